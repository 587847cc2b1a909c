//! Process-wide collaborator registry for [`FileSource`] and [`CacheOps`].
//!
//! Same `Cell<*const dyn Trait>` shape as [`crate::log`]'s `SinkCell` — one
//! slot per collaborator, defaulting to "absent" (`FileSource`) or to the
//! no-op implementation (`CacheOps`).

use crate::collab::{CacheOps, FileSource, NoopCollaborator};
use core::cell::Cell;

struct FileSourceCell(Cell<Option<&'static dyn FileSource>>);
unsafe impl Sync for FileSourceCell {}

struct CacheOpsCell(Cell<*const dyn CacheOps>);
unsafe impl Sync for CacheOpsCell {}

static NOOP: NoopCollaborator = NoopCollaborator;
static FILE_SOURCE: FileSourceCell = FileSourceCell(Cell::new(None));
static CACHE_OPS: CacheOpsCell = CacheOpsCell(Cell::new(&NOOP as *const dyn CacheOps));

/// Install the collaborator `open`/`load_symbol_map` read files through.
pub fn set_file_source(source: &'static dyn FileSource) {
    FILE_SOURCE.0.set(Some(source));
}

pub(crate) fn file_source() -> Option<&'static dyn FileSource> {
    FILE_SOURCE.0.get()
}

/// Install the instruction-cache coherence collaborator. Defaults to a
/// no-op until one is installed.
pub fn set_cache_ops(ops: &'static dyn CacheOps) {
    CACHE_OPS.0.set(ops as *const dyn CacheOps);
}

pub(crate) fn cache_ops() -> &'static dyn CacheOps {
    // Safety: either `&NOOP` or a caller-supplied `'static` reference
    // installed through `set_cache_ops`.
    unsafe { &*CACHE_OPS.0.get() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting;
    impl FileSource for Counting {
        fn load(&self, name: &str) -> Option<alloc::vec::Vec<u8>> {
            if name == "present" {
                Some(alloc::vec![1, 2, 3])
            } else {
                None
            }
        }
    }

    // `FILE_SOURCE`/`CACHE_OPS` are process-wide, so every test that touches
    // them runs single-threaded against the same global state; this is the
    // one test module that can't use `#[test]`'s default parallelism freely.
    #[test]
    fn install_and_retrieve_file_source() {
        assert!(file_source().is_none());
        static SRC: Counting = Counting;
        set_file_source(&SRC);
        let source = file_source().unwrap();
        assert_eq!(source.load("present"), Some(alloc::vec![1, 2, 3]));
        assert_eq!(source.load("absent"), None);

        assert!(cache_ops_flush_does_not_panic());
    }

    fn cache_ops_flush_does_not_panic() -> bool {
        cache_ops().flush_icache(core::ptr::null(), 0);
        true
    }
}
