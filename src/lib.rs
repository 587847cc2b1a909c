//! A minimal dynamic linker for position-independent MIPS shared objects
//! on a bare-metal target with no OS-provided loader.
//!
//! Accepts a relocatable image produced by a cooperating linker script,
//! interprets its restricted `.dynamic`/`.dynsym`/`.hash`/`.dynstr`
//! metadata, fixes up the Global Offset Table, wires a lazy-resolution
//! trampoline, and resolves cross-module references against either a
//! caller-installed callback or a process-wide symbol map built from an
//! `nm`-style text dump of the host executable.
//!
//! This is not a general ELF loader: it trusts a fixed section layout the
//! linker script guarantees, the same way `anyos_std::dll` trusts the
//! kernel's `SYS_DLL_LOAD` to have already mapped an image before it walks
//! program headers.
//!
//! # Usage
//! ```no_run
//! use dynlink::{init, sym, LinkMode, ModuleRef};
//!
//! # fn get_image() -> &'static mut [u8] { unimplemented!() }
//! let image: &mut [u8] = get_image();
//! let handle = init(image, LinkMode::Lazy).expect("bad image");
//! let addr = sym(ModuleRef::Module(&handle), "anyui_init").expect("missing symbol");
//! let init_fn: extern "C" fn() -> u32 = unsafe { core::mem::transmute(addr) };
//! init_fn();
//! ```

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

mod arch;
pub mod collab;
mod config;
mod ctors;
pub mod descriptor;
pub mod elf;
pub mod error;
pub mod hash;
mod loader;
pub mod log;
mod lookup;
mod registry;
pub mod resolve;
mod symmap;

pub use collab::{CacheOps, FileSource, LogSink};
pub use descriptor::{ModuleDescriptor, ModuleHandle, ModuleRef};
pub use error::{last_error, LinkError};
pub use hash::pjw;
pub use loader::{close, init, open, LinkMode};
pub use registry::{set_cache_ops, set_file_source};
pub use resolve::{set_resolve_callback, ResolveFn};
pub use symmap::{parse_symbol_map, unload_symbol_map};

use error::{set_error, Result};
use registry::file_source;

/// Resolve `name` against either a specific module (`ModuleRef::Module`) or
/// the process-wide symbol map (`ModuleRef::Default`).
///
/// Lookup semantics differ deliberately between the two: a module's own
/// `.hash`/`.dynstr` support byte-wise name comparison, so `sym` verifies
/// names there; the symbol map never stored names, only hashes, so
/// `ModuleRef::Default` trusts a hash match (see [`symmap`] for the
/// collision-risk rationale this preserves from the original design).
pub fn sym(target: ModuleRef<'_>, name: &str) -> Option<*const ()> {
    match target {
        ModuleRef::Default => symmap::lookup(name).map(|addr| addr as usize as *const ()),
        ModuleRef::Module(handle) => lookup::lookup_in_module(handle.descriptor(), name),
    }
}

/// Equivalent to `sym(ModuleRef::Default, name)` — look up `name` in the
/// process-wide symbol map built by [`parse_symbol_map`]/[`load_symbol_map`].
pub fn get_symbol_by_name(name: &str) -> Option<*const ()> {
    sym(ModuleRef::Default, name)
}

/// Parse an `nm`-style dump loaded from `filename` through the installed
/// [`FileSource`] and install it as the process-wide symbol map.
///
/// Fails with [`LinkError::NoFileApi`] if no `FileSource` collaborator is
/// installed, or [`LinkError::File`] if the load itself fails.
pub fn load_symbol_map(filename: &str) -> Option<u32> {
    match load_symbol_map_inner(filename) {
        Ok(n) => Some(n),
        Err(e) => {
            set_error(e);
            None
        }
    }
}

fn load_symbol_map_inner(filename: &str) -> Result<u32> {
    let source = file_source().ok_or(LinkError::NoFileApi)?;
    let text = source.load(filename).ok_or(LinkError::File)?;
    parse_symbol_map(&text).ok_or(LinkError::NoSymbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct StaticMapSource;
    impl FileSource for StaticMapSource {
        fn load(&self, name: &str) -> Option<Vec<u8>> {
            if name == "symbols.map" {
                Some(alloc::vec::Vec::from(&b"widget T 80010000 4\n"[..]))
            } else {
                None
            }
        }
    }

    #[test]
    fn get_symbol_by_name_delegates_to_default_map() {
        unload_symbol_map();
        parse_symbol_map(b"thing T 1234 4\n").unwrap();
        assert_eq!(get_symbol_by_name("thing"), Some(0x1234usize as *const ()));
        assert_eq!(get_symbol_by_name("absent"), None);
        unload_symbol_map();
    }

    #[test]
    fn load_symbol_map_without_file_source_fails_cleanly() {
        // This test only asserts the no-collaborator path when nothing has
        // installed a `FileSource` yet in this test binary's run.
        if registry::file_source().is_none() {
            assert_eq!(load_symbol_map("whatever"), None);
            assert_eq!(last_error(), Some("file API disabled at build time"));
        }
    }

    #[test]
    fn load_symbol_map_round_trips_through_file_source() {
        static SRC: StaticMapSource = StaticMapSource;
        set_file_source(&SRC);
        unload_symbol_map();

        assert_eq!(load_symbol_map("symbols.map"), Some(1));
        assert_eq!(get_symbol_by_name("widget"), Some(0x8001_0000usize as *const ()));

        assert_eq!(load_symbol_map("missing.map"), None);
        assert_eq!(last_error(), Some("file not found"));
        unload_symbol_map();
    }
}
