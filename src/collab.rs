//! Collaborator seams.
//!
//! Everything the spec calls out as "external" — file I/O, cache coherence,
//! log transport — lives behind a small trait here, the same way
//! `anyos_std` keeps syscalls, heap, and DLL loading in independent modules
//! the rest of the tree calls into rather than inlining. The core never
//! assumes a particular host; it only ever goes through these seams.

use alloc::vec::Vec;

/// Loads a named file into an owned, heap-allocated buffer.
///
/// `open`/`load_symbol_map` require this collaborator; without one
/// installed they fail with [`crate::error::LinkError::NoFileApi`].
pub trait FileSource {
    /// Returns the file's contents, or `None` if it could not be read.
    fn load(&self, name: &str) -> Option<Vec<u8>>;
}

/// Instruction-cache coherence hook.
///
/// Required after `init` finishes writing GOT fixups, since that touches
/// memory a MIPS core may have speculatively fetched as instructions
/// through the PIC stub path. The lazy resolver's own GOT patch is a data
/// write to a slot the core never executes as code, so it doesn't need
/// this hook — see `resolve::lazy_resolve`.
pub trait CacheOps {
    /// Flush (or otherwise make coherent) the instruction cache for the
    /// `len`-byte region starting at `base`.
    fn flush_icache(&self, base: *const u8, len: usize);
}

/// Destination for the linker core's diagnostic output.
///
/// The bare-metal lazy-resolver fatal path ("no process to fail into") and
/// format-rejection diagnostics route through this instead of a hardcoded
/// UART or named pipe.
pub trait LogSink {
    fn write(&self, msg: &str);
}

/// A `CacheOps`/`LogSink` implementation that does nothing, for hosts that
/// don't need coherence management (e.g. no icache, or tests) or don't
/// care about diagnostics.
pub struct NoopCollaborator;

impl CacheOps for NoopCollaborator {
    fn flush_icache(&self, _base: *const u8, _len: usize) {}
}

impl LogSink for NoopCollaborator {
    fn write(&self, _msg: &str) {}
}
