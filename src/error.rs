//! Error channel for the linker core.
//!
//! `LinkError` serves the same dual role `VmError` does in a CPU emulator:
//! it's the Rust-level return type for fallible operations *and* the
//! payload of the process-wide last-error channel the C-shaped API surface
//! (`init`, `open`, `sym`, ...) signals failure through via a null/`None`
//! return plus `last_error()`.

use core::cell::Cell;
use core::fmt;

/// Errors recorded by the linker core. Never thrown — always paired with a
/// `None`/null return from the call site that set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// File not found.
    File,
    /// Allocation failure while reading file contents.
    FileMalloc,
    /// Read failed partway through a file.
    FileRead,
    /// Symbol-map lookup attempted before `parse_symbol_map`.
    NoMap,
    /// Symbol-map table allocation failed.
    MapMalloc,
    /// Symbol map parsed successfully but accepted zero entries.
    NoSymbols,
    /// Null or empty image passed to `init`.
    DllNull,
    /// Module descriptor allocation failed.
    DllMalloc,
    /// A `.dynamic` constraint was violated.
    DlFormat,
    /// No `FileSource` collaborator installed; `open`/`load_symbol_map`
    /// unavailable.
    NoFileApi,
    /// Name not present in the symbol map.
    MapSymbol,
    /// Name not present in a module's `.dynsym`/`.hash`.
    DllSymbol,
}

impl LinkError {
    /// Human-readable message, the payload `last_error()` hands back.
    pub fn message(&self) -> &'static str {
        match self {
            LinkError::File => "file not found",
            LinkError::FileMalloc => "allocation failed reading file",
            LinkError::FileRead => "read failed mid-file",
            LinkError::NoMap => "no symbol map loaded",
            LinkError::MapMalloc => "symbol map allocation failed",
            LinkError::NoSymbols => "symbol map accepted zero entries",
            LinkError::DllNull => "null image passed to init",
            LinkError::DllMalloc => "module descriptor allocation failed",
            LinkError::DlFormat => "dynamic section violates format constraints",
            LinkError::NoFileApi => "file API disabled at build time",
            LinkError::MapSymbol => "symbol not found in map",
            LinkError::DllSymbol => "symbol not found in module",
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Convenience alias for fallible linker-core operations.
pub type Result<T> = core::result::Result<T, LinkError>;

// The crate runs single-threaded and cooperative (see §5 of the spec), so a
// plain `Cell` is enough here — there is no concurrent access to guard
// against, only reentrancy, which this core never performs.
struct ErrorCell(Cell<Option<LinkError>>);

// Safety: single-threaded cooperative execution model, never accessed from
// more than one logical thread of control at a time.
unsafe impl Sync for ErrorCell {}

static LAST_ERROR: ErrorCell = ErrorCell(Cell::new(None));

/// Record `kind` as the most recent error. Called only from the
/// originating failure site, mirroring the spec's "standardised failure
/// macro".
pub(crate) fn set_error(kind: LinkError) {
    LAST_ERROR.0.set(Some(kind));
}

/// Read and clear the last recorded error's message.
///
/// Returns `None` if no error is pending. Always resets the channel to
/// `None`, so a second consecutive call with no intervening API call
/// observes `None`.
pub fn last_error() -> Option<&'static str> {
    LAST_ERROR.0.take().map(|kind| kind.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_after_clear() {
        set_error(LinkError::DllSymbol);
        assert_eq!(last_error(), Some("symbol not found in module"));
        assert_eq!(last_error(), None);
    }

    #[test]
    fn message_matches_kind() {
        assert_eq!(LinkError::DlFormat.message(), "dynamic section violates format constraints");
    }
}
