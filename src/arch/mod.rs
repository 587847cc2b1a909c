//! Architecture collaborators.
//!
//! Only the lazy-resolution trampoline lives here — the one piece of this
//! crate that is inherently architecture-specific and cannot be expressed
//! in a portable language, per the loader's own ABI contract (§4.6).

#[cfg(target_arch = "mips")]
pub mod mips;
