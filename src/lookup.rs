//! Module symbol lookup — `sym`'s per-module half.
//!
//! Unlike the process-wide symbol map ([`crate::symmap`]), a module carries
//! its own `.dynstr`, so lookup here verifies the name byte-for-byte after
//! the hash narrows it to a bucket, rather than trusting the hash alone.

use crate::descriptor::ModuleDescriptor;
use crate::error::{set_error, LinkError};
use crate::hash::pjw;

/// Resolve `name` against `descriptor`'s `.hash`/`.dynsym`/`.dynstr`.
///
/// Returns the symbol's relocated address, or `None` (with [`LinkError::DllSymbol`]
/// recorded) if no `.dynsym` entry named `name` is reachable from its bucket.
pub(crate) fn lookup_in_module(descriptor: &ModuleDescriptor, name: &str) -> Option<*const ()> {
    let (nbuckets, _nchain) = descriptor.hash_header();
    if nbuckets == 0 {
        set_error(LinkError::DllSymbol);
        return None;
    }

    let h = pjw(name.as_bytes());
    let mut idx = descriptor.hash_bucket(nbuckets, h % nbuckets);

    while idx != 0 {
        let sym = descriptor.read_symtab(idx);
        if sym.st_value != 0 {
            let candidate = descriptor.strtab_name(sym.st_name);
            if candidate == name {
                return Some(sym.st_value as usize as *const ());
            }
        }
        idx = descriptor.hash_chain(nbuckets, idx);
    }

    set_error(LinkError::DllSymbol);
    None
}
