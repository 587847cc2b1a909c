//! Image Descriptor — the runtime record for one loaded module.
//!
//! Two pointer-shaped quantities appear here and they are deliberately
//! different things. `image` is a real, dereferenceable pointer into this
//! process's address space — it's what `got`/`hash`/`symtab`/`strtab` are
//! computed from, and it's what `init`'s internal navigation always reads
//! and writes through. `base` is the *wire-format address value* `.got`
//! entries and `st_value` fields get relocated against, matching the
//! spec's 32-bit MIPS PIC ABI exactly. On real MIPS32 hardware these two
//! coincide (a pointer there already is a 32-bit address), so there is
//! nothing to reconcile in the deployed target; the split only exists so
//! this crate is sound to unit-test on a wider-pointer host, where
//! `image` can't always be truncated into a `u32` without losing the
//! ability to dereference it.

use crate::elf::Elf32Sym;
use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use core::ptr::NonNull;

/// Opaque handle to a loaded module, returned by `init`/`open` and consumed
/// by `close`/`sym`.
pub struct ModuleHandle(pub(crate) NonNull<ModuleDescriptor>);

// The handle only ever carries a pointer into memory this crate owns and
// only touches from one logical thread of control at a time (see spec §5).
unsafe impl Send for ModuleHandle {}
unsafe impl Sync for ModuleHandle {}

impl ModuleHandle {
    pub(crate) fn descriptor(&self) -> &ModuleDescriptor {
        // Safety: the pointer was allocated by `ModuleDescriptor::allocate`
        // and freed only by `close`, which consumes the handle.
        unsafe { self.0.as_ref() }
    }
}

/// Selects which symbol table `sym` consults.
pub enum ModuleRef<'a> {
    /// The process-wide symbol map (built from an `nm`-style dump).
    Default,
    /// A specific loaded module's own `.dynsym`/`.hash`.
    Module(&'a ModuleHandle),
}

/// A buffer the descriptor owns and must free on `close`.
///
/// Owns the memory outright: wherever this value currently lives (a bare
/// local in `loader::open`'s error path, or tucked inside a live
/// `ModuleDescriptor`) is exactly where the single deallocation happens,
/// via `Drop`, so no call site has to remember to free it by hand.
pub(crate) struct OwnedBuffer {
    pub ptr: NonNull<u8>,
    pub layout: Layout,
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        // Safety: `ptr`/`layout` describe an allocation this value has
        // unique ownership of (see struct docs) and this runs at most once.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// Runtime state for one loaded module. Allocated on the heap; the pointer
/// handed back by `init`/`open` *is* the descriptor's address, and that
/// same address (truncated to the wire width) is what `got[1]` holds —
/// see the module docs above for why those two facts don't quite line up
/// bit-for-bit off-target.
pub struct ModuleDescriptor {
    /// Real, dereferenceable pointer to image byte 0.
    pub(crate) image: *mut u8,
    /// Wire-format load address: `image as usize as u32` on the host this
    /// happens to run on; identical to a real MIPS32 pointer on target.
    pub(crate) base: u32,
    /// Total image size in bytes.
    pub(crate) size: usize,
    /// Set when this descriptor allocated `image` itself (via `open`);
    /// `close` frees it. `None` when the caller supplied the buffer to
    /// `init` and retains ownership.
    pub(crate) owned_buffer: Option<OwnedBuffer>,
    /// Pointer to `got[0]`.
    pub(crate) got: *mut u32,
    /// GOT entries past the two reserved header words.
    pub(crate) got_length: u32,
    /// Pointer to the `.hash` section (`[nbuckets, nchain, bucket[], chain[]]`).
    pub(crate) hash: *const u32,
    /// Pointer to the `.dynsym` table.
    pub(crate) symtab: *const Elf32Sym,
    /// Pointer to the `.dynstr` table.
    pub(crate) strtab: *const u8,
    /// Total `.dynsym` entry count (`DT_MIPS_SYMTABNO`).
    pub(crate) symbol_count: u32,
}

impl ModuleDescriptor {
    /// Allocate and zero a descriptor on the heap, matching stage A of
    /// `init`/`open`. Returns `None` on allocation failure (`DllMalloc`).
    pub(crate) fn allocate(image: *mut u8, size: usize) -> Option<NonNull<ModuleDescriptor>> {
        let layout = Layout::new::<ModuleDescriptor>();
        // Safety: layout is non-zero-sized and well-formed for this type.
        let raw = unsafe { alloc_zeroed(layout) } as *mut ModuleDescriptor;
        let ptr = NonNull::new(raw)?;
        let base = image as usize as u32;
        // Safety: `raw` was just allocated with the correct layout for
        // `ModuleDescriptor` and is not aliased anywhere else yet.
        unsafe {
            raw.write(ModuleDescriptor {
                image,
                base,
                size,
                owned_buffer: None,
                got: core::ptr::null_mut(),
                got_length: 0,
                hash: core::ptr::null(),
                symtab: core::ptr::null(),
                strtab: core::ptr::null(),
                symbol_count: 0,
            });
        }
        Some(ptr)
    }

    /// The descriptor's own address, truncated to the wire width — this
    /// is exactly what gets written into `got[1]`.
    pub(crate) fn self_address(ptr: NonNull<ModuleDescriptor>) -> u32 {
        ptr.as_ptr() as usize as u32
    }

    /// Free this descriptor and, if set, the buffer it owns.
    ///
    /// # Safety
    /// `ptr` must be a descriptor returned by [`ModuleDescriptor::allocate`]
    /// and not already freed.
    pub(crate) unsafe fn free(ptr: NonNull<ModuleDescriptor>) {
        // Moving the descriptor out and letting it drop here is what frees
        // `owned_buffer` (via `OwnedBuffer`'s `Drop`) when one is set.
        let descriptor = unsafe { ptr.as_ptr().read() };
        unsafe { dealloc(ptr.as_ptr() as *mut u8, Layout::new::<ModuleDescriptor>()) };
        drop(descriptor);
    }

    /// Byte range `[base, base+size)` this descriptor's image occupies, in
    /// wire-address space.
    pub fn address_range(&self) -> core::ops::Range<u32> {
        self.base..self.base.wrapping_add(self.size as u32)
    }

    /// Pointer to `got[2+i]`, the `i`th entry past the reserved header.
    pub(crate) fn got_slot(&self, i: u32) -> *mut u32 {
        // Safety: callers keep `i < got_length`, and `got` was computed to
        // point inside `image` during stage B.
        unsafe { self.got.add(2 + i as usize) }
    }

    pub(crate) fn read_symtab(&self, index: u32) -> Elf32Sym {
        // Safety: `index < symbol_count`, checked by callers.
        unsafe { self.symtab.add(index as usize).read() }
    }

    pub(crate) fn write_symtab(&self, index: u32, sym: Elf32Sym) {
        // Safety: same as `read_symtab`; `symtab` points inside `image`,
        // which is writable (we hold `&mut [u8]` for it during `init`, or
        // own it outright after `open`).
        unsafe { (self.symtab as *mut Elf32Sym).add(index as usize).write(sym) };
    }

    /// Read the NUL-terminated name at `.dynstr` offset `offset`.
    pub(crate) fn strtab_name(&self, offset: u32) -> &str {
        let start = unsafe { self.strtab.add(offset as usize) };
        let mut len = 0usize;
        // Safety: a well-formed image's `.dynstr` is NUL-terminated within
        // the image bounds; a malformed one can run this past the image,
        // which is the same trust boundary stage B already accepts for an
        // unbounded `.dynamic` walk.
        while unsafe { *start.add(len) } != 0 {
            len += 1;
        }
        let bytes = unsafe { core::slice::from_raw_parts(start, len) };
        core::str::from_utf8(bytes).unwrap_or("")
    }

    /// `.hash` header: `(nbuckets, nchain)`.
    pub(crate) fn hash_header(&self) -> (u32, u32) {
        // Safety: `hash` points at a `.hash` section, computed in stage B.
        unsafe { (*self.hash, *self.hash.add(1)) }
    }

    /// `bucket[b]`, the head of chain `b`.
    pub(crate) fn hash_bucket(&self, nbuckets: u32, b: u32) -> u32 {
        let _ = nbuckets;
        unsafe { *self.hash.add(2 + b as usize) }
    }

    /// `chain[i]`, the continuation link for `.dynsym` index `i`.
    pub(crate) fn hash_chain(&self, nbuckets: u32, i: u32) -> u32 {
        unsafe { *self.hash.add(2 + nbuckets as usize + i as usize) }
    }
}
