//! Loader/Relocator — stages A-F of `init`, plus `open`/`close`.
//!
//! This is the component the spec calls out as the hardest and most
//! characteristic part of the tree: it interprets `.dynamic` without a
//! general ELF parser, fixes up the GOT and `.dynsym`, installs the lazy
//! trampoline, and optionally pre-resolves external references.

use crate::config::{
    ELF32_SYM_SIZE, GOT_RESERVED_WORDS, MIPS_RLD_VERSION, RHF_QUICKSTART,
};
use crate::ctors::{run_constructors, run_destructors};
use crate::descriptor::{ModuleDescriptor, ModuleHandle, OwnedBuffer};
use crate::elf::{dt, Elf32Dyn, Elf32Sym};
use crate::error::{set_error, LinkError, Result};
use crate::registry::{cache_ops, file_source};
use crate::resolve::{resolve_symbol, trampoline_address};
use core::mem::size_of;
use core::ptr::NonNull;

/// Lazy vs. eager resolution mode. `Default` is deliberately not a member
/// here — it's a sentinel for [`crate::descriptor::ModuleRef`], never a
/// mode passed to `init`/`open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Resolve external references on first call, through the trampoline.
    Lazy,
    /// Resolve every external reference before `init`/`open` returns.
    Now,
}

/// Stage B scratch: the handful of `.dynamic` values collected before the
/// GOT/symtab fixup stages can run.
#[derive(Default)]
struct DynamicInfo {
    got_off: Option<u32>,
    hash_off: Option<u32>,
    strtab_off: Option<u32>,
    symtab_off: Option<u32>,
    local_gotno: u32,
    symtabno: u32,
    gotsym: u32,
}

/// Stage B: walk `.dynamic` at `image[0..]`, validating the handful of
/// constraints the spec fixes in stone.
fn parse_dynamic(image: &[u8]) -> Result<DynamicInfo> {
    let mut info = DynamicInfo::default();
    let entry_size = size_of::<Elf32Dyn>();
    let mut offset = 0usize;

    loop {
        if offset + entry_size > image.len() {
            return Err(LinkError::DlFormat);
        }
        // Safety: bounds checked just above; `.dynamic` entries are 8-byte
        // (tag, value) pairs per the image format.
        let entry = unsafe { (image.as_ptr().add(offset) as *const Elf32Dyn).read_unaligned() };
        offset += entry_size;

        match entry.d_tag {
            dt::NULL => break,
            dt::PLTGOT => info.got_off = Some(entry.d_val),
            dt::HASH => info.hash_off = Some(entry.d_val),
            dt::STRTAB => info.strtab_off = Some(entry.d_val),
            dt::SYMTAB => info.symtab_off = Some(entry.d_val),
            dt::SYMENT => {
                if entry.d_val != ELF32_SYM_SIZE {
                    return Err(LinkError::DlFormat);
                }
            }
            dt::MIPS_RLD_VERSION => {
                if entry.d_val != MIPS_RLD_VERSION {
                    return Err(LinkError::DlFormat);
                }
            }
            dt::MIPS_FLAGS => {
                if entry.d_val & RHF_QUICKSTART != 0 {
                    return Err(LinkError::DlFormat);
                }
            }
            dt::MIPS_LOCAL_GOTNO => info.local_gotno = entry.d_val,
            dt::MIPS_BASE_ADDRESS => {
                if entry.d_val != 0 {
                    return Err(LinkError::DlFormat);
                }
            }
            dt::MIPS_SYMTABNO => info.symtabno = entry.d_val,
            dt::MIPS_GOTSYM => info.gotsym = entry.d_val,
            _ => {}
        }
    }

    Ok(info)
}

/// Load an already in-memory image. `image` must outlive the returned
/// handle unless it was allocated for this call (see [`open`]).
pub fn init(image: &mut [u8], mode: LinkMode) -> Option<ModuleHandle> {
    match init_inner(image, mode, None) {
        Ok(handle) => Some(handle),
        Err(e) => {
            set_error(e);
            None
        }
    }
}

/// Load `filename` through the installed [`crate::collab::FileSource`],
/// taking ownership of the returned buffer.
pub fn open(filename: &str, mode: LinkMode) -> Option<ModuleHandle> {
    let Some(source) = file_source() else {
        set_error(LinkError::NoFileApi);
        return None;
    };
    let Some(buffer) = source.load(filename) else {
        set_error(LinkError::File);
        return None;
    };
    if buffer.is_empty() {
        set_error(LinkError::DllNull);
        return None;
    }

    // Shrink to a boxed slice first so `layout` (computed from `len`) is
    // guaranteed to match the allocation `Box::into_raw` hands back — a
    // `Vec`'s spare capacity would make an array-of-`len` layout wrong to
    // `dealloc` with later.
    let boxed: alloc::boxed::Box<[u8]> = buffer.into_boxed_slice();
    let len = boxed.len();
    let layout = match core::alloc::Layout::array::<u8>(len) {
        Ok(l) => l,
        Err(_) => {
            set_error(LinkError::FileMalloc);
            return None;
        }
    };
    let raw = alloc::boxed::Box::into_raw(boxed) as *mut u8;
    // Safety: `raw` was just produced by `Box::into_raw` and is unaliased.
    let owned = OwnedBuffer { ptr: unsafe { NonNull::new_unchecked(raw) }, layout };
    // Safety: `raw` is valid for `len` bytes, uniquely owned by `owned`
    // until it's either moved into the descriptor below or dropped on an
    // early-return path inside `init_inner`.
    let image: &mut [u8] = unsafe { core::slice::from_raw_parts_mut(raw, len) };

    match init_inner(image, mode, Some(owned)) {
        Ok(handle) => Some(handle),
        Err(e) => {
            set_error(e);
            None
        }
    }
}

fn init_inner(
    image: &mut [u8],
    mode: LinkMode,
    owned: Option<OwnedBuffer>,
) -> Result<ModuleHandle> {
    if image.is_empty() {
        return Err(LinkError::DllNull);
    }

    let info = parse_dynamic(image)?;

    let got_off = info.got_off.ok_or(LinkError::DlFormat)?;
    let hash_off = info.hash_off.ok_or(LinkError::DlFormat)?;
    let strtab_off = info.strtab_off.ok_or(LinkError::DlFormat)?;
    let symtab_off = info.symtab_off.ok_or(LinkError::DlFormat)?;

    if info.symtabno < info.gotsym {
        return Err(LinkError::DlFormat);
    }
    let got_length = info
        .local_gotno
        .checked_add(info.symtabno - info.gotsym)
        .and_then(|v| v.checked_sub(GOT_RESERVED_WORDS))
        .ok_or(LinkError::DlFormat)?;

    let image_base = image.as_mut_ptr();
    let image_len = image.len();

    let mut ptr = ModuleDescriptor::allocate(image_base, image_len).ok_or(LinkError::DllMalloc)?;
    // Safety: just allocated, uniquely held by this function so far.
    let descriptor = unsafe { ptr.as_mut() };
    descriptor.owned_buffer = owned;
    descriptor.got = unsafe { image_base.add(got_off as usize) as *mut u32 };
    descriptor.got_length = got_length;
    descriptor.hash = unsafe { image_base.add(hash_off as usize) as *const u32 };
    descriptor.symtab = unsafe { image_base.add(symtab_off as usize) as *const Elf32Sym };
    descriptor.strtab = unsafe { image_base.add(strtab_off as usize) as *const u8 };
    descriptor.symbol_count = info.symtabno;

    let base = descriptor.base;

    // Stage C: install the trampoline, back-pointer, and base-relocate the
    // GOT's local partition.
    unsafe {
        *descriptor.got = trampoline_address();
        *descriptor.got.add(1) = ModuleDescriptor::self_address(ptr);
    }
    for i in 0..got_length {
        let slot = descriptor.got_slot(i);
        // Safety: `i < got_length`, computed from `.dynamic` above and
        // guaranteed in-bounds by the cooperating linker script.
        unsafe { *slot = (*slot).wrapping_add(base) };
    }

    // Stage D: relocate defined symbols, optionally pre-resolve externals.
    let mut got_offset = 0u32;
    for i in 0..info.symtabno {
        let mut sym = descriptor.read_symtab(i);
        if sym.st_value == 0 {
            continue;
        }
        sym.st_value = sym.st_value.wrapping_add(base);
        descriptor.write_symtab(i, sym);

        if mode == LinkMode::Now && sym.is_undefined_data_or_func() {
            let name = descriptor.strtab_name(sym.st_name);
            let module = ModuleHandle(ptr);

            // Stage C already base-relocated every GOT slot in
            // `[0, got_length)`, including this stub, so the slot to match
            // against is the *relocated* `st_value`, not the raw stub.
            let mut found = None;
            for j in got_offset..got_length {
                let slot = descriptor.got_slot(j);
                // Safety: `j < got_length`.
                if unsafe { *slot } == sym.st_value {
                    found = Some(j);
                    break;
                }
            }
            let Some(j) = found else { continue };

            let Some(addr) = resolve_symbol(&module, name) else {
                // Safety: allocated above by `ModuleDescriptor::allocate`
                // and not freed anywhere on this path yet.
                unsafe { ModuleDescriptor::free(ptr) };
                return Err(LinkError::MapSymbol);
            };
            unsafe { *descriptor.got_slot(j) = addr };
            got_offset = j;
        }
    }

    // Stage E: flush the instruction cache before any constructor can run.
    cache_ops().flush_icache(image_base as *const u8, image_len);

    // Stage F: run constructors in reverse.
    let module = ModuleHandle(ptr);
    run_constructors(&module);

    Ok(module)
}

/// Run destructors and free the descriptor (and its owned buffer, if any).
pub fn close(handle: ModuleHandle) {
    run_destructors(&handle);
    // Safety: `handle.0` was produced by `ModuleDescriptor::allocate` in
    // `init_inner` and this is the only `close` call for it — `handle` is
    // consumed by value.
    unsafe { ModuleDescriptor::free(handle.0) };
}
