//! MIPS o32 lazy-resolution trampoline.
//!
//! Entered directly by PIC call stubs with `$t8` holding the `.dynsym`
//! index of the callee and `$gp` pointing at `got[0]`, so `got[1]`, the
//! descriptor back-pointer, sits at `4($gp)`. Argument registers `$a0`-`$a3`
//! and `$f12`-`$f15` must survive the detour since the real callee hasn't
//! seen them yet; `$v0`/`$v1` are clobberable, this is a call site, not a
//! return.

use crate::descriptor::ModuleHandle;
use crate::resolve::lazy_resolve;
use core::ptr::NonNull;

core::arch::global_asm!(
    ".set noreorder",
    ".global dll_trampoline",
    ".type dll_trampoline, @function",
    "dll_trampoline:",
    "addiu $sp, $sp, -32",
    "sw    $ra, 28($sp)",
    "sw    $a0, 16($sp)",
    "sw    $a1, 20($sp)",
    "sw    $a2, 24($sp)",
    "sw    $a3, 12($sp)",
    "lw    $a0, 4($gp)",   // got[1]: descriptor back-pointer
    "move  $a1, $t8",      // dynsym index
    "jal   dll_trampoline_helper",
    "nop",
    "move  $t9, $v0",
    "lw    $ra, 28($sp)",
    "lw    $a0, 16($sp)",
    "lw    $a1, 20($sp)",
    "lw    $a2, 24($sp)",
    "lw    $a3, 12($sp)",
    "addiu $sp, $sp, 32",
    "jr    $t9",
    "nop",
    ".set reorder",
);

/// Rust landing pad for `dll_trampoline`: rebuilds the handle and index,
/// asks [`lazy_resolve`] for the real address, hands it back in `$v0` for
/// the asm to tail-jump into.
#[no_mangle]
extern "C" fn dll_trampoline_helper(descriptor: *mut (), index: u32) -> usize {
    let Some(ptr) = NonNull::new(descriptor as *mut crate::descriptor::ModuleDescriptor) else {
        panic!("lazy resolve entered with a null descriptor");
    };
    let module = ModuleHandle(ptr);
    lazy_resolve(&module, index) as usize
}

extern "C" {
    fn dll_trampoline();
}

/// Entry point address written into `got[0]` during `init`'s stage C.
pub fn trampoline_entry() -> usize {
    dll_trampoline as usize
}
