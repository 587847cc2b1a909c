//! Compile-time-ish tunables for the linker core.
//!
//! Named the way `libsyscall` centralizes syscall numbers: call sites refer
//! to these constants instead of repeating the magic numbers the MIPS PIC
//! ABI and the symbol-map text format fix in stone.

/// Size in bytes of one `Elf32_Sym` entry. `.dynamic`'s `SYMENT` tag must
/// equal this or `init` rejects the image with `DlFormat`.
pub const ELF32_SYM_SIZE: u32 = 16;

/// `DT_MIPS_RLD_VERSION` value this loader understands.
pub const MIPS_RLD_VERSION: u32 = 1;

/// `RHF_QUICKSTART` bit in `DT_MIPS_FLAGS` — rejected if set, since this
/// loader never pre-resolves the GOT at link time.
pub const RHF_QUICKSTART: u32 = 0x0000_0001;

/// Number of reserved GOT header words (`got[0]` trampoline, `got[1]`
/// descriptor back-pointer). `got_length` excludes these.
pub const GOT_RESERVED_WORDS: u32 = 2;

/// Maximum symbol name length accepted by the symbol-map text parser,
/// matching the 63-character + NUL budget of the original `nm` dump format.
pub const MAX_SYMBOL_NAME_LEN: usize = 63;

/// Chain-end sentinel written by the symbol-map builder.
pub const MAP_CHAIN_END: u32 = 0xFFFF_FFFF;

/// Well-known export name for the reverse-order constructor table.
pub const CTOR_LIST_SYMBOL: &str = "__CTOR_LIST__";

/// Well-known export name for the forward-order destructor table.
pub const DTOR_LIST_SYMBOL: &str = "__DTOR_LIST__";
