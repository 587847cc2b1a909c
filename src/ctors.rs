//! Constructor/destructor table runner — `init`'s stage F and `close`'s
//! teardown step.
//!
//! `__CTOR_LIST__`/`__DTOR_LIST__` are resolved the same way any other
//! module symbol is (through [`crate::lookup`]), then read as a small
//! pointer-width array: `[count, fn_1, fn_2, ..., fn_count]`. Unlike GOT
//! entries and `.dynsym` values, these words are never truncated to the
//! 32-bit wire width — they're real, directly-callable function pointers
//! by the time they reach here, matching the pointer width of whatever
//! target this crate is actually compiled for.

use crate::descriptor::ModuleHandle;
use crate::lookup::lookup_in_module;

type Ctor = extern "C" fn();

fn read_table(module: &ModuleHandle, symbol: &str) -> Option<&'static [usize]> {
    let addr = lookup_in_module(module.descriptor(), symbol)?;
    let count = unsafe { *(addr as *const usize) };
    let entries = unsafe { core::slice::from_raw_parts((addr as *const usize).add(1), count) };
    Some(entries)
}

/// Run `__CTOR_LIST__` in reverse order (`[count] .. [1]`), matching the
/// crtstuff convention this loader's `init` stage F mirrors.
pub(crate) fn run_constructors(module: &ModuleHandle) {
    let Some(entries) = read_table(module, crate::config::CTOR_LIST_SYMBOL) else { return };
    for &raw in entries.iter().rev() {
        let f: Ctor = unsafe { core::mem::transmute::<usize, Ctor>(raw) };
        f();
    }
}

/// Run `__DTOR_LIST__` forward, called from `close` before the descriptor
/// is freed.
pub(crate) fn run_destructors(module: &ModuleHandle) {
    let Some(entries) = read_table(module, crate::config::DTOR_LIST_SYMBOL) else { return };
    for &raw in entries.iter() {
        let f: Ctor = unsafe { core::mem::transmute::<usize, Ctor>(raw) };
        f();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ModuleDescriptor;
    use crate::elf::Elf32Sym;
    use alloc::vec;
    use alloc::vec::Vec;
    use std::sync::Mutex;

    static LOG: Mutex<Vec<u32>> = Mutex::new(Vec::new());

    extern "C" fn record_1() {
        LOG.lock().unwrap().push(1);
    }
    extern "C" fn record_2() {
        LOG.lock().unwrap().push(2);
    }
    extern "C" fn record_3() {
        LOG.lock().unwrap().push(3);
    }

    fn build_with_table(entries: &[usize], target_is_ctor: bool) -> (Vec<u8>, ModuleDescriptor) {
        let mut table: Vec<usize> = vec![entries.len()];
        table.extend_from_slice(entries);

        let strtab = b"\0__CTOR_LIST__\0__DTOR_LIST__\0";
        let name_ctor = 1u32;
        let name_dtor = 1 + "__CTOR_LIST__".len() as u32 + 1;

        // One bucket, two dynsym entries (index 0 reserved).
        let hash_words = 2 + 1 + 3;
        let mut image = vec![0u8; hash_words * 4 + 3 * 16 + strtab.len() + table.len() * 8];
        let hash_base = 0usize;
        let symtab_base = hash_base + hash_words * 4;
        let strtab_base = symtab_base + 3 * 16;
        let table_base = strtab_base + strtab.len();

        // hash: nbuckets=1, nchain=3, bucket[0]=1, chain=[0,2,0]
        let words: [u32; 6] = [1, 3, 1, 0, 2, 0];
        for (i, w) in words.iter().enumerate() {
            image[hash_base + i * 4..hash_base + i * 4 + 4].copy_from_slice(&w.to_ne_bytes());
        }
        image[strtab_base..strtab_base + strtab.len()].copy_from_slice(strtab);

        let symtab_ptr = unsafe { image.as_mut_ptr().add(symtab_base) as *mut Elf32Sym };
        let image_base = image.as_ptr() as usize;
        let table_ptr_in_image = unsafe { image.as_ptr().add(table_base) } as usize;

        let (ctor_value, dtor_value) = if target_is_ctor {
            (table_ptr_in_image as u32, 0)
        } else {
            (0, table_ptr_in_image as u32)
        };

        unsafe {
            symtab_ptr.add(1).write(Elf32Sym {
                st_name: name_ctor,
                st_value: ctor_value,
                st_size: 0,
                st_info: crate::elf::stt::OBJECT,
                st_other: 0,
                st_shndx: 1,
            });
            symtab_ptr.add(2).write(Elf32Sym {
                st_name: name_dtor,
                st_value: dtor_value,
                st_size: 0,
                st_info: crate::elf::stt::OBJECT,
                st_other: 0,
                st_shndx: 1,
            });
        }

        unsafe {
            let dst = image.as_mut_ptr().add(table_base) as *mut usize;
            for (i, w) in table.iter().enumerate() {
                dst.add(i).write(*w);
            }
        }

        let descriptor = ModuleDescriptor {
            image: image.as_mut_ptr(),
            base: image_base as u32,
            size: image.len(),
            owned_buffer: None,
            got: core::ptr::null_mut(),
            got_length: 0,
            hash: unsafe { image.as_ptr().add(hash_base) as *const u32 },
            symtab: symtab_ptr,
            strtab: unsafe { image.as_ptr().add(strtab_base) as *const u8 },
            symbol_count: 3,
        };
        (image, descriptor)
    }

    #[test]
    fn constructors_run_in_reverse_order() {
        LOG.lock().unwrap().clear();
        let entries = [record_1 as usize, record_2 as usize, record_3 as usize];
        let (image, descriptor) = build_with_table(&entries, true);
        let boxed = alloc::boxed::Box::new(descriptor);
        let ptr = core::ptr::NonNull::new(alloc::boxed::Box::into_raw(boxed)).unwrap();
        let module = ModuleHandle(ptr);

        run_constructors(&module);
        assert_eq!(*LOG.lock().unwrap(), vec![3, 2, 1]);

        unsafe { drop(alloc::boxed::Box::from_raw(ptr.as_ptr())) };
        drop(image);
    }

    #[test]
    fn destructors_run_forward() {
        LOG.lock().unwrap().clear();
        let entries = [record_1 as usize, record_2 as usize, record_3 as usize];
        let (image, descriptor) = build_with_table(&entries, false);
        let boxed = alloc::boxed::Box::new(descriptor);
        let ptr = core::ptr::NonNull::new(alloc::boxed::Box::into_raw(boxed)).unwrap();
        let module = ModuleHandle(ptr);

        run_destructors(&module);
        assert_eq!(*LOG.lock().unwrap(), vec![1, 2, 3]);

        unsafe { drop(alloc::boxed::Box::from_raw(ptr.as_ptr())) };
        drop(image);
    }

    #[test]
    fn empty_ctor_list_is_a_no_op() {
        LOG.lock().unwrap().clear();
        let (image, descriptor) = build_with_table(&[], true);
        let boxed = alloc::boxed::Box::new(descriptor);
        let ptr = core::ptr::NonNull::new(alloc::boxed::Box::into_raw(boxed)).unwrap();
        let module = ModuleHandle(ptr);

        run_constructors(&module);
        assert!(LOG.lock().unwrap().is_empty());

        unsafe { drop(alloc::boxed::Box::from_raw(ptr.as_ptr())) };
        drop(image);
    }
}
