//! Cross-checks resolved slots against the relocations `object` reads from
//! the file on disk.
mod common;

use common::{exe_image, get_path, record_by_path};
use elf_hook::{ElfImage, MapRecord, arch, locate};
use object::{Object, ObjectSymbol, ObjectSymbolTable, RelocationFlags, RelocationTarget};
use std::path::Path;

/// Offsets of the relocations against `name` that write a whole slot.
fn slot_offsets_on_disk(path: &Path, name: &str) -> Vec<u64> {
    let data = std::fs::read(path).unwrap();
    let file = object::File::parse(&*data).unwrap();
    let symbols = file.dynamic_symbol_table().unwrap();
    let mut offsets: Vec<u64> = file
        .dynamic_relocations()
        .unwrap()
        .filter(|(_, reloc)| {
            matches!(
                reloc.flags(),
                RelocationFlags::Elf { r_type }
                    if r_type == arch::REL_JUMP_SLOT
                        || r_type == arch::REL_GOT
                        || r_type == arch::REL_SYMBOLIC
            )
        })
        .filter(|(_, reloc)| match reloc.target() {
            RelocationTarget::Symbol(index) => symbols
                .symbol_by_index(index)
                .and_then(|symbol| symbol.name().map(|sym| sym == name))
                .unwrap_or(false),
            _ => false,
        })
        .map(|(offset, _)| offset)
        .collect();
    offsets.sort_unstable();
    offsets
}

fn resolved_offsets(image: &ElfImage, name: &str) -> Vec<u64> {
    let mut offsets: Vec<u64> = image
        .resolve_symbol(name)
        .unwrap()
        .iter()
        .map(|slot| (slot.addr - image.bias()) as u64)
        .collect();
    offsets.sort_unstable();
    offsets
}

#[test]
fn executable_slots_match_the_file() {
    let (_, _, image) = exe_image();
    let exe = std::env::current_exe().unwrap();
    let expected = slot_offsets_on_disk(&exe, "getpid");
    assert!(!expected.is_empty());
    assert_eq!(resolved_offsets(&image, "getpid"), expected);
}

#[test]
fn fixture_slots_match_the_file() {
    let path = get_path("libhook_target.so");
    if !path.exists() {
        return;
    }
    let _lib = unsafe { libloading::Library::new(&path).unwrap() };
    let records = MapRecord::scan_self().unwrap();
    let real = std::fs::canonicalize(&path).unwrap();
    let record = record_by_path(&records, &real)
        .or_else(|| record_by_path(&records, &path))
        .unwrap();
    let object = locate(&records, record.dev, record.inode, None).unwrap();
    let image = ElfImage::parse(&object).unwrap();

    let expected = slot_offsets_on_disk(&path, "getpid");
    assert!(expected.len() >= 2);
    assert_eq!(resolved_offsets(&image, "getpid"), expected);
}

#[test]
fn tables_lie_inside_the_executable() {
    let (_, object, image) = exe_image();
    let ranges = object.readable_ranges();
    assert!(!image.reloc_tables().is_empty());
    for table in image.reloc_tables() {
        assert!(
            ranges
                .iter()
                .any(|range| range.start <= table.addr && table.addr + table.size <= range.end),
            "{table:?} outside {ranges:x?}"
        );
    }
}
