//! Reading the dynamic metadata of an object that is already mapped.
//!
//! Nothing here touches the file on disk: headers, the dynamic section,
//! symbol and relocation tables are all read from the live mapping, through
//! a view limited to the object's readable ranges.

mod defs;
mod dynamic;
mod ehdr;
mod hash;
mod reloc;
mod symbol;
mod view;

pub use reloc::{RelEncoding, RelFamily, RelocTable, ResolvedSlot, SlotKind};

use crate::{Result, locate::ObjectMapping, malformed_error, symbol_not_found};
use alloc::vec::Vec;
use core::mem::size_of;
use defs::{Dyn, ElfPhdr};
use dynamic::ElfDynamic;
use ehdr::ElfHeader;
use elf::abi::{DT_REL, DT_RELA, PT_DYNAMIC, PT_LOAD};
use symbol::SymbolTable;
use view::MemoryView;

/// Dynamic metadata of one mapped object.
#[derive(Debug)]
pub struct ElfImage {
    view: MemoryView,
    /// Difference between run-time addresses and link-time virtual addresses.
    bias: usize,
    symbols: SymbolTable,
    tables: Vec<RelocTable>,
}

impl ElfImage {
    /// Validates the header at `object.load_bias` and collects the symbol
    /// and relocation tables named by the dynamic section.
    pub fn parse(object: &ObjectMapping) -> Result<ElfImage> {
        let view = MemoryView::new(object.readable_ranges());
        let load_bias = object.load_bias;
        let ehdr: ElfHeader = view.read(load_bias)?;
        ehdr.validate()?;

        let phdr_table = load_bias
            .checked_add(ehdr.e_phoff())
            .ok_or_else(|| malformed_error("program header offset overflows"))?;
        let mut first_load = None;
        let mut dynamic_phdr = None;
        for idx in 0..ehdr.e_phnum() {
            let phdr: ElfPhdr = view.read_at(phdr_table, idx)?;
            match phdr.p_type {
                PT_LOAD if first_load.is_none() => first_load = Some(phdr),
                PT_DYNAMIC => dynamic_phdr = Some(phdr),
                _ => {}
            }
        }
        let first_load =
            first_load.ok_or_else(|| malformed_error("object has no PT_LOAD segment"))?;
        let dynamic_phdr =
            dynamic_phdr.ok_or_else(|| malformed_error("object has no PT_DYNAMIC segment"))?;

        // addresses wrap for objects linked above their load address
        let bias = load_bias
            .wrapping_add(first_load.p_offset as usize)
            .wrapping_sub(first_load.p_vaddr as usize);
        let dynamic = ElfDynamic::parse(
            &view,
            bias.wrapping_add(dynamic_phdr.p_vaddr as usize),
            dynamic_phdr.p_memsz as usize / size_of::<Dyn>(),
            bias,
        )?;
        let symbols = SymbolTable::from_dynamic(&view, &dynamic)?;
        let tables = reloc_tables(&dynamic)?;
        for table in &tables {
            view.check(table.addr, table.size, "relocation table")?;
        }

        #[cfg(feature = "log")]
        log::trace!(
            "[Parse] load bias: 0x{:x}, bias: 0x{:x}, {} relocation tables",
            load_bias,
            bias,
            tables.len()
        );

        Ok(ElfImage {
            view,
            bias,
            symbols,
            tables,
        })
    }

    /// Offset added to link-time addresses to obtain run-time addresses.
    #[inline]
    pub fn bias(&self) -> usize {
        self.bias
    }

    #[inline]
    pub fn reloc_tables(&self) -> &[RelocTable] {
        &self.tables
    }

    /// Finds every slot through which the object reaches `name`.
    ///
    /// A version suffix on `name` is ignored. A symbol that is absent, or
    /// present without a PLT, GOT or absolute-word relocation, is reported as
    /// [`crate::Error::SymbolNotFound`].
    pub fn resolve_symbol(&self, name: &str) -> Result<Vec<ResolvedSlot>> {
        let Some(sym_idx) = self.symbols.lookup(&self.view, name)? else {
            return Err(symbol_not_found(name));
        };
        let mut slots = Vec::new();
        for table in &self.tables {
            let bytes = self.view.bytes(table.addr, table.size)?;
            for reloc in reloc::decode(table.encoding, bytes)? {
                if reloc.r_symbol != sym_idx {
                    continue;
                }
                let Some(kind) = reloc::slot_kind(table.family, reloc.r_type) else {
                    continue;
                };
                let addr = self.bias.wrapping_add(reloc.r_offset);
                #[cfg(feature = "log")]
                log::trace!(
                    "[Resolve] {}: {} slot at 0x{:x}",
                    name,
                    reloc.r_type_str(),
                    addr
                );
                slots.push(ResolvedSlot { addr, kind });
            }
        }
        if slots.is_empty() {
            return Err(symbol_not_found(name));
        }
        Ok(slots)
    }
}

fn reloc_tables(dynamic: &ElfDynamic) -> Result<Vec<RelocTable>> {
    let mut tables = Vec::new();
    if let Some(addr) = dynamic.jmprel.filter(|_| dynamic.pltrelsz != 0) {
        let encoding = match dynamic.pltrel {
            Some(DT_RELA) => RelEncoding::Rela,
            Some(DT_REL) => RelEncoding::Rel,
            None => RelEncoding::NATIVE,
            Some(_) => return Err(malformed_error("invalid DT_PLTREL")),
        };
        tables.push(RelocTable {
            encoding,
            family: RelFamily::Plt,
            addr,
            size: dynamic.pltrelsz,
        });
    }
    if let Some(addr) = dynamic.rela.filter(|_| dynamic.relasz != 0) {
        tables.push(RelocTable {
            encoding: RelEncoding::Rela,
            family: RelFamily::Dyn,
            addr,
            size: dynamic.relasz,
        });
    }
    if let Some(addr) = dynamic.rel.filter(|_| dynamic.relsz != 0) {
        tables.push(RelocTable {
            encoding: RelEncoding::Rel,
            family: RelFamily::Dyn,
            addr,
            size: dynamic.relsz,
        });
    }
    Ok(tables)
}
