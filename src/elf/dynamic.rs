//! Parsing the `.dynamic` section of a mapped object
use crate::{
    Result,
    elf::{defs::Dyn, view::MemoryView},
    malformed_error,
};
use core::num::NonZeroUsize;
use elf::abi::*;

/// Location of a table named by a dynamic entry.
///
/// glibc relocates pointer-valued dynamic entries in place when it loads an
/// object, other loaders leave them as virtual addresses. A value below the
/// bias is a virtual address; anything else is already absolute.
#[inline]
fn table_addr(bias: usize, ptr: NonZeroUsize) -> usize {
    let ptr = ptr.get();
    if ptr >= bias { ptr } else { bias.wrapping_add(ptr) }
}

/// Information in the dynamic section, with table pointers made absolute.
#[derive(Debug, Default)]
pub(crate) struct ElfDynamic {
    /// DT_SYMTAB
    pub symtab: usize,
    /// DT_SYMENT
    pub syment: Option<NonZeroUsize>,
    /// DT_STRTAB
    pub strtab: usize,
    /// DT_STRSZ
    pub strsz: usize,
    /// DT_HASH
    pub hash: Option<usize>,
    /// DT_GNU_HASH
    pub gnu_hash: Option<usize>,
    /// DT_JMPREL
    pub jmprel: Option<usize>,
    /// DT_PLTRELSZ
    pub pltrelsz: usize,
    /// DT_PLTREL, either DT_REL or DT_RELA
    pub pltrel: Option<i64>,
    /// DT_REL
    pub rel: Option<usize>,
    /// DT_RELSZ
    pub relsz: usize,
    /// DT_RELA
    pub rela: Option<usize>,
    /// DT_RELASZ
    pub relasz: usize,
}

impl ElfDynamic {
    /// Walks at most `count` entries starting at `addr` until `DT_NULL`.
    pub(crate) fn parse(
        view: &MemoryView,
        addr: usize,
        count: usize,
        bias: usize,
    ) -> Result<ElfDynamic> {
        let mut symtab = None;
        let mut strtab = None;
        let mut strsz = None;
        let mut dynamic = ElfDynamic::default();

        for idx in 0..count {
            let entry: Dyn = view.read_at(addr, idx)?;
            let value = entry.d_un as usize;
            let ptr = NonZeroUsize::new(value).map(|ptr| table_addr(bias, ptr));
            match entry.d_tag as i64 {
                DT_NULL => break,
                DT_SYMTAB => symtab = ptr,
                DT_STRTAB => strtab = ptr,
                DT_STRSZ => strsz = Some(value),
                DT_SYMENT => dynamic.syment = NonZeroUsize::new(value),
                DT_HASH => dynamic.hash = ptr,
                DT_GNU_HASH => dynamic.gnu_hash = ptr,
                DT_JMPREL => dynamic.jmprel = ptr,
                DT_PLTRELSZ => dynamic.pltrelsz = value,
                DT_PLTREL => dynamic.pltrel = Some(value as i64),
                DT_REL => dynamic.rel = ptr,
                DT_RELSZ => dynamic.relsz = value,
                DT_RELA => dynamic.rela = ptr,
                DT_RELASZ => dynamic.relasz = value,
                _ => {}
            }
        }

        dynamic.symtab =
            symtab.ok_or_else(|| malformed_error("dynamic section does not have DT_SYMTAB"))?;
        dynamic.strtab =
            strtab.ok_or_else(|| malformed_error("dynamic section does not have DT_STRTAB"))?;
        dynamic.strsz =
            strsz.ok_or_else(|| malformed_error("dynamic section does not have DT_STRSZ"))?;
        Ok(dynamic)
    }
}
