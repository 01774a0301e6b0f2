//! Relocation tables and the indirection slots they describe.

use crate::{
    Result,
    arch::{REL_GOT, REL_JUMP_SLOT, REL_SYMBOLIC},
    elf::defs::{ElfRel, ElfRela, Plain, Reloc},
    malformed_error,
};
use core::mem::size_of;

/// On-disk encoding of a relocation table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelEncoding {
    /// Implicit addends (`Elf_Rel`).
    Rel,
    /// Explicit addends (`Elf_Rela`).
    Rela,
}

impl RelEncoding {
    /// The encoding this architecture's toolchain emits by default.
    #[cfg(any(target_arch = "x86", target_arch = "arm"))]
    pub const NATIVE: RelEncoding = RelEncoding::Rel;
    #[cfg(not(any(target_arch = "x86", target_arch = "arm")))]
    pub const NATIVE: RelEncoding = RelEncoding::Rela;

    #[inline]
    pub fn entry_size(self) -> usize {
        match self {
            RelEncoding::Rel => size_of::<ElfRel>(),
            RelEncoding::Rela => size_of::<ElfRela>(),
        }
    }
}

/// Which dynamic entry a table came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelFamily {
    /// `DT_JMPREL`, the lazily bound call slots.
    Plt,
    /// `DT_REL` / `DT_RELA`, eagerly bound data and address slots.
    Dyn,
}

/// A relocation table of the mapped object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelocTable {
    pub encoding: RelEncoding,
    pub family: RelFamily,
    /// Absolute address of the first entry.
    pub addr: usize,
    /// Size of the table in bytes.
    pub size: usize,
}

/// Kind of indirection slot a symbol is reached through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// A `.got.plt` entry used by a PLT stub.
    Plt,
    /// A `.got` entry or absolute address word.
    Got,
}

/// An indirection slot holding the address of a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedSlot {
    /// Absolute address of the pointer-width slot.
    pub addr: usize,
    pub kind: SlotKind,
}

#[inline]
fn read_entry<T: Plain + Into<Reloc>>(raw: &[u8]) -> Reloc {
    debug_assert_eq!(raw.len(), size_of::<T>());
    // Safety: `raw` holds exactly one entry and `T` accepts any bit pattern.
    unsafe { raw.as_ptr().cast::<T>().read_unaligned() }.into()
}

/// Decodes the raw bytes of a relocation table.
pub(crate) fn decode(
    encoding: RelEncoding,
    bytes: &[u8],
) -> Result<impl Iterator<Item = Reloc> + '_> {
    let entsize = encoding.entry_size();
    if bytes.len() % entsize != 0 {
        return Err(malformed_error(
            "relocation table size is not a multiple of its entry size",
        ));
    }
    Ok(bytes.chunks_exact(entsize).map(move |raw| match encoding {
        RelEncoding::Rel => read_entry::<ElfRel>(raw),
        RelEncoding::Rela => read_entry::<ElfRela>(raw),
    }))
}

/// Classifies a relocation as a hookable slot.
///
/// PLT tables contribute their jump slots; the general tables contribute
/// GOT entries and absolute address words.
#[inline]
pub(crate) fn slot_kind(family: RelFamily, r_type: usize) -> Option<SlotKind> {
    let r_type = r_type as u32;
    match family {
        RelFamily::Plt if r_type == REL_JUMP_SLOT => Some(SlotKind::Plt),
        RelFamily::Dyn if r_type == REL_GOT || r_type == REL_SYMBOLIC => Some(SlotKind::Got),
        _ => None,
    }
}
