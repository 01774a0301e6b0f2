//! ELF format definitions used while reading a mapped object.
//!
//! Only the native class is supported: a 64-bit process reads 64-bit objects
//! and a 32-bit process reads 32-bit objects, as the dynamic linker would
//! refuse anything else.

use core::ops::Deref;

use crate::arch::rel_type_to_str;

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")]{
        pub(crate) const E_CLASS: u8 = elf::abi::ELFCLASS64;
        pub(crate) type Phdr = elf::segment::Elf64_Phdr;
        pub(crate) type Dyn = elf::dynamic::Elf64_Dyn;
        pub(crate) type Ehdr = elf::file::Elf64_Ehdr;
        pub(crate) type Rela = elf::relocation::Elf64_Rela;
        pub(crate) type Rel = elf::relocation::Elf64_Rel;
        pub(crate) type Sym = elf::symbol::Elf64_Sym;
        pub(crate) const REL_MASK: usize = 0xFFFFFFFF;
        pub(crate) const REL_BIT: usize = 32;
    }else{
        pub(crate) const E_CLASS: u8 = elf::abi::ELFCLASS32;
        pub(crate) type Phdr = elf::segment::Elf32_Phdr;
        pub(crate) type Dyn = elf::dynamic::Elf32_Dyn;
        pub(crate) type Ehdr = elf::file::Elf32_Ehdr;
        pub(crate) type Rela = elf::relocation::Elf32_Rela;
        pub(crate) type Rel = elf::relocation::Elf32_Rel;
        pub(crate) type Sym = Elf32Sym;
        pub(crate) const REL_MASK: usize = 0xFF;
        pub(crate) const REL_BIT: usize = 8;
    }
}

#[allow(unused)]
#[repr(C)]
/// 32-bit ELF symbol table entry.
/// For 64-bit targets, the `Sym` type alias points to `elf::symbol::Elf64_Sym` instead.
pub(crate) struct Elf32Sym {
    pub st_name: u32,
    pub st_value: u32,
    pub st_size: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
}

/// Types that can be copied out of mapped memory bit for bit.
///
/// # Safety
/// Implementors must be `repr(C)` or `repr(transparent)` aggregates of
/// integers, valid for every bit pattern.
pub(crate) unsafe trait Plain: Sized {}

unsafe impl Plain for u8 {}
unsafe impl Plain for u32 {}
unsafe impl Plain for usize {}
unsafe impl Plain for Dyn {}

/// ELF RELA relocation entry.
#[repr(transparent)]
pub(crate) struct ElfRela {
    rela: Rela,
}

unsafe impl Plain for ElfRela {}

impl ElfRela {
    /// Returns the relocation type.
    #[inline]
    pub(crate) fn r_type(&self) -> usize {
        self.rela.r_info as usize & REL_MASK
    }

    /// Returns the symbol index.
    #[inline]
    pub(crate) fn r_symbol(&self) -> usize {
        self.rela.r_info as usize >> REL_BIT
    }

    /// Returns the relocation offset.
    #[inline]
    pub(crate) fn r_offset(&self) -> usize {
        self.rela.r_offset as usize
    }
}

/// ELF REL relocation entry.
#[repr(transparent)]
pub(crate) struct ElfRel {
    rel: Rel,
}

unsafe impl Plain for ElfRel {}

impl ElfRel {
    #[inline]
    pub(crate) fn r_type(&self) -> usize {
        self.rel.r_info as usize & REL_MASK
    }

    #[inline]
    pub(crate) fn r_symbol(&self) -> usize {
        self.rel.r_info as usize >> REL_BIT
    }

    #[inline]
    pub(crate) fn r_offset(&self) -> usize {
        self.rel.r_offset as usize
    }
}

/// ELF symbol table entry, wrapping the native symbol type.
#[repr(transparent)]
pub(crate) struct ElfSymbol {
    sym: Sym,
}

unsafe impl Plain for ElfSymbol {}

impl ElfSymbol {
    /// Returns the symbol name index.
    #[inline]
    pub(crate) fn st_name(&self) -> usize {
        self.sym.st_name as usize
    }
}

/// ELF program header.
#[repr(transparent)]
pub(crate) struct ElfPhdr {
    phdr: Phdr,
}

unsafe impl Plain for ElfPhdr {}

impl Deref for ElfPhdr {
    type Target = Phdr;

    fn deref(&self) -> &Self::Target {
        &self.phdr
    }
}

/// One decoded relocation entry, independent of its on-disk encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Reloc {
    pub r_offset: usize,
    pub r_symbol: usize,
    pub r_type: usize,
}

impl Reloc {
    /// Return a human readable relocation type name for the current arch
    #[inline]
    #[cfg_attr(not(feature = "log"), allow(dead_code))]
    pub(crate) fn r_type_str(&self) -> &'static str {
        rel_type_to_str(self.r_type)
    }
}

impl From<ElfRela> for Reloc {
    #[inline]
    fn from(rela: ElfRela) -> Self {
        Reloc {
            r_offset: rela.r_offset(),
            r_symbol: rela.r_symbol(),
            r_type: rela.r_type(),
        }
    }
}

impl From<ElfRel> for Reloc {
    #[inline]
    fn from(rel: ElfRel) -> Self {
        Reloc {
            r_offset: rel.r_offset(),
            r_symbol: rel.r_symbol(),
            r_type: rel.r_type(),
        }
    }
}
