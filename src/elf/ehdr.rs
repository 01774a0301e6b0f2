//! ELF header validation
//!
//! The header of a mapped object sits at its load bias. Before any other
//! metadata is trusted, the header must describe an object the current
//! process could have loaded itself.

use crate::{
    Result,
    arch::EM_ARCH,
    elf::defs::{E_CLASS, ElfPhdr, Ehdr, Plain},
    malformed_error,
};
use core::{mem::size_of, ops::Deref};
use elf::abi::{EI_CLASS, EI_VERSION, ELFMAGIC, EV_CURRENT};

/// A wrapper around the ELF header structure
#[repr(transparent)]
pub(crate) struct ElfHeader {
    ehdr: Ehdr,
}

unsafe impl Plain for ElfHeader {}

impl Deref for ElfHeader {
    type Target = Ehdr;

    fn deref(&self) -> &Self::Target {
        &self.ehdr
    }
}

impl ElfHeader {
    /// Validates the ELF header
    ///
    /// This method performs several validation checks on the ELF header
    /// to ensure it is valid and compatible with the target architecture:
    /// 1. Checks the ELF magic bytes
    /// 2. Verifies the file class matches the target architecture
    /// 3. Ensures the ELF version is current
    /// 4. Confirms the machine architecture matches
    /// 5. Confirms program header entries have the native size
    pub(crate) fn validate(&self) -> Result<()> {
        // Check ELF magic bytes
        if self.e_ident[0..4] != ELFMAGIC {
            return Err(malformed_error("invalid ELF magic"));
        }

        // Check file class (32-bit vs 64-bit)
        if self.e_ident[EI_CLASS] != E_CLASS {
            return Err(malformed_error("file class mismatch"));
        }

        // Check ELF version
        if self.e_ident[EI_VERSION] != EV_CURRENT {
            return Err(malformed_error("invalid ELF version"));
        }

        // Check machine architecture
        if self.e_machine != EM_ARCH {
            return Err(malformed_error("file arch mismatch"));
        }

        if self.e_phnum() != 0 && self.e_phentsize() != size_of::<ElfPhdr>() {
            return Err(malformed_error("unexpected program header entry size"));
        }

        Ok(())
    }

    /// Gets the number of program headers
    #[inline]
    pub(crate) fn e_phnum(&self) -> usize {
        self.ehdr.e_phnum as usize
    }

    /// Gets the size of each program header entry
    #[inline]
    pub(crate) fn e_phentsize(&self) -> usize {
        self.ehdr.e_phentsize as usize
    }

    /// Gets the file offset of the program header table
    #[inline]
    pub(crate) fn e_phoff(&self) -> usize {
        self.ehdr.e_phoff as usize
    }
}
