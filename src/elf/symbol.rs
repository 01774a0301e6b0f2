//! Dynamic symbol table lookup
//!
//! Names are compared with any version suffix (`name@VER`, `name@@VER`)
//! removed on both sides. Lookup tries `.gnu.hash`, then the SYSV `.hash`,
//! then falls back to a linear scan: imported symbols are never placed in a
//! GNU hash table, so for the functions one usually hooks the scan is the
//! path that finds them.

use crate::{
    Result,
    elf::{
        defs::ElfSymbol,
        dynamic::ElfDynamic,
        hash::{ElfGnuHash, ElfHash, ElfHashTable},
        view::MemoryView,
    },
    malformed_error,
};
use core::mem::size_of;

/// Cuts a symbol name at its version separator.
#[inline]
pub(crate) fn strip_version(name: &[u8]) -> &[u8] {
    match name.iter().position(|&byte| byte == b'@') {
        Some(at) => &name[..at],
        None => name,
    }
}

/// ELF string table, `DT_STRTAB` of `DT_STRSZ` bytes.
#[derive(Debug)]
pub(crate) struct ElfStringTable {
    addr: usize,
    size: usize,
}

impl ElfStringTable {
    /// Returns the NUL terminated string at `offset`, without the terminator.
    pub(crate) fn get_bytes<'view>(
        &self,
        view: &'view MemoryView,
        offset: usize,
    ) -> Result<&'view [u8]> {
        if offset >= self.size {
            return Err(malformed_error("symbol name offset exceeds DT_STRSZ"));
        }
        let bytes = view.bytes(self.addr + offset, self.size - offset)?;
        let len = bytes
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| malformed_error("unterminated symbol name"))?;
        Ok(&bytes[..len])
    }
}

/// Symbol table of a mapped object.
#[derive(Debug)]
pub(crate) struct SymbolTable {
    /// Address of `DT_SYMTAB`.
    symtab: usize,
    /// Entry size, `DT_SYMENT` or the native symbol size.
    syment: usize,
    strtab: ElfStringTable,
    gnu_hash: Option<ElfGnuHash>,
    sysv_hash: Option<ElfHash>,
}

impl SymbolTable {
    pub(crate) fn from_dynamic(view: &MemoryView, dynamic: &ElfDynamic) -> Result<Self> {
        let syment = dynamic
            .syment
            .map_or(size_of::<ElfSymbol>(), |syment| syment.get());
        if syment < size_of::<ElfSymbol>() {
            return Err(malformed_error("DT_SYMENT smaller than a symbol"));
        }
        view.check(dynamic.strtab, dynamic.strsz, "string table")?;
        let gnu_hash = dynamic
            .gnu_hash
            .map(|addr| ElfGnuHash::parse(view, addr))
            .transpose()?;
        let sysv_hash = dynamic
            .hash
            .map(|addr| ElfHash::parse(view, addr))
            .transpose()?;
        Ok(SymbolTable {
            symtab: dynamic.symtab,
            syment,
            strtab: ElfStringTable {
                addr: dynamic.strtab,
                size: dynamic.strsz,
            },
            gnu_hash,
            sysv_hash,
        })
    }

    #[inline]
    pub(crate) fn symbol(&self, view: &MemoryView, idx: usize) -> Result<ElfSymbol> {
        view.read_strided(self.symtab, idx, self.syment)
    }

    /// Name of symbol `idx`, as stored (version suffix included).
    pub(crate) fn name<'view>(&self, view: &'view MemoryView, idx: usize) -> Result<&'view [u8]> {
        let symbol = self.symbol(view, idx)?;
        self.strtab.get_bytes(view, symbol.st_name())
    }

    /// Compares symbol `idx` against an already stripped `name`.
    #[inline]
    pub(crate) fn name_matches(&self, view: &MemoryView, idx: usize, name: &[u8]) -> Result<bool> {
        Ok(strip_version(self.name(view, idx)?) == name)
    }

    /// Number of entries in the symbol table.
    pub(crate) fn count(&self, view: &MemoryView) -> Result<usize> {
        if let Some(hashtab) = &self.sysv_hash {
            return hashtab.count_syms(view);
        }
        if let Some(hashtab) = &self.gnu_hash {
            return hashtab.count_syms(view);
        }
        // .dynsym is conventionally followed by .dynstr
        match self.strtab.addr.checked_sub(self.symtab) {
            Some(size) if size > 0 => Ok(size / self.syment),
            _ => Err(malformed_error(
                "cannot size the symbol table without a hash table",
            )),
        }
    }

    /// Returns the index of the symbol called `name`.
    pub(crate) fn lookup(&self, view: &MemoryView, name: &str) -> Result<Option<usize>> {
        let name = strip_version(name.as_bytes());
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(hashtab) = &self.gnu_hash {
            if let Some(idx) = hashtab.lookup(self, view, name)? {
                return Ok(Some(idx));
            }
        }
        if let Some(hashtab) = &self.sysv_hash {
            if let Some(idx) = hashtab.lookup(self, view, name)? {
                return Ok(Some(idx));
            }
        }
        self.linear_lookup(view, name)
    }

    fn linear_lookup(&self, view: &MemoryView, name: &[u8]) -> Result<Option<usize>> {
        // index 0 is the reserved null symbol
        for idx in 1..self.count(view)? {
            if self.name_matches(view, idx, name)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::strip_version;

    #[test]
    fn version_suffix_is_ignored() {
        assert_eq!(strip_version(b"getpid"), b"getpid");
        assert_eq!(strip_version(b"getpid@GLIBC_2.2.5"), b"getpid");
        assert_eq!(strip_version(b"getpid@@GLIBC_2.2.5"), b"getpid");
        assert_eq!(strip_version(b"@VER"), b"");
    }
}
