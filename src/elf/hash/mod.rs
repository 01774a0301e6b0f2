use crate::{
    Result,
    elf::{symbol::SymbolTable, view::MemoryView},
};

mod gnu;
mod sysv;

pub(crate) use gnu::ElfGnuHash;
pub(crate) use sysv::ElfHash;

pub(crate) trait ElfHashTable {
    fn hash(name: &[u8]) -> u32;
    fn count_syms(&self, view: &MemoryView) -> Result<usize>;
    /// Returns the index of the symbol called `name` (version already stripped).
    fn lookup(&self, table: &SymbolTable, view: &MemoryView, name: &[u8])
    -> Result<Option<usize>>;
}
