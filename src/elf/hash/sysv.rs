//! Traditional SYSV ELF hash table
//!
//! Unlike `.gnu.hash`, a SYSV table covers every dynamic symbol, and its
//! `nchain` field is the exact size of the symbol table.

use crate::{
    Result,
    elf::{
        defs::Plain,
        hash::ElfHashTable,
        symbol::SymbolTable,
        view::MemoryView,
    },
    malformed_error,
};
use core::mem::size_of;

/// Header structure for SYSV ELF hash tables
#[repr(C)]
#[derive(Debug)]
struct ElfHashHeader {
    /// Number of bucket entries in the hash table
    nbucket: u32,

    /// Number of chain entries in the hash table
    nchain: u32,
}

unsafe impl Plain for ElfHashHeader {}

#[derive(Debug)]
pub(crate) struct ElfHash {
    header: ElfHashHeader,

    /// Address of the bucket array
    buckets: usize,

    /// Address of the chain array
    chains: usize,
}

impl ElfHash {
    /// Parse a SYSV hash table and check that all of it is mapped.
    pub(crate) fn parse(view: &MemoryView, addr: usize) -> Result<ElfHash> {
        const HEADER_SIZE: usize = size_of::<ElfHashHeader>();
        let header: ElfHashHeader = view.read(addr)?;
        if header.nbucket == 0 {
            return Err(malformed_error("SYSV hash table has no buckets"));
        }
        let size = (header.nbucket as usize)
            .checked_add(header.nchain as usize)
            .and_then(|words| words.checked_mul(size_of::<u32>()))
            .and_then(|size| size.checked_add(HEADER_SIZE))
            .ok_or_else(|| malformed_error("SYSV hash table too large"))?;
        view.check(addr, size, "SYSV hash table")?;

        let buckets = addr + HEADER_SIZE;
        let chains = buckets + header.nbucket as usize * size_of::<u32>();
        Ok(ElfHash {
            header,
            buckets,
            chains,
        })
    }
}

impl ElfHashTable for ElfHash {
    #[inline]
    fn hash(name: &[u8]) -> u32 {
        let mut hash = 0u32;
        for byte in name {
            hash = (hash << 4).wrapping_add(u32::from(*byte));
            let g = hash & 0xf0000000;
            if g != 0 {
                hash ^= g >> 24;
            }
            hash &= !g;
        }
        hash
    }

    #[inline]
    fn count_syms(&self, _view: &MemoryView) -> Result<usize> {
        Ok(self.header.nchain as usize)
    }

    fn lookup(
        &self,
        table: &SymbolTable,
        view: &MemoryView,
        name: &[u8],
    ) -> Result<Option<usize>> {
        let nchain = self.header.nchain as usize;
        let hash = Self::hash(name);
        let bucket_idx = hash as usize % self.header.nbucket as usize;
        let mut chain_idx = view.read_at::<u32>(self.buckets, bucket_idx)? as usize;

        // a well-formed chain visits each symbol at most once
        for _ in 0..=nchain {
            if chain_idx == 0 {
                return Ok(None);
            }
            if chain_idx >= nchain {
                return Err(malformed_error("SYSV hash chain index out of range"));
            }
            if table.name_matches(view, chain_idx, name)? {
                return Ok(Some(chain_idx));
            }
            chain_idx = view.read_at::<u32>(self.chains, chain_idx)? as usize;
        }
        Err(malformed_error("SYSV hash chain does not terminate"))
    }
}
