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

#[repr(C)]
#[derive(Debug)]
struct ElfGnuHeader {
    nbucket: u32,
    symbias: u32,
    nbloom: u32,
    nshift: u32,
}

unsafe impl Plain for ElfGnuHeader {}

#[derive(Debug)]
pub(crate) struct ElfGnuHash {
    header: ElfGnuHeader,
    blooms: usize,
    buckets: usize,
    chains: usize,
}

impl ElfGnuHash {
    /// Parses the fixed part of a `.gnu.hash` table (header, bloom words and
    /// buckets) and checks that it is mapped. The chain array has no declared
    /// length; every chain read is bounds-checked on its own.
    pub(crate) fn parse(view: &MemoryView, addr: usize) -> Result<ElfGnuHash> {
        const HEADER_SIZE: usize = size_of::<ElfGnuHeader>();
        let header: ElfGnuHeader = view.read(addr)?;
        if header.nbucket == 0 || !header.nbloom.is_power_of_two() {
            return Err(malformed_error("invalid GNU hash header"));
        }
        let bloom_size = (header.nbloom as usize)
            .checked_mul(size_of::<usize>())
            .ok_or_else(|| malformed_error("GNU hash bloom filter too large"))?;
        let bucket_size = (header.nbucket as usize)
            .checked_mul(size_of::<u32>())
            .ok_or_else(|| malformed_error("GNU hash buckets too large"))?;
        let fixed_size = HEADER_SIZE
            .checked_add(bloom_size)
            .and_then(|size| size.checked_add(bucket_size))
            .ok_or_else(|| malformed_error("GNU hash table too large"))?;
        view.check(addr, fixed_size, "GNU hash table")?;

        let blooms = addr + HEADER_SIZE;
        let buckets = blooms + bloom_size;
        let chains = buckets + bucket_size;
        Ok(ElfGnuHash {
            header,
            blooms,
            buckets,
            chains,
        })
    }

    #[inline]
    fn bucket(&self, view: &MemoryView, idx: usize) -> Result<usize> {
        Ok(view.read_at::<u32>(self.buckets, idx)? as usize)
    }

    #[inline]
    fn chain(&self, view: &MemoryView, dynsym_idx: usize) -> Result<u32> {
        view.read_at(self.chains, dynsym_idx - self.header.symbias as usize)
    }
}

impl ElfHashTable for ElfGnuHash {
    #[inline]
    fn hash(name: &[u8]) -> u32 {
        let mut hash = 5381u32;
        for byte in name {
            hash = hash.wrapping_mul(33).wrapping_add(u32::from(*byte));
        }
        hash
    }

    fn count_syms(&self, view: &MemoryView) -> Result<usize> {
        let symbias = self.header.symbias as usize;
        let mut nsym = 0;
        for i in 0..self.header.nbucket as usize {
            nsym = nsym.max(self.bucket(view, i)?);
        }
        if nsym == 0 {
            return Ok(symbias);
        }
        if nsym < symbias {
            return Err(malformed_error("GNU hash bucket below symbol bias"));
        }
        while self.chain(view, nsym)? & 1 == 0 {
            nsym += 1;
        }
        Ok(nsym + 1)
    }

    fn lookup(
        &self,
        table: &SymbolTable,
        view: &MemoryView,
        name: &[u8],
    ) -> Result<Option<usize>> {
        const BITS: usize = usize::BITS as usize;
        let hash = Self::hash(name);
        let bloom_idx = (hash as usize / BITS) & (self.header.nbloom as usize - 1);
        let filter: usize = view.read_at(self.blooms, bloom_idx)?;
        if filter >> (hash as usize % BITS) & 1 == 0 {
            return Ok(None);
        }
        let hash2 = hash.checked_shr(self.header.nshift).unwrap_or(0);
        if filter >> (hash2 as usize % BITS) & 1 == 0 {
            return Ok(None);
        }

        let mut dynsym_idx = self.bucket(view, hash as usize % self.header.nbucket as usize)?;
        if dynsym_idx == 0 {
            return Ok(None);
        }
        if dynsym_idx < self.header.symbias as usize {
            return Err(malformed_error("GNU hash bucket below symbol bias"));
        }
        loop {
            let chain_hash = self.chain(view, dynsym_idx)?;
            if hash | 1 == chain_hash | 1 && table.name_matches(view, dynsym_idx, name)? {
                return Ok(Some(dynsym_idx));
            }
            if chain_hash & 1 != 0 {
                return Ok(None);
            }
            dynsym_idx += 1;
        }
    }
}
