//! Bounds-checked reads of a mapped object.
//!
//! Every address derived from ELF metadata is checked against the readable
//! ranges of the object before it is dereferenced, so corrupt metadata turns
//! into [`crate::Error::MalformedObject`] instead of a fault.

use crate::{Result, elf::defs::Plain, malformed_error};
use alloc::{format, vec::Vec};
use core::{mem::size_of, ops::Range};

#[derive(Debug)]
pub(crate) struct MemoryView {
    ranges: Vec<Range<usize>>,
}

impl MemoryView {
    /// `ranges` must be readable for as long as the view is used.
    pub(crate) fn new(ranges: Vec<Range<usize>>) -> Self {
        MemoryView { ranges }
    }

    /// True if `[addr, addr + len)` lies inside one readable range.
    #[inline]
    pub(crate) fn contains(&self, addr: usize, len: usize) -> bool {
        let Some(end) = addr.checked_add(len) else {
            return false;
        };
        self.ranges
            .iter()
            .any(|range| range.start <= addr && end <= range.end)
    }

    pub(crate) fn check(&self, addr: usize, len: usize, what: &str) -> Result<()> {
        if self.contains(addr, len) {
            Ok(())
        } else {
            Err(malformed_error(format!(
                "{what} at 0x{addr:x} (0x{len:x} bytes) lies outside the mapped object"
            )))
        }
    }

    /// Copies a `T` out of memory at `addr`.
    #[inline]
    pub(crate) fn read<T: Plain>(&self, addr: usize) -> Result<T> {
        self.check(addr, size_of::<T>(), core::any::type_name::<T>())?;
        // Safety: the range is readable and `T` accepts any bit pattern.
        Ok(unsafe { (addr as *const T).read_unaligned() })
    }

    /// Copies element `index` of a table of `T` starting at `table`.
    #[inline]
    pub(crate) fn read_at<T: Plain>(&self, table: usize, index: usize) -> Result<T> {
        self.read_strided(table, index, size_of::<T>())
    }

    /// Like [`MemoryView::read_at`] with an explicit entry size.
    pub(crate) fn read_strided<T: Plain>(
        &self,
        table: usize,
        index: usize,
        entsize: usize,
    ) -> Result<T> {
        let addr = index
            .checked_mul(entsize)
            .and_then(|offset| table.checked_add(offset))
            .ok_or_else(|| malformed_error("table index overflows the address space"))?;
        self.read(addr)
    }

    /// Borrows `len` bytes at `addr`.
    pub(crate) fn bytes(&self, addr: usize, len: usize) -> Result<&[u8]> {
        self.check(addr, len, "table")?;
        // Safety: checked above; the mapping outlives the view.
        Ok(unsafe { core::slice::from_raw_parts(addr as *const u8, len) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn reads_inside_and_rejects_outside() {
        let data: Vec<u32> = vec![1, 2, 3, 4];
        let start = data.as_ptr() as usize;
        let view = MemoryView::new(vec![start..start + 16]);

        assert_eq!(view.read_at::<u32>(start, 3).unwrap(), 4);
        assert_eq!(view.read::<u8>(start + 4).unwrap(), 2u32.to_ne_bytes()[0]);
        assert!(view.read_at::<u32>(start, 4).is_err());
        assert!(view.read::<u32>(start + 13).is_err());
        assert!(view.read::<u32>(start - 1).is_err());
        assert!(view.read_at::<u32>(start, usize::MAX).is_err());
        assert!(view.bytes(usize::MAX - 1, 4).is_err());
        assert_eq!(view.bytes(start, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn reads_do_not_span_gaps() {
        let data = [0u8; 32];
        let start = data.as_ptr() as usize;
        let view = MemoryView::new(vec![start..start + 8, start + 16..start + 32]);
        assert!(view.contains(start + 4, 4));
        assert!(!view.contains(start + 4, 8));
        assert!(view.contains(start + 16, 16));
    }
}
