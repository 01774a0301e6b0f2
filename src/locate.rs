//! Finding a loaded object among scanned mappings
//!
//! An object is identified by the `(dev, inode)` of its backing file. Shared
//! objects stored uncompressed inside a container file (an APK, a zip) share
//! the container's inode, so a [`FileWindow`] narrows the match to the byte
//! range the object occupies inside that file.

use crate::{Result, maps::MapRecord, object_not_found};
use alloc::vec::Vec;
use core::ops::Range;

/// Byte range `[offset, offset + size)` of an object inside its backing file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileWindow {
    pub offset: usize,
    pub size: usize,
}

impl FileWindow {
    #[inline]
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    #[inline]
    pub fn contains(&self, file_offset: usize) -> bool {
        file_offset >= self.offset && file_offset - self.offset < self.size
    }
}

/// The mappings that make up one loaded object.
#[derive(Clone, Debug)]
pub struct ObjectMapping {
    /// Address at which byte 0 of the object (the window start, if any) is mapped.
    /// The ELF header lives here.
    pub load_bias: usize,
    /// Matching records in ascending address order.
    pub records: Vec<MapRecord>,
}

impl ObjectMapping {
    /// The record with the lowest start address, `None` for a mapping built
    /// by hand without records.
    #[inline]
    pub fn base_record(&self) -> Option<&MapRecord> {
        self.records.iter().min_by_key(|record| record.start)
    }

    /// Address ranges of the object that can be read without faulting.
    pub fn readable_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = Vec::new();
        for record in self.records.iter().filter(|record| record.is_readable()) {
            match ranges.last_mut() {
                Some(last) if last.end == record.start => last.end = record.end,
                _ => ranges.push(record.start..record.end),
            }
        }
        ranges
    }
}

/// Finds the mappings of the object backed by `(dev, inode)`.
///
/// With a `window`, only records whose file offset falls inside it are
/// considered and the load bias is measured from the window start. The record
/// with the smallest start address is taken as the object's base.
///
/// Not finding the object is an ordinary outcome, reported as
/// [`crate::Error::ObjectNotFound`].
pub fn locate(
    records: &[MapRecord],
    dev: u64,
    inode: u64,
    window: Option<FileWindow>,
) -> Result<ObjectMapping> {
    if dev == 0 && inode == 0 {
        return Err(object_not_found(dev, inode));
    }
    let mut matches: Vec<MapRecord> = records
        .iter()
        .filter(|record| record.dev == dev && record.inode == inode)
        .filter(|record| window.is_none_or(|window| window.contains(record.offset)))
        .cloned()
        .collect();
    if matches.is_empty() {
        return Err(object_not_found(dev, inode));
    }
    matches.sort_unstable_by_key(|record| record.start);

    let window_start = window.map_or(0, |window| window.offset);
    let base = &matches[0];
    let load_bias = base
        .start
        .checked_sub(base.offset - window_start)
        .ok_or_else(|| object_not_found(dev, inode))?;

    #[cfg(feature = "log")]
    log::debug!(
        "[Locate] dev: {:#x}, inode: {}, load bias: 0x{:x}, {} records",
        dev,
        inode,
        load_bias,
        matches.len()
    );

    Ok(ObjectMapping {
        load_bias,
        records: matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, os::ProtFlags};
    use alloc::string::String;

    fn record(start: usize, end: usize, offset: usize, inode: u64) -> MapRecord {
        MapRecord {
            start,
            end,
            perms: ProtFlags::PROT_READ,
            is_private: true,
            offset,
            dev: 0x801,
            inode,
            path: Some(String::from("/data/app/base.apk")),
        }
    }

    #[test]
    fn empty_mapping_has_no_base() {
        let object = ObjectMapping {
            load_bias: 0x1000,
            records: Vec::new(),
        };
        assert_eq!(object.base_record(), None);
        assert!(object.readable_ranges().is_empty());
    }

    #[test]
    fn picks_lowest_start_as_base() {
        let records = [
            record(0x7000, 0x8000, 0x2000, 7),
            record(0x5000, 0x6000, 0x0, 7),
            record(0x6000, 0x7000, 0x1000, 7),
            record(0x9000, 0xa000, 0x0, 8),
        ];
        let object = locate(&records, 0x801, 7, None).unwrap();
        assert_eq!(object.load_bias, 0x5000);
        assert_eq!(object.records.len(), 3);
        assert_eq!(object.base_record().unwrap().start, 0x5000);
        assert_eq!(object.readable_ranges(), [0x5000..0x8000]);
    }

    #[test]
    fn window_selects_embedded_object() {
        let records = [
            record(0x10000, 0x11000, 0x0, 9),
            record(0x20000, 0x21000, 0x40000, 9),
            record(0x21000, 0x22000, 0x41000, 9),
        ];
        let object = locate(&records, 0x801, 9, Some(FileWindow::new(0x40000, 0x10000))).unwrap();
        assert_eq!(object.records.len(), 2);
        assert_eq!(object.base_record().unwrap().offset, 0x40000);
        assert_eq!(object.load_bias, 0x20000);

        let object = locate(&records, 0x801, 9, Some(FileWindow::new(0x0, 0x40000))).unwrap();
        assert_eq!(object.records.len(), 1);
        assert_eq!(object.load_bias, 0x10000);
    }

    #[test]
    fn bias_is_relative_to_window_start() {
        // the first page of the embedded object is not mapped
        let records = [record(0x31000, 0x32000, 0x41000, 9)];
        let object = locate(&records, 0x801, 9, Some(FileWindow::new(0x40000, 0x10000))).unwrap();
        assert_eq!(object.load_bias, 0x30000);
    }

    #[test]
    fn missing_object_is_not_found() {
        let records = [record(0x5000, 0x6000, 0x0, 7)];
        let err = locate(&records, 0x801, 12345, None).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { inode: 12345, .. }));
        assert!(err.is_not_found());

        let err = locate(&records, 0x801, 7, Some(FileWindow::new(0x1000, 0x1000))).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn anonymous_identity_never_matches() {
        let mut anon = record(0x5000, 0x6000, 0x0, 0);
        anon.dev = 0;
        anon.path = None;
        assert!(locate(&[anon], 0, 0, None).is_err());
    }
}
