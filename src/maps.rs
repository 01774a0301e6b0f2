//! Parsing `/proc/<pid>/maps`
//!
//! Every scan reads the complete listing in one pass and turns each line into
//! a [`MapRecord`]. Records are returned in the order the kernel reports them,
//! which is ascending by start address. Nothing is cached between scans.

use crate::{Result, os::ProtFlags, scan_error};
use alloc::{format, string::String, vec::Vec};
use core::fmt::Display;

/// Which process to scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessId {
    /// The calling process (`/proc/self/maps`).
    #[default]
    SelfProcess,
    /// Another process by numeric id.
    Pid(u32),
}

impl ProcessId {
    fn maps_path(&self) -> String {
        match self {
            ProcessId::SelfProcess => String::from("/proc/self/maps"),
            ProcessId::Pid(pid) => format!("/proc/{pid}/maps"),
        }
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId::Pid(pid)
    }
}

/// One contiguous virtual-memory region and its backing file identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapRecord {
    /// First address of the region.
    pub start: usize,
    /// One past the last address of the region.
    pub end: usize,
    /// Read/write/execute permissions.
    pub perms: ProtFlags,
    /// `p` (copy-on-write) rather than `s` (shared).
    pub is_private: bool,
    /// Offset into the backing file, meaningful only when `path` is set.
    pub offset: usize,
    /// Device of the backing file, composed with `makedev(major, minor)`.
    pub dev: u64,
    /// Inode of the backing file, 0 for anonymous regions.
    pub inode: u64,
    /// Backing path or pseudo name such as `[stack]`, kept verbatim.
    pub path: Option<String>,
}

impl MapRecord {
    /// Scans the memory maps of the calling process.
    #[inline]
    pub fn scan_self() -> Result<Vec<MapRecord>> {
        Self::scan(ProcessId::SelfProcess)
    }

    /// Reads `/proc/<pid>/maps` completely and parses it.
    ///
    /// A listing that cannot be opened or read in full yields [`crate::Error::Scan`].
    /// Malformed lines are skipped.
    pub fn scan(pid: ProcessId) -> Result<Vec<MapRecord>> {
        let path = pid.maps_path();
        let listing = std::fs::read(&path)
            .map_err(|err| scan_error(format!("failed to read {path}: {err}")))?;
        let records = Self::parse(&listing);
        #[cfg(feature = "log")]
        log::trace!("[Scan] {}: {} records", path, records.len());
        Ok(records)
    }

    /// Parses an already-read maps listing.
    ///
    /// File names are arbitrary bytes; a name that is not UTF-8 is converted
    /// lossily and only affects the `path` of its own record.
    pub fn parse(listing: impl AsRef<[u8]>) -> Vec<MapRecord> {
        listing
            .as_ref()
            .split(|&byte| byte == b'\n')
            .filter_map(|line| {
                let line = String::from_utf8_lossy(line);
                let record = Self::parse_line(&line);
                #[cfg(feature = "log")]
                if record.is_none() && !line.trim().is_empty() {
                    log::trace!("[Scan] skip malformed line: {:?}", line);
                }
                record
            })
            .collect()
    }

    /// Parses one line of the form
    /// `start-end perms offset major:minor inode [path]`.
    pub fn parse_line(line: &str) -> Option<MapRecord> {
        let (range, rest) = next_field(line)?;
        let (perms, rest) = next_field(rest)?;
        let (offset, rest) = next_field(rest)?;
        let (dev, rest) = next_field(rest)?;
        let (inode, rest) = next_field(rest)?;

        let (start, end) = range.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if start >= end {
            return None;
        }
        let (perms, is_private) = parse_perms(perms)?;
        let offset = usize::from_str_radix(offset, 16).ok()?;
        let (major, minor) = dev.split_once(':')?;
        let major = u32::from_str_radix(major, 16).ok()?;
        let minor = u32::from_str_radix(minor, 16).ok()?;
        let inode = inode.parse::<u64>().ok()?;
        let path = rest.trim();

        Some(MapRecord {
            start,
            end,
            perms,
            is_private,
            offset,
            dev: makedev(major, minor),
            inode,
            path: (!path.is_empty()).then(|| String::from(path)),
        })
    }

    /// Size of the region in bytes, never zero.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.perms.contains(ProtFlags::PROT_READ)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.perms.contains(ProtFlags::PROT_WRITE)
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        self.perms.contains(ProtFlags::PROT_EXEC)
    }

    /// True for regions with no backing file.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.inode == 0 && self.dev == 0
    }
}

impl Display for MapRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let flag = |set: ProtFlags, c: char| if self.perms.contains(set) { c } else { '-' };
        write!(
            f,
            "{:x}-{:x} {}{}{}{} {:08x} {:02x}:{:02x} {}",
            self.start,
            self.end,
            flag(ProtFlags::PROT_READ, 'r'),
            flag(ProtFlags::PROT_WRITE, 'w'),
            flag(ProtFlags::PROT_EXEC, 'x'),
            if self.is_private { 'p' } else { 's' },
            self.offset,
            libc::major(self.dev as _),
            libc::minor(self.dev as _),
            self.inode,
        )?;
        if let Some(path) = &self.path {
            write!(f, " {path}")?;
        }
        Ok(())
    }
}

/// Splits off the next whitespace separated field.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(|c: char| c.is_ascii_whitespace()).unwrap_or(s.len());
    Some(s.split_at(end))
}

fn parse_perms(perms: &str) -> Option<(ProtFlags, bool)> {
    let &[r, w, x, p] = perms.as_bytes() else {
        return None;
    };
    let mut flags = ProtFlags::PROT_NONE;
    for (byte, set, expected) in [
        (r, ProtFlags::PROT_READ, b'r'),
        (w, ProtFlags::PROT_WRITE, b'w'),
        (x, ProtFlags::PROT_EXEC, b'x'),
    ] {
        match byte {
            b'-' => {}
            b if b == expected => flags |= set,
            _ => return None,
        }
    }
    let is_private = match p {
        b'p' => true,
        b's' => false,
        _ => return None,
    };
    Some((flags, is_private))
}

#[inline]
fn makedev(major: u32, minor: u32) -> u64 {
    libc::makedev(major as _, minor as _) as u64
}
