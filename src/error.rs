use alloc::borrow::Cow;
use core::fmt::{Debug, Display};

/// Error types used throughout the `elf_hook` library.
///
/// Locating and resolving failures (`ObjectNotFound`, `SymbolNotFound`) are
/// ordinary outcomes: the object may simply not be loaded yet. None of the
/// variants is fatal to the process.
#[derive(Debug)]
pub enum Error {
    /// The memory-map listing could not be opened or read in full.
    ///
    /// A partially read listing is reported as this error rather than
    /// returned truncated.
    Scan {
        /// A descriptive message about the scan failure.
        msg: Cow<'static, str>,
    },

    /// No mapping matches the requested device and inode (and window, if any).
    ObjectNotFound {
        /// Device number of the requested object.
        dev: u64,
        /// Inode number of the requested object.
        inode: u64,
    },

    /// The symbol is absent from the object, or has no hookable relocation.
    SymbolNotFound {
        /// The requested symbol name.
        symbol: Cow<'static, str>,
    },

    /// The in-memory ELF metadata is corrupt or inconsistent.
    ///
    /// This typically indicates issues such as:
    /// * Invalid magic bytes or a class/machine mismatch
    /// * A table whose declared extent leaves the mapped region
    /// * A missing mandatory dynamic entry
    MalformedObject {
        /// A descriptive message about the inconsistency.
        msg: Cow<'static, str>,
    },

    /// Changing the protection of a page failed.
    Mprotect {
        /// A descriptive message about the protection error.
        msg: Cow<'static, str>,
    },

    /// One or more pending hooks could not be applied during a commit.
    ApplyFailed {
        /// Number of entries that failed.
        failed: usize,
        /// Number of entries attempted.
        total: usize,
    },

    /// One or more committed hooks could not be restored.
    RestoreFailed {
        /// Number of entries that failed.
        failed: usize,
        /// Number of entries attempted.
        total: usize,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Scan { msg } => write!(f, "Memory map scan error: {msg}"),
            Error::ObjectNotFound { dev, inode } => {
                write!(f, "Object not mapped: dev {dev:#x}, inode {inode}")
            }
            Error::SymbolNotFound { symbol } => write!(f, "Symbol not found: {symbol}"),
            Error::MalformedObject { msg } => write!(f, "Malformed ELF object: {msg}"),
            Error::Mprotect { msg } => write!(f, "Memory protection error: {msg}"),
            Error::ApplyFailed { failed, total } => {
                write!(f, "Failed to apply {failed} of {total} hooks")
            }
            Error::RestoreFailed { failed, total } => {
                write!(f, "Failed to restore {failed} of {total} hooks")
            }
        }
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Returns true for the outcomes that only mean "not there yet":
    /// [`Error::ObjectNotFound`] and [`Error::SymbolNotFound`].
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ObjectNotFound { .. } | Error::SymbolNotFound { .. }
        )
    }
}

/// Creates a scan error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn scan_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Scan { msg: msg.into() }
}

/// Creates a malformed object error with the specified message.
///
/// # Arguments
/// * `msg` - The error message.
///
/// # Returns
/// An `Error::MalformedObject` variant with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn malformed_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::MalformedObject { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn symbol_not_found(symbol: &str) -> Error {
    Error::SymbolNotFound {
        symbol: Cow::Owned(symbol.into()),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn object_not_found(dev: u64, inode: u64) -> Error {
    Error::ObjectNotFound { dev, inode }
}

#[cold]
#[inline(never)]
pub(crate) fn apply_failed(failed: usize, total: usize) -> Error {
    Error::ApplyFailed { failed, total }
}

#[cold]
#[inline(never)]
pub(crate) fn restore_failed(failed: usize, total: usize) -> Error {
    Error::RestoreFailed { failed, total }
}

/// Creates a protection error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn mprotect_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Mprotect { msg: msg.into() }
}
