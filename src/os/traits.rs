use core::{ffi::c_void, ptr::NonNull};

use super::ProtFlags;
use crate::Result;

/// A trait for changing the protection of mapped pages.
///
/// The hook engine is generic over this trait so that the syscall layer can
/// be swapped (libc by default, raw syscalls with the `use-syscall` feature,
/// or a custom implementation in tests).
///
/// # Example
/// ```rust,ignore
/// struct MyMprotect;
///
/// impl Mprotect for MyMprotect {
///     unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
///         // Platform-specific implementation
///         todo!()
///     }
/// }
/// ```
pub trait Mprotect {
    /// Changes the protection of a memory region.
    ///
    /// # Arguments
    /// * `addr` - Pointer to the start of the region (must be page-aligned).
    /// * `len` - Size of the region in bytes (rounded up to page boundary).
    /// * `prot` - New protection flags to apply.
    ///
    /// # Returns
    /// `Ok(())` on success, or an error if the operation fails.
    ///
    /// # Safety
    /// Changing permissions can affect running code. Removing read or execute
    /// permission from a page another thread is using will crash it.
    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()>;
}
