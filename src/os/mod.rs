//! Page protection backends.
//!
//! The hook engine only ever needs to flip the protection of the page that
//! holds an indirection slot and to know the page size. Those two operations
//! are abstracted by [`Mprotect`] so that the registry can run on libc or on
//! raw Linux syscalls.

mod traits;

use bitflags::bitflags;
use core::ffi::c_int;

pub use traits::Mprotect;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    /// Memory protection flags for controlling access permissions.
    ///
    /// These flags determine what operations can be performed on a mapped memory region.
    /// The values match `PROT_*` on Linux.
    pub struct ProtFlags: c_int {
        /// No access allowed.
        const PROT_NONE = 0;

        /// Allow reading from the memory region.
        const PROT_READ = 1;

        /// Allow writing to the memory region.
        const PROT_WRITE = 2;

        /// Allow executing code in the memory region.
        const PROT_EXEC = 4;
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "use-syscall")]{
        pub(crate) mod linux_syscall;
        pub use linux_syscall::*;
    }else{
        pub(crate) mod unix;
        pub use unix::*;
    }
}

/// Size of a memory page, queried once from the system.
pub(crate) fn page_size() -> usize {
    use std::sync::OnceLock;
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 { size as usize } else { 0x1000 }
    })
}

#[inline]
pub(crate) fn page_start(addr: usize) -> usize {
    addr & !(page_size() - 1)
}
