use crate::{
    Result, mprotect_error,
    os::{Mprotect, ProtFlags},
};
use alloc::format;
use core::{ffi::c_void, ptr::NonNull};
use syscalls::Sysno;

/// An implementation of [`Mprotect`] that issues the raw Linux syscall.
pub struct DefaultMprotect;

impl Mprotect for DefaultMprotect {
    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
        unsafe {
            from_ret(
                syscalls::raw_syscall!(Sysno::mprotect, addr.as_ptr(), len, prot.bits()),
            )
            .map_err(|errno| {
                mprotect_error(format!(
                    "mprotect({:p}, 0x{:x}, {:?}) failed: errno {}",
                    addr, len, prot, errno
                ))
            })?;
        }
        Ok(())
    }
}

/// Splits a raw syscall return into its value or errno.
#[inline]
fn from_ret(value: usize) -> core::result::Result<usize, isize> {
    if value > -4096isize as usize {
        // Truncation of the error value is guaranteed to never occur due to
        // the above check. This is the same check that musl uses:
        // https://git.musl-libc.org/cgit/musl/tree/src/internal/syscall_ret.c?h=v1.1.15
        return Err(-(value as isize));
    }
    Ok(value)
}
