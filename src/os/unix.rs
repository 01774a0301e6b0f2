use crate::{
    Result, mprotect_error,
    os::{Mprotect, ProtFlags},
};
use alloc::format;
use core::{ffi::c_void, ptr::NonNull};

/// An implementation of [`Mprotect`] on top of libc.
pub struct DefaultMprotect;

impl Mprotect for DefaultMprotect {
    unsafe fn mprotect(addr: NonNull<c_void>, len: usize, prot: ProtFlags) -> Result<()> {
        let res = unsafe { libc::mprotect(addr.as_ptr(), len, prot.bits()) };
        if res != 0 {
            return Err(mprotect_error(format!(
                "mprotect({:p}, 0x{:x}, {:?}) failed: {}",
                addr,
                len,
                prot,
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}
