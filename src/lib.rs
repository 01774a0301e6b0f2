//! # elf_hook
//! Scan the memory maps of a process and redirect the PLT/GOT slots of ELF
//! objects that are already loaded into it.
//! ## Usage
//! [`MapRecord::scan_self`] lists the mappings of the calling process. Pick
//! the object to patch by the device and inode of its backing file, describe
//! the hook with a [`HookRequest`], then [`register`](HookRegistry::register)
//! and [`commit`](HookRegistry::commit) it through a [`HookRegistry`].
//! [`HookRegistry::invalidate`] restores every original pointer.
//!
//! The lower layers are public too: [`locate`] groups the records of one
//! object and [`ElfImage`] resolves a symbol to the slots that reach it.
//! ## Example
//! The `hook_getpid` demo hooks `getpid` in its own executable.
extern crate alloc;

#[cfg(not(target_os = "linux"))]
compile_error!("memory maps are read from /proc, which requires Linux");

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "loongarch64",
    target_arch = "x86",
    target_arch = "arm",
)))]
compile_error!("unsupport arch");

pub mod arch;
pub mod elf;
mod error;
pub mod hook;
pub mod locate;
pub mod maps;
pub mod os;

pub(crate) use error::*;

pub use crate::elf::{ElfImage, ResolvedSlot, SlotKind};
pub use crate::error::Error;
pub use crate::hook::{CommittedHook, HookRegistry, HookRequest, SlotFilter};
pub use crate::locate::{FileWindow, ObjectMapping, locate};
pub use crate::maps::{MapRecord, ProcessId};
pub use crate::os::{DefaultMprotect, Mprotect, ProtFlags};

/// A type alias for `Result`s returned by `elf_hook` functions.
pub type Result<T> = core::result::Result<T, Error>;
