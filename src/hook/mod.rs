//! Two-phase PLT/GOT hooking.
//!
//! Hooks are first [registered](HookRegistry::register), which resolves the
//! slots and reports the current target, then written in one batch by
//! [`HookRegistry::commit`]. [`HookRegistry::invalidate`] puts every original
//! back.
//!
//! ```rust,no_run
//! use core::ffi::c_void;
//! use elf_hook::{HookRegistry, HookRequest, MapRecord};
//!
//! extern "C" fn fake_getpid() -> i32 {
//!     42
//! }
//!
//! let records = MapRecord::scan_self().unwrap();
//! let exe = std::env::current_exe().unwrap();
//! let record = records
//!     .iter()
//!     .find(|record| record.path.as_deref() == exe.to_str())
//!     .unwrap();
//!
//! let registry = HookRegistry::new();
//! let mut original: *const c_void = core::ptr::null();
//! registry
//!     .register(
//!         HookRequest::new(record.dev, record.inode, "getpid", fake_getpid as *const c_void)
//!             .backup(&mut original),
//!     )
//!     .unwrap();
//! registry.commit().unwrap();
//! ```

pub(crate) mod engine;

use crate::{
    Result,
    elf::{ElfImage, ResolvedSlot, SlotKind},
    locate::{FileWindow, locate},
    malformed_error,
    maps::MapRecord,
    os::{DefaultMprotect, Mprotect, ProtFlags},
    symbol_not_found,
};
use alloc::{string::String, vec::Vec};
use core::{ffi::c_void, fmt::Debug, marker::PhantomData};
use engine::HookEngine;
use foldhash::fast::FixedState;
use hashbrown::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Which kinds of slot a request patches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotFilter {
    /// Every PLT and GOT slot of the symbol.
    #[default]
    All,
    /// Only `.got.plt` entries used by PLT stubs.
    PltOnly,
    /// Only `.got` entries and absolute address words.
    GotOnly,
}

impl SlotFilter {
    #[inline]
    pub fn accepts(self, kind: SlotKind) -> bool {
        match self {
            SlotFilter::All => true,
            SlotFilter::PltOnly => kind == SlotKind::Plt,
            SlotFilter::GotOnly => kind == SlotKind::Got,
        }
    }
}

/// A request to redirect one imported symbol of one object.
///
/// The object is named by the device and inode of its backing file, as
/// found in a [`MapRecord`].
pub struct HookRequest<'a> {
    dev: u64,
    inode: u64,
    window: Option<FileWindow>,
    symbol: String,
    replacement: *const c_void,
    backup: Option<&'a mut *const c_void>,
    slots: SlotFilter,
}

impl<'a> HookRequest<'a> {
    pub fn new(dev: u64, inode: u64, symbol: &str, replacement: *const c_void) -> Self {
        HookRequest {
            dev,
            inode,
            window: None,
            symbol: symbol.into(),
            replacement,
            backup: None,
            slots: SlotFilter::All,
        }
    }

    /// Restricts the match to `[offset, offset + size)` of the backing file,
    /// for objects embedded in a larger file.
    pub fn window(mut self, offset: usize, size: usize) -> Self {
        self.window = Some(FileWindow::new(offset, size));
        self
    }

    /// Receives the value the slot holds before the hook, at registration.
    pub fn backup(mut self, backup: &'a mut *const c_void) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn slots(mut self, slots: SlotFilter) -> Self {
        self.slots = slots;
        self
    }
}

impl Debug for HookRequest<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookRequest")
            .field("dev", &self.dev)
            .field("inode", &self.inode)
            .field("window", &self.window)
            .field("symbol", &self.symbol)
            .field("replacement", &self.replacement)
            .field("slots", &self.slots)
            .finish()
    }
}

/// A slot currently holding a replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommittedHook {
    /// Absolute address of the slot.
    pub slot: usize,
    pub kind: SlotKind,
    /// Value found in the slot before it was first hooked.
    pub original: usize,
    /// Value currently written.
    pub replacement: usize,
    /// Page holding the slot.
    pub page: usize,
    /// Protection the page had, and was returned to, around the write.
    pub page_prot: ProtFlags,
}

#[derive(Clone, Copy, Debug)]
struct PendingHook {
    slot: ResolvedSlot,
    replacement: usize,
}

struct Inner {
    pending: Vec<PendingHook>,
    committed: HashMap<usize, CommittedHook, FixedState>,
}

/// The set of pending and committed hooks of the calling process.
///
/// All operations serialize on one internal lock, so a registry can be shared
/// between threads. Slot writes of every registry in the process also
/// serialize on one process-wide lock, and a slot hooked by one registry is
/// refused to the others until it is restored.
///
/// Dropping a registry leaves committed hooks in place, and their slots stay
/// claimed; call [`HookRegistry::invalidate`] to undo them.
pub struct HookRegistry<M: Mprotect = DefaultMprotect> {
    owner: usize,
    inner: Mutex<Inner>,
    _marker: PhantomData<fn() -> M>,
}

impl HookRegistry {
    /// Creates an empty registry using the default protection backend.
    pub fn new() -> Self {
        Self::with_backend()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Mprotect> HookRegistry<M> {
    /// Creates an empty registry that changes page protection through `M`.
    pub fn with_backend() -> Self {
        HookRegistry {
            owner: engine::next_owner(),
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                committed: HashMap::with_hasher(FixedState::default()),
            }),
            _marker: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a panic while holding the lock cannot leave a half-written slot
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolves the slots of `request` and queues them for the next commit.
    ///
    /// The backup, if any, receives the value the slot holds before any hook:
    /// the saved original for a slot that is already hooked, the live value
    /// otherwise. A later request for the same slot replaces an earlier
    /// pending one. On error neither the registry nor the backup is changed.
    pub fn register(&self, request: HookRequest<'_>) -> Result<()> {
        let mut inner = self.lock();
        let records = MapRecord::scan_self()?;
        let object = locate(&records, request.dev, request.inode, request.window)?;
        let image = ElfImage::parse(&object)?;
        let slots: Vec<ResolvedSlot> = image
            .resolve_symbol(&request.symbol)?
            .into_iter()
            .filter(|slot| request.slots.accepts(slot.kind))
            .collect();
        let Some(first) = slots.first() else {
            return Err(symbol_not_found(&request.symbol));
        };

        let current = match inner.committed.get(&first.addr) {
            Some(hook) => hook.original,
            None => {
                let readable = engine::slot_record(&records, first.addr)
                    .is_some_and(|record| record.is_readable());
                if !readable {
                    return Err(malformed_error("slot lies outside the readable mapping"));
                }
                // Safety: aligned and inside a readable record.
                unsafe { engine::read_slot(first.addr) }
            }
        };
        if let Some(backup) = request.backup {
            *backup = current as *const c_void;
        }

        let replacement = request.replacement as usize;
        for slot in slots {
            match inner.pending.iter_mut().find(|hook| hook.slot.addr == slot.addr) {
                Some(pending) => pending.replacement = replacement,
                None => inner.pending.push(PendingHook { slot, replacement }),
            }
        }

        #[cfg(feature = "log")]
        log::debug!(
            "[Register] {} in dev: {:#x}, inode: {}, {} pending",
            request.symbol,
            request.dev,
            request.inode,
            inner.pending.len()
        );
        Ok(())
    }

    /// Writes every pending hook.
    ///
    /// Entries are applied independently; a failure is logged and the rest
    /// are still attempted. The pending list is empty afterwards either way.
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.lock();
        let pending = core::mem::take(&mut inner.pending);
        if pending.is_empty() {
            return Ok(());
        }
        let records = MapRecord::scan_self()?;
        let mut engine = HookEngine::<M>::new(&records, self.owner);
        let total = pending.len();
        let mut failed = 0;

        for PendingHook { slot, replacement } in pending {
            if let Some(hook) = inner.committed.get(&slot.addr) {
                let original = hook.original;
                if replacement == original {
                    // hooking back to the original unhooks
                    match engine.restore(slot.addr, original) {
                        Ok(_) => {
                            inner.committed.remove(&slot.addr);
                        }
                        Err(_) => failed += 1,
                    }
                    continue;
                }
            }
            match engine.apply(slot.addr, replacement) {
                Ok(write)
                    if write.previous == replacement
                        && !inner.committed.contains_key(&slot.addr) =>
                {
                    // the slot already held the target; nothing to undo
                    engine.release(slot.addr);
                }
                Ok(write) => {
                    let hook = inner
                        .committed
                        .entry(slot.addr)
                        .or_insert(CommittedHook {
                            slot: slot.addr,
                            kind: slot.kind,
                            original: write.previous,
                            replacement,
                            page: write.page,
                            page_prot: write.prot,
                        });
                    hook.replacement = replacement;
                }
                Err(_) => failed += 1,
            }
        }

        #[cfg(feature = "log")]
        log::debug!(
            "[Commit] {} of {} hooks applied, {} committed",
            total - failed,
            total,
            inner.committed.len()
        );
        if failed != 0 {
            #[cfg(feature = "log")]
            log::warn!("[Commit] {} of {} hooks failed", failed, total);
            return Err(crate::apply_failed(failed, total));
        }
        Ok(())
    }

    /// Restores every committed slot to its original value.
    ///
    /// The committed table is cleared even if some restores fail, so a second
    /// call is a no-op.
    pub fn invalidate(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.committed.is_empty() {
            return Ok(());
        }
        let records = MapRecord::scan_self()?;
        let mut engine = HookEngine::<M>::new(&records, self.owner);
        let total = inner.committed.len();
        let mut failed = 0;
        for (slot, hook) in inner.committed.drain() {
            if engine.restore(slot, hook.original).is_err() {
                // forgotten here, so no longer ours to keep
                engine.release(slot);
                failed += 1;
            }
        }

        #[cfg(feature = "log")]
        log::debug!("[Invalidate] {} of {} hooks restored", total - failed, total);
        if failed != 0 {
            return Err(crate::restore_failed(failed, total));
        }
        Ok(())
    }

    /// Number of hooks waiting for the next commit.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of slots currently hooked.
    pub fn committed_count(&self) -> usize {
        self.lock().committed.len()
    }

    /// A snapshot of the committed hooks, ordered by slot address.
    pub fn committed(&self) -> Vec<CommittedHook> {
        let mut hooks: Vec<CommittedHook> = self.lock().committed.values().copied().collect();
        hooks.sort_unstable_by_key(|hook| hook.slot);
        hooks
    }
}
