//! Patching and restoring indirection slots.
//!
//! A slot is one pointer-width word in a GOT. Writing it takes four steps:
//! find the mapping that holds it, make its page writable if needed, swap the
//! new value in with a single atomic store, and put the page protection back.
//! Readers of the slot run without any synchronization, so the store must be
//! one aligned word; they see either the old or the new pointer, never a mix.
//!
//! Every engine holds the process-wide claim table for its whole lifetime, so
//! slot writes from different registries never interleave, and a slot hooked
//! by one registry cannot be overwritten by another until it is restored.

use crate::{
    Result,
    maps::MapRecord,
    os::{Mprotect, ProtFlags, page_size, page_start},
};
use core::{ffi::c_void, marker::PhantomData, mem::size_of, ptr::NonNull};
use foldhash::fast::FixedState;
use hashbrown::HashMap;
use std::sync::{Mutex, MutexGuard};

#[cfg(not(feature = "portable-atomic"))]
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "portable-atomic")]
use portable_atomic::{AtomicUsize, Ordering};

/// Slot address to the id of the registry whose hook it holds.
type Claims = HashMap<usize, usize, FixedState>;

static CLAIMS: Mutex<Claims> = Mutex::new(HashMap::with_hasher(FixedState::with_seed(0)));
static NEXT_OWNER: AtomicUsize = AtomicUsize::new(1);

/// A fresh id for a registry.
pub(crate) fn next_owner() -> usize {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// Which way a slot is being written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Apply,
    Restore,
}

impl Direction {
    fn failure(self) -> crate::Error {
        match self {
            Direction::Apply => crate::apply_failed(1, 1),
            Direction::Restore => crate::restore_failed(1, 1),
        }
    }
}

/// Outcome of one slot write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotWrite {
    /// Value the slot held before the write.
    pub previous: usize,
    /// Start of the page holding the slot.
    pub page: usize,
    /// Protection of that page, as found and as left.
    pub prot: ProtFlags,
}

/// Swaps `value` into the word at `slot` and returns the previous contents.
///
/// # Safety
/// `slot` must be word-aligned and lie in a mapping that is currently
/// readable and writable.
#[inline]
pub(crate) unsafe fn write_slot(slot: usize, value: usize) -> usize {
    let slot = unsafe { &*(slot as *const AtomicUsize) };
    slot.swap(value, Ordering::AcqRel)
}

/// Reads the word at `slot`.
///
/// # Safety
/// `slot` must be word-aligned and lie in a readable mapping.
#[inline]
pub(crate) unsafe fn read_slot(slot: usize) -> usize {
    let slot = unsafe { &*(slot as *const AtomicUsize) };
    slot.load(Ordering::Acquire)
}

/// Finds the record a whole slot lies in.
pub(crate) fn slot_record(records: &[MapRecord], slot: usize) -> Option<&MapRecord> {
    if slot % size_of::<usize>() != 0 {
        return None;
    }
    records
        .iter()
        .find(|record| record.contains(slot) && slot + size_of::<usize>() <= record.end)
}

/// Writes slots on the pages described by a fresh memory-map scan, on behalf
/// of one registry.
pub(crate) struct HookEngine<'scan, M: Mprotect> {
    records: &'scan [MapRecord],
    owner: usize,
    claims: MutexGuard<'static, Claims>,
    _marker: PhantomData<fn() -> M>,
}

impl<'scan, M: Mprotect> HookEngine<'scan, M> {
    /// Blocks until no other engine in the process is writing.
    pub(crate) fn new(records: &'scan [MapRecord], owner: usize) -> Self {
        HookEngine {
            records,
            owner,
            claims: CLAIMS.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            _marker: PhantomData,
        }
    }

    /// Writes `replacement` into `slot`; the returned `previous` is the
    /// original to restore later.
    ///
    /// Fails without writing if another registry holds a hook on `slot`.
    pub(crate) fn apply(&mut self, slot: usize, replacement: usize) -> Result<SlotWrite> {
        self.check_claim(slot, Direction::Apply)?;
        let write = self.patch(slot, replacement, Direction::Apply)?;
        self.claims.insert(slot, self.owner);
        Ok(write)
    }

    /// Writes a saved original back into `slot` and gives up the claim on it.
    pub(crate) fn restore(&mut self, slot: usize, original: usize) -> Result<SlotWrite> {
        self.check_claim(slot, Direction::Restore)?;
        let write = self.patch(slot, original, Direction::Restore)?;
        self.claims.remove(&slot);
        Ok(write)
    }

    /// Gives up the claim on `slot` without writing it.
    pub(crate) fn release(&mut self, slot: usize) {
        if self.claims.get(&slot) == Some(&self.owner) {
            self.claims.remove(&slot);
        }
    }

    fn check_claim(&self, slot: usize, direction: Direction) -> Result<()> {
        match self.claims.get(&slot) {
            Some(&owner) if owner != self.owner => {
                #[cfg(feature = "log")]
                log::warn!(
                    "[Engine] {:?}: slot 0x{:x} is hooked by another registry",
                    direction,
                    slot
                );
                Err(direction.failure())
            }
            _ => Ok(()),
        }
    }

    fn patch(&self, slot: usize, value: usize, direction: Direction) -> Result<SlotWrite> {
        let Some(record) = slot_record(self.records, slot) else {
            #[cfg(feature = "log")]
            log::warn!(
                "[Engine] {:?}: slot 0x{:x} is unaligned or not mapped",
                direction,
                slot
            );
            return Err(direction.failure());
        };
        let page = page_start(slot);
        let prot = record.perms;
        let needs_write = !record.is_writable();
        let page_ptr = NonNull::new(page as *mut c_void).ok_or_else(|| direction.failure())?;

        if needs_write {
            unsafe { M::mprotect(page_ptr, page_size(), prot | ProtFlags::PROT_WRITE) }.map_err(
                |_err| {
                    #[cfg(feature = "log")]
                    log::warn!(
                        "[Engine] {:?}: cannot make page 0x{:x} writable: {}",
                        direction,
                        page,
                        _err
                    );
                    direction.failure()
                },
            )?;
        }

        // Safety: the slot is aligned, mapped and now writable.
        let previous = unsafe { write_slot(slot, value) };

        if needs_write {
            if let Err(_err) = unsafe { M::mprotect(page_ptr, page_size(), prot) } {
                // the slot is already written; the page merely stays writable
                #[cfg(feature = "log")]
                log::warn!(
                    "[Engine] page 0x{:x} left writable, restoring {:?} failed: {}",
                    page,
                    prot,
                    _err
                );
            }
        }

        #[cfg(feature = "log")]
        log::trace!(
            "[Engine] {:?}: slot 0x{:x}: 0x{:x} -> 0x{:x}",
            direction,
            slot,
            previous,
            value
        );

        Ok(SlotWrite {
            previous,
            page,
            prot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, os::DefaultMprotect};
    use alloc::boxed::Box;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering as StdOrdering},
        },
        thread,
    };

    fn leak_slot(value: usize) -> usize {
        Box::leak(Box::new(value)) as *mut usize as usize
    }

    fn fresh_scan() -> Vec<MapRecord> {
        MapRecord::scan_self().unwrap()
    }

    /// An anonymous read-only page holding one slot.
    fn read_only_page(value: usize) -> usize {
        unsafe {
            let page = libc::mmap(
                core::ptr::null_mut(),
                page_size(),
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            assert_ne!(page, libc::MAP_FAILED);
            (page as *mut usize).write(value);
            assert_eq!(libc::mprotect(page, page_size(), libc::PROT_READ), 0);
            page as usize
        }
    }

    #[test]
    fn apply_and_restore_exact_bit_patterns() {
        for original in [0usize, usize::MAX, 0x5a5a_a5a5usize.rotate_left(7)] {
            let slot = leak_slot(original);
            let records = fresh_scan();
            let mut engine = HookEngine::<DefaultMprotect>::new(&records, next_owner());

            let replacement = !original;
            let write = engine.apply(slot, replacement).unwrap();
            assert_eq!(write.previous, original);
            assert_eq!(unsafe { read_slot(slot) }, replacement);

            let write = engine.restore(slot, write.previous).unwrap();
            assert_eq!(write.previous, replacement);
            assert_eq!(unsafe { read_slot(slot) }, original);
        }
    }

    #[test]
    fn read_only_page_is_patched_and_protection_restored() {
        let page = read_only_page(0x1234);
        let records = fresh_scan();
        let mut engine = HookEngine::<DefaultMprotect>::new(&records, next_owner());

        let write = engine.apply(page, 0x5678).unwrap();
        assert_eq!(write.previous, 0x1234);
        assert_eq!(write.page, page);
        assert_eq!(write.prot, ProtFlags::PROT_READ);
        assert_eq!(unsafe { read_slot(page) }, 0x5678);

        let after = fresh_scan();
        let record = slot_record(&after, page).unwrap();
        assert_eq!(record.perms, ProtFlags::PROT_READ);

        engine.restore(page, write.previous).unwrap();
        assert_eq!(unsafe { read_slot(page) }, 0x1234);
        unsafe { libc::munmap(page as *mut c_void, page_size()) };
    }

    #[test]
    fn unaligned_or_unmapped_slot_is_rejected() {
        let slot = leak_slot(7);
        let records = fresh_scan();
        let mut engine = HookEngine::<DefaultMprotect>::new(&records, next_owner());

        let err = engine.apply(slot + 1, 0).unwrap_err();
        assert!(matches!(err, Error::ApplyFailed { failed: 1, total: 1 }));
        assert_eq!(unsafe { read_slot(slot) }, 7);

        let err = engine.restore(size_of::<usize>(), 0).unwrap_err();
        assert!(matches!(err, Error::RestoreFailed { failed: 1, total: 1 }));
    }

    #[test]
    fn failed_protection_change_leaves_slot_untouched() {
        struct Refuse;
        impl Mprotect for Refuse {
            unsafe fn mprotect(_: NonNull<c_void>, _: usize, _: ProtFlags) -> Result<()> {
                Err(crate::mprotect_error("refused"))
            }
        }

        let page = read_only_page(42);
        let records = fresh_scan();
        let mut engine = HookEngine::<Refuse>::new(&records, next_owner());
        assert!(matches!(
            engine.apply(page, 0).unwrap_err(),
            Error::ApplyFailed { .. }
        ));
        assert_eq!(unsafe { read_slot(page) }, 42);
        unsafe { libc::munmap(page as *mut c_void, page_size()) };
    }

    #[test]
    fn slot_hooked_by_one_owner_is_refused_to_another() {
        let slot = leak_slot(10);
        let records = fresh_scan();
        let (first, second) = (next_owner(), next_owner());

        {
            let mut engine = HookEngine::<DefaultMprotect>::new(&records, first);
            assert_eq!(engine.apply(slot, 11).unwrap().previous, 10);
        }
        {
            let mut engine = HookEngine::<DefaultMprotect>::new(&records, second);
            assert!(matches!(
                engine.apply(slot, 12).unwrap_err(),
                Error::ApplyFailed { .. }
            ));
            assert!(matches!(
                engine.restore(slot, 0).unwrap_err(),
                Error::RestoreFailed { .. }
            ));
            engine.release(slot);
        }
        assert_eq!(unsafe { read_slot(slot) }, 11);
        {
            let mut engine = HookEngine::<DefaultMprotect>::new(&records, first);
            assert_eq!(engine.restore(slot, 10).unwrap().previous, 11);
        }
        let mut engine = HookEngine::<DefaultMprotect>::new(&records, second);
        assert_eq!(engine.apply(slot, 12).unwrap().previous, 10);
        engine.restore(slot, 10).unwrap();
    }

    #[test]
    fn concurrent_readers_never_see_torn_values() {
        const A: usize = 0x0123_4567usize.wrapping_mul(0x1000_0001);
        const B: usize = !A;
        let slot = leak_slot(A);
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let done = done.clone();
                thread::spawn(move || {
                    while !done.load(StdOrdering::Relaxed) {
                        let value = unsafe { read_slot(slot) };
                        assert!(value == A || value == B, "torn read: 0x{value:x}");
                    }
                })
            })
            .collect();

        let records = fresh_scan();
        let mut engine = HookEngine::<DefaultMprotect>::new(&records, next_owner());
        let mut current = A;
        for _ in 0..10_000 {
            let next = if current == A { B } else { A };
            assert_eq!(engine.apply(slot, next).unwrap().previous, current);
            current = next;
        }
        done.store(true, StdOrdering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
