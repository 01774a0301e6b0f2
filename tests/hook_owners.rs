//! Two registries in one process competing for the same slot.
mod common;

use common::{exe_record, fake_getpid, fake_getpid2, init_logger, real_pid};
use elf_hook::{Error, HookRegistry, HookRequest, MapRecord};
use std::ffi::c_void;

fn getpid() -> libc::pid_t {
    unsafe { libc::getpid() }
}

#[test]
fn second_registry_cannot_take_over_a_hooked_slot() {
    init_logger();
    let pid = real_pid();
    let records = MapRecord::scan_self().unwrap();
    let exe = exe_record(&records).clone();
    let request = |replacement: extern "C" fn() -> libc::pid_t| {
        HookRequest::new(exe.dev, exe.inode, "getpid", replacement as *const c_void)
    };

    let first = HookRegistry::new();
    let second = HookRegistry::new();
    first.register(request(fake_getpid)).unwrap();
    first.commit().unwrap();
    assert_eq!(getpid(), 2333);

    second.register(request(fake_getpid2)).unwrap();
    let err = second.commit().unwrap_err();
    assert!(matches!(err, Error::ApplyFailed { failed, total } if failed == total));
    assert_eq!(second.committed_count(), 0);
    assert_eq!(getpid(), 2333);

    // either order of invalidation ends at the real target
    first.invalidate().unwrap();
    second.invalidate().unwrap();
    assert_eq!(getpid(), pid);

    // once released, the slot is free for the other registry
    second.register(request(fake_getpid2)).unwrap();
    second.commit().unwrap();
    assert_eq!(getpid(), 4666);
    first.register(request(fake_getpid)).unwrap();
    assert!(first.commit().is_err());
    assert_eq!(getpid(), 4666);

    second.invalidate().unwrap();
    first.invalidate().unwrap();
    assert_eq!(getpid(), pid);
}
