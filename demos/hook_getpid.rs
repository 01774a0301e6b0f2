use elf_hook::{HookRegistry, HookRequest, MapRecord};
use std::ffi::c_void;

extern "C" fn fake_getpid() -> libc::pid_t {
    2333
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();

    let records = MapRecord::scan_self().unwrap();
    let exe = std::env::current_exe().unwrap();
    let record = records
        .iter()
        .find(|record| record.path.as_deref().map(std::path::Path::new) == Some(exe.as_path()))
        .unwrap();
    log::info!("hooking getpid in {}", record);

    let registry = HookRegistry::new();
    let mut original: *const c_void = core::ptr::null();
    registry
        .register(
            HookRequest::new(record.dev, record.inode, "getpid", fake_getpid as *const c_void)
                .backup(&mut original),
        )
        .unwrap();
    registry.commit().unwrap();

    log::info!("hooked pid: {}", unsafe { libc::getpid() });
    let original: extern "C" fn() -> libc::pid_t = unsafe { core::mem::transmute(original) };
    log::info!("original pid: {}", original());

    registry.invalidate().unwrap();
    log::info!("restored pid: {}", unsafe { libc::getpid() });
}
