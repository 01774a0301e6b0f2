#![allow(dead_code)]

use elf_hook::{ElfImage, MapRecord, ObjectMapping, locate};
use std::path::{Path, PathBuf};

pub type GetPid = extern "C" fn() -> libc::pid_t;

pub fn get_path(name: &str) -> PathBuf {
    PathBuf::from(env!("TEST_ARTIFACTS")).join(name)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The record of the first mapping backed by `path`.
pub fn record_by_path<'a>(records: &'a [MapRecord], path: &Path) -> Option<&'a MapRecord> {
    records
        .iter()
        .find(|record| record.path.as_deref().map(Path::new) == Some(path))
}

/// The record of the first mapping of the running executable.
pub fn exe_record(records: &[MapRecord]) -> &MapRecord {
    let exe = std::env::current_exe().unwrap();
    record_by_path(records, &exe).unwrap_or_else(|| panic!("{} is not mapped", exe.display()))
}

/// The running executable, located and parsed.
pub fn exe_image() -> (MapRecord, ObjectMapping, ElfImage) {
    let records = MapRecord::scan_self().unwrap();
    let exe = exe_record(&records).clone();
    let object = locate(&records, exe.dev, exe.inode, None).unwrap();
    let image = ElfImage::parse(&object).unwrap();
    (exe, object, image)
}

/// The process id, read without calling `getpid`.
pub fn real_pid() -> libc::pid_t {
    std::fs::read_link("/proc/self")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap()
}

pub extern "C" fn fake_getpid() -> libc::pid_t {
    2333
}

pub extern "C" fn fake_getpid2() -> libc::pid_t {
    4666
}
