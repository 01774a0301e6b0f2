mod common;

use common::exe_record;
use elf_hook::{Error, FileWindow, MapRecord, ProcessId, locate};
use rstest::rstest;

#[rstest]
#[case::self_process(ProcessId::SelfProcess)]
#[case::own_pid(ProcessId::Pid(std::process::id()))]
fn scan_lists_ordered_regions(#[case] pid: ProcessId) {
    let records = MapRecord::scan(pid).unwrap();
    assert!(!records.is_empty());
    for pair in records.windows(2) {
        assert!(pair[0].start < pair[1].start);
        assert!(pair[0].end <= pair[1].start);
    }
    assert!(records.iter().all(|record| record.start < record.end));
    assert!(
        records
            .iter()
            .any(|record| record.path.as_deref() == Some("[stack]"))
    );
    let exe = exe_record(&records);
    assert!(exe.inode != 0);
}

#[test]
fn scan_of_missing_process_fails() {
    // pid_max never exceeds 2^22
    let err = MapRecord::scan(ProcessId::Pid(u32::MAX)).unwrap_err();
    assert!(matches!(err, Error::Scan { .. }));
}

#[test]
fn executable_is_located_with_its_header() {
    let records = MapRecord::scan_self().unwrap();
    let exe = exe_record(&records).clone();
    let object = locate(&records, exe.dev, exe.inode, None).unwrap();

    let base = object.base_record().unwrap();
    assert_eq!(base.offset, 0);
    assert_eq!(object.load_bias, base.start);
    assert!(object.records.iter().any(|record| record.is_executable()));
    let magic = unsafe { std::slice::from_raw_parts(object.load_bias as *const u8, 4) };
    assert_eq!(magic, b"\x7fELF");

    let windowed = locate(
        &records,
        exe.dev,
        exe.inode,
        Some(FileWindow::new(0, usize::MAX)),
    )
    .unwrap();
    assert_eq!(windowed.load_bias, object.load_bias);
    assert_eq!(windowed.records, object.records);
}

#[test]
fn unknown_identity_is_not_found() {
    let records = MapRecord::scan_self().unwrap();
    let exe = exe_record(&records).clone();
    let err = locate(&records, exe.dev, u64::MAX, None).unwrap_err();
    assert!(matches!(err, Error::ObjectNotFound { inode: u64::MAX, .. }));
    assert!(err.is_not_found());

    let beyond = usize::MAX / 2;
    let err = locate(
        &records,
        exe.dev,
        exe.inode,
        Some(FileWindow::new(beyond, 0x1000)),
    )
    .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn non_utf8_file_name_does_not_break_the_scan() {
    use std::os::unix::{ffi::OsStrExt, io::AsRawFd};

    let mut name = format!("elf_hook_{}_", std::process::id()).into_bytes();
    name.extend_from_slice(b"\xff\xfe.bin");
    let path = std::env::temp_dir().join(std::ffi::OsStr::from_bytes(&name));
    std::fs::write(&path, vec![0u8; 4096]).unwrap();
    let file = std::fs::File::open(&path).unwrap();
    let page = unsafe {
        libc::mmap(
            core::ptr::null_mut(),
            4096,
            libc::PROT_READ,
            libc::MAP_PRIVATE,
            file.as_raw_fd(),
            0,
        )
    };
    assert_ne!(page, libc::MAP_FAILED);

    let result = MapRecord::scan_self();
    unsafe { libc::munmap(page, 4096) };
    drop(file);
    let _ = std::fs::remove_file(&path);

    let records = result.unwrap();
    let record = records
        .iter()
        .find(|record| record.start == page as usize)
        .unwrap();
    assert!(record.inode != 0);
    assert!(!record.is_writable());
    assert!(record.path.as_deref().unwrap().contains('\u{fffd}'));
    assert!(exe_record(&records).inode != 0);
}
