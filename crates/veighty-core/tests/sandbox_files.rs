mod common;

use std::fs;

use common::{config_in, run_with};
use tempfile::tempdir;
use veighty_core::{OpCode, ProgramBuilder, VmError};

fn write_program(content: &[u8], name: &[u8]) -> Vec<u8> {
    ProgramBuilder::new()
        .pushs(content)
        .pushs(name)
        .op(OpCode::WriteFile)
        .build()
        .unwrap()
}

#[test]
fn written_file_reads_back_in_new_machine() {
    let dir = tempdir().unwrap();

    let writer = run_with(config_in(dir.path()), &write_program(b"hello", b"out1"), &[]);
    assert!(writer.fault().is_none(), "{:?}", writer.fault());
    assert_eq!(writer.stdout(), "file written\n");
    assert_eq!(fs::read(dir.path().join("out1")).unwrap(), b"hello");

    let reader = ProgramBuilder::new()
        .pushs(b"out1")
        .op(OpCode::ReadFile)
        .op(OpCode::PopS)
        .build()
        .unwrap();
    let r = run_with(config_in(dir.path()), &reader, &[]);
    assert_eq!(r.stdout(), "hello\n");
    assert_eq!(r.vm.live_strings(), 0);
}

#[test]
fn rewrite_truncates_previous_content() {
    let dir = tempdir().unwrap();
    run_with(config_in(dir.path()), &write_program(b"a longer body", b"f"), &[]);
    run_with(config_in(dir.path()), &write_program(b"short", b"f"), &[]);
    assert_eq!(fs::read(dir.path().join("f")).unwrap(), b"short");
}

#[test]
fn path_characters_rejected() {
    let dir = tempdir().unwrap();
    for name in [&b"../escape"[..], b"a/b", b"dot.txt", b"sp ace"] {
        let r = run_with(config_in(dir.path()), &write_program(b"x", name), &[]);
        assert!(matches!(r.fault(), Some(VmError::InvalidFilename)), "{:?}", name);
        assert_eq!(r.stdout(), "");
        // both operands were consumed before the name was checked
        assert_eq!(r.vm.sp(), 0);
        assert_eq!(r.vm.live_strings(), 0);
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn overlong_name_rejected() {
    let dir = tempdir().unwrap();
    // literals top out at 255 bytes, so the name is joined at run time
    let program = ProgramBuilder::new()
        .pushs(b"x")
        .pushs(&[b'a'; 200])
        .pushs(&[b'a'; 57])
        .op(OpCode::StrCat)
        .op(OpCode::WriteFile)
        .build()
        .unwrap();
    let r = run_with(config_in(dir.path()), &program, &[]);
    assert!(matches!(r.fault(), Some(VmError::InvalidFilename)));
    assert_eq!(r.vm.sp(), 0);
    assert_eq!(r.stdout(), "");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn readfile_rejects_path_characters() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("secret"), b"kept").unwrap();
    for name in [&b"../secret"[..], b"./secret", b"sec ret"] {
        let program = ProgramBuilder::new()
            .pushs(name)
            .op(OpCode::ReadFile)
            .build()
            .unwrap();
        let r = run_with(config_in(dir.path()), &program, &[]);
        assert!(matches!(r.fault(), Some(VmError::InvalidFilename)), "{:?}", name);
        assert_eq!(r.vm.sp(), 0);
        assert_eq!(r.vm.live_strings(), 0);
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(fs::read(dir.path().join("secret")).unwrap(), b"kept");
}

#[test]
fn missing_file_is_io_failure() {
    let dir = tempdir().unwrap();
    let program = ProgramBuilder::new()
        .pushs(b"nothere")
        .op(OpCode::ReadFile)
        .build()
        .unwrap();
    let r = run_with(config_in(dir.path()), &program, &[]);
    assert!(matches!(r.fault(), Some(VmError::Io(_))));
    assert_eq!(r.vm.sp(), 0);
}

#[test]
fn empty_content_fails_after_creating_file() {
    let dir = tempdir().unwrap();
    let r = run_with(config_in(dir.path()), &write_program(b"", b"empty"), &[]);
    assert!(matches!(r.fault(), Some(VmError::Io(_))));
    assert_eq!(r.stdout(), "");
    assert_eq!(fs::read(dir.path().join("empty")).unwrap(), b"");
}

#[test]
fn oversized_content_is_capped() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.max_file_size = 4;
    let r = run_with(config, &write_program(b"abcdefgh", b"cap"), &[]);
    assert_eq!(r.stdout(), "file written\n");
    assert_eq!(fs::read(dir.path().join("cap")).unwrap(), b"abcd");
}

#[test]
fn writefile_needs_string_operands() {
    let dir = tempdir().unwrap();
    let program = ProgramBuilder::new()
        .pushs(b"body")
        .push(5)
        .op(OpCode::WriteFile)
        .build()
        .unwrap();
    let r = run_with(config_in(dir.path()), &program, &[]);
    assert!(matches!(r.fault(), Some(VmError::TypeMismatch { .. })));
    assert_eq!(r.vm.sp(), 1);
}
