use std::path::PathBuf;
use std::process::{Command, Output};

fn write_program(name: &str, contents: &[u8]) -> PathBuf {
    let path = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn ls8(args: &[&str], program: &PathBuf) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ls8"))
        .args(["--keyboard", "none", "--no-timer"])
        .args(args)
        .arg(program)
        .output()
        .unwrap()
}

#[test]
fn test_print8_halts() {
    let program = write_program("print8.ls8", b"\
        # print8.ls8\n\
        10000010 # LDI R0,8\n\
        00000000\n\
        00001000\n\
        10000010 # LDI R1,9\n\
        00000001\n\
        00001001\n\
        10100000 # ADD R0,R1\n\
        00000000\n\
        00000001\n\
        01000111 # PRN R0\n\
        00000000\n\
        00000001 # HLT\n\
    ");

    let out = ls8(&[], &program);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(out.stdout, b"17\n");
}

#[test]
fn test_illegal_opcode_fails() {
    let program = write_program("illegal.bin", &[0xFF]);

    let out = ls8(&["--raw"], &program);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Instruction not recognized: 255"), "{stderr}");
}

#[test]
fn test_mod_by_zero_fails() {
    let program = write_program("mod_zero.bin", &[
        0x82, 0, 5,    // LDI R0,5
        0x82, 1, 0,    // LDI R1,0
        0xA4, 0, 1,    // MOD R0,R1
        0x01,          // HLT
    ]);

    let out = ls8(&["--raw"], &program);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("division by zero"), "{stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn test_step_limit_stops() {
    let program = write_program("spin.bin", &[
        0x82, 0, 0,    // LDI R0,0
        0x54, 0,       // JMP R0
    ]);

    let out = ls8(&["--raw", "--max-steps", "10"], &program);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_parse_error_fails() {
    let program = write_program("bad.ls8", b"00000001\n0000000Z\n");

    let out = ls8(&[], &program);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("line 2"), "{stderr}");
}
