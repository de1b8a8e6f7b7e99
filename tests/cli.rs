use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn stdout_of(args: &[&str]) -> String {
  let assert = assert_cmd::cargo::cargo_bin_cmd!("sim8086")
    .args(args)
    .assert()
    .success();
  String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

fn write_program(dir: &Path, bytes: &[u8]) -> String {
  let path = dir.join("program.bin");
  fs::write(&path, bytes).unwrap();
  path.to_str().unwrap().to_string()
}

#[test]
fn disassembles_by_default() {
  let dir = tempdir().unwrap();
  let path = write_program(dir.path(), &[0x89, 0xd9, 0xb1, 0x0c]);
  assert_eq!(
    stdout_of(&[path.as_str()]),
    format!("; src: `{path}`\nbits 16\nmov cx, bx\nmov cl, 12\n")
  );
}

#[test]
fn exec_prints_trace_and_final_registers() {
  let dir = tempdir().unwrap();
  // mov ax, 5; add ax, 10; mov bx, ax
  let path = write_program(
    dir.path(),
    &[0xb8, 0x05, 0x00, 0x83, 0xc0, 0x0a, 0x89, 0xc3],
  );
  let out = stdout_of(&["--exec", "--trace", path.as_str()]);
  let lines: Vec<&str> = out.lines().collect();
  assert_eq!(lines[0], format!("--- {path} execution ---"));
  assert_eq!(lines[1], "mov ax, 5 ; ax:0x0->0x5 ip:0x0->0x3");
  assert_eq!(lines[2], "add ax, 10 ; ax:0x5->0xf ip:0x3->0x6 flags:->P");
  assert_eq!(lines[3], "mov bx, ax ; bx:0x0->0xf ip:0x6->0x8");
  assert!(out.contains("      ax: 0x000f (15)\n      bx: 0x000f (15)\n"));
  assert!(out.ends_with("      ip: 0x0008 (8)\n   flags: P\n"));
}

#[test]
fn exec_writes_memory_dump() {
  let dir = tempdir().unwrap();
  // mov word [1000], 0x1234
  let path = write_program(dir.path(), &[0xc7, 0x06, 0xe8, 0x03, 0x34, 0x12]);
  let dump = dir.path().join("memory.bin");
  stdout_of(&["--exec", "--dump", dump.to_str().unwrap(), path.as_str()]);
  let memory = fs::read(&dump).unwrap();
  assert_eq!(memory.len(), 0x1_0000);
  assert_eq!(&memory[1000..1002], &[0x34, 0x12]);
}

#[test]
fn origin_accepts_hex() {
  let dir = tempdir().unwrap();
  let path = write_program(dir.path(), &[0x0f, 0x0f, 0x90]);
  let out = stdout_of(&["--origin", "0x2", path.as_str()]);
  assert!(out.ends_with("bits 16\nnop\n"));
}

#[test]
fn unknown_opcode_fails_with_offset() {
  let dir = tempdir().unwrap();
  let path = write_program(dir.path(), &[0x90, 0x90, 0x0f]);
  let assert = assert_cmd::cargo::cargo_bin_cmd!("sim8086")
    .args(["--exec", path.as_str()])
    .assert()
    .failure();
  let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
  assert!(stderr.contains("unknown opcode 0x0f (00001111) at offset 0x0002"));
}

#[test]
fn runaway_loop_hits_instruction_limit() {
  let dir = tempdir().unwrap();
  // jmp $
  let path = write_program(dir.path(), &[0xeb, 0xfe]);
  let assert = assert_cmd::cargo::cargo_bin_cmd!("sim8086")
    .args(["--exec", "--max-instructions", "50", path.as_str()])
    .assert()
    .failure();
  let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
  assert!(stderr.contains("instruction limit of 50 reached"));
}
