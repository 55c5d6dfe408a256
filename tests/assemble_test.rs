//! End-to-end assembler tests, fixture-driven: each test assembles a real
//! `.tv` source file and asserts on the resulting object bytes.

use std::path::Path;

use tvasm::assembler::Assembler;
use tvasm::objfile::ObjectFile;

fn assemble(fixture: &str) -> ObjectFile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(fixture);
    Assembler::assemble_file(&path).unwrap_or_else(|err| panic!("assembling {fixture} failed: {err}"))
}

#[test]
fn single_instruction() {
    let object = assemble("single_instruction.tv");
    assert!(object.defs.is_empty());
    assert!(object.callers.is_empty());
    assert_eq!(object.instructions, vec![0x00, 0x03, 0x00, 0x07]);
}

#[test]
fn negative_immediate() {
    let object = assemble("negative_immediate.tv");
    assert_eq!(object.instructions, vec![0x00, 0x00, 0xFF, 0xFF]);
}

#[test]
fn macro_expansion_in_parameter() {
    let object = assemble("macro_in_parameter.tv");
    assert_eq!(object.instructions, vec![0x00, 0x05, 0x00, 0x0A]);
}

#[test]
fn semicolon_line_comment_and_block_comment_terminators_agree() {
    let object = assemble("comments_and_terminators.tv");
    assert_eq!(object.instruction_count(), 3);
    for chunk in object.instructions.chunks(4) {
        assert_eq!(chunk, [0x24, 0x00, 0x00, 0x00]);
    }
}

#[test]
fn include_pulls_in_a_section_and_resolves_locally() {
    let object = assemble("include_main.tv");
    assert_eq!(object.defs, vec![("helper".to_string(), 0), ("main".to_string(), 4)]);
    assert_eq!(object.callers, vec![("helper".to_string(), 4)]);
    assert_eq!(
        object.instructions,
        vec![0x24, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x25, 0x00, 0x00, 0x00]
    );
}

#[test]
fn object_file_round_trips_through_write_and_read() {
    let object = assemble("macro_in_parameter.tv");
    let mut buf = Vec::new();
    object.write_to(&mut buf).unwrap();
    let reread = ObjectFile::read_from(&mut buf.as_slice()).unwrap();
    assert_eq!(reread, object);
}

#[test]
fn unknown_mnemonic_is_a_fatal_error() {
    let dir = std::env::temp_dir().join("tvasm_unknown_mnemonic_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bad.tv");
    std::fs::write(&path, "frobnicate 1, 2\n").unwrap();
    assert!(Assembler::assemble_file(&path).is_err());
}

#[test]
fn double_comma_is_a_fatal_error() {
    let dir = std::env::temp_dir().join("tvasm_double_comma_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bad.tv");
    std::fs::write(&path, "add 1,, 2\n").unwrap();
    assert!(Assembler::assemble_file(&path).is_err());
}
