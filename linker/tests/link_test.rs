//! Full assemble-then-link tests, covering the cross-module and
//! forward-reference scenarios that only make sense once a linker is in
//! the loop.

use std::fs::File;
use std::path::{Path, PathBuf};

use tvasm::assembler::Assembler;

fn assemble_to_object(fixture: &str, out_name: &str) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(fixture);
    let object = Assembler::assemble_file(&source).unwrap_or_else(|err| panic!("assembling {fixture} failed: {err}"));

    let dir = std::env::temp_dir().join("tvlink_test_objects");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join(out_name);
    let mut file = File::create(&out_path).unwrap();
    object.write_to(&mut file).unwrap();
    out_path
}

#[test]
fn intra_module_jump_with_zero_delta() {
    let path = assemble_to_object("intra_module_jump.tv", "intra.o");
    let binary = tvasm::link::link(&[path]).unwrap();
    assert_eq!(binary, vec![0x20, 0x00, 0x00, 0x00, 0x25, 0x00, 0x00, 0x00]);
}

#[test]
fn forward_jump_patches_positive_delta() {
    let path = assemble_to_object("forward_jump.tv", "forward.o");
    let binary = tvasm::link::link(&[path]).unwrap();
    assert_eq!(
        binary,
        vec![0x20, 0x00, 0x00, 0x08, 0x25, 0x00, 0x00, 0x00, 0x25, 0x00, 0x00, 0x00]
    );
}

#[test]
fn cross_module_link_computes_base_address() {
    let path_a = assemble_to_object("cross_module_a.tv", "a.o");
    let path_b = assemble_to_object("cross_module_b.tv", "b.o");
    let binary = tvasm::link::link(&[path_a, path_b]).unwrap();
    assert_eq!(
        binary,
        vec![0x20, 0x00, 0x00, 0x08, 0x25, 0x00, 0x00, 0x00, 0x24, 0x00, 0x00, 0x00]
    );
}

#[test]
fn module_count_determines_output_size() {
    let path_a = assemble_to_object("cross_module_a.tv", "size_a.o");
    let path_b = assemble_to_object("cross_module_b.tv", "size_b.o");
    let binary = tvasm::link::link(&[path_a, path_b]).unwrap();
    assert_eq!(binary.len(), 12);
}
