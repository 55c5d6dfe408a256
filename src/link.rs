//! The linker: four passes over a list of object files producing a flat
//! binary. Lives in the assembler's library (rather than only in the
//! `tvlink` crate) so the assembler binary can invoke it directly on the
//! single object file it just wrote, without a circular crate dependency
//! between `tvasm` and `tvlink`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::objfile::ObjectFile;

/// One parsed module, still at its module-local addresses.
struct Module {
    path: String,
    object: ObjectFile,
}

/// Link the given object files, in order, into a flat binary image.
///
/// Pass 1 (parse) happens in [`Module::load`]; this function performs
/// passes 2 through 4: base-address placement, symbol resolution and
/// in-place patching, and concatenation.
pub fn link(paths: &[impl AsRef<Path>]) -> Result<Vec<u8>, String> {
    let modules: Vec<Module> = paths
        .iter()
        .map(|p| Module::load(p.as_ref()))
        .collect::<Result<_, _>>()?;

    // Pass 2 — placement: module i's base is 4 * sum of instruction counts before it.
    let mut bases = Vec::with_capacity(modules.len());
    let mut running = 0u32;
    for module in &modules {
        bases.push(running);
        running += module.object.instructions.len() as u32;
    }
    debug!("module bases: {bases:?}");

    // Concatenate first so patches land in one contiguous buffer; the byte
    // at each caller's absolute location is the opcode byte regardless of
    // which module's slice it came from.
    let mut blob: Vec<u8> = modules.iter().flat_map(|m| m.object.instructions.iter().copied()).collect();

    // Pass 3 — resolution: patch every caller against the first module (in
    // input order) whose defs contain the matching name.
    for (i, module) in modules.iter().enumerate() {
        for (name, local_loc) in &module.object.callers {
            let caller_abs = bases[i] + local_loc;
            let def_abs = find_def(&modules, &bases, name)
                .ok_or_else(|| format!("unresolved symbol '{name}' referenced from {}", module.path))?;
            let delta = def_abs as i64 - caller_abs as i64;
            patch(&mut blob, caller_abs, delta)?;
        }
    }

    Ok(blob)
}

fn find_def(modules: &[Module], bases: &[u32], name: &str) -> Option<u32> {
    for (i, module) in modules.iter().enumerate() {
        if let Some(local_loc) = module.object.defs.iter().find(|(n, _)| n == name).map(|(_, o)| *o) {
            return Some(bases[i] + local_loc);
        }
    }
    None
}

/// Patch a PC-relative delta into the instruction word whose opcode byte
/// sits at `caller_abs`. The patch width (24-bit vs. 16-bit) is driven
/// entirely by that opcode byte, per the design notes — this is only
/// correct because the assembler never emits a caller entry for any
/// opcode other than these four.
fn patch(blob: &mut [u8], caller_abs: u32, delta: i64) -> Result<(), String> {
    let caller_abs = caller_abs as usize;
    let opcode = *blob.get(caller_abs).ok_or_else(|| format!("caller location {caller_abs} is out of range"))?;
    match opcode {
        0x20 | 0x26 => {
            let bytes = (delta as i32 as u32 & 0x00FF_FFFF).to_be_bytes();
            blob[caller_abs + 1] = bytes[1];
            blob[caller_abs + 2] = bytes[2];
            blob[caller_abs + 3] = bytes[3];
        }
        0x22 | 0x27 => {
            let bytes = (delta as i32 as u16).to_be_bytes();
            blob[caller_abs + 1] = bytes[0];
            blob[caller_abs + 2] = bytes[1];
        }
        other => return Err(format!("logic error: opcode 0x{other:02x} at caller site {caller_abs} is not patchable")),
    }
    Ok(())
}

impl Module {
    fn load(path: &Path) -> Result<Module, String> {
        let file = File::open(path).map_err(|e| format!("could not open '{}': {e}", path.display()))?;
        let mut reader = BufReader::new(file);
        let object = ObjectFile::read_from(&mut reader).map_err(|e| e.to_string())?;
        debug!("loaded module '{}': {}", path.display(), object.debug_dump());
        Ok(Module { path: path.display().to_string(), object })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_object(dir: &Path, name: &str, object: &ObjectFile) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        object.write_to(&mut file).unwrap();
        file.flush().unwrap();
        path
    }

    #[test]
    fn intra_module_jump_with_zero_delta_is_unchanged() {
        let dir = std::env::temp_dir().join("tvasm_link_test_intra");
        std::fs::create_dir_all(&dir).unwrap();
        let object = ObjectFile {
            defs: vec![("start".into(), 0)],
            callers: vec![("start".into(), 0)],
            instructions: vec![0x20, 0, 0, 0, 0x25, 0, 0, 0],
        };
        let path = write_object(&dir, "a.o", &object);
        let binary = link(&[path]).unwrap();
        assert_eq!(binary, vec![0x20, 0, 0, 0, 0x25, 0, 0, 0]);
    }

    #[test]
    fn forward_jump_patches_positive_delta() {
        let dir = std::env::temp_dir().join("tvasm_link_test_forward");
        std::fs::create_dir_all(&dir).unwrap();
        let object = ObjectFile {
            defs: vec![("after".into(), 8)],
            callers: vec![("after".into(), 0)],
            instructions: vec![0x20, 0, 0, 0, 0x25, 0, 0, 0, 0x25, 0, 0, 0],
        };
        let path = write_object(&dir, "a.o", &object);
        let binary = link(&[path]).unwrap();
        assert_eq!(binary, vec![0x20, 0, 0, 8, 0x25, 0, 0, 0, 0x25, 0, 0, 0]);
    }

    #[test]
    fn cross_module_link_computes_base_offset() {
        let dir = std::env::temp_dir().join("tvasm_link_test_cross");
        std::fs::create_dir_all(&dir).unwrap();
        let a = ObjectFile {
            defs: vec![("main".into(), 0)],
            callers: vec![("helper".into(), 0)],
            instructions: vec![0x20, 0, 0, 0, 0x25, 0, 0, 0],
        };
        let b = ObjectFile {
            defs: vec![("helper".into(), 0)],
            callers: vec![],
            instructions: vec![0x24, 0, 0, 0],
        };
        let path_a = write_object(&dir, "a.o", &a);
        let path_b = write_object(&dir, "b.o", &b);
        let binary = link(&[path_a, path_b]).unwrap();
        assert_eq!(binary, vec![0x20, 0, 0, 8, 0x25, 0, 0, 0, 0x24, 0, 0, 0]);
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        let dir = std::env::temp_dir().join("tvasm_link_test_unresolved");
        std::fs::create_dir_all(&dir).unwrap();
        let object = ObjectFile {
            defs: vec![],
            callers: vec![("missing".into(), 0)],
            instructions: vec![0x20, 0, 0, 0],
        };
        let path = write_object(&dir, "a.o", &object);
        assert!(link(&[path]).is_err());
    }
}
