//! The object-file format shared by the assembler and linker.
//!
//! All multi-byte integers are written most-significant byte first, via
//! `to_be_bytes`/`from_be_bytes` rather than manual byte-shuffling.

use std::io::{self, Read, Write};

use log::trace;

use crate::error::AsmError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFile {
    pub defs: Vec<(String, u32)>,
    pub callers: Vec<(String, u32)>,
    /// Raw instruction bytes, big-endian word order, always a multiple of 4.
    pub instructions: Vec<u8>,
}

impl ObjectFile {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_records(w, &self.defs)?;
        write_records(w, &self.callers)?;
        w.write_all(&self.instructions)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, AsmError> {
        let defs = read_records(r)?;
        let callers = read_records(r)?;
        let mut instructions = Vec::new();
        r.read_to_end(&mut instructions)
            .map_err(|e| AsmError::object_file(format!("failed to read instruction blob: {e}")))?;
        if instructions.len() % 4 != 0 {
            return Err(AsmError::object_file(format!(
                "object file misalignment: instruction blob is {} bytes, not a multiple of 4",
                instructions.len()
            )));
        }
        trace!("parsed object file: {} defs, {} callers, {} instruction bytes", defs.len(), callers.len(), instructions.len());
        Ok(ObjectFile { defs, callers, instructions })
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len() / 4
    }

    /// A one-line-per-table dump of defs, callers, and instruction word
    /// count, logged at debug level wherever a module is loaded. Grounded
    /// in the original linker's `print_vmsi`/`print_vuc` dumps of the same
    /// three tables; here it rides on `log::debug!` rather than a `-v` flag.
    pub fn debug_dump(&self) -> String {
        let defs = self.defs.iter().map(|(n, o)| format!("{n}@{o}")).collect::<Vec<_>>().join(", ");
        let callers = self.callers.iter().map(|(n, o)| format!("{n}@{o}")).collect::<Vec<_>>().join(", ");
        format!("defs=[{defs}] callers=[{callers}] instructions={}", self.instruction_count())
    }
}

fn write_records<W: Write>(w: &mut W, records: &[(String, u32)]) -> io::Result<()> {
    w.write_all(&(records.len() as u32).to_be_bytes())?;
    for (name, offset) in records {
        let name_bytes = name.as_bytes();
        w.write_all(&(name_bytes.len() as u16).to_be_bytes())?;
        w.write_all(name_bytes)?;
        w.write_all(&offset.to_be_bytes())?;
    }
    Ok(())
}

fn read_records<R: Read>(r: &mut R) -> Result<Vec<(String, u32)>, AsmError> {
    let count = read_u32(r)?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = read_u16(r)?;
        let mut name_bytes = vec![0u8; name_len as usize];
        r.read_exact(&mut name_bytes).map_err(|e| AsmError::object_file(format!("truncated record: {e}")))?;
        let name = String::from_utf8(name_bytes).map_err(|e| AsmError::object_file(format!("record name is not valid ASCII: {e}")))?;
        let offset = read_u32(r)?;
        records.push((name, offset));
    }
    Ok(records)
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, AsmError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| AsmError::object_file(format!("truncated u32 field: {e}")))?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, AsmError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf).map_err(|e| AsmError::object_file(format!("truncated u16 field: {e}")))?;
    Ok(u16::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_defs_callers_and_instructions() {
        let obj = ObjectFile {
            defs: vec![("start".into(), 0), ("helper".into(), 8)],
            callers: vec![("helper".into(), 0)],
            instructions: vec![0x20, 0, 0, 0, 0x25, 0, 0, 0, 0x24, 0, 0, 0],
        };
        let mut buf = Vec::new();
        obj.write_to(&mut buf).unwrap();
        let parsed = ObjectFile::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, obj);
    }

    #[test]
    fn rejects_misaligned_instruction_blob() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_be_bytes()); // N_defs
        buf.extend_from_slice(&0u32.to_be_bytes()); // N_callers
        buf.extend_from_slice(&[1, 2, 3]); // 3 bytes, not a multiple of 4
        assert!(ObjectFile::read_from(&mut buf.as_slice()).is_err());
    }
}
