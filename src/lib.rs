//! # tvasm
//!
//! An assembler and linker for a toy 32-bit fixed-width instruction set.
//!
//! ## Pipeline
//!
//! 1. **Assembler** ([`assembler`]) — a character-driven finite-state
//!    machine lexes source, expanding `#define`/`#include` directives and
//!    recording section labels along the way, then [`encoder`] lowers each
//!    instruction to a 32-bit word.
//! 2. **Object file** ([`objfile`]) — the on-disk format the assembler
//!    writes and the linker reads: a defs table, a callers table, and a raw
//!    instruction blob.
//! 3. **Linker** ([`link`]) — resolves every caller against the first
//!    module whose defs define it and patches the PC-relative delta
//!    directly into the instruction word.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! let object = tvasm::assembler::Assembler::assemble_file(Path::new("program.tv")).unwrap();
//! let mut file = std::fs::File::create("objects/program.o").unwrap();
//! object.write_to(&mut file).unwrap();
//! ```

pub mod assembler;
pub mod category;
pub mod encoder;
pub mod error;
pub mod link;
pub mod objfile;
pub mod preprocessor;
pub mod sections;
pub mod source;
pub mod state;
