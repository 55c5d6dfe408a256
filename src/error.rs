//! Error types shared by every stage of the assembler.
//!
//! Mirrors the shape the assembler previously used — a `Span`, an
//! `ErrorKind`, and a flat `AsmError` struct — but adds the constructors
//! that shape always needed: every call site was building one of these by
//! hand.

use std::fmt;

/// A source position: the file it came from and the 1-indexed line/column
/// within that file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self { file: file.into(), line, col }
    }
}

/// One of the eight error kinds named by the error-handling design: lex,
/// identifier, preprocessor, instruction, numeric, include, object-file,
/// and link errors. `Link` is declared here too even though it is only
/// ever produced by the `tvlink` crate, so a single enum can be matched on
/// both sides of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Identifier,
    Preprocessor,
    Instruction,
    Numeric,
    Include,
    ObjectFile,
    Link,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Identifier => "identifier error",
            ErrorKind::Preprocessor => "preprocessor error",
            ErrorKind::Instruction => "instruction error",
            ErrorKind::Numeric => "numeric error",
            ErrorKind::Include => "include error",
            ErrorKind::ObjectFile => "object-file error",
            ErrorKind::Link => "link error",
        };
        f.write_str(name)
    }
}

/// A fatal assembler error: one-line diagnostic with file, line, column,
/// and offending line text, per the error-handling design's "no structured
/// error crosses the process boundary" policy — the driver just prints
/// `Display` and exits non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub line_text: String,
}

impl AsmError {
    pub fn new(kind: ErrorKind, span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), span, line_text: line_text.into() }
    }

    pub fn lex(span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lex, span, line_text, message)
    }

    pub fn identifier(span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Identifier, span, line_text, message)
    }

    pub fn preprocessor(span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Preprocessor, span, line_text, message)
    }

    pub fn instruction(span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Instruction, span, line_text, message)
    }

    pub fn numeric(span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Numeric, span, line_text, message)
    }

    pub fn include(span: Span, line_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Include, span, line_text, message)
    }

    pub fn object_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectFile, Span::new("<object file>", 0, 0), String::new(), message)
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}: {}", self.span.file, self.span.line, self.span.col, self.kind, self.message)?;
        if !self.line_text.is_empty() {
            write!(f, "\n    {}", self.line_text)?;
        }
        Ok(())
    }
}

impl std::error::Error for AsmError {}
