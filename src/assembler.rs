//! The assembler: the character-driven FSM plus the driver loop around it.
//!
//! Dispatch is `match (self.state, category)` rather than a long
//! per-state `switch`; states are grouped below roughly in directive,
//! label, and instruction order.

use std::path::Path;

use log::{debug, trace};

use crate::category::Category;
use crate::encoder::{self, parse_operand, Operand};
use crate::error::{AsmError, Span};
use crate::objfile::ObjectFile;
use crate::preprocessor::MacroTable;
use crate::sections::{CallerTable, SectionTable};
use crate::source::{IncludeStack, SourceFrame};
use crate::state::State;

pub struct Assembler {
    state: State,
    state_before_comment: State,

    /// "buffer0": mnemonic / macro name / section name / preprocessor keyword.
    ident_buf: String,
    /// "buffer1": macro value / current instruction parameter.
    value_buf: String,
    /// Parameters completed so far for the instruction in progress.
    params: Vec<String>,
    /// Accumulated `#include` path body.
    path_buf: String,
    /// Paren nesting depth inside `WaitParenClose`.
    paren_depth: u32,

    macros: MacroTable,
    sections: SectionTable,
    callers: CallerTable,
    instructions: Vec<u8>,
    pc: u32,

    include_stack: IncludeStack,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            state: State::ScanFirst,
            state_before_comment: State::ScanFirst,
            ident_buf: String::new(),
            value_buf: String::new(),
            params: Vec::new(),
            path_buf: String::new(),
            paren_depth: 0,
            macros: MacroTable::new(),
            sections: SectionTable::new(),
            callers: CallerTable::new(),
            instructions: Vec::new(),
            pc: 0,
            include_stack: IncludeStack::new(),
        }
    }

    /// Assemble a single entry file (and anything it `#include`s) into an
    /// object file.
    pub fn assemble_file(entry: &Path) -> Result<ObjectFile, AsmError> {
        let mut asm = Assembler::new();
        let frame = SourceFrame::open(entry, None).map_err(|e| {
            AsmError::include(Span::new(entry.display().to_string(), 0, 0), "", format!("could not open '{}': {e}", entry.display()))
        })?;
        asm.include_stack.push(frame);

        loop {
            let Some(frame) = asm.include_stack.top() else { break };
            match frame.advance() {
                Some(byte) => {
                    let span = frame.span();
                    let line_text = frame.current_line_text();
                    asm.step(byte, &span, &line_text)?;
                }
                None => {
                    let span = frame.span();
                    let line_text = frame.current_line_text();
                    if !asm.state.eof_is_legal() {
                        return Err(AsmError::lex(span, line_text, format!("unexpected end of file in state {:?}", asm.state)));
                    }
                    let popped = asm.include_stack.pop().expect("frame was just observed as top");
                    debug!("closed '{}'", popped.path());
                    if let Some(resume) = popped.resume_state {
                        asm.state = resume;
                    }
                }
            }
        }

        Ok(ObjectFile {
            defs: asm.sections.iter().map(|(n, o)| (n.to_string(), o)).collect(),
            callers: asm.callers.iter().map(|(n, o)| (n.to_string(), o)).collect(),
            instructions: asm.instructions,
        })
    }

    fn step(&mut self, byte: u8, span: &Span, line_text: &str) -> Result<(), AsmError> {
        let category = Category::of(byte);
        trace!("state={:?} byte={:?} category={:?}", self.state, byte as char, category);

        match self.state {
            State::ScanFirst => self.step_scan_first(byte, category, span, line_text)?,
            State::ScanInstrOrMacro => self.step_scan_instr_or_macro(byte, category, span, line_text)?,

            State::ScanPreprocDef => self.step_scan_preproc_def(byte, category, span, line_text)?,
            State::ScanPreprocSub => self.step_scan_preproc_sub(byte, category, span, line_text)?,
            State::ScanPreprocVal => self.step_scan_preproc_val(byte, category, span, line_text)?,
            State::ScanIncludeLead => self.step_scan_include_lead(category, span, line_text)?,
            State::ScanIncludeFpath => self.step_scan_include_fpath(byte, category, span, line_text)?,

            State::ScanFuncLead => self.step_scan_func_lead(byte, category, span, line_text)?,
            State::ScanFuncName => self.step_scan_func_name(byte, category, span, line_text)?,
            State::ScanFuncTrail => self.step_scan_func_trail(category, span, line_text)?,

            State::ScanParamNoCommaNoDash => self.step_param(byte, category, span, line_text, false, false)?,
            State::ScanParamNoCommaYesDash => self.step_param(byte, category, span, line_text, false, true)?,
            State::ScanParamYesCommaYesDash => self.step_param(byte, category, span, line_text, true, true)?,

            State::WaitParenClose => self.step_wait_paren_close(category, span, line_text)?,

            State::CommentScanBegin => self.step_comment_scan_begin(category, span, line_text)?,
            State::LineComment => self.step_line_comment(category),
            State::BlockComment => self.step_block_comment(category),
            State::BlockCommentEnd => self.step_block_comment_end(category),

            State::ScOrCommentUntilLf => self.step_sc_or_comment_until_lf(category, span, line_text)?,
            State::NothingOrCommentUntilLf => self.step_nothing_or_comment_until_lf(category, span, line_text)?,

            State::InvalidState => unreachable!("assembler never transitions into InvalidState"),
        }
        Ok(())
    }

    // ---- line start -------------------------------------------------

    fn step_scan_first(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al => {
                self.ident_buf.clear();
                self.ident_buf.push(byte as char);
                self.state = State::ScanInstrOrMacro;
            }
            Category::Dot => self.state = State::ScanFuncLead,
            Category::Hash => {
                self.ident_buf.clear();
                self.state = State::ScanPreprocDef;
            }
            Category::Slash => {
                self.state_before_comment = State::ScanFirst;
                self.state = State::CommentScanBegin;
            }
            Category::Sc => {}
            _ if category.is_blank() || category == Category::Lf => {}
            _ => return Err(AsmError::lex(span.clone(), line_text, format!("unexpected character {:?} at line start", byte as char))),
        }
        Ok(())
    }

    // ---- mnemonic / macro name ---------------------------------------

    fn step_scan_instr_or_macro(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al | Category::Num => {
                self.ident_buf.push(byte as char);
            }
            _ if category.is_blank() => {
                self.expand_mnemonic_buffer(span, line_text)?;
                self.value_buf.clear();
                self.state = State::ScanParamNoCommaYesDash;
            }
            Category::ParenOpen => {
                self.paren_depth = 1;
                self.state = State::WaitParenClose;
            }
            Category::Sc => {
                self.expand_mnemonic_buffer(span, line_text)?;
                self.flush_instruction(span, line_text)?;
                self.state = State::NothingOrCommentUntilLf;
            }
            Category::Lf => {
                self.expand_mnemonic_buffer(span, line_text)?;
                self.flush_instruction(span, line_text)?;
                self.state = State::ScanFirst;
            }
            _ => return Err(AsmError::lex(span.clone(), line_text, format!("unexpected character {:?} in mnemonic", byte as char))),
        }
        Ok(())
    }

    fn expand_mnemonic_buffer(&mut self, span: &Span, line_text: &str) -> Result<(), AsmError> {
        let expanded = self.macros.expand(&self.ident_buf);
        if !encoder::is_known_mnemonic(&expanded) {
            return Err(AsmError::instruction(span.clone(), line_text, format!("unknown mnemonic '{expanded}'")));
        }
        self.ident_buf = expanded;
        Ok(())
    }

    // ---- preprocessor --------------------------------------------------

    fn step_scan_preproc_def(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al => self.ident_buf.push(byte as char),
            Category::Num => {
                if self.ident_buf.is_empty() {
                    return Err(AsmError::identifier(span.clone(), line_text, "directive keyword may not begin with a digit"));
                }
                self.ident_buf.push(byte as char);
            }
            Category::Sc => return Err(AsmError::preprocessor(span.clone(), line_text, "semicolon not permitted in preprocessor directive")),
            _ if category.is_blank() => match self.ident_buf.as_str() {
                "define" => {
                    self.ident_buf.clear();
                    self.state = State::ScanPreprocSub;
                }
                "include" => self.state = State::ScanIncludeLead,
                other => return Err(AsmError::preprocessor(span.clone(), line_text, format!("unknown directive '{other}'"))),
            },
            _ => return Err(AsmError::preprocessor(span.clone(), line_text, "malformed preprocessor directive")),
        }
        Ok(())
    }

    fn step_scan_preproc_sub(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al => self.ident_buf.push(byte as char),
            Category::Num => {
                if self.ident_buf.is_empty() {
                    return Err(AsmError::identifier(span.clone(), line_text, "macro name may not begin with a digit"));
                }
                self.ident_buf.push(byte as char);
            }
            Category::Sc => return Err(AsmError::preprocessor(span.clone(), line_text, "semicolon not permitted in preprocessor directive")),
            _ if category.is_blank() => {
                self.value_buf.clear();
                self.state = State::ScanPreprocVal;
            }
            _ => return Err(AsmError::preprocessor(span.clone(), line_text, "malformed macro name")),
        }
        Ok(())
    }

    fn step_scan_preproc_val(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al | Category::Num => self.value_buf.push(byte as char),
            Category::Dash => {
                if !self.value_buf.is_empty() {
                    return Err(AsmError::lex(span.clone(), line_text, "unexpected '-' in macro value"));
                }
                self.value_buf.push('-');
            }
            Category::Sc => return Err(AsmError::preprocessor(span.clone(), line_text, "semicolon not permitted in preprocessor directive")),
            _ if category.is_blank() => {
                self.insert_macro(span, line_text)?;
                self.state = State::NothingOrCommentUntilLf;
            }
            Category::Lf => {
                self.insert_macro(span, line_text)?;
                self.state = State::ScanFirst;
            }
            _ => return Err(AsmError::preprocessor(span.clone(), line_text, "malformed macro value")),
        }
        Ok(())
    }

    fn insert_macro(&mut self, span: &Span, line_text: &str) -> Result<(), AsmError> {
        if self.value_buf.is_empty() {
            return Err(AsmError::preprocessor(span.clone(), line_text, "missing argument in #define"));
        }
        debug!("#define {} {}", self.ident_buf, self.value_buf);
        self.macros.insert(self.ident_buf.clone(), self.value_buf.clone());
        self.ident_buf.clear();
        self.value_buf.clear();
        Ok(())
    }

    fn step_scan_include_lead(&mut self, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            _ if category.is_blank() => {}
            Category::Quote => {
                self.path_buf.clear();
                self.state = State::ScanIncludeFpath;
            }
            _ => return Err(AsmError::preprocessor(span.clone(), line_text, "expected opening '\"' in #include")),
        }
        Ok(())
    }

    fn step_scan_include_fpath(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Quote => {
                let target = self.include_stack.resolve_include_path(&self.path_buf);
                debug!("#include \"{}\"", self.path_buf);
                let frame = SourceFrame::open(&target, Some(State::NothingOrCommentUntilLf))
                    .map_err(|e| AsmError::include(span.clone(), line_text, format!("could not open '{}': {e}", target.display())))?;
                self.include_stack.push(frame);
                self.path_buf.clear();
                self.state = State::ScanFirst;
            }
            Category::Al
            | Category::Num
            | Category::Dot
            | Category::Comma
            | Category::Colon
            | Category::Sc
            | Category::Ast
            | Category::Slash
            | Category::Hash => {
                self.path_buf.push(byte as char);
            }
            _ if category.is_blank() => self.path_buf.push(' '),
            _ => return Err(AsmError::include(span.clone(), line_text, "malformed include path")),
        }
        Ok(())
    }

    // ---- section labels -------------------------------------------------

    fn step_scan_func_lead(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al => {
                self.ident_buf.clear();
                self.ident_buf.push(byte as char);
                self.state = State::ScanFuncName;
            }
            Category::Num => return Err(AsmError::identifier(span.clone(), line_text, "section name may not begin with a digit")),
            _ => return Err(AsmError::lex(span.clone(), line_text, "expected section name after '.'")),
        }
        Ok(())
    }

    fn step_scan_func_name(&mut self, byte: u8, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Al | Category::Num => self.ident_buf.push(byte as char),
            Category::Colon => self.finish_section_label(span, line_text)?,
            _ if category.is_blank() => self.state = State::ScanFuncTrail,
            _ => return Err(AsmError::lex(span.clone(), line_text, "malformed section name")),
        }
        Ok(())
    }

    fn step_scan_func_trail(&mut self, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            _ if category.is_blank() => {}
            Category::Colon => self.finish_section_label(span, line_text)?,
            _ => return Err(AsmError::lex(span.clone(), line_text, "expected ':' after section name")),
        }
        Ok(())
    }

    fn finish_section_label(&mut self, _span: &Span, _line_text: &str) -> Result<(), AsmError> {
        debug!("section '{}' at offset {}", self.ident_buf, self.pc);
        self.sections.insert(self.ident_buf.clone(), self.pc);
        self.ident_buf.clear();
        self.state = State::NothingOrCommentUntilLf;
        Ok(())
    }

    // ---- parameter sub-FSM ----------------------------------------------

    fn step_param(
        &mut self,
        byte: u8,
        category: Category,
        span: &Span,
        line_text: &str,
        comma_allowed: bool,
        dash_allowed: bool,
    ) -> Result<(), AsmError> {
        match category {
            Category::Al | Category::Num => {
                self.value_buf.push(byte as char);
                self.state = State::ScanParamNoCommaNoDash;
            }
            Category::Dash => {
                if !dash_allowed {
                    return Err(AsmError::lex(span.clone(), line_text, "unexpected '-' in parameter"));
                }
                self.value_buf.push('-');
                self.state = State::ScanParamNoCommaNoDash;
            }
            _ if category.is_blank() => {
                self.end_current_param();
                self.state = State::ScanParamYesCommaYesDash;
            }
            Category::Comma => {
                if !self.value_buf.is_empty() {
                    self.end_current_param();
                    self.state = State::ScanParamNoCommaYesDash;
                } else if comma_allowed {
                    self.state = State::ScanParamNoCommaYesDash;
                } else {
                    return Err(AsmError::lex(span.clone(), line_text, "unexpected ',' (empty parameter)"));
                }
            }
            Category::Sc => {
                self.end_current_param();
                self.flush_instruction(span, line_text)?;
                self.state = State::NothingOrCommentUntilLf;
            }
            Category::Lf => {
                self.end_current_param();
                self.flush_instruction(span, line_text)?;
                self.state = State::ScanFirst;
            }
            _ => return Err(AsmError::lex(span.clone(), line_text, format!("unexpected character {:?} in parameter", byte as char))),
        }
        Ok(())
    }

    fn end_current_param(&mut self) {
        if !self.value_buf.is_empty() {
            let expanded = self.macros.expand(&self.value_buf);
            self.params.push(expanded);
            self.value_buf.clear();
        }
    }

    fn flush_instruction(&mut self, span: &Span, line_text: &str) -> Result<(), AsmError> {
        let mnemonic = std::mem::take(&mut self.ident_buf);
        let params = std::mem::take(&mut self.params);

        let operands: Vec<Operand> =
            params.iter().map(|p| parse_operand(p, span, line_text)).collect::<Result<_, _>>()?;

        let word = encoder::encode(&mnemonic, &operands, self.pc, &mut self.callers, span, line_text)?;
        trace!("pc={:04x} {} -> {:02x?}", self.pc, mnemonic, word);
        self.instructions.extend_from_slice(&word);
        self.pc += 4;
        Ok(())
    }

    // ---- call syntax ------------------------------------------------------

    fn step_wait_paren_close(&mut self, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::ParenOpen => self.paren_depth += 1,
            Category::ParenClose => {
                self.paren_depth -= 1;
                if self.paren_depth == 0 {
                    self.ident_buf.clear();
                    self.state = State::ScOrCommentUntilLf;
                }
            }
            Category::Lf => return Err(AsmError::lex(span.clone(), line_text, "unterminated call: missing ')'")),
            _ => {}
        }
        Ok(())
    }

    // ---- comments -----------------------------------------------------------

    fn step_comment_scan_begin(&mut self, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Slash => self.state = State::LineComment,
            Category::Ast => self.state = State::BlockComment,
            _ => return Err(AsmError::lex(span.clone(), line_text, "'/' must begin '//' or '/*'")),
        }
        Ok(())
    }

    fn step_line_comment(&mut self, category: Category) {
        if category == Category::Lf {
            self.state = State::ScanFirst;
        }
    }

    fn step_block_comment(&mut self, category: Category) {
        if category == Category::Ast {
            self.state = State::BlockCommentEnd;
        }
    }

    fn step_block_comment_end(&mut self, category: Category) {
        if category == Category::Slash {
            self.state = self.state_before_comment;
        } else {
            self.state = State::BlockComment;
        }
    }

    // ---- line trailing --------------------------------------------------------

    fn step_sc_or_comment_until_lf(&mut self, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Sc => self.state = State::NothingOrCommentUntilLf,
            Category::Lf => self.state = State::ScanFirst,
            Category::Slash => {
                // Once a comment starts, the optional ';' window is gone either way.
                self.state_before_comment = State::NothingOrCommentUntilLf;
                self.state = State::CommentScanBegin;
            }
            _ if category.is_blank() => {}
            _ => return Err(AsmError::lex(span.clone(), line_text, "expected only ';', whitespace, or a comment before end of line")),
        }
        Ok(())
    }

    fn step_nothing_or_comment_until_lf(&mut self, category: Category, span: &Span, line_text: &str) -> Result<(), AsmError> {
        match category {
            Category::Lf => self.state = State::ScanFirst,
            Category::Slash => {
                self.state_before_comment = self.state;
                self.state = State::CommentScanBegin;
            }
            _ if category.is_blank() => {}
            _ => return Err(AsmError::lex(span.clone(), line_text, "expected only whitespace or a comment before end of line")),
        }
        Ok(())
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
