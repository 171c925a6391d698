use std::ops::Range;

use thiserror::Error;

use crate::expr::ExprId;
use crate::span::Span;
use crate::target::{AssemblerInfo, InstrInfo, RegisterInfo, SubtargetInfo};

/// Assembler syntax dialect. Inline-asm parsing always runs with the
/// MS-style Intel dialect; AT&T exists for completeness of the config
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsmDialect {
    #[default]
    Intel,
    Att,
}

/// Destination for machine code the sub-parser would emit. Semantic
/// analysis only validates and extracts operand information, so it always
/// installs [`NullSink`].
pub trait CodeSink {
    fn emit_bytes(&mut self, bytes: &[u8]);
}

/// Discards everything written to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CodeSink for NullSink {
    fn emit_bytes(&mut self, _bytes: &[u8]) {}
}

/// Everything a target backend needs to construct its sub-parser for one
/// statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubParserConfig {
    pub register_info: RegisterInfo,
    pub assembler_info: AssemblerInfo,
    pub instr_info: InstrInfo,
    pub subtarget_info: SubtargetInfo,
    pub dialect: AsmDialect,
    pub parsing_inline_asm: bool,
}

/// What the sub-parser records about one resolved identifier operand: the
/// host expression standing in for it and the layout it should assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandInfo {
    pub expr: ExprId,
    pub size: u64,
    pub align: u64,
}

/// Outcome of an identifier lookup: the operand the chain parser produced
/// (if any) and how many bytes of the line buffer the chain consumed. The
/// sub-parser shrinks its line buffer to `consumed_bytes` and reinterprets
/// whatever follows as raw assembly text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierLookup {
    pub operand: Option<OperandInfo>,
    pub consumed_bytes: usize,
}

/// The semantic services a target sub-parser needs from the host compiler,
/// plus the diagnostic hook. Implemented by the bridge; the sub-parser
/// calls back into it mid-parse.
pub trait AsmSemaCallback {
    /// Byte offset of field `member` within the named aggregate `base`,
    /// or `None` when the field is unknown or field lookup is
    /// unsupported.
    fn lookup_field(&mut self, base: &str, member: &str) -> Option<u64>;

    /// Resolve the identifier reference at the start of `line_range`, a
    /// byte range into the raw assembly text covering the rest of the
    /// current line. The range start must be a token boundary (the
    /// sub-parser only hands back offsets it was itself given as
    /// identifier starts). `unevaluated` marks references the sub-parser
    /// will not evaluate, e.g. operands of size directives.
    fn lookup_identifier(&mut self, line_range: Range<usize>, unevaluated: bool)
        -> IdentifierLookup;

    /// Find or create a label for `identifier` at buffer offset `offset`.
    /// Returns the label's rewritten name, or `None` when labels are
    /// unsupported.
    fn lookup_label(&mut self, identifier: &str, offset: usize, create: bool) -> Option<String>;

    /// A diagnostic the sub-parser raised against its private buffer;
    /// `offset` is local to that buffer.
    fn handle_diagnostic(&mut self, offset: usize, message: &str);
}

/// Everything the sub-parser hands back for one inline-asm statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAsm {
    /// Assembly text with operand placeholders substituted.
    pub rewritten_text: String,
    pub output_count: usize,
    pub input_count: usize,
    /// `(operand, is_output)` in the order the operands were encountered.
    pub operands: Vec<(OperandInfo, bool)>,
    pub constraints: Vec<String>,
    pub clobbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubParserError {
    /// The sub-parser could not continue at all (as opposed to grammar
    /// complaints, which it reports through the diagnostic hook and
    /// recovers from).
    #[error("{0}")]
    Fatal(String),
}

/// The opaque, target-specific assembly parser. The host never inspects it
/// beyond this entry point; grammar and instruction knowledge live
/// entirely behind it.
pub trait AsmSubParser {
    /// Parse `asm_text` in inline-asm mode. `anchor` is the host location
    /// of the statement, used by the sub-parser only to tag what it hands
    /// back. Identifier resolution and diagnostics flow through
    /// `callback`; any generated code goes to `sink`.
    fn parse_inline_asm(
        &mut self,
        asm_text: &str,
        anchor: Span,
        callback: &mut dyn AsmSemaCallback,
        sink: &mut dyn CodeSink,
    ) -> Result<ParsedAsm, SubParserError>;
}
