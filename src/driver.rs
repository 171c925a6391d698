use thiserror::Error;

use crate::bridge::{AsmBlockContext, AsmBridge};
use crate::diag::Diagnostic;
use crate::expr::{ExprArena, ExprId};
use crate::span::Span;
use crate::subparser::{AsmDialect, AsmSubParser, NullSink, SubParserConfig, SubParserError};
use crate::target::{TargetRegistry, host_cpu, host_features};
use crate::token::TokenizedAsm;
use crate::typeck::{DeclContext, FixedOperandLayout, HostTypeChecker, OperandLayoutResolver};

/// One resolved operand of the statement: the expression substituted for
/// it and whether the assembly writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandRecord {
    pub expr: ExprId,
    pub is_output: bool,
}

/// Statement-level result bundle handed back to the semantic-analysis
/// driver once the sub-parser is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmArtifact {
    pub rewritten_text: String,
    pub operands: Vec<OperandRecord>,
    pub constraints: Vec<String>,
    pub clobbers: Vec<String>,
    pub output_count: usize,
    pub input_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmSessionError {
    /// The triple matched no registered target. Diagnosed once; analysis
    /// of this statement stops before any parsing.
    #[error("no registered target matches triple '{triple}'")]
    TargetLookup { triple: String },
    /// The sub-parser signalled a fatal error mid-parse.
    #[error("inline assembly parsing aborted: {0}")]
    SubParser(#[from] SubParserError),
}

/// Where one statement's session currently stands. Per-identifier errors
/// (malformed chains, relayed sub-parser complaints) never leave
/// `Parsing`; only target lookup failure and a fatal sub-parser error
/// reach `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    TargetResolved,
    SubParserConfigured,
    Parsing,
    Completed,
    Aborted,
}

/// Everything the statement-level driver supplies for one inline-assembly
/// statement.
#[derive(Debug, Clone, Copy)]
pub struct AsmSessionInputs<'a> {
    pub asm_text: &'a str,
    pub tokenized: &'a TokenizedAsm,
    pub anchor: Span,
    pub decl_context: DeclContext,
    pub triple: &'a str,
    pub dialect: AsmDialect,
}

/// Runs one inline-assembly statement's analysis: resolves the target,
/// builds its descriptors, configures the sub-parser with the bridge
/// installed as semantic callback, invokes the parse, and bundles the
/// artifacts. One session per statement; construct a fresh one for the
/// next.
pub struct AsmSession<'a> {
    registry: &'a TargetRegistry,
    layout: &'a dyn OperandLayoutResolver,
    state: SessionState,
}

impl<'a> AsmSession<'a> {
    pub fn new(registry: &'a TargetRegistry) -> Self {
        Self::with_layout(registry, &FixedOperandLayout)
    }

    pub fn with_layout(registry: &'a TargetRegistry, layout: &'a dyn OperandLayoutResolver) -> Self {
        Self {
            registry,
            layout,
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn run(
        &mut self,
        inputs: AsmSessionInputs<'_>,
        checker: &mut dyn HostTypeChecker,
        arena: &mut ExprArena,
    ) -> Result<AsmArtifact, AsmSessionError> {
        let Some(backend) = self.registry.lookup(inputs.triple) else {
            checker.diagnose(Diagnostic::error(
                inputs.anchor,
                format!("unknown target triple '{}'", inputs.triple),
            ));
            self.state = SessionState::Aborted;
            return Err(AsmSessionError::TargetLookup {
                triple: inputs.triple.to_string(),
            });
        };
        self.state = SessionState::TargetResolved;

        let cpu = host_cpu();
        let features = host_features();
        let config = SubParserConfig {
            register_info: backend.register_info(inputs.triple),
            assembler_info: backend.assembler_info(inputs.triple),
            instr_info: backend.instr_info(),
            subtarget_info: backend.subtarget_info(inputs.triple, &cpu, &features),
            dialect: inputs.dialect,
            parsing_inline_asm: true,
        };
        let mut sub_parser = backend.make_sub_parser(config);
        self.state = SessionState::SubParserConfigured;

        let context = AsmBlockContext::new(
            inputs.asm_text,
            inputs.tokenized,
            inputs.anchor,
            inputs.decl_context,
        );
        let mut bridge = AsmBridge::new(&context, checker, arena, self.layout);
        let mut sink = NullSink;

        self.state = SessionState::Parsing;
        let parsed =
            match sub_parser.parse_inline_asm(inputs.asm_text, inputs.anchor, &mut bridge, &mut sink)
            {
                Ok(parsed) => parsed,
                Err(error) => {
                    self.state = SessionState::Aborted;
                    return Err(error.into());
                }
            };
        self.state = SessionState::Completed;

        Ok(AsmArtifact {
            rewritten_text: parsed.rewritten_text,
            operands: parsed
                .operands
                .iter()
                .map(|(operand, is_output)| OperandRecord {
                    expr: operand.expr,
                    is_output: *is_output,
                })
                .collect(),
            constraints: parsed.constraints,
            clobbers: parsed.clobbers,
            output_count: parsed.output_count,
            input_count: parsed.input_count,
        })
    }
}

/// Convenience wrapper for hosts without a custom layout resolver.
pub fn run_asm_session(
    registry: &TargetRegistry,
    inputs: AsmSessionInputs<'_>,
    checker: &mut dyn HostTypeChecker,
    arena: &mut ExprArena,
) -> Result<AsmArtifact, AsmSessionError> {
    AsmSession::new(registry).run(inputs, checker, arena)
}
