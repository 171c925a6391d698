//! End-to-end sessions: a scripted target backend drives the real bridge,
//! offset index, and chain parser through full statement analyses.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use asm_bridge::diag::Diagnostic;
use asm_bridge::expr::{ExprArena, ExprId};
use asm_bridge::span::{SourceId, Span};
use asm_bridge::subparser::{
    AsmDialect, AsmSemaCallback, AsmSubParser, CodeSink, ParsedAsm, SubParserConfig,
    SubParserError,
};
use asm_bridge::target::{AssemblerInfo, InstrInfo, RegisterInfo, TargetBackend, TargetRegistry};
use asm_bridge::token::{TokenizedAsm, tokenize};
use asm_bridge::typeck::{DeclContext, DeclId, HostTypeChecker};
use asm_bridge::{AsmSession, AsmSessionInputs, SessionState, run_asm_session};

/// Scope-map type checker standing in for the host compiler: binds names
/// it knows, diagnoses the rest, and records every check it ran.
#[derive(Default)]
struct FakeTypeChecker {
    scope: HashMap<String, DeclId>,
    checked_paths: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl FakeTypeChecker {
    fn with_scope(names: &[&str]) -> Self {
        let scope = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_string(), DeclId(index as u32)))
            .collect();
        Self {
            scope,
            ..Self::default()
        }
    }
}

impl HostTypeChecker for FakeTypeChecker {
    fn type_check_expression(&mut self, arena: &mut ExprArena, expr: ExprId, _context: DeclContext) {
        let chain = arena.get_mut(expr);
        chain.binding = self.scope.get(&chain.base.name).copied();
        if chain.binding.is_none() {
            self.diagnostics.push(Diagnostic::error(
                chain.base.span,
                format!("cannot find '{}' in scope", chain.base.name),
            ));
        }
        self.checked_paths.push(arena.get(expr).path());
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// One step a scripted sub-parser takes against the bridge mid-parse.
#[derive(Clone)]
enum Action {
    /// Resolve the identifier at `start`; the line buffer runs to
    /// `line_end`. The consumed bytes get replaced by an operand
    /// placeholder in the rewritten text.
    Identifier {
        start: usize,
        line_end: usize,
        is_output: bool,
        constraint: &'static str,
    },
    /// Raise a grammar complaint at a buffer-local offset.
    Diagnose {
        offset: usize,
        message: &'static str,
    },
}

struct ScriptedSubParser {
    actions: Vec<Action>,
    clobbers: Vec<String>,
}

impl AsmSubParser for ScriptedSubParser {
    fn parse_inline_asm(
        &mut self,
        asm_text: &str,
        _anchor: Span,
        callback: &mut dyn AsmSemaCallback,
        _sink: &mut dyn CodeSink,
    ) -> Result<ParsedAsm, SubParserError> {
        let mut operands = Vec::new();
        let mut constraints = Vec::new();
        let mut replacements: Vec<(Range<usize>, String)> = Vec::new();
        let mut output_count = 0;
        let mut input_count = 0;

        for action in &self.actions {
            match action {
                Action::Identifier {
                    start,
                    line_end,
                    is_output,
                    constraint,
                } => {
                    let lookup = callback.lookup_identifier(*start..*line_end, false);
                    let Some(operand) = lookup.operand else {
                        continue;
                    };
                    let placeholder = format!("${}", operands.len());
                    replacements.push((*start..start + lookup.consumed_bytes, placeholder));
                    operands.push((operand, *is_output));
                    constraints.push(constraint.to_string());
                    if *is_output {
                        output_count += 1;
                    } else {
                        input_count += 1;
                    }
                }
                Action::Diagnose { offset, message } => {
                    callback.handle_diagnostic(*offset, message);
                }
            }
        }

        let mut rewritten = asm_text.to_string();
        replacements.sort_by_key(|(range, _)| range.start);
        for (range, placeholder) in replacements.into_iter().rev() {
            rewritten.replace_range(range, &placeholder);
        }

        Ok(ParsedAsm {
            rewritten_text: rewritten,
            output_count,
            input_count,
            operands,
            constraints,
            clobbers: self.clobbers.clone(),
        })
    }
}

struct ScriptedBackend {
    actions: Vec<Action>,
    clobbers: Vec<String>,
}

impl ScriptedBackend {
    fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            clobbers: vec!["eax".into()],
        }
    }
}

impl TargetBackend for ScriptedBackend {
    fn arch(&self) -> &str {
        "x86_64"
    }

    fn register_info(&self, _triple: &str) -> RegisterInfo {
        RegisterInfo {
            arch: "x86_64".into(),
            registers: vec!["eax".into(), "ebx".into()],
        }
    }

    fn assembler_info(&self, _triple: &str) -> AssemblerInfo {
        AssemblerInfo {
            arch: "x86_64".into(),
            comment_prefix: "#".into(),
        }
    }

    fn instr_info(&self) -> InstrInfo {
        InstrInfo {
            arch: "x86_64".into(),
            mnemonics: vec!["mov".into(), "add".into()],
        }
    }

    fn make_sub_parser(&self, config: SubParserConfig) -> Box<dyn AsmSubParser> {
        assert!(config.parsing_inline_asm);
        assert_eq!(config.dialect, AsmDialect::Intel);
        Box::new(ScriptedSubParser {
            actions: self.actions.clone(),
            clobbers: self.clobbers.clone(),
        })
    }
}

const TRIPLE: &str = "x86_64-unknown-linux-gnu";

fn registry_with(actions: Vec<Action>) -> TargetRegistry {
    let registry = TargetRegistry::new();
    registry.register(Arc::new(ScriptedBackend::new(actions)));
    registry
}

fn inputs<'a>(
    asm: &'a str,
    tokenized: &'a TokenizedAsm,
    anchor: Span,
) -> AsmSessionInputs<'a> {
    AsmSessionInputs {
        asm_text: asm,
        tokenized,
        anchor,
        decl_context: DeclContext(0),
        triple: TRIPLE,
        dialect: AsmDialect::Intel,
    }
}

#[test]
fn full_session_resolves_identifiers_and_rewrites_operands() {
    let asm = "mov eax, counter\nadd total, ebx";
    let counter_at = asm.find("counter").unwrap();
    let total_at = asm.find("total").unwrap();
    let registry = registry_with(vec![
        Action::Identifier {
            start: counter_at,
            line_end: asm.find('\n').unwrap(),
            is_output: false,
            constraint: "*m",
        },
        Action::Identifier {
            start: total_at,
            line_end: asm.len(),
            is_output: true,
            constraint: "=*m",
        },
    ]);

    let lexed = tokenize(SourceId(0), asm, 0);
    let mut checker = FakeTypeChecker::with_scope(&["counter", "total"]);
    let mut arena = ExprArena::default();

    let artifact = run_asm_session(
        &registry,
        inputs(asm, &lexed, Span::point(SourceId(0), 0)),
        &mut checker,
        &mut arena,
    )
    .expect("session");

    assert_eq!(artifact.rewritten_text, "mov eax, $0\nadd $1, ebx");
    assert_eq!(artifact.operands.len(), 2);
    assert!(!artifact.operands[0].is_output);
    assert!(artifact.operands[1].is_output);
    assert_eq!(artifact.output_count, 1);
    assert_eq!(artifact.input_count, 1);
    assert_eq!(artifact.constraints, vec!["*m", "=*m"]);
    assert_eq!(artifact.clobbers, vec!["eax"]);

    assert_eq!(arena.get(artifact.operands[0].expr).base.name, "counter");
    assert_eq!(arena.get(artifact.operands[0].expr).binding, Some(DeclId(0)));
    assert_eq!(arena.get(artifact.operands[1].expr).base.name, "total");
    assert!(checker.diagnostics.is_empty());
}

#[test]
fn member_chain_is_type_checked_twice_and_substituted_as_one_operand() {
    let asm = "mov eax, state.flags + 1";
    let state_at = asm.find("state").unwrap();
    let registry = registry_with(vec![Action::Identifier {
        start: state_at,
        line_end: asm.len(),
        is_output: false,
        constraint: "*m",
    }]);

    let lexed = tokenize(SourceId(0), asm, 0);
    let mut checker = FakeTypeChecker::with_scope(&["state"]);
    let mut arena = ExprArena::default();

    let artifact = run_asm_session(
        &registry,
        inputs(asm, &lexed, Span::point(SourceId(0), 0)),
        &mut checker,
        &mut arena,
    )
    .expect("session");

    // The chain ends at "flags"; "+ 1" stays raw assembly text.
    assert_eq!(artifact.rewritten_text, "mov eax, $0 + 1");
    assert_eq!(checker.checked_paths, vec!["state", "state.flags"]);

    let chain = arena.get(artifact.operands[0].expr);
    assert_eq!(chain.path(), "state.flags");
    assert_eq!(chain.members.len(), 1);
}

#[test]
fn malformed_member_access_is_recovered_and_the_session_completes() {
    let asm = "mov eax, x.";
    let x_at = asm.find('x').unwrap();
    let registry = registry_with(vec![Action::Identifier {
        start: x_at,
        line_end: asm.len(),
        is_output: false,
        constraint: "*m",
    }]);

    let lexed = tokenize(SourceId(0), asm, 0);
    let mut checker = FakeTypeChecker::with_scope(&["x"]);
    let mut arena = ExprArena::default();
    let mut session = AsmSession::new(&registry);

    let artifact = session
        .run(
            inputs(asm, &lexed, Span::point(SourceId(0), 0)),
            &mut checker,
            &mut arena,
        )
        .expect("one malformed chain must not abort the statement");

    assert_eq!(session.state(), SessionState::Completed);
    // The bare reference survives; the stray period stays raw.
    assert_eq!(artifact.rewritten_text, "mov eax, $0.");
    assert_eq!(arena.get(artifact.operands[0].expr).base.name, "x");

    let malformed: Vec<_> = checker
        .diagnostics
        .iter()
        .filter(|diag| diag.message.contains("expected member name after '.'"))
        .collect();
    assert_eq!(malformed.len(), 1);
}

#[test]
fn sub_parser_diagnostics_are_relayed_in_host_coordinates() {
    let asm = "mov eax, 5 garbage";
    // The statement's text begins at host offset 200.
    let base = 200;
    let garbage_at = asm.find("garbage").unwrap();
    let registry = registry_with(vec![Action::Diagnose {
        // Two bytes into "garbage", well inside the token.
        offset: garbage_at + 2,
        message: "unknown token in expression",
    }]);

    let lexed = tokenize(SourceId(0), asm, base);
    let mut checker = FakeTypeChecker::default();
    let mut arena = ExprArena::default();

    run_asm_session(
        &registry,
        inputs(asm, &lexed, Span::point(SourceId(0), base)),
        &mut checker,
        &mut arena,
    )
    .expect("relayed diagnostics do not abort the session");

    assert_eq!(checker.diagnostics.len(), 1);
    let diagnostic = &checker.diagnostics[0];
    assert!(
        diagnostic
            .message
            .contains("inline assembly parsing failed: unknown token in expression")
    );
    assert_eq!(
        diagnostic.primary,
        Span::point(SourceId(0), base + garbage_at + 2)
    );
}

#[test]
fn rerunning_an_identical_statement_is_deterministic() {
    let asm = "mov eax, state.flags";
    let state_at = asm.find("state").unwrap();

    let run = || {
        let registry = registry_with(vec![Action::Identifier {
            start: state_at,
            line_end: asm.len(),
            is_output: false,
            constraint: "*m",
        }]);
        let lexed = tokenize(SourceId(0), asm, 0);
        let mut checker = FakeTypeChecker::with_scope(&["state"]);
        let mut arena = ExprArena::default();
        let artifact = run_asm_session(
            &registry,
            inputs(asm, &lexed, Span::point(SourceId(0), 0)),
            &mut checker,
            &mut arena,
        )
        .expect("session");
        (artifact, arena, checker.checked_paths)
    };

    let (first_artifact, first_arena, first_checked) = run();
    let (second_artifact, second_arena, second_checked) = run();

    assert_eq!(first_artifact, second_artifact);
    assert_eq!(first_arena, second_arena);
    assert_eq!(first_checked, second_checked);
}

#[test]
fn unknown_triple_aborts_before_any_callback_runs() {
    let registry = TargetRegistry::new();

    let asm = "mov eax, x";
    let lexed = tokenize(SourceId(0), asm, 0);
    let mut checker = FakeTypeChecker::default();
    let mut arena = ExprArena::default();
    let mut session = AsmSession::new(&registry);

    let result = session.run(
        AsmSessionInputs {
            asm_text: asm,
            tokenized: &lexed,
            anchor: Span::point(SourceId(0), 0),
            decl_context: DeclContext(0),
            triple: "m68k-unknown-none",
            dialect: AsmDialect::Intel,
        },
        &mut checker,
        &mut arena,
    );

    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(checker.diagnostics.len(), 1);
    assert!(checker.diagnostics[0].message.contains("m68k-unknown-none"));
    assert!(arena.is_empty());
    assert!(checker.checked_paths.is_empty());
}
