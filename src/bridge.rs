use std::ops::Range;

use crate::diag::Diagnostic;
use crate::expr::{ChainExpr, ExprArena, ExprId, IdentRef, MemberLink};
use crate::offsets::TokenOffsetIndex;
use crate::span::Span;
use crate::subparser::{AsmSemaCallback, IdentifierLookup, OperandInfo};
use crate::token::{Token, TokenKind, TokenizedAsm};
use crate::typeck::{DeclContext, HostTypeChecker, OperandLayoutResolver};

/// Per-statement ownership unit for one inline-assembly block's analysis:
/// the raw text, its host tokenization, the offset index over it, the
/// statement's anchor location, and the enclosing declaration context.
/// Built fresh for every statement and torn down when its analysis ends;
/// never shared across statements or threads.
pub struct AsmBlockContext<'a> {
    asm_text: &'a str,
    tokens: &'a [Token],
    index: TokenOffsetIndex,
    anchor: Span,
    decl_context: DeclContext,
}

impl<'a> AsmBlockContext<'a> {
    pub fn new(
        asm_text: &'a str,
        tokenized: &'a TokenizedAsm,
        anchor: Span,
        decl_context: DeclContext,
    ) -> Self {
        assert_eq!(
            tokenized.tokens.len(),
            tokenized.offsets.len(),
            "token offset table must stay parallel to the token list"
        );
        Self {
            asm_text,
            tokens: &tokenized.tokens,
            index: TokenOffsetIndex::new(tokenized.offsets.clone()),
            anchor,
            decl_context,
        }
    }

    pub fn anchor(&self) -> Span {
        self.anchor
    }
}

/// The semantic callback installed into the sub-parser for one statement.
/// Mid-parse, the sub-parser hands it line buffers to resolve identifier
/// references in (feeding the host type checker) and buffer-local offsets
/// to report diagnostics at (feeding the host diagnostic path).
pub struct AsmBridge<'a> {
    context: &'a AsmBlockContext<'a>,
    checker: &'a mut dyn HostTypeChecker,
    arena: &'a mut ExprArena,
    layout: &'a dyn OperandLayoutResolver,
}

impl<'a> AsmBridge<'a> {
    pub fn new(
        context: &'a AsmBlockContext<'a>,
        checker: &'a mut dyn HostTypeChecker,
        arena: &'a mut ExprArena,
        layout: &'a dyn OperandLayoutResolver,
    ) -> Self {
        Self {
            context,
            checker,
            arena,
            layout,
        }
    }

    /// The host tokens covered by a byte sub-range of the assembly text:
    /// the first token's index and the tokens starting inside the range.
    /// The range start must be a token boundary. The sub-parser only hands
    /// back offsets it was itself given as identifier starts, so a miss
    /// here is a broken contract between it and the bridge, not user
    /// input.
    fn locate_tokens(&self, range: &Range<usize>) -> (usize, &'a [Token]) {
        assert!(
            range.start <= range.end && range.end <= self.context.asm_text.len(),
            "line buffer range must lie within the assembly text"
        );
        let first = self
            .context
            .index
            .exact(range.start)
            .expect("line buffer must start on a token boundary");

        let tokens = self.context.tokens;
        let mut past = first;
        while past < tokens.len() && self.context.index.start_of(past) < range.end {
            past += 1;
        }
        (first, &tokens[first..past])
    }

    /// Parse one identifier reference, with optional `.member` links, out
    /// of the token window. Returns the expression and how many tokens of
    /// the window it consumed.
    ///
    /// The base reference is type-checked as soon as it is built, so name
    /// lookup binds (or complains) before any chain is parsed; the whole
    /// chain is checked again once it is complete. A period with no
    /// member name after it is diagnosed and ends the chain, keeping the
    /// prefix built so far; the rest of the line stays with the
    /// sub-parser.
    fn parse_identifier(&mut self, window: &[Token]) -> (ExprId, usize) {
        let first = &window[0];
        let expr = self.arena.alloc(ChainExpr::new(IdentRef {
            name: first.text.clone(),
            span: first.span,
        }));
        self.checker
            .type_check_expression(self.arena, expr, self.context.decl_context);

        if window.len() == 1 || window[1].kind != TokenKind::Period {
            return (expr, 1);
        }

        let mut cursor = 1;
        while cursor < window.len() && window[cursor].kind == TokenKind::Period {
            let period = &window[cursor];
            match window.get(cursor + 1) {
                Some(member) if member.kind == TokenKind::Ident => {
                    self.arena.get_mut(expr).push_member(MemberLink {
                        dot_span: period.span,
                        name: member.text.clone(),
                        name_span: member.span,
                    });
                    cursor += 2;
                }
                _ => {
                    self.checker.diagnose(Diagnostic::error(
                        period.span,
                        "expected member name after '.'",
                    ));
                    break;
                }
            }
        }

        self.checker
            .type_check_expression(self.arena, expr, self.context.decl_context);

        (expr, cursor)
    }

    /// Map a sub-parser-local buffer offset back to a host location: the
    /// containing token's start, advanced by the offset's position inside
    /// that token. Offsets before the first token fall back to the
    /// statement anchor.
    fn translate_location(&self, offset: usize) -> Span {
        match self.context.index.floor(offset) {
            Ok(index) => {
                let token = &self.context.tokens[index];
                token.span.advanced(offset - self.context.index.start_of(index))
            }
            Err(_) => self.context.anchor,
        }
    }
}

impl AsmSemaCallback for AsmBridge<'_> {
    // Aggregate field lookup is unsupported; the sub-parser treats every
    // field as not found.
    fn lookup_field(&mut self, _base: &str, _member: &str) -> Option<u64> {
        None
    }

    fn lookup_identifier(
        &mut self,
        line_range: Range<usize>,
        _unevaluated: bool,
    ) -> IdentifierLookup {
        let (first, window) = self.locate_tokens(&line_range);
        assert!(
            !window.is_empty(),
            "identifier line buffer must cover at least one token"
        );

        let (expr, consumed) = self.parse_identifier(window);

        // When the chain ate only a prefix of the window, tell the
        // sub-parser how many bytes that prefix spans so it can keep
        // parsing the rest of the line as raw text.
        let consumed_bytes = if consumed < window.len() {
            let last = first + consumed - 1;
            self.context.index.start_of(last) + self.context.tokens[last].byte_len()
                - self.context.index.start_of(first)
        } else {
            line_range.len()
        };

        let layout = self.layout.resolve(self.arena.get(expr).binding);
        IdentifierLookup {
            operand: Some(OperandInfo {
                expr,
                size: layout.size,
                align: layout.align,
            }),
            consumed_bytes,
        }
    }

    // Label creation is unsupported; the sub-parser keeps its own name.
    fn lookup_label(&mut self, _identifier: &str, _offset: usize, _create: bool) -> Option<String> {
        None
    }

    fn handle_diagnostic(&mut self, offset: usize, message: &str) {
        let location = self.translate_location(offset);
        self.checker.diagnose(Diagnostic::error(
            location,
            format!("inline assembly parsing failed: {message}"),
        ));
    }
}
