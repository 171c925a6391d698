use logos::Logos;

use crate::span::{SourceId, Span};

/// Host-side lexical classification of the raw assembly text. The sub-parser
/// never sees these tokens; they exist so identifier references and relayed
/// diagnostics can be mapped between the sub-parser's buffer offsets and host
/// source locations.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[token(".")]
    Period,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,

    #[regex(r"0x[0-9a-fA-F]+|[0-9]+", parse_number)]
    Number(i64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    /// A byte the host lexer has no classification for. Raw assembly is not
    /// the host's to validate, but every non-blank byte must still land in a
    /// token so the offset table stays parallel to the text.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn byte_len(&self) -> usize {
        self.span.byte_len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedAsm {
    pub tokens: Vec<Token>,
    /// Byte offset of each token's start, relative to the start of the
    /// assembly text. Strictly increasing, one entry per token.
    pub offsets: Vec<usize>,
}

/// Tokenize one inline-assembly string. `base_offset` is where the assembly
/// text begins inside the enclosing host source file, so token spans come out
/// in host coordinates while the offset table stays relative to the text.
pub fn tokenize(source_id: SourceId, asm_text: &str, base_offset: usize) -> TokenizedAsm {
    let mut lexer = TokenKind::lexer(asm_text);
    let mut tokens = Vec::new();
    let mut offsets = Vec::new();

    while let Some(next) = lexer.next() {
        let range = lexer.span();
        let kind = next.unwrap_or(TokenKind::Unknown);
        offsets.push(range.start);
        tokens.push(Token {
            kind,
            text: lexer.slice().to_string(),
            span: Span::new(source_id, base_offset + range.start, base_offset + range.end),
        });
    }

    TokenizedAsm { tokens, offsets }
}

fn parse_number(lex: &mut logos::Lexer<TokenKind>) -> Option<i64> {
    let slice = lex.slice();
    if let Some(hex) = slice.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    slice.parse::<i64>().ok()
}
