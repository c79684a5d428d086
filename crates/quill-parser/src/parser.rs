//! Core parser infrastructure: token cursor, error reporting, helpers.

use quill_lexer::token::{Token, TokenKind};
use quill_types::ast::{Ident, Path, SourceUnit};
use quill_types::{Diagnostic, DiagnosticCode, Diagnostics, SourceFile, Span};

/// Deepest expression nesting the parser accepts before giving up on the
/// expression.
pub(crate) const MAX_EXPR_DEPTH: u32 = 64;

/// The Quill parser.
///
/// Consumes a token stream produced by the lexer and builds a
/// [`SourceUnit`]. Errors are collected and the parser recovers at
/// statement and declaration boundaries.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Returned by the cursor once the stream is exhausted.
    eof: Token,
    file_name: String,
    errors: Diagnostics,
    pub(crate) expr_depth: u32,
}

/// Result of parsing.
pub struct ParseResult {
    /// Everything that parsed, possibly partial when `errors` is non-empty.
    pub unit: SourceUnit,
    pub errors: Diagnostics,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source_file: &SourceFile) -> Self {
        let eof_span = tokens
            .last()
            .map(|t| t.span)
            .unwrap_or_else(|| Span::point(1, 1));
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, eof_span),
            file_name: source_file.name.clone(),
            errors: Diagnostics::new(),
            expr_depth: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Span of the previously consumed token.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(format!(
                "expected `{}`, got `{}`",
                expected,
                self.peek_kind()
            ));
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            other => {
                self.error_at_current(format!("expected identifier, got `{other}`"));
                None
            }
        }
    }

    /// `IDENT ('.' IDENT)*`
    pub(crate) fn parse_path(&mut self) -> Option<Path> {
        let first = self.expect_identifier()?;
        let mut span = first.span;
        let mut segments = vec![first];
        while self.eat(&TokenKind::Dot) {
            let segment = self.expect_identifier()?;
            span = span.to(segment.span);
            segments.push(segment);
        }
        Some(Path { segments, span })
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(message, span);
    }

    pub(crate) fn error_at(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(
            Diagnostic::error(DiagnosticCode::UNEXPECTED_TOKEN, message)
                .at(self.file_name.as_str(), span),
        );
    }

    /// `true` once the error limit is reached and parsing should stop.
    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_saturated()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip to the next statement boundary: just past a `;`, or before a
    /// statement keyword or `}`.
    pub(crate) fn synchronize_stmt(&mut self) {
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Let
                | TokenKind::Mutable
                | TokenKind::Set
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Fail
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next declaration inside a namespace body.
    pub(crate) fn synchronize_decl(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::RBrace => depth -= 1,
                TokenKind::Open
                | TokenKind::At
                | TokenKind::Operation
                | TokenKind::Function
                | TokenKind::Namespace
                    if depth == 0 =>
                {
                    return
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    pub fn parse(mut self) -> ParseResult {
        let unit = self.parse_source_unit();
        ParseResult {
            unit,
            errors: self.errors,
        }
    }
}
