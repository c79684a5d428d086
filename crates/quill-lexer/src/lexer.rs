//! Core Quill lexer.
//!
//! - `//` comments are skipped, whitespace (including newlines) is insignificant
//! - integer literals must fit in `i64`
//! - string literals support `\" \\ \n \t \r` and may not span lines
//! - errors are collected (up to [`quill_types::MAX_ERRORS`]) instead of
//!   stopping at the first one

use quill_types::{Diagnostic, DiagnosticCode, Diagnostics, SourceFile, Span};

use crate::token::{Token, TokenKind};

pub struct Lexer<'src> {
    source: &'src [u8],
    file_name: &'src str,
    pos: usize,
    line: u32,
    col: u32,
    errors: Diagnostics,
}

/// Tokens plus any diagnostics collected while lexing.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: Diagnostics,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            file_name: &source_file.name,
            pos: 0,
            line: 1,
            col: 1,
            errors: Diagnostics::new(),
        }
    }

    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.is_saturated() {
                tokens.push(Token::new(TokenKind::Eof, self.current_span()));
                break;
            }
            let token = self.scan();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ── Character helpers ────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column.
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.errors
            .push(Diagnostic::error(code, message).at(self.file_name, span));
    }

    // ── Trivia ───────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    // ── Scanning ─────────────────────────────────────────────────────────

    fn scan(&mut self) -> Token {
        loop {
            if let Some(token) = self.scan_one() {
                return token;
            }
            if self.errors.is_saturated() {
                return Token::new(TokenKind::Eof, self.current_span());
            }
        }
    }

    /// Scan one token; `None` means an invalid character was reported and
    /// skipped.
    fn scan_one(&mut self) -> Option<Token> {
        self.skip_trivia();
        let start_line = self.line;
        let start_col = self.col;
        let Some(ch) = self.advance() else {
            return Some(Token::new(TokenKind::Eof, self.current_span()));
        };

        let kind = match ch {
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b';' => TokenKind::Semicolon,
            b':' => TokenKind::Colon,
            b',' => TokenKind::Comma,
            b'@' => TokenKind::At,
            b'?' => TokenKind::Question,
            b'|' => TokenKind::Pipe,
            b'%' => TokenKind::Percent,
            b'/' => TokenKind::Slash,
            b'.' => {
                if self.eat(b'.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    TokenKind::BangEq
                } else {
                    self.emit_error(
                        DiagnosticCode::INVALID_CHARACTER,
                        "unexpected `!`; use `not` for negation",
                        self.span_from(start_line, start_col),
                    );
                    return None;
                }
            }
            b'<' => {
                if self.eat(b'=') {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            b'+' => {
                if self.eat(b'=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.eat(b'=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.eat(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'"' => self.scan_string(start_line, start_col),
            b'0'..=b'9' => self.scan_number(start_line, start_col),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_word(),
            other => {
                // Swallow the rest of a multi-byte character so it is reported once.
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.advance();
                }
                let shown = if other.is_ascii() {
                    format!("`{}`", other as char)
                } else {
                    "non-ASCII character".to_string()
                };
                self.emit_error(
                    DiagnosticCode::INVALID_CHARACTER,
                    format!("unexpected {shown}"),
                    self.span_from(start_line, start_col),
                );
                return None;
            }
        };
        Some(Token::new(kind, self.span_from(start_line, start_col)))
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos - 1;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.advance();
        }
        // Only ASCII bytes were consumed, so the slice is valid UTF-8.
        let word = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier(word))
    }

    fn scan_number(&mut self, start_line: u32, start_col: u32) -> TokenKind {
        let start = self.pos - 1;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = String::from_utf8_lossy(&self.source[start..self.pos]);
        match digits.parse::<i64>() {
            Ok(value) => TokenKind::IntLit(value),
            Err(_) => {
                self.emit_error(
                    DiagnosticCode::INTEGER_OVERFLOW,
                    format!("integer literal `{digits}` does not fit in a 64-bit Int"),
                    self.span_from(start_line, start_col),
                );
                TokenKind::IntLit(0)
            }
        }
    }

    fn scan_string(&mut self, start_line: u32, start_col: u32) -> TokenKind {
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.emit_error(
                        DiagnosticCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        self.span_from(start_line, start_col),
                    );
                    break;
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    let escape_line = self.line;
                    let escape_col = self.col;
                    self.advance();
                    match self.advance() {
                        Some(b'"') => bytes.push(b'"'),
                        Some(b'\\') => bytes.push(b'\\'),
                        Some(b'n') => bytes.push(b'\n'),
                        Some(b't') => bytes.push(b'\t'),
                        Some(b'r') => bytes.push(b'\r'),
                        other => {
                            let shown = other.map(|b| (b as char).to_string()).unwrap_or_default();
                            self.emit_error(
                                DiagnosticCode::INVALID_ESCAPE,
                                format!("unknown escape sequence `\\{shown}`"),
                                self.span_from(escape_line, escape_col),
                            );
                        }
                    }
                }
                Some(b) => {
                    self.advance();
                    bytes.push(b);
                }
            }
        }
        TokenKind::StringLit(String::from_utf8_lossy(&bytes).into_owned())
    }
}
