//! Token types for the Quill lexer.

use quill_types::Span;
use std::fmt;

/// Reserved words. Each one lexes to its own [`TokenKind`].
pub const KEYWORDS: &[&str] = &[
    "namespace", "open", "operation", "function", "let", "mutable", "set", "if", "elif",
    "else", "for", "in", "while", "return", "fail", "true", "false", "and", "or", "not",
    "Unit", "Int", "Bool", "String",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals and names ──
    IntLit(i64),
    StringLit(String),
    Identifier(String),

    // ── Keywords ──
    Namespace,
    Open,
    Operation,
    Function,
    Let,
    Mutable,
    Set,
    If,
    Elif,
    Else,
    For,
    In,
    While,
    Return,
    Fail,
    True,
    False,
    And,
    Or,
    Not,
    KwUnit,
    KwInt,
    KwBool,
    KwString,

    // ── Punctuation ──
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semicolon,
    Colon,
    Comma,
    Dot,
    DotDot,
    At,
    Question,
    Pipe,

    // ── Operators ──
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    EqEq,
    BangEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eof,
}

impl TokenKind {
    /// Look up a keyword by its spelling.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "namespace" => Self::Namespace,
            "open" => Self::Open,
            "operation" => Self::Operation,
            "function" => Self::Function,
            "let" => Self::Let,
            "mutable" => Self::Mutable,
            "set" => Self::Set,
            "if" => Self::If,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "for" => Self::For,
            "in" => Self::In,
            "while" => Self::While,
            "return" => Self::Return,
            "fail" => Self::Fail,
            "true" => Self::True,
            "false" => Self::False,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "Unit" => Self::KwUnit,
            "Int" => Self::KwInt,
            "Bool" => Self::KwBool,
            "String" => Self::KwString,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Self::Namespace
                | Self::Open
                | Self::Operation
                | Self::Function
                | Self::Let
                | Self::Mutable
                | Self::Set
                | Self::If
                | Self::Elif
                | Self::Else
                | Self::For
                | Self::In
                | Self::While
                | Self::Return
                | Self::Fail
                | Self::True
                | Self::False
                | Self::And
                | Self::Or
                | Self::Not
                | Self::KwUnit
                | Self::KwInt
                | Self::KwBool
                | Self::KwString
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IntLit(n) => return write!(f, "{n}"),
            Self::StringLit(s) => return write!(f, "\"{s}\""),
            Self::Identifier(name) => return f.write_str(name),
            Self::Namespace => "namespace",
            Self::Open => "open",
            Self::Operation => "operation",
            Self::Function => "function",
            Self::Let => "let",
            Self::Mutable => "mutable",
            Self::Set => "set",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::For => "for",
            Self::In => "in",
            Self::While => "while",
            Self::Return => "return",
            Self::Fail => "fail",
            Self::True => "true",
            Self::False => "false",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::KwUnit => "Unit",
            Self::KwInt => "Int",
            Self::KwBool => "Bool",
            Self::KwString => "String",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::DotDot => "..",
            Self::At => "@",
            Self::Question => "?",
            Self::Pipe => "|",
            Self::Eq => "=",
            Self::PlusEq => "+=",
            Self::MinusEq => "-=",
            Self::StarEq => "*=",
            Self::EqEq => "==",
            Self::BangEq => "!=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Eof => "end of file",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyword_round_trips_through_display() {
        for word in KEYWORDS {
            let kind = TokenKind::keyword(word).unwrap_or_else(|| panic!("{word} not a keyword"));
            assert!(kind.is_keyword());
            assert_eq!(kind.to_string(), *word);
        }
    }

    #[test]
    fn identifiers_are_not_keywords() {
        assert_eq!(TokenKind::keyword("Message"), None);
        assert!(!TokenKind::Identifier("let".into()).is_keyword());
    }
}
