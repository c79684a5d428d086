//! Type annotations.

use crate::parser::Parser;
use quill_lexer::token::TokenKind;
use quill_types::ast::TypeAnn;
use quill_types::tree::Type;

impl Parser {
    /// `'Unit' | 'Int' | 'Bool' | 'String'`
    pub(crate) fn parse_type(&mut self) -> Option<TypeAnn> {
        let ty = match self.peek_kind() {
            TokenKind::KwUnit => Type::Unit,
            TokenKind::KwInt => Type::Int,
            TokenKind::KwBool => Type::Bool,
            TokenKind::KwString => Type::String,
            other => {
                self.error_at_current(format!("expected a type, got `{other}`"));
                return None;
            }
        };
        let span = self.advance().span;
        Some(TypeAnn { ty, span })
    }
}
