//! Namespace and callable declarations.

use crate::parser::Parser;
use quill_lexer::token::TokenKind;
use quill_types::ast::*;

impl Parser {
    /// `file := namespace*`
    pub(crate) fn parse_source_unit(&mut self) -> SourceUnit {
        let mut namespaces = Vec::new();
        while !self.at_end() && !self.too_many_errors() {
            if self.check(&TokenKind::Namespace) {
                let start = self.position();
                if let Some(ns) = self.parse_namespace() {
                    namespaces.push(ns);
                } else if self.position() == start {
                    self.advance();
                }
            } else {
                self.error_at_current(format!(
                    "expected `namespace`, got `{}`",
                    self.peek_kind()
                ));
                while !self.at_end() && !self.check(&TokenKind::Namespace) {
                    self.advance();
                }
            }
        }
        SourceUnit { namespaces }
    }

    /// `'namespace' qualname '{' (open | callable)* '}'`
    fn parse_namespace(&mut self) -> Option<NamespaceDecl> {
        let start = self.current_span();
        self.advance(); // `namespace`
        let name = self.parse_path()?;
        self.expect(&TokenKind::LBrace)?;

        let mut opens = Vec::new();
        let mut callables = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            let before = self.position();
            match self.peek_kind() {
                TokenKind::Open => {
                    if let Some(path) = self.parse_open() {
                        opens.push(path);
                    } else {
                        self.synchronize_decl();
                    }
                }
                TokenKind::At | TokenKind::Operation | TokenKind::Function => {
                    if let Some(callable) = self.parse_callable() {
                        callables.push(callable);
                    } else {
                        self.synchronize_decl();
                    }
                }
                TokenKind::Namespace => {
                    // Namespaces do not nest; the closing brace is missing.
                    break;
                }
                other => {
                    self.error_at_current(format!(
                        "expected `open`, `operation` or `function`, got `{other}`"
                    ));
                    self.advance();
                    self.synchronize_decl();
                }
            }
            if self.position() == before {
                self.advance();
            }
        }
        self.expect(&TokenKind::RBrace);
        Some(NamespaceDecl {
            name,
            opens,
            callables,
            span: start.to(self.previous_span()),
        })
    }

    /// `'open' qualname ';'`
    fn parse_open(&mut self) -> Option<Path> {
        self.advance(); // `open`
        let path = self.parse_path()?;
        self.expect(&TokenKind::Semicolon)?;
        Some(path)
    }

    /// `attribute* ('operation' | 'function') IDENT '(' params? ')' ':' type block`
    fn parse_callable(&mut self) -> Option<CallableDecl> {
        let start = self.current_span();
        let mut attributes = Vec::new();
        while self.check(&TokenKind::At) {
            attributes.push(self.parse_attribute()?);
        }

        let kind = match self.peek_kind() {
            TokenKind::Operation => CallableKind::Operation,
            TokenKind::Function => CallableKind::Function,
            other => {
                self.error_at_current(format!(
                    "expected `operation` or `function`, got `{other}`"
                ));
                return None;
            }
        };
        self.advance();

        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param_name = self.expect_identifier()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(ParamDecl {
                    name: param_name,
                    ty,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Colon)?;
        let return_type = self.parse_type()?;
        let body = self.parse_block()?;

        Some(CallableDecl {
            attributes,
            kind,
            name,
            params,
            return_type,
            body,
            span: start.to(self.previous_span()),
        })
    }

    /// `'@' IDENT '(' ')'`
    fn parse_attribute(&mut self) -> Option<Attribute> {
        let start = self.current_span();
        self.advance(); // `@`
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        self.expect(&TokenKind::RParen)?;
        Some(Attribute {
            name,
            span: start.to(self.previous_span()),
        })
    }
}
