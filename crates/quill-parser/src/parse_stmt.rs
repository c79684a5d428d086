//! Statement parsing.

use crate::parser::Parser;
use quill_lexer::token::TokenKind;
use quill_types::ast::*;

impl Parser {
    /// `'{' stmt* '}'`
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            let before = self.position();
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            } else {
                self.synchronize_stmt();
            }
            if self.position() == before {
                self.advance();
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(Block {
            stmts,
            span: start.to(self.previous_span()),
        })
    }

    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let kind = match self.peek_kind() {
            TokenKind::Let => self.parse_let(false)?,
            TokenKind::Mutable => self.parse_let(true)?,
            TokenKind::Set => self.parse_set()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expression()?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            TokenKind::Fail => {
                self.advance();
                let message = self.parse_expression()?;
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Fail(message)
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::Semicolon)?;
                StmtKind::Expr(expr)
            }
        };
        Some(Stmt {
            kind,
            span: start.to(self.previous_span()),
        })
    }

    /// `('let' | 'mutable') IDENT '=' expr ';'`
    fn parse_let(&mut self, mutable: bool) -> Option<StmtKind> {
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Some(StmtKind::Let {
            name,
            mutable,
            value,
        })
    }

    /// `'set' IDENT ('=' | '+=' | '-=' | '*=') expr ';'`
    fn parse_set(&mut self) -> Option<StmtKind> {
        self.advance();
        let name = self.expect_identifier()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            other => {
                self.error_at_current(format!(
                    "expected an assignment operator, got `{other}`"
                ));
                return None;
            }
        };
        self.advance();
        let value = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Some(StmtKind::Set { name, op, value })
    }

    /// `'if' expr block ('elif' expr block)* ('else' block)?`
    fn parse_if(&mut self) -> Option<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let cond = self.parse_expression()?;
        let block = self.parse_block()?;
        branches.push((cond, block));
        while self.eat(&TokenKind::Elif) {
            let cond = self.parse_expression()?;
            let block = self.parse_block()?;
            branches.push((cond, block));
        }
        let otherwise = if self.eat(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(StmtKind::If {
            branches,
            otherwise,
        })
    }

    /// `'for' IDENT 'in' expr '..' expr block`
    fn parse_for(&mut self) -> Option<StmtKind> {
        self.advance();
        let var = self.expect_identifier()?;
        self.expect(&TokenKind::In)?;
        let start = self.parse_expression()?;
        self.expect(&TokenKind::DotDot)?;
        let end = self.parse_expression()?;
        let body = self.parse_block()?;
        Some(StmtKind::For {
            var,
            start,
            end,
            body,
        })
    }
}
