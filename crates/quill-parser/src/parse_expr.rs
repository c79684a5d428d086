//! Expression parsing with operator precedence.
//!
//! Precedence (lowest → highest):
//! 7. `? |` (conditional, right-associative)
//! 6. `or`
//! 5. `and`
//! 4. `==`, `!=`
//! 3. `<`, `<=`, `>`, `>=`
//! 2. `+`, `-` then `*`, `/`, `%`
//! 1. unary `-`, `not`

use quill_lexer::token::TokenKind;
use quill_types::ast::*;

use crate::parser::{Parser, MAX_EXPR_DEPTH};

impl Parser {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_DEPTH {
            self.error_at_current(format!(
                "expression nesting exceeds {MAX_EXPR_DEPTH} levels"
            ));
            self.expr_depth -= 1;
            return None;
        }
        let result = self.parse_conditional();
        self.expr_depth -= 1;
        result
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `or ('?' expr '|' expr)?`
    fn parse_conditional(&mut self) -> Option<Expr> {
        let cond = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Some(cond);
        }
        let then = self.parse_expression()?;
        self.expect(&TokenKind::Pipe)?;
        let otherwise = self.parse_expression()?;
        let span = cond.span.to(otherwise.span);
        Some(Expr {
            kind: ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        })
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                _ => return Some(lhs),
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::LessEq => BinaryOp::Le,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::GreaterEq => BinaryOp::Ge,
                _ => return Some(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Some(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Some(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let start = self.advance().span;
        // Unary chains recurse without going through `parse_expression`.
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_DEPTH {
            self.error_at_current(format!(
                "expression nesting exceeds {MAX_EXPR_DEPTH} levels"
            ));
            self.expr_depth -= 1;
            return None;
        }
        let operand = self.parse_unary();
        self.expr_depth -= 1;
        let operand = operand?;
        let span = start.to(operand.span);
        Some(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::IntLit(value) => {
                self.advance();
                ExprKind::Int(value)
            }
            TokenKind::StringLit(value) => {
                self.advance();
                ExprKind::Str(value)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Some(Expr {
                    kind: inner.kind,
                    span: span.to(self.previous_span()),
                });
            }
            TokenKind::Identifier(_) => {
                let path = self.parse_path()?;
                if !self.eat(&TokenKind::LParen) {
                    let span = path.span;
                    return Some(Expr {
                        kind: ExprKind::Path(path),
                        span,
                    });
                }
                let args = self.parse_args()?;
                return Some(Expr {
                    kind: ExprKind::Call { callee: path, args },
                    span: span.to(self.previous_span()),
                });
            }
            other => {
                self.error_at_current(format!("expected an expression, got `{other}`"));
                return None;
            }
        };
        Some(Expr { kind, span })
    }

    /// Arguments after the opening `(`, through the closing `)`.
    fn parse_args(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Some(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(args)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}
