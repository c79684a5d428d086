//! Quill checker: resolves names, checks types and builds the
//! [`Compilation`] from parsed sources.
//!
//! Entry point: [`Checker::check`].
//!
//! Codes emitted:
//! - `UNDEFINED_NAME`, `UNDEFINED_CALLABLE`, `AMBIGUOUS_CALLABLE`,
//!   `UNKNOWN_NAMESPACE`, `DUPLICATE_CALLABLE`, `VARIABLE_ALREADY_DECLARED`,
//!   `CALLABLE_AS_VALUE`
//! - `TYPE_MISMATCH`, `WRONG_ARG_COUNT`, `INVALID_OPERATOR`,
//!   `IMMUTABLE_ASSIGNMENT`, `MISSING_RETURN`, `OPERATION_IN_FUNCTION`
//! - `MISSING_ENTRY_POINT`, `ENTRY_POINT_PARAMETERS`, `ENTRY_POINT_IN_LIBRARY`,
//!   `UNKNOWN_ATTRIBUTE`, `UNUSED_VARIABLE`

use std::collections::{HashMap, HashSet};

use quill_types::ast::{self, AssignOp, BinaryOp, CallableKind, UnaryOp};
use quill_types::tree::{
    self, Callable, CallableBody, Compilation, ExprKind, Namespace, Param, QualifiedName,
    Signature, Type, TypedExpr,
};
use quill_types::{Diagnostic, DiagnosticCode, Span};

use crate::env::LocalEnv;

/// The only attribute Quill understands.
pub(crate) const ENTRY_POINT_ATTRIBUTE: &str = "EntryPoint";

/// One parsed source file.
pub(crate) struct ParsedSource {
    pub id: String,
    pub unit: ast::SourceUnit,
}

#[derive(Debug, Clone)]
struct CallableInfo {
    kind: CallableKind,
    signature: Signature,
}

/// Per-callable state while checking a body.
struct BodyCx<'a> {
    source: &'a str,
    namespace: &'a str,
    opens: &'a [String],
    kind: CallableKind,
    return_type: Type,
    env: LocalEnv,
}

enum Lookup {
    Found(QualifiedName),
    Ambiguous(Vec<QualifiedName>),
    UnknownNamespace(String),
    Missing,
}

// ══════════════════════════════════════════════════════════════════════════════
// Checker
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) struct Checker {
    callables: HashMap<QualifiedName, CallableInfo>,
    namespaces: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    pub fn new() -> Self {
        Self {
            callables: HashMap::new(),
            namespaces: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Check every source against the loaded references.
    ///
    /// The returned compilation lists reference namespaces first. It is only
    /// meaningful when no error diagnostic was returned.
    pub fn check(
        mut self,
        references: Vec<Namespace>,
        sources: &[ParsedSource],
        is_executable: bool,
    ) -> (Compilation, Vec<Diagnostic>) {
        let mut built: HashSet<QualifiedName> = HashSet::new();

        // 1. Register reference declarations
        for ns in &references {
            self.namespaces.insert(ns.name.clone());
            for callable in &ns.callables {
                self.callables.insert(
                    callable.name.clone(),
                    CallableInfo {
                        kind: callable.kind,
                        signature: callable.signature.clone(),
                    },
                );
                built.insert(callable.name.clone());
            }
        }

        // 2. Register source declarations
        let mut declared: HashSet<QualifiedName> = HashSet::new();
        for source in sources {
            for ns in &source.unit.namespaces {
                let ns_name = ns.name.to_string();
                self.namespaces.insert(ns_name.clone());
                for decl in &ns.callables {
                    let name = QualifiedName::new(ns_name.as_str(), decl.name.name.as_str());
                    if self.callables.contains_key(&name) {
                        self.error(
                            &source.id,
                            DiagnosticCode::DUPLICATE_CALLABLE,
                            format!("`{name}` is declared more than once"),
                            decl.name.span,
                        );
                        continue;
                    }
                    self.callables.insert(
                        name.clone(),
                        CallableInfo {
                            kind: decl.kind,
                            signature: signature_of(decl),
                        },
                    );
                    declared.insert(name);
                }
            }
        }

        // 3. Check bodies and collect entry points
        let mut namespaces = references;
        let mut entry_points = Vec::new();
        let mut saw_entry_attribute = false;
        for source in sources {
            for ns in &source.unit.namespaces {
                let ns_name = ns.name.to_string();
                let opens = self.check_opens(&source.id, ns);
                for decl in &ns.callables {
                    let name = QualifiedName::new(ns_name.as_str(), decl.name.name.as_str());
                    if !declared.contains(&name) || !built.insert(name.clone()) {
                        continue;
                    }
                    let callable = self.check_callable(&source.id, &ns_name, &opens, decl);

                    if self.is_entry_point(&source.id, decl) {
                        saw_entry_attribute = true;
                        if !is_executable {
                            self.warning(
                                &source.id,
                                DiagnosticCode::ENTRY_POINT_IN_LIBRARY,
                                format!("entry point `{name}` is ignored when compiling a library"),
                                decl.name.span,
                            );
                        } else if !decl.params.is_empty() {
                            self.error(
                                &source.id,
                                DiagnosticCode::ENTRY_POINT_PARAMETERS,
                                format!("entry point `{name}` cannot take parameters"),
                                decl.name.span,
                            );
                        } else {
                            entry_points.push(name);
                        }
                    }

                    match namespaces.iter_mut().find(|n| n.name == ns_name) {
                        Some(existing) => existing.callables.push(callable),
                        None => namespaces.push(Namespace {
                            name: ns_name.clone(),
                            callables: vec![callable],
                        }),
                    }
                }
            }
        }

        if is_executable && !saw_entry_attribute {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::MISSING_ENTRY_POINT,
                format!("no callable is marked `@{ENTRY_POINT_ATTRIBUTE}()`; an executable needs exactly one"),
            ));
        }

        (
            Compilation {
                namespaces,
                entry_points,
            },
            self.diagnostics,
        )
    }

    // ══════════════════════════════════════════════════════════════════════
    // Declarations
    // ══════════════════════════════════════════════════════════════════════

    fn check_opens(&mut self, source: &str, ns: &ast::NamespaceDecl) -> Vec<String> {
        let mut opens: Vec<String> = Vec::new();
        for open in &ns.opens {
            let name = open.to_string();
            if !self.namespaces.contains(&name) {
                self.error(
                    source,
                    DiagnosticCode::UNKNOWN_NAMESPACE,
                    format!("no namespace named `{name}`"),
                    open.span,
                );
            } else if !opens.contains(&name) {
                opens.push(name);
            }
        }
        opens
    }

    fn is_entry_point(&mut self, source: &str, decl: &ast::CallableDecl) -> bool {
        let mut entry = false;
        for attribute in &decl.attributes {
            if attribute.name.name == ENTRY_POINT_ATTRIBUTE {
                entry = true;
            } else {
                self.warning(
                    source,
                    DiagnosticCode::UNKNOWN_ATTRIBUTE,
                    format!("unknown attribute `@{}()`", attribute.name.name),
                    attribute.span,
                );
            }
        }
        entry
    }

    fn check_callable(
        &mut self,
        source: &str,
        namespace: &str,
        opens: &[String],
        decl: &ast::CallableDecl,
    ) -> Callable {
        let signature = signature_of(decl);
        let mut cx = BodyCx {
            source,
            namespace,
            opens,
            kind: decl.kind,
            return_type: signature.return_type,
            env: LocalEnv::new(),
        };

        for param in &decl.params {
            if param.ty.ty == Type::Unit {
                self.error(
                    source,
                    DiagnosticCode::TYPE_MISMATCH,
                    format!("parameter `{}` cannot have type Unit", param.name.name),
                    param.ty.span,
                );
            }
            if cx
                .env
                .define(&param.name.name, param.ty.ty, false, param.name.span, false)
                .is_none()
            {
                self.error(
                    source,
                    DiagnosticCode::VARIABLE_ALREADY_DECLARED,
                    format!("parameter `{}` is declared twice", param.name.name),
                    param.name.span,
                );
            }
        }

        let body = self.check_block(&mut cx, &decl.body);

        if signature.return_type != Type::Unit && !always_returns(&decl.body) {
            self.error(
                source,
                DiagnosticCode::MISSING_RETURN,
                format!(
                    "`{}` must return a value of type {} on every path",
                    decl.name.name, signature.return_type
                ),
                decl.name.span,
            );
        }

        let unused: Vec<(String, Span)> = cx
            .env
            .unused()
            .map(|slot| (slot.decl.name.clone(), slot.span))
            .collect();
        for (name, span) in unused {
            self.warning(
                source,
                DiagnosticCode::UNUSED_VARIABLE,
                format!("variable `{name}` is never read"),
                span,
            );
        }

        Callable {
            name: QualifiedName::new(namespace, decl.name.name.as_str()),
            kind: decl.kind,
            source: source.to_string(),
            signature,
            locals: cx.env.into_locals(),
            body: CallableBody::Provided(body),
            span: decl.span,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn check_block(&mut self, cx: &mut BodyCx<'_>, block: &ast::Block) -> tree::Block {
        cx.env.push_scope();
        let stmts = block
            .stmts
            .iter()
            .filter_map(|stmt| self.check_stmt(cx, stmt))
            .collect();
        cx.env.pop_scope();
        tree::Block { stmts }
    }

    fn check_stmt(&mut self, cx: &mut BodyCx<'_>, stmt: &ast::Stmt) -> Option<tree::Stmt> {
        match &stmt.kind {
            ast::StmtKind::Let {
                name,
                mutable,
                value,
            } => {
                let value = self.check_expr(cx, value)?;
                if value.ty == Type::Unit {
                    self.error(
                        cx.source,
                        DiagnosticCode::TYPE_MISMATCH,
                        format!("cannot bind a value of type Unit to `{}`", name.name),
                        stmt.span,
                    );
                    return None;
                }
                match cx
                    .env
                    .define(&name.name, value.ty, *mutable, name.span, true)
                {
                    Some(local) => Some(tree::Stmt::Let { local, value }),
                    None => {
                        self.error(
                            cx.source,
                            DiagnosticCode::VARIABLE_ALREADY_DECLARED,
                            format!("`{}` is already declared in an enclosing scope", name.name),
                            name.span,
                        );
                        None
                    }
                }
            }

            ast::StmtKind::Set { name, op, value } => self.check_set(cx, name, *op, value),

            ast::StmtKind::If {
                branches,
                otherwise,
            } => {
                let mut checked = Vec::with_capacity(branches.len());
                let mut ok = true;
                for (cond, block) in branches {
                    let cond = self.check_expr_as(cx, cond, Type::Bool);
                    let block = self.check_block(cx, block);
                    match cond {
                        Some(cond) => checked.push((cond, block)),
                        None => ok = false,
                    }
                }
                let otherwise = otherwise.as_ref().map(|b| self.check_block(cx, b));
                ok.then_some(tree::Stmt::If {
                    branches: checked,
                    otherwise,
                })
            }

            ast::StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.check_expr_as(cx, start, Type::Int);
                let end = self.check_expr_as(cx, end, Type::Int);
                cx.env.push_scope();
                let local = cx.env.define(&var.name, Type::Int, false, var.span, false);
                if local.is_none() {
                    self.error(
                        cx.source,
                        DiagnosticCode::VARIABLE_ALREADY_DECLARED,
                        format!("`{}` is already declared in an enclosing scope", var.name),
                        var.span,
                    );
                }
                let body = self.check_block(cx, body);
                cx.env.pop_scope();
                Some(tree::Stmt::For {
                    local: local?,
                    start: start?,
                    end: end?,
                    body,
                })
            }

            ast::StmtKind::While { cond, body } => {
                let cond = self.check_expr_as(cx, cond, Type::Bool);
                let body = self.check_block(cx, body);
                Some(tree::Stmt::While { cond: cond?, body })
            }

            ast::StmtKind::Return(value) => match value {
                None => {
                    if cx.return_type != Type::Unit {
                        self.error(
                            cx.source,
                            DiagnosticCode::TYPE_MISMATCH,
                            format!("expected a return value of type {}", cx.return_type),
                            stmt.span,
                        );
                        return None;
                    }
                    Some(tree::Stmt::Return(None))
                }
                Some(value) => {
                    let expected = cx.return_type;
                    let value = self.check_expr_as(cx, value, expected)?;
                    Some(tree::Stmt::Return(Some(value)))
                }
            },

            ast::StmtKind::Fail(message) => {
                let message = self.check_expr_as(cx, message, Type::String)?;
                Some(tree::Stmt::Fail(message))
            }

            ast::StmtKind::Expr(expr) => {
                let expr = self.check_expr(cx, expr)?;
                Some(tree::Stmt::Expr(expr))
            }
        }
    }

    fn check_set(
        &mut self,
        cx: &mut BodyCx<'_>,
        name: &ast::Ident,
        op: AssignOp,
        value: &ast::Expr,
    ) -> Option<tree::Stmt> {
        let Some(local) = cx.env.lookup(&name.name) else {
            self.error(
                cx.source,
                DiagnosticCode::UNDEFINED_NAME,
                format!("cannot find variable `{}`", name.name),
                name.span,
            );
            self.check_expr(cx, value);
            return None;
        };
        let (ty, mutable) = {
            let slot = cx.env.slot(local)?;
            (slot.decl.ty, slot.decl.mutable)
        };
        if !mutable {
            self.error(
                cx.source,
                DiagnosticCode::IMMUTABLE_ASSIGNMENT,
                format!(
                    "cannot assign to `{}`; declare it with `mutable` instead of `let`",
                    name.name
                ),
                name.span,
            );
        }
        let value = self.check_expr(cx, value)?;
        let valid = match op {
            AssignOp::Assign => value.ty == ty,
            AssignOp::Add => value.ty == ty && matches!(ty, Type::Int | Type::String),
            AssignOp::Sub | AssignOp::Mul => value.ty == ty && ty == Type::Int,
        };
        if !valid {
            self.error(
                cx.source,
                DiagnosticCode::TYPE_MISMATCH,
                format!(
                    "cannot apply `{op}` to `{}` of type {ty} with a value of type {}",
                    name.name, value.ty
                ),
                name.span,
            );
            return None;
        }
        mutable.then_some(tree::Stmt::Set { local, op, value })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    fn check_expr_as(
        &mut self,
        cx: &mut BodyCx<'_>,
        expr: &ast::Expr,
        expected: Type,
    ) -> Option<TypedExpr> {
        let typed = self.check_expr(cx, expr)?;
        if typed.ty != expected {
            self.error(
                cx.source,
                DiagnosticCode::TYPE_MISMATCH,
                format!("expected {expected}, found {}", typed.ty),
                expr.span,
            );
            return None;
        }
        Some(typed)
    }

    fn check_expr(&mut self, cx: &mut BodyCx<'_>, expr: &ast::Expr) -> Option<TypedExpr> {
        match &expr.kind {
            ast::ExprKind::Int(value) => Some(TypedExpr::new(ExprKind::Int(*value), Type::Int)),
            ast::ExprKind::Bool(value) => {
                Some(TypedExpr::new(ExprKind::Bool(*value), Type::Bool))
            }
            ast::ExprKind::Str(value) => {
                Some(TypedExpr::new(ExprKind::Str(value.clone()), Type::String))
            }

            ast::ExprKind::Path(path) => {
                if path.is_simple() {
                    if let Some(local) = cx.env.lookup(&path.last().name) {
                        cx.env.mark_read(local);
                        let ty = cx.env.slot(local)?.decl.ty;
                        return Some(TypedExpr::new(ExprKind::Local(local), ty));
                    }
                }
                if matches!(self.lookup_callable(cx, path), Lookup::Found(_)) {
                    self.error(
                        cx.source,
                        DiagnosticCode::CALLABLE_AS_VALUE,
                        format!("`{path}` is a callable; call it with `{path}(...)`"),
                        path.span,
                    );
                } else {
                    self.error(
                        cx.source,
                        DiagnosticCode::UNDEFINED_NAME,
                        format!("cannot find variable `{path}`"),
                        path.span,
                    );
                }
                None
            }

            ast::ExprKind::Call { callee, args } => self.check_call(cx, callee, args),

            ast::ExprKind::Unary { op, operand } => {
                let operand = self.check_expr(cx, operand)?;
                let expected = match op {
                    UnaryOp::Neg => Type::Int,
                    UnaryOp::Not => Type::Bool,
                };
                if operand.ty != expected {
                    self.error(
                        cx.source,
                        DiagnosticCode::INVALID_OPERATOR,
                        format!("operator `{op}` cannot be applied to {}", operand.ty),
                        expr.span,
                    );
                    return None;
                }
                Some(TypedExpr::new(
                    ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    expected,
                ))
            }

            ast::ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expr(cx, lhs);
                let rhs = self.check_expr(cx, rhs);
                let (lhs, rhs) = (lhs?, rhs?);
                let Some(ty) = binary_result(*op, lhs.ty, rhs.ty) else {
                    self.error(
                        cx.source,
                        DiagnosticCode::INVALID_OPERATOR,
                        format!(
                            "operator `{op}` cannot be applied to {} and {}",
                            lhs.ty, rhs.ty
                        ),
                        expr.span,
                    );
                    return None;
                };
                Some(TypedExpr::new(
                    ExprKind::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                ))
            }

            ast::ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.check_expr_as(cx, cond, Type::Bool);
                let then = self.check_expr(cx, then);
                let otherwise_typed = self.check_expr(cx, otherwise);
                let (cond, then, otherwise_typed) = (cond?, then?, otherwise_typed?);
                if then.ty != otherwise_typed.ty {
                    self.error(
                        cx.source,
                        DiagnosticCode::TYPE_MISMATCH,
                        format!(
                            "conditional branches differ: {} and {}",
                            then.ty, otherwise_typed.ty
                        ),
                        otherwise.span,
                    );
                    return None;
                }
                let ty = then.ty;
                Some(TypedExpr::new(
                    ExprKind::Conditional {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise_typed),
                    },
                    ty,
                ))
            }
        }
    }

    fn check_call(
        &mut self,
        cx: &mut BodyCx<'_>,
        callee: &ast::Path,
        args: &[ast::Expr],
    ) -> Option<TypedExpr> {
        let target = self.resolve_callable(cx, callee);
        let typed_args: Vec<Option<TypedExpr>> =
            args.iter().map(|arg| self.check_expr(cx, arg)).collect();
        let target = target?;
        let info = self.callables.get(&target)?.clone();

        if cx.kind == CallableKind::Function && info.kind == CallableKind::Operation {
            self.error(
                cx.source,
                DiagnosticCode::OPERATION_IN_FUNCTION,
                format!("function cannot call operation `{target}`"),
                callee.span,
            );
        }

        if args.len() != info.signature.params.len() {
            self.error(
                cx.source,
                DiagnosticCode::WRONG_ARG_COUNT,
                format!(
                    "`{target}` takes {} argument(s) but {} were supplied",
                    info.signature.params.len(),
                    args.len()
                ),
                callee.span,
            );
            return None;
        }

        let mut checked = Vec::with_capacity(args.len());
        let mut ok = true;
        for ((typed, arg), param) in typed_args.into_iter().zip(args).zip(&info.signature.params)
        {
            match typed {
                Some(typed) if typed.ty == param.ty => checked.push(typed),
                Some(typed) => {
                    self.error(
                        cx.source,
                        DiagnosticCode::TYPE_MISMATCH,
                        format!(
                            "argument `{}` of `{target}` expects {}, found {}",
                            param.name, param.ty, typed.ty
                        ),
                        arg.span,
                    );
                    ok = false;
                }
                None => ok = false,
            }
        }
        if !ok {
            return None;
        }
        Some(TypedExpr::new(
            ExprKind::Call {
                callee: target,
                args: checked,
            },
            info.signature.return_type,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Callable resolution
    // ══════════════════════════════════════════════════════════════════════

    /// Qualified names are looked up directly. A simple name is looked up in
    /// the current namespace first, then in the opened namespaces.
    fn lookup_callable(&self, cx: &BodyCx<'_>, path: &ast::Path) -> Lookup {
        let name = path.last().name.as_str();
        if let Some(namespace) = path.qualifier() {
            let qualified = QualifiedName::new(namespace.as_str(), name);
            if self.callables.contains_key(&qualified) {
                return Lookup::Found(qualified);
            }
            if !self.namespaces.contains(&namespace) {
                return Lookup::UnknownNamespace(namespace);
            }
            return Lookup::Missing;
        }

        let local = QualifiedName::new(cx.namespace, name);
        if self.callables.contains_key(&local) {
            return Lookup::Found(local);
        }
        let mut found: Vec<QualifiedName> = cx
            .opens
            .iter()
            .map(|open| QualifiedName::new(open.as_str(), name))
            .filter(|candidate| self.callables.contains_key(candidate))
            .collect();
        match found.len() {
            0 => Lookup::Missing,
            1 => Lookup::Found(found.remove(0)),
            _ => Lookup::Ambiguous(found),
        }
    }

    fn resolve_callable(&mut self, cx: &BodyCx<'_>, path: &ast::Path) -> Option<QualifiedName> {
        match self.lookup_callable(cx, path) {
            Lookup::Found(name) => Some(name),
            Lookup::Ambiguous(candidates) => {
                let listed: Vec<String> = candidates.iter().map(ToString::to_string).collect();
                self.error(
                    cx.source,
                    DiagnosticCode::AMBIGUOUS_CALLABLE,
                    format!(
                        "`{path}` is ambiguous; candidates: {}",
                        listed.join(", ")
                    ),
                    path.span,
                );
                None
            }
            Lookup::UnknownNamespace(namespace) => {
                self.error(
                    cx.source,
                    DiagnosticCode::UNKNOWN_NAMESPACE,
                    format!("no namespace named `{namespace}`"),
                    path.span,
                );
                None
            }
            Lookup::Missing => {
                self.error(
                    cx.source,
                    DiagnosticCode::UNDEFINED_CALLABLE,
                    format!("cannot find callable `{path}`"),
                    path.span,
                );
                None
            }
        }
    }

    // ── Reporting ──

    fn error(&mut self, source: &str, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(code, message).at(source, span));
    }

    fn warning(
        &mut self,
        source: &str,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Span,
    ) {
        self.diagnostics
            .push(Diagnostic::warning(code, message).at(source, span));
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn signature_of(decl: &ast::CallableDecl) -> Signature {
    Signature {
        params: decl
            .params
            .iter()
            .map(|p| Param {
                name: p.name.name.clone(),
                ty: p.ty.ty,
            })
            .collect(),
        return_type: decl.return_type.ty,
    }
}

fn binary_result(op: BinaryOp, lhs: Type, rhs: Type) -> Option<Type> {
    match (op, lhs, rhs) {
        (BinaryOp::Add, Type::Int, Type::Int) => Some(Type::Int),
        (BinaryOp::Add, Type::String, Type::String) => Some(Type::String),
        (BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod, Type::Int, Type::Int) => {
            Some(Type::Int)
        }
        (op, Type::Int, Type::Int) if op.is_comparison() => Some(Type::Bool),
        (op, l, r) if op.is_equality() && l == r && l != Type::Unit => Some(Type::Bool),
        (op, Type::Bool, Type::Bool) if op.is_logical() => Some(Type::Bool),
        _ => None,
    }
}

/// `true` if control can never reach the end of the block.
fn always_returns(block: &ast::Block) -> bool {
    block.stmts.iter().any(|stmt| match &stmt.kind {
        ast::StmtKind::Return(_) | ast::StmtKind::Fail(_) => true,
        ast::StmtKind::If {
            branches,
            otherwise: Some(otherwise),
        } => branches.iter().all(|(_, b)| always_returns(b)) && always_returns(otherwise),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_concatenation_and_equality() {
        assert_eq!(
            binary_result(BinaryOp::Add, Type::String, Type::String),
            Some(Type::String)
        );
        assert_eq!(
            binary_result(BinaryOp::Eq, Type::String, Type::String),
            Some(Type::Bool)
        );
        assert_eq!(binary_result(BinaryOp::Sub, Type::String, Type::String), None);
        assert_eq!(binary_result(BinaryOp::Eq, Type::Unit, Type::Unit), None);
        assert_eq!(binary_result(BinaryOp::Lt, Type::Bool, Type::Bool), None);
        assert_eq!(
            binary_result(BinaryOp::And, Type::Bool, Type::Bool),
            Some(Type::Bool)
        );
    }
}
