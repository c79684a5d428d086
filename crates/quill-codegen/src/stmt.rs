//! Statement and callable lowering.

use quill_types::abi::{callable_symbol, CONCAT_FUNC, FAIL_FUNC};
use quill_types::ast::AssignOp;
use quill_types::tree::{Block, Callable, CallableBody, LocalId, Stmt, Type, TypedExpr};

use crate::context::{FuncContext, LoweringContext};
use crate::error::CodegenResult;
use crate::expr::emit_expr;
use crate::wat::{result_clause, WatWriter};

// ══════════════════════════════════════════════════════════════════════════════
// Callables
// ══════════════════════════════════════════════════════════════════════════════

/// Lower one callable with a body to a `(func ...)` field.
///
/// Returns `None` for intrinsics: their definitions come from a reference.
pub(crate) fn emit_callable<'c>(
    lowering: &mut LoweringContext<'c>,
    callable: &'c Callable,
) -> CodegenResult<Option<String>> {
    let CallableBody::Provided(block) = &callable.body else {
        return Ok(None);
    };
    let mut f = FuncContext::new(lowering, callable);

    // The body is lowered first: it decides which scratch locals exist.
    let mut body = WatWriter::with_depth(1);
    emit_block(block, &mut f, &mut body)?;
    if callable.signature.return_type != Type::Unit {
        // Every path has returned; validation needs the fallthrough closed.
        body.line("unreachable");
    }

    let mut head = format!("(func {}", callable_symbol(&callable.name));
    for param in f.param_declarations() {
        head.push(' ');
        head.push_str(&param);
    }
    head.push_str(&result_clause(callable.signature.return_type));

    let mut w = WatWriter::new();
    w.line(format!(";; {} {}", callable.kind, callable.name));
    w.begin(head);
    for local in f.local_declarations() {
        w.line(local);
    }
    w.raw(&body.finish());
    w.end(")");
    Ok(Some(w.finish()))
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

pub(crate) fn emit_block(block: &Block, f: &mut FuncContext, w: &mut WatWriter) -> CodegenResult<()> {
    for stmt in &block.stmts {
        emit_stmt(stmt, f, w)?;
    }
    Ok(())
}

pub(crate) fn emit_stmt(stmt: &Stmt, f: &mut FuncContext, w: &mut WatWriter) -> CodegenResult<()> {
    match stmt {
        Stmt::Let { local, value } => {
            emit_expr(value, f, w)?;
            emit_local_set(*local, f, w)?;
        }
        Stmt::Set { local, op, value } => emit_set(*local, *op, value, f, w)?,
        Stmt::If {
            branches,
            otherwise,
        } => emit_if(branches, otherwise.as_ref(), f, w)?,
        Stmt::For {
            local,
            start,
            end,
            body,
        } => emit_for(*local, start, end, body, f, w)?,
        Stmt::While { cond, body } => {
            let label = f.next_label();
            w.begin(format!("block $while#exit{label}"));
            w.begin(format!("loop $while#loop{label}"));
            emit_expr(cond, f, w)?;
            w.line("i32.eqz");
            w.line(format!("br_if $while#exit{label}"));
            emit_block(body, f, w)?;
            w.line(format!("br $while#loop{label}"));
            w.end("end");
            w.end("end");
        }
        Stmt::Return(value) => {
            if let Some(value) = value {
                emit_expr(value, f, w)?;
            }
            w.line("return");
        }
        Stmt::Fail(message) => {
            emit_expr(message, f, w)?;
            w.line(format!("call {FAIL_FUNC}"));
            w.line("unreachable");
        }
        Stmt::Expr(expr) => {
            emit_expr(expr, f, w)?;
            if expr.ty != Type::Unit {
                w.line("drop");
            }
        }
    }
    Ok(())
}

fn emit_local_set(local: LocalId, f: &mut FuncContext, w: &mut WatWriter) -> CodegenResult<()> {
    // Unit locals have no storage.
    if f.local_type(local)? != Type::Unit {
        w.line(format!("local.set {}", f.local(local)?));
    }
    Ok(())
}

fn emit_set(
    local: LocalId,
    op: AssignOp,
    value: &TypedExpr,
    f: &mut FuncContext,
    w: &mut WatWriter,
) -> CodegenResult<()> {
    let ty = f.local_type(local)?;
    let combine = match (op, ty) {
        (AssignOp::Assign, _) => None,
        (AssignOp::Add, Type::String) => Some(format!("call {CONCAT_FUNC}")),
        (AssignOp::Add, _) => Some("i64.add".to_string()),
        (AssignOp::Sub, _) => Some("i64.sub".to_string()),
        (AssignOp::Mul, _) => Some("i64.mul".to_string()),
    };
    if let Some(combine) = combine {
        w.line(format!("local.get {}", f.local(local)?));
        emit_expr(value, f, w)?;
        w.line(combine);
    } else {
        emit_expr(value, f, w)?;
    }
    emit_local_set(local, f, w)
}

fn emit_if(
    branches: &[(TypedExpr, Block)],
    otherwise: Option<&Block>,
    f: &mut FuncContext,
    w: &mut WatWriter,
) -> CodegenResult<()> {
    let Some(((cond, block), rest)) = branches.split_first() else {
        if let Some(block) = otherwise {
            emit_block(block, f, w)?;
        }
        return Ok(());
    };
    emit_expr(cond, f, w)?;
    w.begin("if");
    emit_block(block, f, w)?;
    if !rest.is_empty() || otherwise.is_some() {
        w.middle("else");
        // `elif` chains nest in the else arm.
        emit_if(rest, otherwise, f, w)?;
    }
    w.end("end");
    Ok(())
}

/// `for i in start..end { body }` with an inclusive bound evaluated once.
///
/// The exit test runs before the increment, so `end == i64::MAX` terminates.
fn emit_for(
    local: LocalId,
    start: &TypedExpr,
    end: &TypedExpr,
    body: &Block,
    f: &mut FuncContext,
    w: &mut WatWriter,
) -> CodegenResult<()> {
    let label = f.next_label();
    let counter = f.local(local)?.to_string();
    let bound = f.scratch_local("end", "i64");

    emit_expr(start, f, w)?;
    w.line(format!("local.set {counter}"));
    emit_expr(end, f, w)?;
    w.line(format!("local.set {bound}"));

    w.begin(format!("block $for#exit{label}"));
    w.line(format!("local.get {counter}"));
    w.line(format!("local.get {bound}"));
    w.line("i64.gt_s");
    w.line(format!("br_if $for#exit{label}"));
    w.begin(format!("loop $for#loop{label}"));
    emit_block(body, f, w)?;
    w.line(format!("local.get {counter}"));
    w.line(format!("local.get {bound}"));
    w.line("i64.ge_s");
    w.line(format!("br_if $for#exit{label}"));
    w.line(format!("local.get {counter}"));
    w.line("i64.const 1");
    w.line("i64.add");
    w.line(format!("local.set {counter}"));
    w.line(format!("br $for#loop{label}"));
    w.end("end");
    w.end("end");
    Ok(())
}
