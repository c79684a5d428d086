//! Expression lowering.
//!
//! Every `emit_*` function leaves exactly the value of its expression on the
//! operand stack (nothing for `Unit`).

use quill_types::abi::{callable_symbol, CONCAT_FUNC, STR_EQ_FUNC};
use quill_types::ast::{BinaryOp, UnaryOp};
use quill_types::tree::{ExprKind, QualifiedName, Type, TypedExpr};

use crate::context::FuncContext;
use crate::error::{CodegenError, CodegenResult};
use crate::wat::{result_clause, WatWriter};

pub(crate) fn emit_expr(expr: &TypedExpr, f: &mut FuncContext, w: &mut WatWriter) -> CodegenResult<()> {
    match &expr.kind {
        ExprKind::Int(value) => w.line(format!("i64.const {value}")),
        ExprKind::Bool(value) => w.line(format!("i32.const {}", i32::from(*value))),
        ExprKind::Str(text) => {
            let offset = f.lowering.strings.intern(text)?;
            w.line(format!("i32.const {offset}"));
        }
        ExprKind::Local(id) => {
            if f.local_type(*id)? != Type::Unit {
                w.line(format!("local.get {}", f.local(*id)?));
            }
        }
        ExprKind::Call { callee, args } => emit_call(callee, args, f, w)?,
        ExprKind::Unary { op, operand } => emit_unary(*op, operand, f, w)?,
        ExprKind::Binary { op, lhs, rhs } => emit_binary(*op, lhs, rhs, f, w)?,
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            emit_expr(cond, f, w)?;
            w.begin(format!("if{}", result_clause(expr.ty)));
            emit_expr(then, f, w)?;
            w.middle("else");
            emit_expr(otherwise, f, w)?;
            w.end("end");
        }
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Calls
// ══════════════════════════════════════════════════════════════════════════════

fn emit_call(
    callee: &QualifiedName,
    args: &[TypedExpr],
    f: &mut FuncContext,
    w: &mut WatWriter,
) -> CodegenResult<()> {
    if f.lowering.callable(callee).is_none() {
        return Err(CodegenError::UnresolvedCallee {
            caller: f.callable.name.clone(),
            callee: callee.clone(),
        });
    }
    for arg in args {
        emit_expr(arg, f, w)?;
    }
    w.line(format!("call {}", callable_symbol(callee)));
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

fn emit_unary(op: UnaryOp, operand: &TypedExpr, f: &mut FuncContext, w: &mut WatWriter) -> CodegenResult<()> {
    match op {
        UnaryOp::Neg => {
            w.line("i64.const 0");
            emit_expr(operand, f, w)?;
            w.line("i64.sub");
        }
        UnaryOp::Not => {
            emit_expr(operand, f, w)?;
            w.line("i32.eqz");
        }
    }
    Ok(())
}

fn emit_binary(
    op: BinaryOp,
    lhs: &TypedExpr,
    rhs: &TypedExpr,
    f: &mut FuncContext,
    w: &mut WatWriter,
) -> CodegenResult<()> {
    // Short-circuit forms evaluate `rhs` conditionally.
    match op {
        BinaryOp::And => {
            emit_expr(lhs, f, w)?;
            w.begin("if (result i32)");
            emit_expr(rhs, f, w)?;
            w.middle("else");
            w.line("i32.const 0");
            w.end("end");
            return Ok(());
        }
        BinaryOp::Or => {
            emit_expr(lhs, f, w)?;
            w.begin("if (result i32)");
            w.line("i32.const 1");
            w.middle("else");
            emit_expr(rhs, f, w)?;
            w.end("end");
            return Ok(());
        }
        _ => {}
    }

    emit_expr(lhs, f, w)?;
    emit_expr(rhs, f, w)?;
    for instruction in binary_instructions(op, lhs.ty) {
        w.line(instruction);
    }
    Ok(())
}

/// Instructions that combine the two operands on the stack. `operand` is the
/// (shared) type of both sides.
pub(crate) fn binary_instructions(op: BinaryOp, operand: Type) -> Vec<String> {
    let single = |s: &str| vec![s.to_string()];
    match (op, operand) {
        (BinaryOp::Add, Type::String) => vec![format!("call {CONCAT_FUNC}")],
        (BinaryOp::Eq, Type::String) => vec![format!("call {STR_EQ_FUNC}")],
        (BinaryOp::Ne, Type::String) => vec![format!("call {STR_EQ_FUNC}"), "i32.eqz".into()],
        (BinaryOp::Eq, Type::Bool) => single("i32.eq"),
        (BinaryOp::Ne, Type::Bool) => single("i32.ne"),
        // Unit values are all equal.
        (BinaryOp::Eq, Type::Unit) => single("i32.const 1"),
        (BinaryOp::Ne, Type::Unit) => single("i32.const 0"),
        (BinaryOp::Add, _) => single("i64.add"),
        (BinaryOp::Sub, _) => single("i64.sub"),
        (BinaryOp::Mul, _) => single("i64.mul"),
        (BinaryOp::Div, _) => single("i64.div_s"),
        (BinaryOp::Mod, _) => single("i64.rem_s"),
        (BinaryOp::Eq, _) => single("i64.eq"),
        (BinaryOp::Ne, _) => single("i64.ne"),
        (BinaryOp::Lt, _) => single("i64.lt_s"),
        (BinaryOp::Le, _) => single("i64.le_s"),
        (BinaryOp::Gt, _) => single("i64.gt_s"),
        (BinaryOp::Ge, _) => single("i64.ge_s"),
        // Lowered by `emit_binary` before reaching here.
        (BinaryOp::And, _) => single("i32.and"),
        (BinaryOp::Or, _) => single("i32.or"),
    }
}
