//! The Program Representation: the resolved, typed form of a whole
//! compilation, handed from the front-end to rewrite steps.
//!
//! A [`Compilation`] is immutable once built. Rewrite steps receive it behind
//! an `Arc` and either return it unchanged or return a new value.

use crate::ast::{AssignOp, BinaryOp, CallableKind, UnaryOp};
use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value types of the Quill language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Unit,
    Int,
    Bool,
    String,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "Unit"),
            Self::Int => write!(f, "Int"),
            Self::Bool => write!(f, "Bool"),
            Self::String => write!(f, "String"),
        }
    }
}

/// Fully qualified callable name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compilation {
    /// Namespaces in load order: references first, then sources.
    pub namespaces: Vec<Namespace>,
    /// Entry points in declaration order. Empty for a library.
    pub entry_points: Vec<QualifiedName>,
}

impl Compilation {
    /// Every source identifier that declares a callable, in first-appearance
    /// order. A source declaring only empty namespaces is not listed.
    pub fn source_files(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for callable in self.callables() {
            if !seen.contains(&callable.source.as_str()) {
                seen.push(&callable.source);
            }
        }
        seen
    }

    /// All callables across all namespaces, in load order.
    pub fn callables(&self) -> impl Iterator<Item = &Callable> {
        self.namespaces.iter().flat_map(|ns| ns.callables.iter())
    }

    pub fn callable(&self, name: &QualifiedName) -> Option<&Callable> {
        self.namespaces
            .iter()
            .find(|ns| ns.name == name.namespace)
            .and_then(|ns| ns.callables.iter().find(|c| c.name.name == name.name))
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    pub fn is_executable(&self) -> bool {
        !self.entry_points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub callables: Vec<Callable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callable {
    pub name: QualifiedName,
    pub kind: CallableKind,
    /// Declaring-source identifier: a source file name or a reference name.
    pub source: String,
    pub signature: Signature,
    /// Every local slot of the body; parameters occupy the first slots.
    pub locals: Vec<LocalDecl>,
    pub body: CallableBody,
    pub span: Span,
}

impl Callable {
    pub fn local(&self, id: LocalId) -> Option<&LocalDecl> {
        self.locals.get(id.0 as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Param>,
    pub return_type: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallableBody {
    /// Provided by a prebuilt reference; there is nothing to lower.
    Intrinsic,
    Provided(Block),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let {
        local: LocalId,
        value: TypedExpr,
    },
    Set {
        local: LocalId,
        op: AssignOp,
        value: TypedExpr,
    },
    If {
        branches: Vec<(TypedExpr, Block)>,
        otherwise: Option<Block>,
    },
    For {
        local: LocalId,
        start: TypedExpr,
        end: TypedExpr,
        body: Block,
    },
    While {
        cond: TypedExpr,
        body: Block,
    },
    Return(Option<TypedExpr>),
    Fail(TypedExpr),
    Expr(TypedExpr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedExpr {
    pub kind: ExprKind,
    pub ty: Type,
}

impl TypedExpr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Str(String),
    Local(LocalId),
    Call {
        callee: QualifiedName,
        args: Vec<TypedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<TypedExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    Conditional {
        cond: Box<TypedExpr>,
        then: Box<TypedExpr>,
        otherwise: Box<TypedExpr>,
    },
}
