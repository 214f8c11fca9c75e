//! Syntax tree produced by the reader.
//!
//! Nodes are immutable and shared through `Arc`, so macro expansion builds new
//! trees around untouched subtrees instead of copying them.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::source::SourceId;

pub mod parser;

pub use parser::{is_source_language, read, read_all, Reader};

/// Byte range inside one source file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub file: SourceId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(file: SourceId, start: usize, end: usize) -> Self {
        Self { file, start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both, assuming the same file.
    pub fn join(self, other: Span) -> Span {
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

pub type AstNode = Spanned<Arc<Expr>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Symbol(String),
    Keyword(String),
    String(String),
    Number(f64),
    Bool(bool),
    Nil,
    List(Vec<AstNode>),
    Vector(Vec<AstNode>),
    Map(Vec<(AstNode, AstNode)>),
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

pub fn node(expr: Expr, span: Span) -> AstNode {
    Spanned {
        value: Arc::new(expr),
        span,
    }
}

pub fn make_symbol(name: &str, span: Span) -> AstNode {
    node(Expr::Symbol(name.to_string()), span)
}

pub fn make_list(items: Vec<AstNode>, span: Span) -> AstNode {
    node(Expr::List(items), span)
}

/// `(head inner)`, the shape every reader macro desugars to.
pub fn make_wrapped(head: &str, inner: AstNode, span: Span) -> AstNode {
    make_list(vec![make_symbol(head, span), inner], span)
}

// ============================================================================
// ACCESSORS
// ============================================================================

impl Expr {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AstNode]> {
        match self {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Items of a list or vector.
    pub fn as_sequence(&self) -> Option<&[AstNode]> {
        match self {
            Expr::List(items) | Expr::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Symbol at the head of a non-empty list.
    pub fn head_symbol(&self) -> Option<&str> {
        self.as_list()?.first()?.value.as_symbol()
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Symbol(_) => "symbol",
            Expr::Keyword(_) => "keyword",
            Expr::String(_) => "string",
            Expr::Number(_) => "number",
            Expr::Bool(_) => "boolean",
            Expr::Nil => "nil",
            Expr::List(_) => "list",
            Expr::Vector(_) => "vector",
            Expr::Map(_) => "map",
        }
    }
}

/// Structural equality that ignores spans.
pub fn same_shape(a: &AstNode, b: &AstNode) -> bool {
    if Arc::ptr_eq(&a.value, &b.value) {
        return true;
    }
    match (&*a.value, &*b.value) {
        (Expr::List(xs), Expr::List(ys)) | (Expr::Vector(xs), Expr::Vector(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_shape(x, y))
        }
        (Expr::Map(xs), Expr::Map(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|((k1, v1), (k2, v2))| same_shape(k1, k2) && same_shape(v1, v2))
        }
        (x, y) => x == y,
    }
}

// ============================================================================
// PRINTING
// ============================================================================

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[AstNode], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item.value)?;
    }
    write!(f, "{close}")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Keyword(k) => write!(f, ":{k}"),
            Expr::String(s) => write!(f, "{s:?}"),
            Expr::Number(n) => write!(f, "{}", format_number(*n)),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Nil => write!(f, "nil"),
            Expr::List(items) => write_seq(f, "(", items, ")"),
            Expr::Vector(items) => write_seq(f, "[", items, "]"),
            Expr::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{} {}", k.value, v.value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Spanned<Arc<Expr>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
