//! Abstract Syntax Tree definitions
//!
//! The tree is produced once by the front end (or by a host that builds it
//! directly) and handed to [`crate::interp::Runtime`], which owns it for the
//! rest of its life. Nothing in the evaluator mutates it.

mod expr;
mod span;

pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};

/// Source line, 1-based
pub type Line = u32;

/// A program is a list of function definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub funcs: Vec<Func>,
}

/// Function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: Line,
}

/// Statement with the line it starts on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: Line,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: Line) -> Self {
        Stmt { kind, line }
    }
}

/// Statement kinds.
///
/// `If`, `Elif` and `Else` are siblings in a statement list rather than one
/// nested construct; the evaluator links them through chain state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    /// `;`
    Empty,
    /// `expr;`
    Expr(Expr),
    /// `x = expr;` or `x[key] = expr;`
    Assign { target: AssignTarget, value: Expr },
    /// `if (cond) { ... }`
    If { cond: Expr, body: Vec<Stmt> },
    /// `else if (cond) { ... }`
    Elif { cond: Expr, body: Vec<Stmt> },
    /// `else { ... }`
    Else { body: Vec<Stmt> },
    /// `while (cond) { ... }`
    While { cond: Expr, body: Vec<Stmt> },
    /// `for (...) { ... }`
    For(ForLoop),
    /// `return;` or `return expr;`
    Return(Option<Expr>),
    Break,
    Continue,
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignTarget {
    Scalar(String),
    Element { symbol: String, subscript: Expr },
}

/// The two `for` forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForLoop {
    /// `for (var in start .. end)`, both bounds inclusive
    Range {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },
    /// `for (key, value in array)`
    Each {
        key: String,
        value: String,
        array: Expr,
        body: Vec<Stmt>,
    },
}

impl ForLoop {
    pub fn body(&self) -> &[Stmt] {
        match self {
            ForLoop::Range { body, .. } | ForLoop::Each { body, .. } => body,
        }
    }
}

/// Nested statement lists are torn down from a worklist, one level at a time
impl Drop for Func {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.body);
        while let Some(mut stmt) = pending.pop() {
            match &mut stmt.kind {
                StmtKind::If { body, .. }
                | StmtKind::Elif { body, .. }
                | StmtKind::Else { body }
                | StmtKind::While { body, .. }
                | StmtKind::For(ForLoop::Range { body, .. } | ForLoop::Each { body, .. }) => {
                    pending.append(body);
                }
                _ => {}
            }
        }
    }
}

impl Program {
    pub fn func(&self, name: &str) -> Option<&Func> {
        self.funcs.iter().find(|f| f.name == name)
    }
}
