//! Expression AST nodes

use serde::{Deserialize, Serialize};

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Term(Term),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Unary minus
    Neg(Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn int(n: i64) -> Self {
        Expr::Term(Term::Int(n))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::Term(Term::Str(s.into()))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Term(Term::Symbol(name.into()))
    }
}

/// Leaf of an expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Term {
    Int(i64),
    Float(f64),
    Str(String),
    /// Variable reference
    Symbol(String),
    /// `symbol[subscript]`
    Index { symbol: String, subscript: Box<Expr> },
    /// `name(args...)`
    Call { name: String, args: Vec<Expr> },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
