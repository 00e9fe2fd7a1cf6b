//! Recursive descent parser for WMS scripts
//!
//! Produces a [`Program`] from source text. Statements carry the line they
//! start on; `else` and `else if` come out as standalone siblings of the
//! preceding `if`, and the evaluator checks their ordering at run time.

use crate::ast::{
    AssignTarget, BinOp, Expr, ForLoop, Func, Line, LineIndex, Program, Span, Stmt, StmtKind,
    Term,
};
use crate::error::{Result, WmsError};
use crate::lexer::{tokenize, Token};


/// Stack growth parameters for deeply nested blocks and expressions
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Binary operator levels, loosest first
const PRECEDENCE: &[&[BinOp]] = &[
    &[BinOp::Or],
    &[BinOp::And],
    &[BinOp::Eq, BinOp::Neq],
    &[BinOp::Lt, BinOp::Lte, BinOp::Gt, BinOp::Gte],
    &[BinOp::Plus, BinOp::Minus],
    &[BinOp::Mul, BinOp::Div, BinOp::Mod],
];

fn binary_op(token: &Token) -> Option<BinOp> {
    Some(match token {
        Token::PipePipe => BinOp::Or,
        Token::AmpAmp => BinOp::And,
        Token::EqEq => BinOp::Eq,
        Token::NotEq => BinOp::Neq,
        Token::Lt => BinOp::Lt,
        Token::LtEq => BinOp::Lte,
        Token::Gt => BinOp::Gt,
        Token::GtEq => BinOp::Gte,
        Token::Plus => BinOp::Plus,
        Token::Minus => BinOp::Minus,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Percent => BinOp::Mod,
        _ => return None,
    })
}

/// Parse a whole script
pub fn parse(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    Parser::new(source, tokens).parse_program()
}

/// Parse a single expression, e.g. for a host evaluating a snippet
pub fn parse_expr(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    let expr = parser.parse_expr()?;
    if let Some(token) = parser.current() {
        return Err(parser.error(format!("unexpected `{token}` after expression")));
    }
    Ok(expr)
}

/// Parser state
struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    index: LineIndex,
    /// Span used for errors at end of input
    eof: Span,
    /// Loops enclosing the current statement
    loop_depth: usize,
}

impl Parser {
    fn new(source: &str, tokens: Vec<(Token, Span)>) -> Self {
        Parser {
            tokens,
            pos: 0,
            index: LineIndex::new(source),
            eof: Span::new(source.len(), source.len()),
            loop_depth: 0,
        }
    }

    // ============ Cursor ============

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map_or(self.eof, |(_, s)| *s)
    }

    fn current_line(&self) -> Line {
        self.index.line(self.current_span().start)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.current() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{token}`")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.current() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn error(&self, message: impl Into<String>) -> WmsError {
        WmsError::syntax(message, self.current_span(), &self.index)
    }

    fn unexpected(&self, expected: &str) -> WmsError {
        match self.current() {
            Some(token) => self.error(format!("expected {expected}, found `{token}`")),
            None => self.error(format!("expected {expected}, found end of input")),
        }
    }

    // ============ Items ============

    fn parse_program(mut self) -> Result<Program> {
        let mut program = Program::default();
        while self.current().is_some() {
            program.funcs.push(self.parse_func()?);
        }
        Ok(program)
    }

    fn parse_func(&mut self) -> Result<Func> {
        let line = self.current_line();
        if !self.eat(&Token::Func) {
            return Err(self.unexpected("`func`"));
        }
        let name = self.expect_ident("function name")?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.expect_ident("parameter name")?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        self.loop_depth = 0;
        let body = self.parse_block()?;
        Ok(Func {
            name,
            params,
            body,
            line,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.parse_block_inner())
    }

    fn parse_block_inner(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.current().is_none() {
                return Err(self.unexpected("`}`"));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    // ============ Statements ============

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let line = self.current_line();
        let kind = match self.current() {
            Some(Token::Semi) => {
                self.pos += 1;
                StmtKind::Empty
            }
            Some(Token::If) => {
                self.pos += 1;
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                StmtKind::If { cond, body }
            }
            Some(Token::Else) => {
                self.pos += 1;
                if self.eat(&Token::If) {
                    let cond = self.parse_condition()?;
                    let body = self.parse_block()?;
                    StmtKind::Elif { cond, body }
                } else {
                    StmtKind::Else {
                        body: self.parse_block()?,
                    }
                }
            }
            Some(Token::While) => {
                self.pos += 1;
                let cond = self.parse_condition()?;
                let body = self.parse_loop_body()?;
                StmtKind::While { cond, body }
            }
            Some(Token::For) => {
                self.pos += 1;
                StmtKind::For(self.parse_for()?)
            }
            Some(Token::Return) => {
                self.pos += 1;
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Token::Semi)?;
                StmtKind::Return(value)
            }
            Some(Token::Break) | Some(Token::Continue) => {
                let kind = if self.check(&Token::Break) {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                };
                if self.loop_depth == 0 {
                    let keyword = if matches!(kind, StmtKind::Break) { "break" } else { "continue" };
                    return Err(self.error(format!("`{keyword}` outside of a loop")));
                }
                self.pos += 1;
                self.expect(&Token::Semi)?;
                kind
            }
            Some(Token::Ident(_)) => self.parse_assign_or_expr()?,
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt::new(kind, line))
    }

    fn parse_condition(&mut self) -> Result<Expr> {
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        Ok(cond)
    }

    /// `x = e;`, `x[k] = e;` or an expression statement starting with a name
    fn parse_assign_or_expr(&mut self) -> Result<StmtKind> {
        let start = self.pos;
        let symbol = self.expect_ident("name")?;

        let target = if self.eat(&Token::Eq) {
            Some(AssignTarget::Scalar(symbol))
        } else if self.eat(&Token::LBracket) {
            let subscript = self.parse_expr()?;
            self.expect(&Token::RBracket)?;
            if self.eat(&Token::Eq) {
                Some(AssignTarget::Element { symbol, subscript })
            } else {
                None
            }
        } else {
            None
        };

        let kind = match target {
            Some(target) => StmtKind::Assign {
                target,
                value: self.parse_expr()?,
            },
            None => {
                // not an assignment; read it again as an expression
                self.pos = start;
                StmtKind::Expr(self.parse_expr()?)
            }
        };
        self.expect(&Token::Semi)?;
        Ok(kind)
    }

    /// `(i in a .. b)` or `(k, v in array)` followed by the body
    fn parse_for(&mut self) -> Result<ForLoop> {
        self.expect(&Token::LParen)?;
        let first = self.expect_ident("loop variable")?;
        if self.eat(&Token::Comma) {
            let value = self.expect_ident("value variable")?;
            self.expect(&Token::In)?;
            let array = self.parse_expr()?;
            self.expect(&Token::RParen)?;
            let body = self.parse_loop_body()?;
            return Ok(ForLoop::Each {
                key: first,
                value,
                array,
                body,
            });
        }
        self.expect(&Token::In)?;
        let start = self.parse_expr()?;
        self.expect(&Token::DotDot)?;
        let end = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(ForLoop::Range {
            var: first,
            start,
            end,
            body,
        })
    }

    // ============ Expressions ============

    fn parse_expr(&mut self) -> Result<Expr> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.parse_binary(0))
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr> {
        let Some(ops) = PRECEDENCE.get(level) else {
            return self.parse_unary();
        };
        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = self.current().and_then(binary_op).filter(|op| ops.contains(op)) {
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if !self.eat(&Token::Minus) {
            return self.parse_primary();
        }
        // the magnitude of i64::MIN only fits once negated
        if self.current() == Some(&Token::IntLit(i64::MIN.unsigned_abs())) {
            self.pos += 1;
            return Ok(Expr::Term(Term::Int(i64::MIN)));
        }
        let operand = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.parse_unary())?;
        Ok(match operand {
            Expr::Term(Term::Int(n)) => Expr::Term(Term::Int(n.wrapping_neg())),
            Expr::Term(Term::Float(f)) => Expr::Term(Term::Float(-f)),
            other => Expr::Neg(Box::new(other)),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = match self.current() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("expression")),
        };
        let term = match token {
            Token::IntLit(n) => match i64::try_from(n) {
                Ok(n) => Term::Int(n),
                Err(_) => return Err(self.error("integer literal out of range")),
            },
            Token::FloatLit(f) => Term::Float(f),
            Token::StringLit(s) => Term::Str(s),
            Token::True => Term::Int(1),
            Token::False => Term::Int(0),
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::Ident(name) => {
                self.pos += 1;
                return self.parse_name(name);
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::Term(term))
    }

    /// Variable, element access or call after its name
    fn parse_name(&mut self, name: String) -> Result<Expr> {
        if self.eat(&Token::LParen) {
            let mut args = Vec::new();
            if !self.check(&Token::RParen) {
                loop {
                    args.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::RParen)?;
            return Ok(Expr::Term(Term::Call { name, args }));
        }
        if self.eat(&Token::LBracket) {
            let subscript = self.parse_expr()?;
            self.expect(&Token::RBracket)?;
            return Ok(Expr::Term(Term::Index {
                symbol: name,
                subscript: Box::new(subscript),
            }));
        }
        Ok(Expr::Term(Term::Symbol(name)))
    }
}
