//! Runtime errors for the interpreter

use std::fmt;

/// Runtime error during interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Line of the innermost statement that was executing, once known
    pub line: Option<u32>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Undefined variable
    UndefinedVariable,
    /// Undefined function
    UndefinedFunction,
    /// `else`/`else if` without a preceding `if`
    MisplacedElse,
    /// Operand or argument of the wrong type
    TypeError,
    /// Division or modulo by zero
    DivisionByZero,
    /// String or array pool is full
    PoolExhausted,
    /// Call depth limit reached
    StackOverflow,
    /// Array element lookup for a key that is not present
    KeyNotFound,
    /// Intrinsic or accessor called without a required argument
    MissingArgument,
    /// Bad foreign-function registration
    Registration,
    /// Raised by a host function
    Foreign,
    /// Handle that does not refer to a live pool slot
    InvalidHandle,
}

/// Error classes reported to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    TypeError,
    NameError,
    RangeError,
    KeyOrArityError,
    ForeignError,
    InternalError,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::TypeError => ErrorClass::TypeError,
            ErrorKind::UndefinedVariable
            | ErrorKind::UndefinedFunction
            | ErrorKind::MisplacedElse => ErrorClass::NameError,
            ErrorKind::DivisionByZero | ErrorKind::PoolExhausted | ErrorKind::StackOverflow => {
                ErrorClass::RangeError
            }
            ErrorKind::KeyNotFound | ErrorKind::MissingArgument => ErrorClass::KeyOrArityError,
            ErrorKind::Registration | ErrorKind::Foreign => ErrorClass::ForeignError,
            ErrorKind::InvalidHandle => ErrorClass::InternalError,
        }
    }
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: String) -> Self {
        RuntimeError {
            kind,
            message,
            line: None,
        }
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("variable not found: {name}"))
    }

    pub fn undefined_function(name: &str, hint: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedFunction,
            format!("function not found: {name}{hint}"),
        )
    }

    pub fn else_if_before_if() -> Self {
        Self::new(ErrorKind::MisplacedElse, "else if before if".to_string())
    }

    pub fn else_before_if() -> Self {
        Self::new(ErrorKind::MisplacedElse, "else before if".to_string())
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::TypeError,
            format!("type error: expected {expected}, got {got}"),
        )
    }

    pub fn operand_error(op: &str, lhs: &str, rhs: &str) -> Self {
        Self::new(
            ErrorKind::TypeError,
            format!("type error: unsupported operands for {op}: {lhs} and {rhs}"),
        )
    }

    pub fn array_expected(got: &str) -> Self {
        Self::new(ErrorKind::TypeError, format!("array expected, got {got}"))
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero".to_string())
    }

    pub fn pool_exhausted(pool: &str, capacity: usize) -> Self {
        Self::new(
            ErrorKind::PoolExhausted,
            format!("{pool} pool exhausted ({capacity} slots)"),
        )
    }

    pub fn stack_overflow(depth: usize) -> Self {
        Self::new(
            ErrorKind::StackOverflow,
            format!("stack overflow: call depth exceeds {depth}"),
        )
    }

    pub fn key_not_found(key: &str) -> Self {
        Self::new(ErrorKind::KeyNotFound, format!("key not found: {key}"))
    }

    pub fn missing_argument(func: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::MissingArgument,
            format!("{func} expects {expected} argument(s), got {got}"),
        )
    }

    pub fn registration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Registration, message.into())
    }

    pub fn foreign(func: &str, message: &str) -> Self {
        Self::new(ErrorKind::Foreign, format!("{func}: {message}"))
    }

    pub fn invalid_handle(what: &str) -> Self {
        Self::new(ErrorKind::InvalidHandle, format!("invalid {what} handle"))
    }

    /// Attach a source line unless an inner statement already did
    pub fn at_line(mut self, line: u32) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Runtime error at line {line}: {}", self.message),
            None => write!(f, "Runtime error: {}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;
