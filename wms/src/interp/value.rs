//! Runtime values for the interpreter
//!
//! Strings and arrays live in the [`Heap`](super::Heap); a [`Value`] only
//! carries a handle to them. Handle-carrying values are deliberately not
//! `Clone`: every alias must be minted with [`Heap::retain`](super::Heap::retain)
//! and given back with [`Heap::release`](super::Heap::release), which keeps the
//! slot's reference count equal to the number of live aliases.

use std::fmt;

/// Index of a pool slot plus the generation it was allocated in.
///
/// A slot's generation changes when it is freed, so a handle that outlived
/// its slot is detected instead of silently aliasing whatever reuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Handle {
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Counted reference to a string pool slot
#[derive(Debug, PartialEq, Eq)]
pub struct StrRef(pub(crate) Handle);

/// Counted reference to an array head in the cell pool
#[derive(Debug, PartialEq, Eq)]
pub struct ArrayRef(pub(crate) Handle);

impl StrRef {
    pub fn handle(&self) -> Handle {
        self.0
    }
}

impl ArrayRef {
    pub fn handle(&self) -> Handle {
        self.0
    }
}

/// Runtime value
///
/// Equality on the handle variants is identity (same slot), not content.
#[derive(Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(StrRef),
    Array(ArrayRef),
}

impl Value {
    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Array(_) => "array",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float view, promoting ints
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Truth value of a numeric value; `None` for strings and arrays
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Int(n) => Some(*n != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Str(_) | Value::Array(_) => None,
        }
    }

    pub fn from_bool(b: bool) -> Self {
        Value::Int(i64::from(b))
    }

    /// Whether this value holds a pool reference
    pub fn is_counted(&self) -> bool {
        matches!(self, Value::Str(_) | Value::Array(_))
    }

    /// Whether this value may be used as an array key
    pub fn is_key(&self) -> bool {
        !matches!(self, Value::Array(_))
    }
}

/// Borrowed scalar accepted by host-facing setters and as array keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Int(i64),
    Float(f64),
    Str(&'a str),
}

impl From<i64> for Scalar<'_> {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<f64> for Scalar<'_> {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl<'a> From<&'a str> for Scalar<'a> {
    fn from(s: &'a str) -> Self {
        Scalar::Str(s)
    }
}

impl fmt::Display for Scalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(x) => f.write_str(&format_float(*x)),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// Stringify a float the way C's `%f` does
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        let text = if f.is_sign_negative() { "-nan" } else { "nan" };
        return text.to_string();
    }
    format!("{f:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        let h = Handle { index: 0, generation: 0 };
        assert_eq!(Value::Str(StrRef(h)).type_name(), "str");
        assert_eq!(Value::Array(ArrayRef(h)).type_name(), "array");
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(Value::Int(0).truthiness(), Some(false));
        assert_eq!(Value::Int(-3).truthiness(), Some(true));
        assert_eq!(Value::Float(0.0).truthiness(), Some(false));
        assert_eq!(Value::Float(0.5).truthiness(), Some(true));
        let h = Handle { index: 1, generation: 0 };
        assert_eq!(Value::Str(StrRef(h)).truthiness(), None);
    }

    #[test]
    fn test_as_float_promotes() {
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Float(2.5).as_int(), None);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.5), "1.500000");
        assert_eq!(format_float(-0.25), "-0.250000");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(-f64::NAN), "-nan");
        assert_eq!(Scalar::Float(3.0).to_string(), "3.000000");
        assert_eq!(Scalar::Int(-4).to_string(), "-4");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }

    #[test]
    fn test_is_key() {
        let h = Handle { index: 0, generation: 0 };
        assert!(Value::Int(1).is_key());
        assert!(Value::Str(StrRef(h)).is_key());
        assert!(!Value::Array(ArrayRef(h)).is_key());
    }
}
