//! Operator semantics
//!
//! Operators dispatch on the runtime types of both operands. `+` is
//! asymmetric: a string on the left concatenates the stringified right
//! operand, a string on the right is parsed as a number and added.

use super::error::{InterpResult, RuntimeError};
use super::heap::Heap;
use super::value::Value;
use crate::ast::BinOp;

/// Apply a binary operator, consuming both operands
pub fn binary(heap: &mut Heap, op: BinOp, lhs: Value, rhs: Value) -> InterpResult<Value> {
    let result = apply(heap, op, &lhs, &rhs);
    heap.release(lhs);
    heap.release(rhs);
    result
}

/// Unary minus, consuming the operand
pub fn negate(heap: &mut Heap, operand: Value) -> InterpResult<Value> {
    let result = match &operand {
        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(RuntimeError::type_error("int or float", other.type_name())),
    };
    heap.release(operand);
    result
}

fn apply(heap: &mut Heap, op: BinOp, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    match op {
        BinOp::Plus => plus(heap, lhs, rhs),
        BinOp::Minus | BinOp::Mul | BinOp::Div | BinOp::Mod => arithmetic(op, lhs, rhs),
        BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => compare(op, lhs, rhs),
        BinOp::Eq | BinOp::Neq => equality(heap, op, lhs, rhs),
        BinOp::And | BinOp::Or => logical(op, lhs, rhs),
    }
}

fn operand_error(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::operand_error(op.symbol(), lhs.type_name(), rhs.type_name())
}

fn plus(heap: &mut Heap, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(_) | Value::Int(_) | Value::Float(_)) => {
            let text = format!("{}{}", heap.str(a)?, heap.display(rhs)?);
            heap.alloc_string(text)
        }
        (Value::Int(a), Value::Str(b)) => Ok(Value::Int(a.wrapping_add(parse_int_prefix(heap.str(b)?)))),
        (Value::Float(a), Value::Str(b)) => Ok(Value::Float(a + parse_float_prefix(heap.str(b)?))),
        _ => arithmetic(BinOp::Plus, lhs, rhs),
    }
}

fn arithmetic(op: BinOp, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => float_arithmetic(op, a, b),
                _ => Err(operand_error(op, lhs, rhs)),
            }
        }
        _ => Err(operand_error(op, lhs, rhs)),
    }
}

fn int_arithmetic(op: BinOp, a: i64, b: i64) -> InterpResult<Value> {
    let n = match op {
        BinOp::Plus => a.wrapping_add(b),
        BinOp::Minus => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => return Err(RuntimeError::division_by_zero()),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        _ => return Err(RuntimeError::operand_error(op.symbol(), "int", "int")),
    };
    Ok(Value::Int(n))
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> InterpResult<Value> {
    let f = match op {
        BinOp::Plus => a + b,
        BinOp::Minus => a - b,
        BinOp::Mul => a * b,
        BinOp::Div | BinOp::Mod if b == 0.0 => return Err(RuntimeError::division_by_zero()),
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        _ => return Err(RuntimeError::operand_error(op.symbol(), "float", "float")),
    };
    Ok(Value::Float(f))
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(operand_error(op, lhs, rhs)),
            }
        }
        _ => return Err(operand_error(op, lhs, rhs)),
    };
    // NaN compares false under every operator
    let result = ordering.is_some_and(|ord| match op {
        BinOp::Lt => ord.is_lt(),
        BinOp::Lte => ord.is_le(),
        BinOp::Gt => ord.is_gt(),
        _ => ord.is_ge(),
    });
    Ok(Value::from_bool(result))
}

fn equality(heap: &Heap, op: BinOp, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    let equal = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => heap.str(a)? == heap.str(b)?,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            lhs.as_float() == rhs.as_float()
        }
        _ => return Err(operand_error(op, lhs, rhs)),
    };
    Ok(Value::from_bool(if op == BinOp::Eq { equal } else { !equal }))
}

fn logical(op: BinOp, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    match (lhs.truthiness(), rhs.truthiness()) {
        (Some(a), Some(b)) => Ok(Value::from_bool(if op == BinOp::And { a && b } else { a || b })),
        _ => Err(operand_error(op, lhs, rhs)),
    }
}

/// Integer prefix of `s` the way C's `atoi` reads it; 0 when there is none
pub fn parse_int_prefix(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut n: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        n = n.wrapping_mul(10).wrapping_add(i64::from(b - b'0'));
    }
    if negative { n.wrapping_neg() } else { n }
}

/// Floating prefix of `s` the way C's `atof` reads it; 0.0 when there is none
pub fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;

    fn heap() -> Heap {
        Heap::new(32, 32)
    }

    fn text(heap: &Heap, v: &Value) -> String {
        heap.text(v).expect("string value").to_string()
    }

    #[test]
    fn test_int_arithmetic() {
        let mut heap = heap();
        assert_eq!(binary(&mut heap, BinOp::Plus, Value::Int(2), Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(binary(&mut heap, BinOp::Minus, Value::Int(2), Value::Int(3)).unwrap(), Value::Int(-1));
        assert_eq!(binary(&mut heap, BinOp::Mul, Value::Int(4), Value::Int(3)).unwrap(), Value::Int(12));
        assert_eq!(binary(&mut heap, BinOp::Div, Value::Int(7), Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(binary(&mut heap, BinOp::Mod, Value::Int(7), Value::Int(2)).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        let mut heap = heap();
        assert_eq!(
            binary(&mut heap, BinOp::Plus, Value::Int(1), Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            binary(&mut heap, BinOp::Div, Value::Float(1.0), Value::Int(4)).unwrap(),
            Value::Float(0.25)
        );
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let mut heap = heap();
        for (op, lhs, rhs) in [
            (BinOp::Div, Value::Int(5), Value::Int(0)),
            (BinOp::Div, Value::Float(5.0), Value::Float(0.0)),
            (BinOp::Mod, Value::Int(5), Value::Int(0)),
            (BinOp::Div, Value::Int(5), Value::Float(0.0)),
        ] {
            let err = binary(&mut heap, op, lhs, rhs).unwrap_err();
            assert_eq!(err.kind, ErrorKind::DivisionByZero);
        }
    }

    #[test]
    fn test_int_overflow_wraps() {
        let mut heap = heap();
        assert_eq!(
            binary(&mut heap, BinOp::Plus, Value::Int(i64::MAX), Value::Int(1)).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            binary(&mut heap, BinOp::Div, Value::Int(i64::MIN), Value::Int(-1)).unwrap(),
            Value::Int(i64::MIN)
        );
    }

    #[test]
    fn test_string_left_concatenates() {
        let mut heap = heap();
        let s = heap.alloc_string("3").unwrap();
        let v = binary(&mut heap, BinOp::Plus, s, Value::Int(2)).unwrap();
        assert_eq!(text(&heap, &v), "32");

        let s = heap.alloc_string("x=").unwrap();
        let v2 = binary(&mut heap, BinOp::Plus, s, Value::Float(1.5)).unwrap();
        assert_eq!(text(&heap, &v2), "x=1.500000");

        let a = heap.alloc_string("a").unwrap();
        let b = heap.alloc_string("b").unwrap();
        let v3 = binary(&mut heap, BinOp::Plus, a, b).unwrap();
        assert_eq!(text(&heap, &v3), "ab");
        // operands were released, only the three results remain
        assert_eq!(heap.live_strings(), 3);
    }

    #[test]
    fn test_string_right_parses() {
        let mut heap = heap();
        let s = heap.alloc_string("3").unwrap();
        assert_eq!(binary(&mut heap, BinOp::Plus, Value::Int(2), s).unwrap(), Value::Int(5));
        let s = heap.alloc_string("0.25abc").unwrap();
        assert_eq!(binary(&mut heap, BinOp::Plus, Value::Float(1.0), s).unwrap(), Value::Float(1.25));
        let s = heap.alloc_string("junk").unwrap();
        assert_eq!(binary(&mut heap, BinOp::Plus, Value::Int(7), s).unwrap(), Value::Int(7));
        assert_eq!(heap.live_strings(), 0);
    }

    #[test]
    fn test_string_only_supports_plus() {
        let mut heap = heap();
        let s = heap.alloc_string("3").unwrap();
        let err = binary(&mut heap, BinOp::Minus, s, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(heap.live_strings(), 0);
    }

    #[test]
    fn test_arrays_rejected_everywhere() {
        let mut heap = heap();
        for op in [BinOp::Plus, BinOp::Eq, BinOp::Lt, BinOp::And] {
            let a = heap.alloc_array().unwrap();
            let err = binary(&mut heap, op, a, Value::Int(1)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::TypeError);
        }
        assert_eq!(heap.live_cells(), 0);
    }

    #[test]
    fn test_comparisons() {
        let mut heap = heap();
        assert_eq!(binary(&mut heap, BinOp::Lt, Value::Int(1), Value::Float(1.5)).unwrap(), Value::Int(1));
        assert_eq!(binary(&mut heap, BinOp::Gte, Value::Int(2), Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(binary(&mut heap, BinOp::Gt, Value::Float(f64::NAN), Value::Int(0)).unwrap(), Value::Int(0));
        let s = heap.alloc_string("a").unwrap();
        let err = binary(&mut heap, BinOp::Lt, s, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_equality() {
        let mut heap = heap();
        let a = heap.alloc_string("same").unwrap();
        let b = heap.alloc_string("same").unwrap();
        assert_eq!(binary(&mut heap, BinOp::Eq, a, b).unwrap(), Value::Int(1));
        let a = heap.alloc_string("x").unwrap();
        let b = heap.alloc_string("y").unwrap();
        assert_eq!(binary(&mut heap, BinOp::Neq, a, b).unwrap(), Value::Int(1));
        assert_eq!(binary(&mut heap, BinOp::Eq, Value::Int(2), Value::Float(2.0)).unwrap(), Value::Int(1));
        let s = heap.alloc_string("2").unwrap();
        assert!(binary(&mut heap, BinOp::Eq, Value::Int(2), s).is_err());
    }

    #[test]
    fn test_logical() {
        let mut heap = heap();
        assert_eq!(binary(&mut heap, BinOp::And, Value::Int(1), Value::Float(0.0)).unwrap(), Value::Int(0));
        assert_eq!(binary(&mut heap, BinOp::Or, Value::Int(0), Value::Int(3)).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_negate() {
        let mut heap = heap();
        assert_eq!(negate(&mut heap, Value::Int(4)).unwrap(), Value::Int(-4));
        assert_eq!(negate(&mut heap, Value::Float(0.5)).unwrap(), Value::Float(-0.5));
        let s = heap.alloc_string("4").unwrap();
        assert!(negate(&mut heap, s).is_err());
        assert_eq!(heap.live_strings(), 0);
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("42"), 42);
        assert_eq!(parse_int_prefix("  -17xyz"), -17);
        assert_eq!(parse_int_prefix("+8"), 8);
        assert_eq!(parse_int_prefix("3.9"), 3);
        assert_eq!(parse_int_prefix(""), 0);
        assert_eq!(parse_int_prefix("abc"), 0);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("1.5"), 1.5);
        assert_eq!(parse_float_prefix(" -2.5e2 rest"), -250.0);
        assert_eq!(parse_float_prefix(".5"), 0.5);
        assert_eq!(parse_float_prefix("7."), 7.0);
        assert_eq!(parse_float_prefix("3e"), 3.0);
        assert_eq!(parse_float_prefix("."), 0.0);
        assert_eq!(parse_float_prefix("x1"), 0.0);
    }
}
