//! Built-in functions resolved before foreign and user functions

use super::error::{InterpResult, RuntimeError};
use super::heap::Heap;
use super::output::LineWriter;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Print,
    Remove,
    Size,
    IsInt,
    IsFloat,
    IsStr,
    IsArray,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 7] = [
        Intrinsic::Print,
        Intrinsic::Remove,
        Intrinsic::Size,
        Intrinsic::IsInt,
        Intrinsic::IsFloat,
        Intrinsic::IsStr,
        Intrinsic::IsArray,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Print => "print",
            Intrinsic::Remove => "remove",
            Intrinsic::Size => "size",
            Intrinsic::IsInt => "isint",
            Intrinsic::IsFloat => "isfloat",
            Intrinsic::IsStr => "isstr",
            Intrinsic::IsArray => "isarray",
        }
    }

    fn arity(self) -> usize {
        match self {
            Intrinsic::Remove => 2,
            _ => 1,
        }
    }

    /// Run the intrinsic, consuming its arguments
    pub fn call(self, heap: &mut Heap, out: &mut LineWriter, args: Vec<Value>) -> InterpResult<Value> {
        if args.len() < self.arity() {
            let got = args.len();
            heap.release_all(args);
            return Err(RuntimeError::missing_argument(self.name(), self.arity(), got));
        }
        let result = self.apply(heap, out, &args);
        heap.release_all(args);
        result
    }

    fn apply(self, heap: &mut Heap, out: &mut LineWriter, args: &[Value]) -> InterpResult<Value> {
        let arg = &args[0];
        match self {
            Intrinsic::Print => {
                let mut text = heap.display(arg)?;
                text.push('\n');
                out.write(&text);
                Ok(Value::Int(0))
            }
            Intrinsic::Size => match arg {
                Value::Array(a) => Ok(Value::Int(heap.array_len(a)? as i64)),
                other => Err(RuntimeError::array_expected(other.type_name())),
            },
            Intrinsic::Remove => match arg {
                Value::Array(a) => Ok(Value::from_bool(heap.array_remove_value(a, &args[1])?)),
                other => Err(RuntimeError::array_expected(other.type_name())),
            },
            Intrinsic::IsInt => Ok(Value::from_bool(matches!(arg, Value::Int(_)))),
            Intrinsic::IsFloat => Ok(Value::from_bool(matches!(arg, Value::Float(_)))),
            Intrinsic::IsStr => Ok(Value::from_bool(matches!(arg, Value::Str(_)))),
            Intrinsic::IsArray => Ok(Value::from_bool(matches!(arg, Value::Array(_)))),
        }
    }
}
