//! Host functions callable from scripts
//!
//! A host registers a table of [`ForeignFunction`]s. When a script calls one,
//! the runtime pushes a frame holding the named parameters, then hands the
//! host a [`CallContext`] over that frame. The host reads its arguments by
//! name and leaves a result in the `__return` variable with one of the
//! `set_return_*` methods; anything it leaves there is handed back to the
//! caller exactly like a user function's return value.

use super::error::{InterpResult, RuntimeError};
use super::frame::{Frame, RETURN_VAR};
use super::heap::{ElemId, Heap};
use super::intrinsics::Intrinsic;
use super::value::{ArrayRef, Scalar, Value};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Host function signature
pub type ForeignFn = fn(&mut CallContext<'_>) -> InterpResult<()>;

/// One entry of a host registration table
#[derive(Debug, Clone)]
pub struct ForeignFunction {
    pub name: String,
    pub params: Vec<String>,
    pub func: ForeignFn,
}

impl ForeignFunction {
    pub fn new(name: &str, params: &[&str], func: ForeignFn) -> Self {
        ForeignFunction {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            func,
        }
    }
}

/// Registered host functions by name
#[derive(Debug, Default)]
pub struct ForeignRegistry {
    functions: HashMap<String, Rc<ForeignFunction>>,
}

impl ForeignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table of functions.
    ///
    /// The whole table is checked before anything is added, so a rejected
    /// table leaves the registry unchanged.
    pub fn register(&mut self, table: &[ForeignFunction]) -> InterpResult<()> {
        for (i, entry) in table.iter().enumerate() {
            if entry.name.is_empty() {
                return Err(RuntimeError::registration("foreign function with empty name"));
            }
            if Intrinsic::from_name(&entry.name).is_some() {
                return Err(RuntimeError::registration(format!(
                    "foreign function `{}` shadows an intrinsic",
                    entry.name
                )));
            }
            let repeated = table[..i].iter().any(|prev| prev.name == entry.name);
            if repeated || self.functions.contains_key(&entry.name) {
                return Err(RuntimeError::registration(format!(
                    "foreign function `{}` registered twice",
                    entry.name
                )));
            }
        }
        for entry in table {
            debug!(name = %entry.name, params = entry.params.len(), "registered foreign function");
            self.functions
                .insert(entry.name.clone(), Rc::new(entry.clone()));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Rc<ForeignFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

/// A host function's view of its own frame
pub struct CallContext<'a> {
    function: &'a str,
    heap: &'a mut Heap,
    frame: &'a mut Frame,
}

impl<'a> CallContext<'a> {
    pub fn new(function: &'a str, heap: &'a mut Heap, frame: &'a mut Frame) -> Self {
        CallContext {
            function,
            heap,
            frame,
        }
    }

    /// Name the function was registered under
    pub fn function(&self) -> &str {
        self.function
    }

    /// Error attributed to this function
    pub fn fail(&self, message: &str) -> RuntimeError {
        RuntimeError::foreign(self.function, message)
    }

    pub fn heap(&self) -> &Heap {
        self.heap
    }

    // ============ Parameters ============

    pub fn get(&self, name: &str) -> InterpResult<&Value> {
        self.frame
            .get(name)
            .ok_or_else(|| RuntimeError::undefined_variable(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.frame.contains(name)
    }

    pub fn is_int(&self, name: &str) -> bool {
        matches!(self.frame.get(name), Some(Value::Int(_)))
    }

    pub fn is_float(&self, name: &str) -> bool {
        matches!(self.frame.get(name), Some(Value::Float(_)))
    }

    pub fn is_str(&self, name: &str) -> bool {
        matches!(self.frame.get(name), Some(Value::Str(_)))
    }

    pub fn is_array(&self, name: &str) -> bool {
        matches!(self.frame.get(name), Some(Value::Array(_)))
    }

    pub fn get_int(&self, name: &str) -> InterpResult<i64> {
        match self.get(name)? {
            Value::Int(n) => Ok(*n),
            other => Err(RuntimeError::type_error("int", other.type_name())),
        }
    }

    /// Float parameter; ints are promoted
    pub fn get_float(&self, name: &str) -> InterpResult<f64> {
        let value = self.get(name)?;
        value
            .as_float()
            .ok_or_else(|| RuntimeError::type_error("float", value.type_name()))
    }

    pub fn get_str(&self, name: &str) -> InterpResult<&str> {
        match self.get(name)? {
            Value::Str(s) => self.heap.str(s),
            other => Err(RuntimeError::type_error("str", other.type_name())),
        }
    }

    /// Text of any value, e.g. an array element
    pub fn text<'v>(&'v self, value: &'v Value) -> Option<&'v str> {
        self.heap.text(value)
    }

    // ============ Setting variables ============

    fn bind(&mut self, name: &str, value: Value) {
        if let Some(old) = self.frame.set(name, value) {
            self.heap.release(old);
        }
    }

    pub fn set_int(&mut self, name: &str, n: i64) {
        self.bind(name, Value::Int(n));
    }

    pub fn set_float(&mut self, name: &str, f: f64) {
        self.bind(name, Value::Float(f));
    }

    pub fn set_str(&mut self, name: &str, s: &str) -> InterpResult<()> {
        let value = self.heap.alloc_string(s)?;
        self.bind(name, value);
        Ok(())
    }

    /// Bind `name` to a fresh empty array
    pub fn make_array(&mut self, name: &str) -> InterpResult<()> {
        let array = self.heap.alloc_array()?;
        self.bind(name, array);
        Ok(())
    }

    pub fn set_return_int(&mut self, n: i64) {
        self.set_int(RETURN_VAR, n);
    }

    pub fn set_return_float(&mut self, f: f64) {
        self.set_float(RETURN_VAR, f);
    }

    pub fn set_return_str(&mut self, s: &str) -> InterpResult<()> {
        self.set_str(RETURN_VAR, s)
    }

    /// Start an empty array as the return value; fill it through
    /// [`CallContext::array_set`] on `__return`
    pub fn return_array(&mut self) -> InterpResult<()> {
        self.make_array(RETURN_VAR)
    }

    // ============ Arrays ============

    fn array(&self, name: &str) -> InterpResult<&ArrayRef> {
        match self.get(name)? {
            Value::Array(a) => Ok(a),
            other => Err(RuntimeError::array_expected(other.type_name())),
        }
    }

    /// Element of the array in `name`; a missing key is an error
    pub fn array_get<'k>(&self, name: &str, key: impl Into<Scalar<'k>>) -> InterpResult<&Value> {
        let key = key.into();
        self.heap
            .array_get(self.array(name)?, key)?
            .ok_or_else(|| RuntimeError::key_not_found(&key.to_string()))
    }

    /// Store a scalar in the array in `name`, creating the array if the
    /// variable is unset
    pub fn array_set<'k>(
        &mut self,
        name: &str,
        key: impl Into<Scalar<'k>>,
        value: impl Into<Scalar<'k>>,
    ) -> InterpResult<()> {
        if !self.frame.contains(name) {
            self.make_array(name)?;
        }
        let key = self.heap.alloc_scalar(key.into())?;
        let value = match self.heap.alloc_scalar(value.into()) {
            Ok(value) => value,
            Err(e) => {
                self.heap.release(key);
                return Err(e);
            }
        };
        match self.frame.get(name) {
            Some(Value::Array(a)) => self.heap.array_set(a, key, value),
            other => {
                let got = other.map_or("nothing", Value::type_name);
                self.heap.release(key);
                self.heap.release(value);
                Err(RuntimeError::array_expected(got))
            }
        }
    }

    pub fn array_remove<'k>(&mut self, name: &str, key: impl Into<Scalar<'k>>) -> InterpResult<bool> {
        match self.frame.get(name) {
            Some(Value::Array(a)) => self.heap.array_remove(a, key.into()),
            Some(other) => Err(RuntimeError::array_expected(other.type_name())),
            None => Err(RuntimeError::undefined_variable(name)),
        }
    }

    pub fn array_size(&self, name: &str) -> InterpResult<usize> {
        self.heap.array_len(self.array(name)?)
    }

    pub fn array_first(&self, name: &str) -> InterpResult<Option<ElemId>> {
        self.heap.array_first(self.array(name)?)
    }

    pub fn array_next(&self, elem: ElemId) -> Option<ElemId> {
        self.heap.elem_next(elem)
    }

    pub fn element(&self, elem: ElemId) -> Option<(&Value, &Value)> {
        self.heap.element(elem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;

    fn noop(_: &mut CallContext<'_>) -> InterpResult<()> {
        Ok(())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ForeignRegistry::new();
        registry
            .register(&[
                ForeignFunction::new("host_add", &["a", "b"], noop),
                ForeignFunction::new("host_name", &[], noop),
            ])
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("host_add").unwrap().params, vec!["a", "b"]);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_rejected_table_adds_nothing() {
        let mut registry = ForeignRegistry::new();
        let err = registry
            .register(&[
                ForeignFunction::new("ok", &[], noop),
                ForeignFunction::new("print", &["v"], noop),
            ])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Registration);
        assert!(registry.is_empty());

        let err = registry
            .register(&[
                ForeignFunction::new("dup", &[], noop),
                ForeignFunction::new("dup", &[], noop),
            ])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Registration);

        let err = registry.register(&[ForeignFunction::new("", &[], noop)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Registration);
    }

    #[test]
    fn test_register_twice_across_tables() {
        let mut registry = ForeignRegistry::new();
        registry.register(&[ForeignFunction::new("f", &[], noop)]).unwrap();
        assert!(registry.register(&[ForeignFunction::new("f", &[], noop)]).is_err());
        assert!(registry.contains("f"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["f"]);
    }

    #[test]
    fn test_parameter_accessors() {
        let mut heap = Heap::new(8, 8);
        let mut frame = Frame::new("host");
        let s = heap.alloc_string("text").unwrap();
        let _ = frame.set("s", s);
        let _ = frame.set("n", Value::Int(7));
        let ctx = CallContext::new("host", &mut heap, &mut frame);

        assert_eq!(ctx.function(), "host");
        assert_eq!(ctx.get_int("n").unwrap(), 7);
        assert_eq!(ctx.get_float("n").unwrap(), 7.0);
        assert_eq!(ctx.get_str("s").unwrap(), "text");
        assert!(ctx.is_str("s") && ctx.is_int("n") && !ctx.is_array("n") && !ctx.is_float("n"));
        assert_eq!(ctx.get_int("s").unwrap_err().kind, ErrorKind::TypeError);
        assert_eq!(ctx.get_int("zz").unwrap_err().kind, ErrorKind::UndefinedVariable);
        assert_eq!(ctx.fail("boom").message, "host: boom");
    }

    #[test]
    fn test_set_releases_previous_value() {
        let mut heap = Heap::new(8, 8);
        let mut frame = Frame::new("host");
        {
            let mut ctx = CallContext::new("host", &mut heap, &mut frame);
            ctx.set_str("x", "one").unwrap();
            ctx.set_str("x", "two").unwrap();
            ctx.set_return_float(1.5);
            assert_eq!(ctx.heap().live_strings(), 1);
        }
        assert_eq!(frame.get(RETURN_VAR), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_array_accessors() {
        let mut heap = Heap::new(8, 8);
        let mut frame = Frame::new("host");
        let mut ctx = CallContext::new("host", &mut heap, &mut frame);
        ctx.array_set("a", "name", "wms").unwrap();
        ctx.array_set("a", 1_i64, 2.5_f64).unwrap();
        assert!(ctx.is_array("a"));
        assert_eq!(ctx.array_size("a").unwrap(), 2);
        let v = ctx.array_get("a", "name").unwrap();
        assert_eq!(ctx.text(v), Some("wms"));
        assert_eq!(ctx.array_get("a", 1_i64).unwrap(), &Value::Float(2.5));
        assert_eq!(ctx.array_get("a", 9_i64).unwrap_err().kind, ErrorKind::KeyNotFound);

        let first = ctx.array_first("a").unwrap().unwrap();
        let (key, _) = ctx.element(first).unwrap();
        assert_eq!(key, &Value::Int(1));
        let second = ctx.array_next(first).unwrap();
        assert!(ctx.array_next(second).is_none());

        assert!(ctx.array_remove("a", "name").unwrap());
        assert_eq!(ctx.array_size("a").unwrap(), 1);
        assert_eq!(ctx.heap().live_strings(), 0);
    }

    #[test]
    fn test_array_set_on_scalar_fails_cleanly() {
        let mut heap = Heap::new(8, 8);
        let mut frame = Frame::new("host");
        let mut ctx = CallContext::new("host", &mut heap, &mut frame);
        ctx.set_int("n", 1);
        let err = ctx.array_set("n", "k", "v").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(ctx.heap().live_strings(), 0);
    }
}
