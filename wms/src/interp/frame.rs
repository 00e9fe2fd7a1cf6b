//! Call frames
//!
//! One frame is pushed per user or foreign call and popped when it returns.
//! Lookups never leave the current frame: the stack below it only records who
//! called whom, it is not a scope chain.

use super::value::Value;
use std::collections::HashMap;

/// Variable that carries a function's result back to its caller
pub const RETURN_VAR: &str = "__return";

/// Variables of one function activation
#[derive(Debug, Default)]
pub struct Frame {
    function: String,
    variables: HashMap<String, Value>,
}

impl Frame {
    pub fn new(function: impl Into<String>) -> Self {
        Frame {
            function: function.into(),
            variables: HashMap::new(),
        }
    }

    /// Name of the function this frame belongs to
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Bind `name`, returning the value it replaced so the caller can release it
    #[must_use = "a replaced value must be released"]
    pub fn set(&mut self, name: &str, value: Value) -> Option<Value> {
        self.variables.insert(name.to_string(), value)
    }

    /// Move a variable out of the frame
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Tear the frame down, yielding every value it owned
    pub fn into_values(self) -> impl Iterator<Item = Value> {
        self.variables.into_values()
    }
}

/// Stack of active frames; the last one is executing
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        FrameStack { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len()
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Remove every frame, innermost first
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        self.frames.drain(..).rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_replaced_value() {
        let mut frame = Frame::new("main");
        assert_eq!(frame.set("x", Value::Int(1)), None);
        assert_eq!(frame.set("x", Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(frame.get("x"), Some(&Value::Int(2)));
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_take_moves_out() {
        let mut frame = Frame::new("f");
        let _ = frame.set(RETURN_VAR, Value::Float(1.5));
        assert!(frame.contains(RETURN_VAR));
        assert_eq!(frame.take(RETURN_VAR), Some(Value::Float(1.5)));
        assert!(!frame.contains(RETURN_VAR));
        assert!(frame.is_empty());
    }

    #[test]
    fn test_frames_are_isolated() {
        let mut stack = FrameStack::new();
        let mut outer = Frame::new("main");
        let _ = outer.set("x", Value::Int(1));
        stack.push(outer);
        stack.push(Frame::new("callee"));

        let current = stack.current().unwrap();
        assert_eq!(current.function(), "callee");
        // no lookup through the caller
        assert_eq!(current.get("x"), None);

        stack.pop();
        assert_eq!(stack.current().unwrap().get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_depth_and_drain_order() {
        let mut stack = FrameStack::new();
        assert_eq!(stack.push(Frame::new("a")), 1);
        assert_eq!(stack.push(Frame::new("b")), 2);
        assert_eq!(stack.depth(), 2);
        let names: Vec<_> = stack.drain().map(|f| f.function().to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_into_values() {
        let mut frame = Frame::new("f");
        let _ = frame.set("a", Value::Int(1));
        let _ = frame.set("b", Value::Int(2));
        let mut values: Vec<_> = frame.into_values().filter_map(|v| v.as_int()).collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }
}
