//! Statement and expression evaluator

use super::error::{InterpResult, RuntimeError};
use super::ffi::{CallContext, ForeignFunction, ForeignRegistry};
use super::frame::{Frame, FrameStack, RETURN_VAR};
use super::heap::{Heap, Pinned};
use super::intrinsics::Intrinsic;
use super::ops;
use super::output::{LineWriter, OutputSink, StdoutSink};
use super::value::{ArrayRef, Value};
use crate::ast::{AssignTarget, Expr, ForLoop, Func, Program, Stmt, StmtKind, Term};
use crate::config::RuntimeConfig;
use crate::util::{find_similar_name, format_suggestion_hint};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Stack growth parameters for deep recursion
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// How a statement finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Return,
    Break,
    Continue,
}

/// Links `if`/`else if`/`else` siblings within one statement list
#[derive(Debug, Clone, Copy, Default)]
struct Chain {
    last_was_conditional: bool,
    last_was_false: bool,
}

impl Chain {
    fn after_test(taken: bool) -> Self {
        Chain {
            last_was_conditional: true,
            last_was_false: !taken,
        }
    }
}

fn frame(frames: &FrameStack) -> InterpResult<&Frame> {
    frames
        .current()
        .ok_or_else(|| RuntimeError::invalid_handle("frame"))
}

fn frame_mut(frames: &mut FrameStack) -> InterpResult<&mut Frame> {
    frames
        .current_mut()
        .ok_or_else(|| RuntimeError::invalid_handle("frame"))
}

/// A loaded program with its heap, frames and host bindings
pub struct Runtime {
    /// User-defined functions
    functions: HashMap<String, Rc<Func>>,
    /// Host functions
    foreign: ForeignRegistry,
    frames: FrameStack,
    heap: Heap,
    out: LineWriter,
    config: RuntimeConfig,
    last_error: Option<RuntimeError>,
}

impl Runtime {
    /// Load a program. A function defined twice keeps its last definition.
    pub fn new(program: Program, config: RuntimeConfig) -> Self {
        let mut functions = HashMap::new();
        for func in program.funcs {
            let name = func.name.clone();
            let line = func.line;
            if functions.insert(name.clone(), Rc::new(func)).is_some() {
                warn!(function = %name, line, "function redefined; keeping the later definition");
            }
        }
        Runtime {
            functions,
            foreign: ForeignRegistry::new(),
            frames: FrameStack::new(),
            heap: Heap::with_config(&config),
            out: LineWriter::new(Box::new(StdoutSink)),
            config,
            last_error: None,
        }
    }

    /// Send `print` output to `sink` instead of stdout
    pub fn with_output(mut self, sink: impl OutputSink + 'static) -> Self {
        self.set_output(Box::new(sink));
        self
    }

    pub fn set_output(&mut self, sink: Box<dyn OutputSink>) {
        self.out.set_sink(sink);
    }

    /// Make host functions callable from scripts
    pub fn register(&mut self, table: &[ForeignFunction]) -> InterpResult<()> {
        self.foreign.register(table)
    }

    /// Run `main` on a fresh heap. On failure the error is kept for
    /// [`Runtime::error_line`] and [`Runtime::error_message`].
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&mut self) -> bool {
        debug!(functions = self.functions.len(), "run start");
        self.last_error = None;
        self.unwind();
        self.heap.reset();

        let ok = match self.call_named("main", "main", Vec::new()) {
            Ok(value) => {
                self.heap.release(value);
                true
            }
            Err(e) => {
                debug!(error = %e, "run failed");
                self.unwind();
                self.heap.reset();
                self.last_error = Some(e);
                false
            }
        };
        self.out.flush();

        let (strings, cells) = (self.heap.live_strings(), self.heap.live_cells());
        if strings > 0 || cells > 0 {
            warn!(strings, cells, "heap slots still live after run");
        }
        debug!(ok, "run end");
        ok
    }

    /// Call a function by name with arguments the host owns.
    ///
    /// The result belongs to the host; give it back with [`Runtime::release`].
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> InterpResult<Value> {
        let result = self.call_named(name, name, args);
        if result.is_err() {
            self.unwind();
        }
        self.out.flush();
        result
    }

    /// Return a value obtained from [`Runtime::call_function`]
    pub fn release(&mut self, value: Value) {
        self.heap.release(value);
    }

    pub fn error_line(&self) -> Option<u32> {
        self.last_error.as_ref().and_then(|e| e.line)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|e| e.message.as_str())
    }

    pub fn last_error(&self) -> Option<&RuntimeError> {
        self.last_error.as_ref()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Drop every frame left behind by a failed call
    fn unwind(&mut self) {
        for frame in self.frames.drain() {
            self.heap.release_all(frame.into_values());
        }
    }

    // ============ Statements ============

    /// Run a statement list with a fresh chain state, growing the native
    /// stack for deeply nested blocks
    fn exec_block(&mut self, stmts: &[Stmt]) -> InterpResult<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.exec_block_inner(stmts))
    }

    fn exec_block_inner(&mut self, stmts: &[Stmt]) -> InterpResult<Flow> {
        let mut chain = Chain::default();
        for stmt in stmts {
            let flow = self
                .exec_stmt(stmt, &mut chain)
                .map_err(|e| e.at_line(stmt.line))?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, chain: &mut Chain) -> InterpResult<Flow> {
        match &stmt.kind {
            StmtKind::If { cond, body } => {
                let taken = self.condition(cond)?;
                *chain = Chain::after_test(taken);
                if taken {
                    return self.exec_block(body);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Elif { cond, body } => {
                if !chain.last_was_conditional {
                    return Err(RuntimeError::else_if_before_if());
                }
                if !chain.last_was_false {
                    // an earlier branch ran
                    *chain = Chain::after_test(true);
                    return Ok(Flow::Normal);
                }
                let taken = self.condition(cond)?;
                *chain = Chain::after_test(taken);
                if taken {
                    return self.exec_block(body);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Else { body } => {
                if !chain.last_was_conditional {
                    return Err(RuntimeError::else_before_if());
                }
                let run = chain.last_was_false;
                *chain = Chain::default();
                if run {
                    return self.exec_block(body);
                }
                Ok(Flow::Normal)
            }
            other => {
                *chain = Chain::default();
                self.exec_simple(other)
            }
        }
    }

    fn exec_simple(&mut self, kind: &StmtKind) -> InterpResult<Flow> {
        match kind {
            StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::Expr(expr) => {
                let value = self.eval(expr)?;
                self.heap.release(value);
                Ok(Flow::Normal)
            }
            StmtKind::Assign { target, value } => {
                self.exec_assign(target, value)?;
                Ok(Flow::Normal)
            }
            StmtKind::While { cond, body } => {
                while self.condition(cond)? {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return => return Ok(Flow::Return),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For(ForLoop::Range {
                var,
                start,
                end,
                body,
            }) => self.exec_range(var, start, end, body),
            StmtKind::For(ForLoop::Each {
                key,
                value,
                array,
                body,
            }) => {
                let subject = self.eval(array)?;
                let result = match &subject {
                    Value::Array(a) => self.exec_each(a, key, value, body),
                    other => Err(RuntimeError::array_expected(other.type_name())),
                };
                self.heap.release(subject);
                result
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    let value = self.eval(expr)?;
                    self.bind(RETURN_VAR, value)?;
                }
                Ok(Flow::Return)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::If { .. } | StmtKind::Elif { .. } | StmtKind::Else { .. } => {
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_assign(&mut self, target: &AssignTarget, value: &Expr) -> InterpResult<()> {
        match target {
            AssignTarget::Scalar(name) => {
                let value = self.eval(value)?;
                self.bind(name, value)
            }
            AssignTarget::Element { symbol, subscript } => {
                let key = self.eval(subscript)?;
                let value = match self.eval(value) {
                    Ok(v) => v,
                    Err(e) => {
                        self.heap.release(key);
                        return Err(e);
                    }
                };
                self.store_element(symbol, key, value)
            }
        }
    }

    /// `symbol[key] = value`; an unset variable becomes a new array
    fn store_element(&mut self, symbol: &str, key: Value, value: Value) -> InterpResult<()> {
        let frame = match frame_mut(&mut self.frames) {
            Ok(frame) => frame,
            Err(e) => {
                self.heap.release_all([key, value]);
                return Err(e);
            }
        };
        if !frame.contains(symbol) {
            match self.heap.alloc_array() {
                Ok(array) => {
                    if let Some(old) = frame.set(symbol, array) {
                        self.heap.release(old);
                    }
                }
                Err(e) => {
                    self.heap.release_all([key, value]);
                    return Err(e);
                }
            }
        }
        match frame.get(symbol) {
            Some(Value::Array(a)) => self.heap.array_set(a, key, value),
            other => {
                let got = other.map_or("nothing", Value::type_name);
                self.heap.release_all([key, value]);
                Err(RuntimeError::array_expected(got))
            }
        }
    }

    /// Bind a variable in the current frame, releasing what it held
    fn bind(&mut self, name: &str, value: Value) -> InterpResult<()> {
        let frame = match frame_mut(&mut self.frames) {
            Ok(frame) => frame,
            Err(e) => {
                self.heap.release(value);
                return Err(e);
            }
        };
        if let Some(old) = frame.set(name, value) {
            self.heap.release(old);
        }
        Ok(())
    }

    fn exec_range(&mut self, var: &str, start: &Expr, end: &Expr, body: &[Stmt]) -> InterpResult<Flow> {
        let start = self.eval_int(start)?;
        let end = self.eval_int(end)?;
        let mut i = start;
        while i <= end {
            self.bind(var, Value::Int(i))?;
            match self.exec_block(body)? {
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }
            match i.checked_add(1) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(Flow::Normal)
    }

    /// Walk the live element list. The successor is read after the body
    /// runs, falling back to the one seen before it when the body removed
    /// the current element.
    fn exec_each(&mut self, array: &ArrayRef, key_var: &str, value_var: &str, body: &[Stmt]) -> InterpResult<Flow> {
        let mut cursor = self.heap.array_first(array)?;
        while let Some(elem) = cursor {
            let successor = self.heap.elem_next(elem);
            let Some((key, value)) = self.heap.entry(elem) else {
                break;
            };
            if let Err(e) = self.bind(key_var, key) {
                self.heap.release(value);
                return Err(e);
            }
            self.bind(value_var, value)?;

            match self.exec_block(body)? {
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }

            cursor = if self.heap.elem_live(elem) {
                self.heap.elem_next(elem)
            } else {
                successor.filter(|next| self.heap.elem_live(*next))
            };
        }
        Ok(Flow::Normal)
    }

    /// Truth value of a condition; only numbers qualify
    fn condition(&mut self, cond: &Expr) -> InterpResult<bool> {
        let value = self.eval(cond)?;
        let truth = value.truthiness();
        let got = value.type_name();
        self.heap.release(value);
        truth.ok_or_else(|| RuntimeError::type_error("int or float condition", got))
    }

    fn eval_int(&mut self, expr: &Expr) -> InterpResult<i64> {
        let value = self.eval(expr)?;
        match value {
            Value::Int(n) => Ok(n),
            other => {
                let got = other.type_name();
                self.heap.release(other);
                Err(RuntimeError::type_error("int", got))
            }
        }
    }

    // ============ Expressions ============

    /// Evaluate an expression with automatic stack growth for deep nesting
    fn eval(&mut self, expr: &Expr) -> InterpResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr))
    }

    fn eval_inner(&mut self, expr: &Expr) -> InterpResult<Value> {
        match expr {
            Expr::Term(term) => self.eval_term(term),
            Expr::Binary { op, lhs, rhs } => {
                // both sides always run; there is no short-circuit
                let lhs = self.eval(lhs)?;
                let rhs = match self.eval(rhs) {
                    Ok(v) => v,
                    Err(e) => {
                        self.heap.release(lhs);
                        return Err(e);
                    }
                };
                ops::binary(&mut self.heap, *op, lhs, rhs)
            }
            Expr::Neg(operand) => {
                let value = self.eval(operand)?;
                ops::negate(&mut self.heap, value)
            }
        }
    }

    fn eval_term(&mut self, term: &Term) -> InterpResult<Value> {
        match term {
            Term::Int(n) => Ok(Value::Int(*n)),
            Term::Float(f) => Ok(Value::Float(*f)),
            Term::Str(s) => self.heap.alloc_string(s.as_str()),
            Term::Symbol(name) => match frame(&self.frames)?.get(name) {
                Some(value) => Ok(self.heap.retain(value)),
                None => Err(RuntimeError::undefined_variable(name)),
            },
            Term::Index { symbol, subscript } => {
                let key = self.eval(subscript)?;
                let result = self.fetch_element(symbol, &key);
                self.heap.release(key);
                result
            }
            Term::Call { name, args } => self.eval_call(name, args),
        }
    }

    fn fetch_element(&mut self, symbol: &str, key: &Value) -> InterpResult<Value> {
        let array = match frame(&self.frames)?.get(symbol) {
            Some(Value::Array(a)) => a,
            Some(other) => return Err(RuntimeError::array_expected(other.type_name())),
            None => return Err(RuntimeError::undefined_variable(symbol)),
        };
        match self.heap.array_fetch(array, key)? {
            Some(value) => Ok(value),
            None => Err(RuntimeError::key_not_found(&self.heap.display(key)?)),
        }
    }

    // ============ Calls ============

    fn eval_call(&mut self, name: &str, args: &[Expr]) -> InterpResult<Value> {
        // a string variable names the function to call
        let callee = match frame(&self.frames)?.get(name) {
            Some(Value::Str(s)) => Some(self.heap.str(s)?.to_string()),
            _ => None,
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval(arg) {
                Ok(value) => values.push(value),
                Err(e) => {
                    self.heap.release_all(values);
                    return Err(e);
                }
            }
        }
        self.call_named(name, callee.as_deref().unwrap_or(name), values)
    }

    /// Resolve `callee` as intrinsic, then foreign, then user function
    fn call_named(&mut self, name: &str, callee: &str, args: Vec<Value>) -> InterpResult<Value> {
        if let Some(intrinsic) = Intrinsic::from_name(callee) {
            return intrinsic.call(&mut self.heap, &mut self.out, args);
        }
        if let Some(foreign) = self.foreign.get(callee) {
            return self.call_foreign(&foreign, args);
        }
        if let Some(func) = self.functions.get(callee).cloned() {
            return self.call_user(&func, args);
        }
        self.heap.release_all(args);
        let hint = format_suggestion_hint(self.similar_function(callee));
        Err(RuntimeError::undefined_function(name, &hint))
    }

    fn similar_function(&self, name: &str) -> Option<&str> {
        let mut candidates: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        candidates.extend(self.foreign.names());
        candidates.extend(Intrinsic::ALL.iter().map(|i| i.name()));
        find_similar_name(name, &candidates, 2)
    }

    fn call_user(&mut self, func: &Func, args: Vec<Value>) -> InterpResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.enter(&func.name, &func.params, args)?;
            debug!(function = %func.name, depth = self.frames.depth(), "call");
            // break/continue reaching the body end it like a bare return
            self.exec_block(&func.body)?;
            Ok(self.leave().adopt(&mut self.heap))
        })
    }

    fn call_foreign(&mut self, foreign: &ForeignFunction, args: Vec<Value>) -> InterpResult<Value> {
        self.enter(&foreign.name, &foreign.params, args)?;
        debug!(function = %foreign.name, depth = self.frames.depth(), "foreign call");
        let frame = frame_mut(&mut self.frames)?;
        let mut ctx = CallContext::new(&foreign.name, &mut self.heap, frame);
        (foreign.func)(&mut ctx)?;
        Ok(self.leave().adopt(&mut self.heap))
    }

    /// Push a frame binding `args` to `params` positionally. Surplus
    /// arguments are released and surplus parameters stay unbound.
    fn enter(&mut self, function: &str, params: &[String], args: Vec<Value>) -> InterpResult<()> {
        if self.frames.depth() >= self.config.max_call_depth {
            self.heap.release_all(args);
            return Err(RuntimeError::stack_overflow(self.config.max_call_depth));
        }
        let mut frame = Frame::new(function);
        let mut args = args.into_iter();
        for param in params {
            let Some(arg) = args.next() else {
                break;
            };
            if let Some(old) = frame.set(param, arg) {
                self.heap.release(old);
            }
        }
        self.heap.release_all(args);
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the current frame, carrying `__return` out pinned
    fn leave(&mut self) -> Pinned {
        let Some(mut frame) = self.frames.pop() else {
            return self.heap.pin_return(Value::Int(0));
        };
        let value = frame.take(RETURN_VAR).unwrap_or(Value::Int(0));
        let pinned = self.heap.pin_return(value);
        self.heap.release_all(frame.into_values());
        pinned
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("functions", &self.functions.len())
            .field("foreign", &self.foreign.len())
            .field("depth", &self.frames.depth())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;
    use crate::interp::output::CaptureSink;
    use crate::parser::parse;

    fn runtime(source: &str) -> (Runtime, CaptureSink) {
        let program = parse(source).unwrap();
        let sink = CaptureSink::new();
        let rt = Runtime::new(program, RuntimeConfig::default()).with_output(sink.clone());
        (rt, sink)
    }

    fn run_ok(source: &str) -> Vec<String> {
        let (mut rt, sink) = runtime(source);
        assert!(rt.run(), "run failed: {:?}", rt.last_error());
        assert_eq!(rt.heap().live_strings(), 0);
        assert_eq!(rt.heap().live_cells(), 0);
        sink.lines()
    }

    fn run_err(source: &str) -> RuntimeError {
        let (mut rt, _) = runtime(source);
        assert!(!rt.run());
        rt.last_error().cloned().unwrap()
    }

    #[test]
    fn test_print_and_arithmetic() {
        let out = run_ok("func main() { print(1 + 2 * 3); print(7 / 2); print(7.0 / 2); }");
        assert_eq!(out, vec!["7", "3", "3.500000"]);
    }

    #[test]
    fn test_if_chain_takes_one_branch() {
        let src = r#"
            func pick(n) {
                if (n == 1) { return "one"; }
                else if (n == 2) { return "two"; }
                else { return "many"; }
            }
            func main() { print(pick(1)); print(pick(2)); print(pick(5)); }
        "#;
        assert_eq!(run_ok(src), vec!["one", "two", "many"]);
    }

    #[test]
    fn test_elif_skipped_after_taken_branch() {
        let src = r#"
            func main() {
                x = 1;
                if (x) { print("a"); } else if (x) { print("b"); } else { print("c"); }
            }
        "#;
        assert_eq!(run_ok(src), vec!["a"]);
    }

    #[test]
    fn test_else_before_if() {
        let err = run_err("func main() {\n x = 1;\n else { print(1); }\n}");
        assert_eq!(err.kind, ErrorKind::MisplacedElse);
        assert_eq!(err.message, "else before if");
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn test_while_break_continue() {
        let src = r#"
            func main() {
                i = 0; total = 0;
                while (1) {
                    i = i + 1;
                    if (i > 5) { break; }
                    if (i % 2 == 0) { continue; }
                    total = total + i;
                }
                print(total);
            }
        "#;
        assert_eq!(run_ok(src), vec!["9"]);
    }

    #[test]
    fn test_range_is_inclusive() {
        let out = run_ok("func main() { s = 0; for (i in 1 .. 4) { s = s + i; } print(s); }");
        assert_eq!(out, vec!["10"]);
    }

    #[test]
    fn test_range_bounds_must_be_int() {
        let err = run_err("func main() { for (i in 1 .. 2.5) { } }");
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_string_condition_rejected() {
        let err = run_err("func main() { if (\"x\") { } }");
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_missing_return_is_zero() {
        assert_eq!(run_ok("func f() { } func main() { print(f()); }"), vec!["0"]);
    }

    #[test]
    fn test_frames_do_not_see_caller_variables() {
        let err = run_err("func f() { return x; } func main() { x = 1; f(); }");
        assert_eq!(err.kind, ErrorKind::UndefinedVariable);
    }

    #[test]
    fn test_undefined_function_hint() {
        let err = run_err("func greet() { } func main() { greeet(); }");
        assert_eq!(err.kind, ErrorKind::UndefinedFunction);
        assert!(err.message.contains("greeet"));
        assert!(err.message.contains("did you mean `greet`?"));
    }

    #[test]
    fn test_error_releases_everything() {
        let (mut rt, _) = runtime(r#"func main() { a[1] = "x"; s = "y"; q = s + 1 / 0; }"#);
        assert!(!rt.run());
        assert_eq!(rt.error_message(), Some("division by zero"));
        assert_eq!(rt.heap().live_strings(), 0);
        assert_eq!(rt.heap().live_cells(), 0);
    }

    #[test]
    fn test_call_function_from_host() {
        let (mut rt, _) = runtime("func twice(s) { return s + s; }");
        let arg = rt.heap_mut().alloc_string("ab").unwrap();
        let v = rt.call_function("twice", vec![arg]).unwrap();
        assert_eq!(rt.heap().text(&v), Some("abab"));
        assert_eq!(rt.heap().ref_count(&v), Some(1));
        rt.release(v);
        assert_eq!(rt.heap().live_strings(), 0);
    }

    #[test]
    fn test_run_is_repeatable() {
        let (mut rt, sink) = runtime(r#"func main() { print("hi"); }"#);
        assert!(rt.run());
        assert!(rt.run());
        assert_eq!(sink.lines(), vec!["hi", "hi"]);
    }
}
