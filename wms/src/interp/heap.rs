//! String and array storage shared by every value in a runtime.
//!
//! Arrays are singly linked lists threaded through the cell pool: a head cell
//! carries the array's reference count and each element cell owns one key and
//! one value. New elements are linked directly after the head, so element
//! order is most-recent-first.

use super::error::{InterpResult, RuntimeError};
use super::pool::Pool;
use super::value::{format_float, ArrayRef, Handle, Scalar, StrRef, Value};
use crate::config::RuntimeConfig;

/// Array-cell pool slot
#[derive(Debug)]
pub(crate) enum Cell {
    Head {
        next: Option<Handle>,
    },
    Element {
        key: Value,
        value: Value,
        next: Option<Handle>,
    },
}

/// Position of an element inside an array, for iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElemId(Handle);

/// A return value in transit from a callee frame to its caller.
///
/// Holding the guard keeps the value's slot pinned; [`Pinned::adopt`] hands
/// the value over and lifts the pin.
#[must_use]
#[derive(Debug)]
pub struct Pinned(Value);

impl Pinned {
    pub fn adopt(self, heap: &mut Heap) -> Value {
        heap.unpin(&self.0);
        self.0
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

/// Both object pools of a runtime
#[derive(Debug)]
pub struct Heap {
    strings: Pool<String>,
    cells: Pool<Cell>,
}

impl Heap {
    pub fn new(string_capacity: usize, array_capacity: usize) -> Self {
        Heap {
            strings: Pool::new("string", string_capacity),
            cells: Pool::new("array", array_capacity),
        }
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self::new(config.string_pool_capacity, config.array_pool_capacity)
    }

    // ============ Allocation and reference counting ============

    pub fn alloc_string(&mut self, text: impl Into<String>) -> InterpResult<Value> {
        let handle = self.strings.alloc(text.into())?;
        Ok(Value::Str(StrRef(handle)))
    }

    /// New empty array (a head cell only)
    pub fn alloc_array(&mut self) -> InterpResult<Value> {
        let handle = self.cells.alloc(Cell::Head { next: None })?;
        Ok(Value::Array(ArrayRef(handle)))
    }

    /// Build a value from a host scalar
    pub fn alloc_scalar(&mut self, scalar: Scalar<'_>) -> InterpResult<Value> {
        match scalar {
            Scalar::Int(n) => Ok(Value::Int(n)),
            Scalar::Float(f) => Ok(Value::Float(f)),
            Scalar::Str(s) => self.alloc_string(s),
        }
    }

    /// Mint another alias of `value`, counting it
    pub fn retain(&mut self, value: &Value) -> Value {
        match value {
            Value::Int(n) => Value::Int(*n),
            Value::Float(f) => Value::Float(*f),
            Value::Str(s) => {
                let live = self.strings.incref(s.0);
                debug_assert!(live, "retain of stale string {}", s.0);
                Value::Str(StrRef(s.0))
            }
            Value::Array(a) => {
                let live = self.cells.incref(a.0);
                debug_assert!(live, "retain of stale array {}", a.0);
                Value::Array(ArrayRef(a.0))
            }
        }
    }

    /// Give back one alias; frees storage when it was the last one
    pub fn release(&mut self, value: Value) {
        let mut pending = vec![value];
        while let Some(value) = pending.pop() {
            match value {
                Value::Int(_) | Value::Float(_) => {}
                Value::Str(s) => {
                    self.strings.decref(s.0);
                }
                Value::Array(a) => {
                    if let Some(head) = self.cells.decref(a.0) {
                        self.free_elements(head, &mut pending);
                    }
                }
            }
        }
    }

    pub fn release_all(&mut self, values: impl IntoIterator<Item = Value>) {
        for value in values {
            self.release(value);
        }
    }

    /// Unlink and free every element after a dead head, queueing their contents
    fn free_elements(&mut self, head: Cell, pending: &mut Vec<Value>) {
        let mut next = match head {
            Cell::Head { next } => next,
            Cell::Element { .. } => None,
        };
        while let Some(handle) = next {
            match self.cells.take(handle) {
                Some(Cell::Element { key, value, next: after }) => {
                    pending.push(key);
                    pending.push(value);
                    next = after;
                }
                _ => break,
            }
        }
    }

    pub fn pin(&mut self, value: &Value) {
        match value {
            Value::Str(s) => {
                self.strings.pin(s.0);
            }
            Value::Array(a) => {
                self.cells.pin(a.0);
            }
            Value::Int(_) | Value::Float(_) => {}
        }
    }

    /// Lift a pin; storage nobody adopted in the meantime is freed here
    pub fn unpin(&mut self, value: &Value) {
        match value {
            Value::Str(s) => {
                self.strings.unpin(s.0);
            }
            Value::Array(a) => {
                if let Some(head) = self.cells.unpin(a.0) {
                    let mut pending = Vec::new();
                    self.free_elements(head, &mut pending);
                    self.release_all(pending);
                }
            }
            Value::Int(_) | Value::Float(_) => {}
        }
    }

    /// Pin a value leaving a callee frame
    pub fn pin_return(&mut self, value: Value) -> Pinned {
        self.pin(&value);
        Pinned(value)
    }

    // ============ Strings ============

    pub fn str(&self, s: &StrRef) -> InterpResult<&str> {
        self.strings
            .get(s.0)
            .map(String::as_str)
            .ok_or_else(|| RuntimeError::invalid_handle("string"))
    }

    /// Text of a string value, `None` for other types
    pub fn text(&self, value: &Value) -> Option<&str> {
        match value {
            Value::Str(s) => self.strings.get(s.0).map(String::as_str),
            _ => None,
        }
    }

    /// Borrowed key view of a value
    pub fn scalar<'a>(&'a self, value: &Value) -> InterpResult<Scalar<'a>> {
        match value {
            Value::Int(n) => Ok(Scalar::Int(*n)),
            Value::Float(f) => Ok(Scalar::Float(*f)),
            Value::Str(s) => self.str(s).map(Scalar::Str),
            Value::Array(_) => Err(RuntimeError::type_error("int, float or str key", "array")),
        }
    }

    /// Stringify a value for printing and concatenation
    pub fn display(&self, value: &Value) -> InterpResult<String> {
        match value {
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) => Ok(format_float(*f)),
            Value::Str(s) => self.str(s).map(str::to_string),
            Value::Array(a) => {
                let mut out = String::from("{");
                for (i, (key, val)) in self.elements(a)?.enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&self.display_shallow(key)?);
                    out.push_str(": ");
                    out.push_str(&self.display_shallow(val)?);
                }
                out.push('}');
                Ok(out)
            }
        }
    }

    fn display_shallow(&self, value: &Value) -> InterpResult<String> {
        match value {
            Value::Array(_) => Ok("{...}".to_string()),
            other => self.display(other),
        }
    }

    // ============ Arrays ============

    fn head_next(&self, array: Handle) -> InterpResult<Option<Handle>> {
        match self.cells.get(array) {
            Some(Cell::Head { next }) => Ok(*next),
            _ => Err(RuntimeError::invalid_handle("array")),
        }
    }

    fn key_matches(&self, key: &Value, wanted: Scalar<'_>) -> bool {
        match (key, wanted) {
            (Value::Int(a), Scalar::Int(b)) => *a == b,
            (Value::Float(a), Scalar::Float(b)) => *a == b,
            (Value::Str(s), Scalar::Str(b)) => self.strings.get(s.0).is_some_and(|a| a == b),
            _ => false,
        }
    }

    /// Element cell holding `key`, if any
    fn find(&self, array: Handle, key: Scalar<'_>) -> InterpResult<Option<Handle>> {
        let mut next = self.head_next(array)?;
        while let Some(handle) = next {
            match self.cells.get(handle) {
                Some(Cell::Element { key: k, next: after, .. }) => {
                    if self.key_matches(k, key) {
                        return Ok(Some(handle));
                    }
                    next = *after;
                }
                _ => return Err(RuntimeError::invalid_handle("array element")),
            }
        }
        Ok(None)
    }

    pub fn array_get(&self, array: &ArrayRef, key: Scalar<'_>) -> InterpResult<Option<&Value>> {
        let Some(handle) = self.find(array.0, key)? else {
            return Ok(None);
        };
        match self.cells.get(handle) {
            Some(Cell::Element { value, .. }) => Ok(Some(value)),
            _ => Err(RuntimeError::invalid_handle("array element")),
        }
    }

    /// Store `value` under `key`, taking ownership of both.
    ///
    /// An existing element keeps its cell; its previous value is released.
    pub fn array_set(&mut self, array: &ArrayRef, key: Value, value: Value) -> InterpResult<()> {
        let found = match self.scalar(&key).and_then(|k| self.find(array.0, k)) {
            Ok(found) => found,
            Err(e) => {
                self.release(key);
                self.release(value);
                return Err(e);
            }
        };

        if let Some(handle) = found {
            if let Some(Cell::Element { value: slot, .. }) = self.cells.get_mut(handle) {
                let old = std::mem::replace(slot, value);
                self.release(old);
                self.release(key);
                return Ok(());
            }
            self.release(key);
            self.release(value);
            return Err(RuntimeError::invalid_handle("array element"));
        }

        if self.cells.is_full() {
            self.release(key);
            self.release(value);
            return Err(RuntimeError::pool_exhausted(
                self.cells.name(),
                self.cells.capacity(),
            ));
        }
        let first = self.head_next(array.0)?;
        let element = self.cells.alloc(Cell::Element {
            key,
            value,
            next: first,
        })?;
        if let Some(Cell::Head { next }) = self.cells.get_mut(array.0) {
            *next = Some(element);
        }
        Ok(())
    }

    /// Counted alias of the value stored under `key`
    pub fn array_fetch(&mut self, array: &ArrayRef, key: &Value) -> InterpResult<Option<Value>> {
        let found = {
            let key = self.scalar(key)?;
            self.find(array.0, key)?
        };
        let Some(handle) = found else {
            return Ok(None);
        };
        let raw = match self.cells.get(handle) {
            Some(Cell::Element { value, .. }) => uncounted(value),
            _ => return Err(RuntimeError::invalid_handle("array element")),
        };
        Ok(Some(self.retain(&raw)))
    }

    /// Unlink the element holding `key`; false when there is none
    pub fn array_remove(&mut self, array: &ArrayRef, key: Scalar<'_>) -> InterpResult<bool> {
        match self.find(array.0, key)? {
            Some(handle) => self.unlink(array.0, handle).map(|()| true),
            None => Ok(false),
        }
    }

    /// [`Heap::array_remove`] keyed by a script value
    pub fn array_remove_value(&mut self, array: &ArrayRef, key: &Value) -> InterpResult<bool> {
        let found = {
            let key = self.scalar(key)?;
            self.find(array.0, key)?
        };
        match found {
            Some(handle) => self.unlink(array.0, handle).map(|()| true),
            None => Ok(false),
        }
    }

    fn unlink(&mut self, array: Handle, target: Handle) -> InterpResult<()> {
        let mut prev = array;
        let mut next = self.head_next(array)?;
        while let Some(handle) = next {
            let after = match self.cells.get(handle) {
                Some(Cell::Element { next, .. }) => *next,
                _ => return Err(RuntimeError::invalid_handle("array element")),
            };
            if handle == target {
                match self.cells.get_mut(prev) {
                    Some(Cell::Head { next }) | Some(Cell::Element { next, .. }) => *next = after,
                    None => return Err(RuntimeError::invalid_handle("array")),
                }
                if let Some(Cell::Element { key, value, .. }) = self.cells.take(handle) {
                    self.release(key);
                    self.release(value);
                }
                return Ok(());
            }
            prev = handle;
            next = after;
        }
        Err(RuntimeError::invalid_handle("array element"))
    }

    pub fn array_len(&self, array: &ArrayRef) -> InterpResult<usize> {
        Ok(self.elements(array)?.count())
    }

    pub fn array_first(&self, array: &ArrayRef) -> InterpResult<Option<ElemId>> {
        Ok(self.head_next(array.0)?.map(ElemId))
    }

    /// Successor of a live element; `None` at the end or for a removed element
    pub fn elem_next(&self, elem: ElemId) -> Option<ElemId> {
        match self.cells.get(elem.0) {
            Some(Cell::Element { next, .. }) => next.map(ElemId),
            _ => None,
        }
    }

    /// Key and value of a live element
    pub fn element(&self, elem: ElemId) -> Option<(&Value, &Value)> {
        match self.cells.get(elem.0) {
            Some(Cell::Element { key, value, .. }) => Some((key, value)),
            _ => None,
        }
    }

    /// Counted aliases of a live element's key and value
    pub fn entry(&mut self, elem: ElemId) -> Option<(Value, Value)> {
        let (key, value) = match self.cells.get(elem.0) {
            Some(Cell::Element { key, value, .. }) => (uncounted(key), uncounted(value)),
            _ => return None,
        };
        Some((self.retain(&key), self.retain(&value)))
    }

    pub fn elem_live(&self, elem: ElemId) -> bool {
        self.element(elem).is_some()
    }

    /// Iterate an array's (key, value) pairs in list order
    pub fn elements(&self, array: &ArrayRef) -> InterpResult<Elements<'_>> {
        Ok(Elements {
            heap: self,
            next: self.array_first(array)?,
        })
    }

    // ============ Diagnostics ============

    /// Current count of the slot behind a string or array value
    pub fn ref_count(&self, value: &Value) -> Option<u32> {
        match value {
            Value::Str(s) => self.strings.ref_count(s.0),
            Value::Array(a) => self.cells.ref_count(a.0),
            Value::Int(_) | Value::Float(_) => None,
        }
    }

    pub fn is_pinned(&self, value: &Value) -> Option<bool> {
        match value {
            Value::Str(s) => self.strings.is_pinned(s.0),
            Value::Array(a) => self.cells.is_pinned(a.0),
            Value::Int(_) | Value::Float(_) => None,
        }
    }

    /// Whether a string or array value still refers to live storage
    pub fn is_live(&self, value: &Value) -> bool {
        match value {
            Value::Str(s) => self.strings.is_live(s.0),
            Value::Array(a) => self.cells.is_live(a.0),
            Value::Int(_) | Value::Float(_) => true,
        }
    }

    pub fn live_strings(&self) -> usize {
        self.strings.live()
    }

    /// Heads and elements in use
    pub fn live_cells(&self) -> usize {
        self.cells.live()
    }

    /// Drop all storage, e.g. after a failed run left temporaries behind
    pub fn reset(&mut self) {
        self.strings.reset();
        self.cells.reset();
    }
}

/// Bitwise copy of a value that does not own a count; only for immediate `retain`
fn uncounted(value: &Value) -> Value {
    match value {
        Value::Int(n) => Value::Int(*n),
        Value::Float(f) => Value::Float(*f),
        Value::Str(s) => Value::Str(StrRef(s.0)),
        Value::Array(a) => Value::Array(ArrayRef(a.0)),
    }
}

/// Iterator over an array's elements
pub struct Elements<'a> {
    heap: &'a Heap,
    next: Option<ElemId>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = (&'a Value, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.heap.elem_next(current);
        self.heap.element(current)
    }
}
