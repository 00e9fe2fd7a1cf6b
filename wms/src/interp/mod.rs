//! Tree-walking interpreter
//!
//! [`Runtime`] executes a parsed [`Program`](crate::ast::Program). Strings and
//! arrays live in a per-runtime [`Heap`] of reference-counted pool slots;
//! each call gets its own [`Frame`]; hosts extend the language through
//! [`ForeignFunction`] tables.

mod error;
mod eval;
mod ffi;
mod frame;
mod heap;
mod intrinsics;
mod ops;
mod output;
mod pool;
mod value;

pub use error::{ErrorClass, ErrorKind, InterpResult, RuntimeError};
pub use eval::Runtime;
pub use ffi::{CallContext, ForeignFn, ForeignFunction, ForeignRegistry};
pub use frame::{Frame, FrameStack, RETURN_VAR};
pub use heap::{ElemId, Elements, Heap, Pinned};
pub use intrinsics::Intrinsic;
pub use ops::{parse_float_prefix, parse_int_prefix};
pub use output::{CaptureSink, LineWriter, OutputSink, StdoutSink};
pub use pool::Pool;
pub use value::{format_float, ArrayRef, Handle, Scalar, StrRef, Value};
