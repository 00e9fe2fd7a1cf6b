//! WMS scripting runtime
//!
//! A small embeddable scripting language: scripts are parsed into an AST
//! and executed by a tree-walking [`Runtime`] with pooled, reference-counted
//! strings and arrays. Hosts add functions through foreign-function tables.
//!
//! ```no_run
//! use wms::{parse, Runtime, RuntimeConfig};
//!
//! let program = parse(r#"func main() { print("hello"); }"#)?;
//! let mut runtime = Runtime::new(program, RuntimeConfig::default());
//! if !runtime.run() {
//!     eprintln!("line {:?}: {:?}", runtime.error_line(), runtime.error_message());
//! }
//! # Ok::<(), wms::WmsError>(())
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod util;

pub use ast::Span;
pub use config::RuntimeConfig;
pub use error::{Result, WmsError};
pub use interp::{CallContext, ForeignFunction, Runtime, RuntimeError, Value};
pub use parser::parse;
