//! A tiny interpreter for line-oriented "rituals".
//!
//! Each input line starts with a verb (`summon`, `chant`, `fuse`, ...) followed by
//! arguments. Arguments are expression fragments written in a very small
//! arithmetic/string language, evaluated against a per-session variable store.
//! Fragments that do not parse are taken literally, so `dream hello` works just as
//! well as `dream 4`.
//!
//! The main entry point is [`Interpreter`], which processes one line at a time and
//! returns an optional [`Response`]. The [`session`] module wires an interpreter to
//! the console or to a script file.

pub mod env;
pub mod evaluator;
mod io_adapters;
mod interpreter;
pub mod lexer;
pub mod parser;
mod rite;
pub mod session;
pub mod value;

/// Just a convenient re-export of the line interpreter.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, Response};
pub use io_adapters::MemWriter;
pub use value::Value;
