//! Spy language compiler and runtime
//!
//! Spy extends a Python-like surface with C++/Java-style class modifiers:
//! `interface`, `abstract class`, `final class`, `extends`, `implements`,
//! and per-member `abstract`, `final`, `static`. This crate provides the
//! compiler front end (lexer, parser, modifier checker), the canonical
//! printer, and a tree-walking runtime for `.spc` programs.

pub mod cli;
pub mod compile;
pub mod format;
pub mod frontend;
pub mod runtime;

pub use compile::Compilation;
pub use frontend::ast;
pub use frontend::checker;
pub use frontend::diagnostics;
pub use frontend::lexer;
pub use frontend::parser;
pub use frontend::symbols;
