//! sipc-ast - AST types for SIP programs.
//!
//! This crate owns the data model handed from whatever produced the program
//! tree (see the `--ast` flag on the driver) to the semantic analyzer and IR
//! lowering stage. There is no lexer or parser here.

pub mod ast;

pub use ast::*;
