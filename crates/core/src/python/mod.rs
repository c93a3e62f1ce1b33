//! Python AST and its textual emission.
//!
//! Code generation builds structured [`ast`] values; [`emit`] turns them into
//! source text mechanically, so formatting rules live in exactly one place.

pub mod ast;
pub mod emit;

pub use ast::{PyClass, PyExpr, PyFunction, PyImport, PyItem, PyModule, PyParam, PyStmt, PyType};
pub use emit::Emit;
