//! Semantic analysis: symbol tables and the AST-building checker.

mod checker;
pub mod tables;

pub use checker::{CheckedProgram, SemanticChecker};
