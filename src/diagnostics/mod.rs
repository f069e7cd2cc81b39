//! Compiler error types.
//!
//! Every pass reports at most one error: the first problem found aborts
//! the compilation, so errors are plain enums propagated with `?` instead
//! of an accumulating reporter.

use thiserror::Error;

use crate::typing::Type;

/// Errors detected while tokenizing source text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("LEXICAL ERROR ({line}): unexpected character '{ch}'.")]
    UnexpectedCharacter { line: usize, ch: char },

    #[error("LEXICAL ERROR ({line}): unterminated string literal.")]
    UnterminatedString { line: usize },
}

/// Errors detected while parsing the token stream
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("SYNTAX ERROR ({line}): expected {expected}, found '{found}'.")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },
}

/// Errors detected by the semantic checker
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("SEMANTIC ERROR ({line}): variable '{name}' was not declared.")]
    UndeclaredVariable { line: usize, name: String },

    #[error("SEMANTIC ERROR ({line}): variable '{name}' already declared at line {original_line}.")]
    RedeclaredVariable {
        line: usize,
        name: String,
        original_line: usize,
    },

    #[error(
        "SEMANTIC ERROR ({line}): incompatible types for operator '{op}', \
         LHS is '{lhs}' and RHS is '{rhs}'."
    )]
    OperatorMismatch {
        line: usize,
        op: String,
        lhs: Type,
        rhs: Type,
    },

    #[error("SEMANTIC ERROR ({line}): conditional expression in '{construct}' is '{found}' instead of 'bool'.")]
    NonBoolGuard {
        line: usize,
        construct: &'static str,
        found: Type,
    },

    #[error("SEMANTIC ERROR ({line}): function '{name}' was not declared.")]
    UndeclaredFunction { line: usize, name: String },
}

/// Errors detected during IR emission
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("CODE GENERATION ERROR: cannot read into a variable of type '{0}'.")]
    UnsupportedReadType(Type),
}

/// Any error produced by the compilation pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}
