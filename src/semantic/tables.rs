//! Compile-time symbol tables: strings, variables, functions and arrays.
//!
//! All tables are append-only and referenced by dense index. Entries are
//! never removed or reordered, so an index handed out at insertion time
//! stays valid for the whole compilation.

use std::fmt;

use tracing::debug;

use crate::typing::Type;

/// Index of the built-in `read` intrinsic in the function table.
pub const READ_IDX: usize = 0;
/// Index of the built-in `write` intrinsic in the function table.
pub const WRITE_IDX: usize = 1;

/// Deduplicated table of string literals
#[derive(Debug, Default)]
pub struct StrTable {
    strings: Vec<String>,
}

impl StrTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal, returning its index. Re-adding an existing literal
    /// returns the index assigned the first time.
    pub fn intern(&mut self, s: &str) -> usize {
        if let Some(idx) = self.strings.iter().position(|t| t == s) {
            return idx;
        }
        let idx = self.strings.len();
        debug!(idx, literal = s, "interned string");
        self.strings.push(s.to_string());
        idx
    }

    pub fn get(&self, idx: usize) -> &str {
        &self.strings[idx]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl fmt::Display for StrTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strings table:")?;
        for (i, s) in self.strings.iter().enumerate() {
            writeln!(f, "Entry {} -- {}", i, s)?;
        }
        Ok(())
    }
}

/// A declared variable
#[derive(Debug, Clone)]
pub struct VarEntry {
    pub name: String,
    pub line: usize,
    pub ty: Type,
}

/// Table of declared variables, one scope per table
#[derive(Debug, Default)]
pub struct VarTable {
    entries: Vec<VarEntry>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear lookup by name; the first match wins.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn add(&mut self, name: &str, line: usize, ty: Type) -> usize {
        let idx = self.entries.len();
        debug!(idx, name, line, %ty, "declared variable");
        self.entries.push(VarEntry {
            name: name.to_string(),
            line,
            ty,
        });
        idx
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.entries[idx].name
    }

    pub fn line(&self, idx: usize) -> usize {
        self.entries[idx].line
    }

    pub fn ty(&self, idx: usize) -> Type {
        self.entries[idx].ty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for VarTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Variables table:")?;
        for (i, e) in self.entries.iter().enumerate() {
            writeln!(
                f,
                "Entry {} -- name: {}, line: {}, type: {}",
                i, e.name, e.line, e.ty
            )?;
        }
        Ok(())
    }
}

/// A declared function, with its own variable table for parameters and locals
#[derive(Debug)]
pub struct FunctionEntry {
    pub name: String,
    pub line: usize,
    pub ty: Type,
    pub params: Vec<Type>,
    pub locals: VarTable,
}

/// Table of functions, pre-seeded with the read/write intrinsics
#[derive(Debug)]
pub struct FunctionTable {
    entries: Vec<FunctionEntry>,
}

impl FunctionTable {
    /// The two built-ins occupy indices 0 and 1. Their single string-typed
    /// parameter slot is used for dispatch only, never type-checked.
    pub fn new() -> Self {
        let mut table = Self {
            entries: Vec::new(),
        };
        table.add("read", 0, Type::NoType);
        table.set_params(vec![Type::Str]);
        table.add("write", 0, Type::NoType);
        table.set_params(vec![Type::Str]);
        table
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn add(&mut self, name: &str, line: usize, ty: Type) -> usize {
        let idx = self.entries.len();
        debug!(idx, name, line, %ty, "declared function");
        self.entries.push(FunctionEntry {
            name: name.to_string(),
            line,
            ty,
            params: Vec::new(),
            locals: VarTable::new(),
        });
        idx
    }

    /// Set the parameter-type list of the most recently added function.
    pub fn set_params(&mut self, params: Vec<Type>) {
        if let Some(entry) = self.entries.last_mut() {
            entry.params = params;
        }
    }

    /// Declare a local in the most recently added function's scope.
    pub fn add_local(&mut self, name: &str, line: usize, ty: Type) -> usize {
        let entry = self.entries.last_mut().expect("builtins always present");
        entry.locals.add(name, line, ty)
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.entries[idx].name
    }

    pub fn line(&self, idx: usize) -> usize {
        self.entries[idx].line
    }

    pub fn ty(&self, idx: usize) -> Type {
        self.entries[idx].ty
    }

    pub fn params(&self, idx: usize) -> &[Type] {
        &self.entries[idx].params
    }

    pub fn locals(&self, idx: usize) -> &VarTable {
        &self.entries[idx].locals
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Functions table:")?;
        for (i, e) in self.entries.iter().enumerate() {
            writeln!(
                f,
                "Entry {} -- name: {}, line: {}, type: {}",
                i, e.name, e.line, e.ty
            )?;
            for p in &e.params {
                writeln!(f, "\t type: {}", p)?;
            }
            writeln!(f, "\t Function Variable Table:")?;
            for j in 0..e.locals.len() {
                writeln!(
                    f,
                    "\t\t name: {}, line: {}, type: {}",
                    e.locals.name(j),
                    e.locals.line(j),
                    e.locals.ty(j)
                )?;
            }
        }
        Ok(())
    }
}

/// An inclusive index range of one array dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lower: i64,
    pub upper: i64,
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lower, self.upper)
    }
}

/// A declared array
#[derive(Debug)]
pub struct ArrayEntry {
    pub name: String,
    pub line: usize,
    pub elem_ty: Type,
    pub ranges: Vec<Range>,
}

/// Table of declared arrays and their dimension ranges
#[derive(Debug, Default)]
pub struct ArrayTable {
    entries: Vec<ArrayEntry>,
}

impl ArrayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn add(&mut self, name: &str, line: usize, elem_ty: Type, ranges: Vec<Range>) -> usize {
        let idx = self.entries.len();
        debug!(idx, name, line, %elem_ty, "declared array");
        self.entries.push(ArrayEntry {
            name: name.to_string(),
            line,
            elem_ty,
            ranges,
        });
        idx
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.entries[idx].name
    }

    pub fn line(&self, idx: usize) -> usize {
        self.entries[idx].line
    }

    pub fn elem_ty(&self, idx: usize) -> Type {
        self.entries[idx].elem_ty
    }

    pub fn ranges(&self, idx: usize) -> &[Range] {
        &self.entries[idx].ranges
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ArrayTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Array table:")?;
        for (i, e) in self.entries.iter().enumerate() {
            let dims: Vec<String> = e.ranges.iter().map(Range::to_string).collect();
            writeln!(
                f,
                "Entry {} -- name: {}, line: {}, type: {}, range: [({})]",
                i,
                e.name,
                e.line,
                e.elem_ty,
                dims.join(", ")
            )?;
        }
        Ok(())
    }
}
