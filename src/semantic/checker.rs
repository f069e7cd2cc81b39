//! Semantic checking and AST construction.
//!
//! A single pass over the parse tree that validates declarations and
//! types while building the AST. The pass aborts on the first error.

use tracing::debug;

use crate::ast::{Ast, NodeKind, Payload};
use crate::diagnostics::SemanticError;
use crate::lexer::{Token, TokenKind};
use crate::parser::{
    AssignStmtCtx, BlockCtx, ExprCtx, FunctionDeclCtx, ProcCallCtx, ProgramCtx,
    ProgramHeadingCtx, StatementCtx, TypeSpecCtx, VarDeclCtx,
};
use crate::semantic::tables::{ArrayTable, FunctionTable, Range, StrTable, VarTable};
use crate::typing::{Conv, Type};

/// Everything a successful semantic pass produces. The tables are never
/// mutated afterwards; the code generator borrows them.
#[derive(Debug)]
pub struct CheckedProgram {
    pub ast: Ast,
    pub str_table: StrTable,
    pub var_table: VarTable,
    pub fun_table: FunctionTable,
    pub array_table: ArrayTable,
}

/// One-pass visitor over the parse tree
pub struct SemanticChecker {
    str_table: StrTable,
    var_table: VarTable,
    fun_table: FunctionTable,
    array_table: ArrayTable,
    /// Type most recently seen in a declaration header; it types the
    /// identifiers that follow it.
    last_decl_type: Type,
    /// Function-table index of the function being checked, if any. The
    /// active variable scope is that function's locals table.
    current_function: Option<usize>,
}

impl SemanticChecker {
    pub fn new() -> Self {
        Self {
            str_table: StrTable::new(),
            var_table: VarTable::new(),
            fun_table: FunctionTable::new(),
            array_table: ArrayTable::new(),
            last_decl_type: Type::NoType,
            current_function: None,
        }
    }

    /// Check the whole program, consuming the checker and returning the
    /// AST together with the populated tables.
    pub fn check(mut self, program: &ProgramCtx) -> Result<CheckedProgram, SemanticError> {
        let heading = self.visit_heading(&program.heading);
        let block = self.visit_block(&program.block)?;
        let ast = Ast::subtree(NodeKind::Program, Type::NoType, vec![heading, block]);
        debug!(
            vars = self.var_table.len(),
            strings = self.str_table.len(),
            "semantic pass finished"
        );
        Ok(CheckedProgram {
            ast,
            str_table: self.str_table,
            var_table: self.var_table,
            fun_table: self.fun_table,
            array_table: self.array_table,
        })
    }

    fn visit_heading(&self, _heading: &ProgramHeadingCtx) -> Ast {
        // The program name is not a variable; nothing gets registered.
        let ident = Ast::new(NodeKind::Identifier, Payload::None, Type::NoType);
        Ast::subtree(NodeKind::ProgramHeading, Type::NoType, vec![ident])
    }

    fn visit_block(&mut self, block: &BlockCtx) -> Result<Ast, SemanticError> {
        let mut children = Vec::new();

        if !block.var_decls.is_empty() {
            let mut part = Ast::subtree(NodeKind::VarDeclPart, Type::NoType, Vec::new());
            for decl in &block.var_decls {
                part.add_child(self.visit_var_decl(decl)?);
            }
            children.push(part);
        }

        for func in &block.functions {
            children.push(self.visit_function_decl(func)?);
        }

        children.push(self.visit_statements(&block.body)?);
        Ok(Ast::subtree(NodeKind::Block, Type::NoType, children))
    }

    /// One `a, b: <type>;` group. Scalar names land in the variable
    /// table; array names land in the array table and produce no
    /// declaration nodes (array access is not lowered).
    fn visit_var_decl(&mut self, decl: &VarDeclCtx) -> Result<Ast, SemanticError> {
        let mut list = Ast::subtree(NodeKind::VarList, Type::NoType, Vec::new());
        match &decl.type_spec {
            TypeSpecCtx::Simple { keyword } => {
                self.last_decl_type = keyword_type(keyword);
                for name in &decl.names {
                    list.add_child(self.new_var(name)?);
                }
            }
            TypeSpecCtx::Array { ranges, elem } => {
                let elem_ty = keyword_type(elem);
                let ranges: Vec<Range> = ranges
                    .iter()
                    .map(|r| Range {
                        lower: int_value(&r.lower),
                        upper: int_value(&r.upper),
                    })
                    .collect();
                for name in &decl.names {
                    self.new_array(name, elem_ty, ranges.clone())?;
                }
            }
        }
        Ok(list)
    }

    fn visit_function_decl(&mut self, func: &FunctionDeclCtx) -> Result<Ast, SemanticError> {
        let ret_ty = match &func.return_type {
            TypeSpecCtx::Simple { keyword } | TypeSpecCtx::Array { elem: keyword, .. } => {
                keyword_type(keyword)
            }
        };
        let fidx = self.fun_table.add(&func.name.lexeme, func.name.line, ret_ty);
        self.current_function = Some(fidx);

        let mut param_types = Vec::new();
        let mut param_list = Ast::subtree(NodeKind::ParamList, Type::NoType, Vec::new());
        for group in &func.params {
            match &group.type_spec {
                TypeSpecCtx::Simple { keyword } | TypeSpecCtx::Array { elem: keyword, .. } => {
                    self.last_decl_type = keyword_type(keyword);
                }
            }
            for name in &group.names {
                param_types.push(self.last_decl_type);
                param_list.add_child(self.new_var(name)?);
            }
        }
        self.fun_table.set_params(param_types);

        let mut decl_part = Ast::subtree(NodeKind::VarDeclPart, Type::NoType, Vec::new());
        for decl in &func.locals {
            decl_part.add_child(self.visit_var_decl(decl)?);
        }

        let body = self.visit_statements(&func.body)?;
        self.current_function = None;

        let ident = Ast::new(NodeKind::FuncIdent, Payload::Int(fidx as i64), ret_ty);
        Ok(Ast::subtree(
            NodeKind::FuncDecl,
            ret_ty,
            vec![ident, param_list, decl_part, body],
        ))
    }

    fn visit_statements(&mut self, stmts: &[StatementCtx]) -> Result<Ast, SemanticError> {
        let mut list = Ast::subtree(NodeKind::StatementList, Type::NoType, Vec::new());
        for stmt in stmts {
            list.add_child(self.visit_statement(stmt)?);
        }
        Ok(list)
    }

    fn visit_statement(&mut self, stmt: &StatementCtx) -> Result<Ast, SemanticError> {
        match stmt {
            StatementCtx::Assign(assign) => self.visit_assign(assign),
            StatementCtx::If(stmt) => {
                let guard = self.visit_expr(&stmt.guard)?;
                check_bool_expr(stmt.line, "if", guard.ty)?;
                let mut children = vec![guard, self.visit_statement(&stmt.then_branch)?];
                if let Some(else_branch) = &stmt.else_branch {
                    children.push(self.visit_statement(else_branch)?);
                }
                Ok(Ast::subtree(NodeKind::If, Type::NoType, children))
            }
            StatementCtx::Repeat(stmt) => {
                let body = self.visit_statements(&stmt.body)?;
                let guard = self.visit_expr(&stmt.guard)?;
                check_bool_expr(stmt.line, "repeat", guard.ty)?;
                Ok(Ast::subtree(NodeKind::Repeat, Type::NoType, vec![guard, body]))
            }
            StatementCtx::ProcCall(call) => self.visit_proc_call(call),
            StatementCtx::Compound(stmts) => self.visit_statements(stmts),
        }
    }

    fn visit_assign(&mut self, assign: &AssignStmtCtx) -> Result<Ast, SemanticError> {
        let target = self.check_var(&assign.target)?;
        let value = self.visit_expr(&assign.value)?;

        // Bool, Str and Int targets require an exact match; Real also
        // accepts Int through a widening conversion.
        let value = match (target.ty, value.ty) {
            (l, r) if l == r => value,
            (Type::Real, Type::Int) => wrap_conv(value, Conv::I2R),
            (l, r) => {
                return Err(SemanticError::OperatorMismatch {
                    line: assign.target.line,
                    op: ":=".to_string(),
                    lhs: l,
                    rhs: r,
                })
            }
        };

        Ok(Ast::subtree(
            NodeKind::Assign,
            Type::NoType,
            vec![target, value],
        ))
    }

    fn visit_proc_call(&mut self, call: &ProcCallCtx) -> Result<Ast, SemanticError> {
        let fidx = self.fun_table.lookup(&call.name.lexeme).ok_or_else(|| {
            SemanticError::UndeclaredFunction {
                line: call.name.line,
                name: call.name.lexeme.clone(),
            }
        })?;

        let ident = Ast::new(
            NodeKind::FuncIdent,
            Payload::Int(fidx as i64),
            self.fun_table.ty(fidx),
        );
        let mut params = Ast::subtree(NodeKind::ParamList, Type::NoType, Vec::new());
        for arg in &call.args {
            params.add_child(self.visit_expr(arg)?);
        }
        Ok(Ast::subtree(
            NodeKind::ProcCall,
            Type::NoType,
            vec![ident, params],
        ))
    }

    fn visit_expr(&mut self, expr: &ExprCtx) -> Result<Ast, SemanticError> {
        match expr {
            ExprCtx::IntLit(token) => Ok(Ast::new(
                NodeKind::IntVal,
                Payload::Int(int_value(token)),
                Type::Int,
            )),
            ExprCtx::RealLit(token) => {
                let value: f64 = token
                    .lexeme
                    .parse()
                    .expect("scanner only emits digits and one dot");
                Ok(Ast::new(NodeKind::RealVal, Payload::Real(value), Type::Real))
            }
            ExprCtx::BoolLit(token) => {
                let value = i64::from(token.kind == TokenKind::True);
                Ok(Ast::new(NodeKind::BoolVal, Payload::Int(value), Type::Bool))
            }
            ExprCtx::StrLit(token) => {
                let idx = self.str_table.intern(&token.lexeme);
                Ok(Ast::new(
                    NodeKind::StrVal,
                    Payload::Int(idx as i64),
                    Type::Str,
                ))
            }
            ExprCtx::Var(token) => self.check_var(token),
            ExprCtx::Binary { op, lhs, rhs } => self.visit_binary(op, lhs, rhs),
        }
    }

    fn visit_binary(&mut self, op: &Token, lhs: &ExprCtx, rhs: &ExprCtx) -> Result<Ast, SemanticError> {
        let lhs = self.visit_expr(lhs)?;
        let rhs = self.visit_expr(rhs)?;

        // 'and'/'or' are not table-driven: both operands must already
        // be Bool, no conversions apply.
        if matches!(op.kind, TokenKind::And | TokenKind::Or) {
            if lhs.ty != Type::Bool || rhs.ty != Type::Bool {
                return Err(type_mismatch(op, lhs.ty, rhs.ty));
            }
            let kind = if op.kind == TokenKind::And {
                NodeKind::And
            } else {
                NodeKind::Or
            };
            return Ok(Ast::subtree(kind, Type::Bool, vec![lhs, rhs]));
        }

        let unified = match op.kind {
            TokenKind::Plus => lhs.ty.unify_plus(rhs.ty),
            TokenKind::Minus | TokenKind::Star | TokenKind::Slash => {
                lhs.ty.unify_other_arith(rhs.ty)
            }
            _ => lhs.ty.unify_comp(rhs.ty),
        };
        if unified.ty == Type::NoType {
            return Err(type_mismatch(op, lhs.ty, rhs.ty));
        }

        let lhs = wrap_conv(lhs, unified.lconv);
        let rhs = wrap_conv(rhs, unified.rconv);
        Ok(Ast::subtree(op_kind(op.kind), unified.ty, vec![lhs, rhs]))
    }

    // ------------------------------------------------------------------
    // Declaration and lookup against the active scope.

    fn active_lookup(&self, name: &str) -> Option<(usize, Type, usize)> {
        let table = match self.current_function {
            Some(fidx) => self.fun_table.locals(fidx),
            None => &self.var_table,
        };
        table
            .lookup(name)
            .map(|idx| (idx, table.ty(idx), table.line(idx)))
    }

    /// Declare a new variable in the active scope, with the last
    /// declared type. Redeclaration is an error citing the first
    /// declaration's line.
    fn new_var(&mut self, token: &Token) -> Result<Ast, SemanticError> {
        if let Some((_, _, original_line)) = self.active_lookup(&token.lexeme) {
            return Err(SemanticError::RedeclaredVariable {
                line: token.line,
                name: token.lexeme.clone(),
                original_line,
            });
        }
        let idx = match self.current_function {
            Some(_) => self
                .fun_table
                .add_local(&token.lexeme, token.line, self.last_decl_type),
            None => self
                .var_table
                .add(&token.lexeme, token.line, self.last_decl_type),
        };
        Ok(Ast::new(
            NodeKind::VarDecl,
            Payload::Int(idx as i64),
            self.last_decl_type,
        ))
    }

    fn new_array(
        &mut self,
        token: &Token,
        elem_ty: Type,
        ranges: Vec<Range>,
    ) -> Result<(), SemanticError> {
        if let Some(idx) = self.array_table.lookup(&token.lexeme) {
            return Err(SemanticError::RedeclaredVariable {
                line: token.line,
                name: token.lexeme.clone(),
                original_line: self.array_table.line(idx),
            });
        }
        if let Some((_, _, original_line)) = self.active_lookup(&token.lexeme) {
            return Err(SemanticError::RedeclaredVariable {
                line: token.line,
                name: token.lexeme.clone(),
                original_line,
            });
        }
        self.array_table
            .add(&token.lexeme, token.line, elem_ty, ranges);
        Ok(())
    }

    /// Resolve a variable use in the active scope.
    fn check_var(&mut self, token: &Token) -> Result<Ast, SemanticError> {
        match self.active_lookup(&token.lexeme) {
            Some((idx, ty, _)) => Ok(Ast::new(NodeKind::VarUse, Payload::Int(idx as i64), ty)),
            None => Err(SemanticError::UndeclaredVariable {
                line: token.line,
                name: token.lexeme.clone(),
            }),
        }
    }
}

impl Default for SemanticChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn check_bool_expr(line: usize, construct: &'static str, ty: Type) -> Result<(), SemanticError> {
    if ty != Type::Bool {
        return Err(SemanticError::NonBoolGuard {
            line,
            construct,
            found: ty,
        });
    }
    Ok(())
}

fn type_mismatch(op: &Token, lhs: Type, rhs: Type) -> SemanticError {
    SemanticError::OperatorMismatch {
        line: op.line,
        op: op.lexeme.clone(),
        lhs,
        rhs,
    }
}

/// Wrap a node in the conversion the unification prescribed.
fn wrap_conv(node: Ast, conv: Conv) -> Ast {
    let (kind, ty) = match conv {
        Conv::B2I => (NodeKind::B2I, Type::Int),
        Conv::B2R => (NodeKind::B2R, Type::Real),
        Conv::B2S => (NodeKind::B2S, Type::Str),
        Conv::I2R => (NodeKind::I2R, Type::Real),
        Conv::I2S => (NodeKind::I2S, Type::Str),
        Conv::R2S => (NodeKind::R2S, Type::Str),
        Conv::None => return node,
    };
    Ast::subtree(kind, ty, vec![node])
}

fn op_kind(kind: TokenKind) -> NodeKind {
    match kind {
        TokenKind::Plus => NodeKind::Plus,
        TokenKind::Minus => NodeKind::Minus,
        TokenKind::Star => NodeKind::Times,
        TokenKind::Slash => NodeKind::Over,
        TokenKind::Equal => NodeKind::Eq,
        TokenKind::NotEqual => NodeKind::NotEq,
        TokenKind::Less => NodeKind::Lt,
        TokenKind::LessEqual => NodeKind::Le,
        TokenKind::Greater => NodeKind::Gt,
        TokenKind::GreaterEqual => NodeKind::Ge,
        other => unreachable!("{:?} is not a binary operator", other),
    }
}

fn keyword_type(token: &Token) -> Type {
    match token.kind {
        TokenKind::Integer => Type::Int,
        TokenKind::Real => Type::Real,
        TokenKind::Boolean => Type::Bool,
        TokenKind::String => Type::Str,
        other => unreachable!("{:?} is not a type keyword", other),
    }
}

fn int_value(token: &Token) -> i64 {
    token.lexeme.parse().expect("scanner only emits digit runs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use crate::semantic::tables::{READ_IDX, WRITE_IDX};

    fn check(source: &str) -> CheckedProgram {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        SemanticChecker::new().check(&program).unwrap()
    }

    fn check_err(source: &str) -> SemanticError {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        SemanticChecker::new().check(&program).unwrap_err()
    }

    #[test]
    fn assigning_int_to_real_inserts_one_widening() {
        let checked = check(
            "program p;\nvar x: integer;\ny: real;\nbegin y := x end.",
        );
        assert_eq!(checked.ast.count_kind(NodeKind::I2R), 1);
        assert_eq!(checked.var_table.ty(0), Type::Int);
        assert_eq!(checked.var_table.ty(1), Type::Real);
    }

    #[test]
    fn duplicate_declaration_cites_the_original_line() {
        let err = check_err("program p;\nvar x: integer;\nx: real;\nbegin end.");
        assert_eq!(
            err.to_string(),
            "SEMANTIC ERROR (3): variable 'x' already declared at line 2."
        );
    }

    #[test]
    fn undeclared_variable_is_an_error() {
        let err = check_err("program p; begin x := 1 end.");
        assert_eq!(
            err.to_string(),
            "SEMANTIC ERROR (1): variable 'x' was not declared."
        );
    }

    #[test]
    fn assigning_string_to_int_fails() {
        let err = check_err("program p; var a: integer; begin a := 'oops' end.");
        assert_eq!(
            err,
            SemanticError::OperatorMismatch {
                line: 1,
                op: ":=".to_string(),
                lhs: Type::Int,
                rhs: Type::Str,
            }
        );
    }

    #[test]
    fn int_plus_bool_is_widened_to_int() {
        let checked = check("program p; var a: integer; begin a := 1 + true end.");
        assert_eq!(checked.ast.count_kind(NodeKind::B2I), 1);
        assert_eq!(checked.ast.count_kind(NodeKind::Plus), 1);
    }

    #[test]
    fn string_concatenation_converts_the_numeric_side() {
        let checked = check("program p; var s: string; begin s := 'n = ' + 3 end.");
        assert_eq!(checked.ast.count_kind(NodeKind::I2S), 1);
    }

    #[test]
    fn non_bool_if_guard_is_rejected() {
        let err = check_err("program p; var a: integer; begin if a then a := 1 end.");
        assert_eq!(
            err.to_string(),
            "SEMANTIC ERROR (1): conditional expression in 'if' is 'int' instead of 'bool'."
        );
    }

    #[test]
    fn non_bool_repeat_guard_is_rejected() {
        let err = check_err(
            "program p;\nvar i: integer;\nbegin\nrepeat i := i + 1 until i\nend.",
        );
        assert_eq!(
            err,
            SemanticError::NonBoolGuard {
                line: 4,
                construct: "repeat",
                found: Type::Int,
            }
        );
    }

    #[test]
    fn logical_operators_require_bool_operands() {
        let err = check_err("program p; var b: boolean; begin b := b and 1 end.");
        assert_eq!(
            err,
            SemanticError::OperatorMismatch {
                line: 1,
                op: "and".to_string(),
                lhs: Type::Bool,
                rhs: Type::Int,
            }
        );
    }

    #[test]
    fn comparing_bools_is_a_type_error() {
        let err = check_err("program p; var b: boolean; begin if b < b then b := true end.");
        assert!(matches!(err, SemanticError::OperatorMismatch { .. }));
    }

    #[test]
    fn intrinsic_calls_resolve_to_fixed_indices() {
        let checked = check("program p; var x: integer; begin read(x); write(x) end.");
        let stmts = checked.ast.child(1).child(1);
        let read_ident = stmts.child(0).child(0);
        let write_ident = stmts.child(1).child(0);
        assert_eq!(read_ident.kind, NodeKind::FuncIdent);
        assert_eq!(read_ident.index(), READ_IDX);
        assert_eq!(write_ident.index(), WRITE_IDX);
    }

    #[test]
    fn calling_an_undeclared_function_fails() {
        let err = check_err("program p; begin shuffle(1) end.");
        assert_eq!(
            err.to_string(),
            "SEMANTIC ERROR (1): function 'shuffle' was not declared."
        );
    }

    #[test]
    fn identical_literals_share_one_table_entry() {
        let checked = check("program p; begin write('hi'); write('hi'); write('ho') end.");
        assert_eq!(checked.str_table.len(), 2);
        assert_eq!(checked.str_table.get(0), "hi");
        assert_eq!(checked.str_table.get(1), "ho");
    }

    #[test]
    fn array_declarations_fill_the_array_table() {
        let checked = check(
            "program p; var grid: array [1..3, 0..4] of integer; begin end.",
        );
        assert_eq!(checked.array_table.len(), 1);
        assert_eq!(checked.array_table.elem_ty(0), Type::Int);
        assert_eq!(checked.array_table.ranges(0)[1].to_string(), "0..4");
        assert!(checked.var_table.is_empty());
    }

    #[test]
    fn function_params_and_locals_live_in_their_own_scope() {
        let source = "program p;\n\
                      var x: integer;\n\
                      function inc(n: integer): integer;\n\
                      var r: integer;\n\
                      begin r := n + 1 end;\n\
                      begin x := 1 end.";
        let checked = check(source);
        let f = checked.fun_table.lookup("inc").unwrap();
        assert_eq!(checked.fun_table.params(f), &[Type::Int]);
        assert_eq!(checked.fun_table.locals(f).lookup("n"), Some(0));
        assert_eq!(checked.fun_table.locals(f).lookup("r"), Some(1));
        // 'x' is global, not a local of 'inc'.
        assert_eq!(checked.fun_table.locals(f).lookup("x"), None);
        assert_eq!(checked.var_table.lookup("x"), Some(0));
    }

    #[test]
    fn function_bodies_resolve_names_in_their_own_scope_only() {
        let source = "program p;\n\
                      var x: integer;\n\
                      function bad: integer;\n\
                      begin x := 1 end;\n\
                      begin end.";
        let err = check_err(source);
        assert_eq!(
            err,
            SemanticError::UndeclaredVariable {
                line: 4,
                name: "x".to_string(),
            }
        );
    }

    #[test]
    fn every_expression_node_gets_a_resolved_type() {
        let checked = check(
            "program p; var a: integer; b: real; begin b := (a + 2) * 3 / (b - 1) end.",
        );
        fn no_unresolved_exprs(node: &Ast) -> bool {
            let ok = match node.kind {
                NodeKind::Plus
                | NodeKind::Minus
                | NodeKind::Times
                | NodeKind::Over
                | NodeKind::VarUse
                | NodeKind::IntVal
                | NodeKind::RealVal => node.ty != Type::NoType,
                _ => true,
            };
            ok && node.children.iter().all(no_unresolved_exprs)
        }
        assert!(no_unresolved_exprs(&checked.ast));
    }
}
