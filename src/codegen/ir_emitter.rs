//! Lowering of the checked AST into textual IR.
//!
//! The emitter buffers the routine body and the global constants
//! separately: globals are discovered while lowering the body (string
//! literals up front, format strings lazily on first use), and the
//! final output is body first, globals second, extern declarations
//! last.

use std::fmt::Write;

use tracing::debug;

use crate::ast::{Ast, NodeKind};
use crate::diagnostics::CodegenError;
use crate::semantic::tables::{READ_IDX, WRITE_IDX};
use crate::semantic::CheckedProgram;
use crate::typing::Type;

const STRCMP: &str = "declare i32 @strcmp(i8*, i8*)";
const SCANF: &str = "declare i32 @__isoc99_scanf(i8*, ...)";
const PRINTF: &str = "declare i32 @printf(i8*, ...)";
const SNPRINTF: &str = "declare i32 @snprintf(i8*, i64, i8*, ...)";
const STRCPY: &str = "declare i8* @strcpy(i8*, i8*)";
const STRCAT: &str = "declare i8* @strcat(i8*, i8*)";

/// Constant strings the lowering needs besides the literals of the
/// program itself. Allocated a global register lazily on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FmtStr {
    Int,
    Real,
    Str,
    Newline,
    TrueLit,
    FalseLit,
}

impl FmtStr {
    /// Array length of the constant, terminator included.
    fn len(self) -> usize {
        match self {
            FmtStr::Int | FmtStr::Str => 3,
            FmtStr::Real => 4,
            FmtStr::Newline => 2,
            FmtStr::TrueLit => 5,
            FmtStr::FalseLit => 6,
        }
    }

    fn body(self) -> &'static str {
        match self {
            FmtStr::Int => "%d",
            FmtStr::Real => "%lf",
            FmtStr::Str => "%s",
            FmtStr::Newline => "\\0A",
            FmtStr::TrueLit => "true",
            FmtStr::FalseLit => "false",
        }
    }
}

/// One-pass AST visitor that emits IR text. Expression visits return
/// the operand naming their value: `%N` for registers, `@N` for string
/// globals, or a literal spelling.
pub struct IrEmitter<'a> {
    program: &'a CheckedProgram,
    body: String,
    globals: String,
    fmt_globals: Vec<(FmtStr, usize)>,
    declares: Vec<&'static str>,
    global_regs: usize,
    local_regs: usize,
    labels: usize,
    /// Function-table index recorded by the designator of the call
    /// currently being lowered.
    function_idx: Option<usize>,
}

impl<'a> IrEmitter<'a> {
    pub fn new(program: &'a CheckedProgram) -> Self {
        Self {
            program,
            body: String::new(),
            globals: String::new(),
            fmt_globals: Vec::new(),
            declares: Vec::new(),
            global_regs: 0,
            // Register 0 is never used; variable slots start at %1.
            local_regs: 1,
            labels: 0,
            function_idx: None,
        }
    }

    /// Lower the whole program to IR text.
    pub fn emit(mut self) -> Result<String, CodegenError> {
        // String literals claim the first global registers, in table
        // order, so a literal's operand `@N` is also its table index.
        for i in 0..self.program.str_table.len() {
            let reg = self.new_global();
            let len = self.program.str_table.get(i).len() + 1;
            let _ = writeln!(
                self.globals,
                "@{} = private constant [{} x i8] c\"{}\\00\"",
                reg,
                len,
                self.program.str_table.get(i)
            );
        }

        let _ = writeln!(self.body, "\ndefine void @main() {{");
        let program = self.program;
        self.visit(&program.ast)?;
        let _ = write!(self.body, "  ret void \n}}\n");

        for (kind, reg) in self.fmt_globals.clone() {
            let _ = writeln!(
                self.globals,
                "@{} = private constant [{} x i8] c\"{}\\00\"",
                reg,
                kind.len(),
                kind.body()
            );
        }

        debug!(
            globals = self.global_regs,
            locals = self.local_regs,
            "lowered program"
        );

        let mut out = self.body;
        out.push('\n');
        out.push_str(&self.globals);
        out.push('\n');
        for proto in &self.declares {
            out.push_str(proto);
            out.push('\n');
        }
        Ok(out)
    }

    fn visit(&mut self, node: &Ast) -> Result<String, CodegenError> {
        match node.kind {
            NodeKind::Program
            | NodeKind::Block
            | NodeKind::VarDeclPart
            | NodeKind::VarList
            | NodeKind::StatementList => {
                for child in &node.children {
                    self.visit(child)?;
                }
                Ok(String::new())
            }

            // The heading carries no code; user-defined functions are
            // registered but their bodies are not lowered.
            NodeKind::ProgramHeading | NodeKind::Identifier | NodeKind::FuncDecl => {
                Ok(String::new())
            }

            NodeKind::VarDecl => self.var_decl(node),
            NodeKind::VarUse => self.var_use(node),
            NodeKind::Assign => self.assign(node),
            NodeKind::If => self.if_stmt(node),
            NodeKind::Repeat => self.repeat_stmt(node),

            NodeKind::ProcCall => {
                self.visit(node.child(0))?;
                self.visit(node.child(1))?;
                Ok(String::new())
            }
            NodeKind::FuncIdent => {
                self.function_idx = Some(node.index());
                Ok(String::new())
            }
            NodeKind::ParamList => {
                match self.function_idx.take() {
                    Some(READ_IDX) => self.read_call(node)?,
                    Some(WRITE_IDX) => self.write_call(node)?,
                    // User-function call sites are not lowered.
                    _ => {}
                }
                Ok(String::new())
            }

            NodeKind::Plus => self.plus(node),
            NodeKind::Minus => self.arith(node, "sub", "fsub"),
            NodeKind::Times => self.arith(node, "mul", "fmul"),
            NodeKind::Over => self.arith(node, "sdiv", "fdiv"),

            NodeKind::And => self.logical(node, "and"),
            NodeKind::Or => self.logical(node, "or"),

            NodeKind::Eq => self.comparison(node, "eq", "oeq"),
            NodeKind::NotEq => self.comparison(node, "ne", "one"),
            NodeKind::Lt => self.comparison(node, "slt", "olt"),
            NodeKind::Le => self.comparison(node, "sle", "ole"),
            NodeKind::Gt => self.comparison(node, "sgt", "ogt"),
            NodeKind::Ge => self.comparison(node, "sge", "oge"),

            NodeKind::IntVal => Ok(node.int_value().to_string()),
            NodeKind::RealVal => Ok(format!("{:?}", node.real_value())),
            NodeKind::BoolVal => Ok(if node.int_value() == 0 {
                "false".to_string()
            } else {
                "true".to_string()
            }),
            NodeKind::StrVal => Ok(format!("@{}", node.index())),

            NodeKind::I2R => {
                let x = self.visit(node.child(0))?;
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = sitofp i32 {} to double", r, x);
                Ok(format!("%{}", r))
            }
            NodeKind::B2I => {
                let x = self.visit(node.child(0))?;
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = zext i1 {} to i32", r, x);
                Ok(format!("%{}", r))
            }
            NodeKind::B2R => {
                let x = self.visit(node.child(0))?;
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = uitofp i1 {} to double", r, x);
                Ok(format!("%{}", r))
            }
            NodeKind::B2S => self.bool_to_str(node),
            NodeKind::I2S => self.num_to_str(node, FmtStr::Int, "i32"),
            NodeKind::R2S => self.num_to_str(node, FmtStr::Real, "double"),
        }
    }

    // ------------------------------------------------------------------
    // Declarations, loads and stores.

    fn var_decl(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let slot = self.new_local();
        let ty = match node.ty {
            Type::Int => "i32",
            Type::Real => "double",
            Type::Bool => "i1",
            Type::Str => "i8*",
            Type::NoType => unreachable!("declarations are always typed"),
        };
        let _ = writeln!(self.body, "  %{} = alloca {}", slot, ty);
        Ok(String::new())
    }

    fn var_use(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let x = self.new_local();
        let slot = node.index() + 1;
        let ty = match node.ty {
            Type::Int => "i32",
            Type::Real => "double",
            Type::Bool => "i1",
            Type::Str => "i8*",
            Type::NoType => unreachable!("variable uses are always typed"),
        };
        let _ = writeln!(self.body, "  %{} = load {}, {}* %{}", x, ty, ty, slot);
        Ok(format!("%{}", x))
    }

    fn assign(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let value = self.visit(node.child(1))?;
        let var_idx = node.child(0).index();
        let slot = var_idx + 1;
        match self.program.var_table.ty(var_idx) {
            Type::Int => {
                let _ = writeln!(self.body, "  store i32 {}, i32* %{}", value, slot);
            }
            Type::Real => {
                let _ = writeln!(self.body, "  store double {}, double* %{}", value, slot);
            }
            Type::Bool => {
                let _ = writeln!(self.body, "  store i1 {}, i1* %{}", value, slot);
            }
            Type::Str => {
                // A bare literal operand must become an element pointer
                // before it can be stored.
                let ptr = self.str_pointer(&value);
                let _ = writeln!(self.body, "  store i8* {}, i8** %{}", ptr, slot);
            }
            Type::NoType => unreachable!("assignment targets are always typed"),
        }
        Ok(String::new())
    }

    // ------------------------------------------------------------------
    // Control flow.

    fn if_stmt(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let guard = self.visit(node.child(0))?;
        let has_else = node.child_count() == 3;

        let l_then = self.new_label();
        let l_else = if has_else { Some(self.new_label()) } else { None };
        let l_cont = self.new_label();
        let false_target = l_else.unwrap_or(l_cont);

        let _ = writeln!(
            self.body,
            "  br i1 {}, label %L{}, label %L{}",
            guard, l_then, false_target
        );
        let _ = writeln!(self.body, "L{}:", l_then);
        self.visit(node.child(1))?;
        let _ = writeln!(self.body, "  br label %L{}", l_cont);

        if let Some(l_else) = l_else {
            let _ = writeln!(self.body, "L{}:", l_else);
            self.visit(node.child(2))?;
            let _ = writeln!(self.body, "  br label %L{}", l_cont);
        }

        let _ = writeln!(self.body, "L{}:", l_cont);
        Ok(String::new())
    }

    /// Body runs at least once; loop back while the guard is false.
    fn repeat_stmt(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let l_body = self.new_label();
        let l_exit = self.new_label();

        let _ = writeln!(self.body, "  br label %L{}", l_body);
        let _ = writeln!(self.body, "L{}:", l_body);
        self.visit(node.child(1))?;
        let guard = self.visit(node.child(0))?;
        let _ = writeln!(
            self.body,
            "  br i1 {}, label %L{}, label %L{}",
            guard, l_exit, l_body
        );
        let _ = writeln!(self.body, "L{}:", l_exit);
        Ok(String::new())
    }

    // ------------------------------------------------------------------
    // Expressions.

    fn plus(&mut self, node: &Ast) -> Result<String, CodegenError> {
        match node.ty {
            Type::Int | Type::Real => self.arith(node, "add", "fadd"),
            Type::Bool => self.logical(node, "or"),
            Type::Str => self.concat(node),
            Type::NoType => unreachable!("operator nodes are always typed"),
        }
    }

    fn arith(&mut self, node: &Ast, int_op: &str, float_op: &str) -> Result<String, CodegenError> {
        let lhs = self.visit(node.child(0))?;
        let rhs = self.visit(node.child(1))?;
        let r = self.new_local();
        match node.ty {
            Type::Int => {
                let _ = writeln!(self.body, "  %{} = {} i32 {}, {}", r, int_op, lhs, rhs);
            }
            Type::Real => {
                let _ = writeln!(self.body, "  %{} = {} double {}, {}", r, float_op, lhs, rhs);
            }
            _ => unreachable!("arithmetic operands are numeric"),
        }
        Ok(format!("%{}", r))
    }

    fn logical(&mut self, node: &Ast, op: &str) -> Result<String, CodegenError> {
        let lhs = self.visit(node.child(0))?;
        let rhs = self.visit(node.child(1))?;
        let r = self.new_local();
        let _ = writeln!(self.body, "  %{} = {} i1 {}, {}", r, op, lhs, rhs);
        Ok(format!("%{}", r))
    }

    /// Both operand types are identical after the checker's inserted
    /// conversions, so the operand kind is read off the left child.
    fn comparison(&mut self, node: &Ast, ipred: &str, fpred: &str) -> Result<String, CodegenError> {
        let lhs = self.visit(node.child(0))?;
        let rhs = self.visit(node.child(1))?;
        let operand_ty = node.child(0).ty;

        let r = match operand_ty {
            Type::Int => {
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = icmp {} i32 {}, {}", r, ipred, lhs, rhs);
                r
            }
            Type::Real => {
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = fcmp {} double {}, {}", r, fpred, lhs, rhs);
                r
            }
            Type::Bool if matches!(ipred, "eq" | "ne") => {
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = icmp {} i1 {}, {}", r, ipred, lhs, rhs);
                r
            }
            Type::Bool => {
                // Ordered comparison has no i1 form here; widen first.
                let a = self.new_local();
                let _ = writeln!(self.body, "  %{} = zext i1 {} to i32", a, lhs);
                let b = self.new_local();
                let _ = writeln!(self.body, "  %{} = zext i1 {} to i32", b, rhs);
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = icmp {} i32 %{}, %{}", r, ipred, a, b);
                r
            }
            Type::Str => {
                let lp = self.str_pointer(&lhs);
                let rp = self.str_pointer(&rhs);
                self.declare(STRCMP);
                let c = self.new_local();
                let _ = writeln!(
                    self.body,
                    "  %{} = call i32 @strcmp(i8* {}, i8* {})",
                    c, lp, rp
                );
                let r = self.new_local();
                let _ = writeln!(self.body, "  %{} = icmp {} i32 %{}, 0", r, ipred, c);
                r
            }
            Type::NoType => unreachable!("comparison operands are always typed"),
        };
        Ok(format!("%{}", r))
    }

    fn concat(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let lhs = self.visit(node.child(0))?;
        let rhs = self.visit(node.child(1))?;
        let lp = self.str_pointer(&lhs);
        let rp = self.str_pointer(&rhs);

        self.declare(STRCPY);
        self.declare(STRCAT);
        let buf = self.new_local();
        let _ = writeln!(self.body, "  %{} = alloca [256 x i8]", buf);
        let p = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = getelementptr inbounds [256 x i8], [256 x i8]* %{}, i64 0, i64 0",
            p, buf
        );
        let c = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = call i8* @strcpy(i8* %{}, i8* {})",
            c, p, lp
        );
        let c = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = call i8* @strcat(i8* %{}, i8* {})",
            c, p, rp
        );
        Ok(format!("%{}", p))
    }

    fn bool_to_str(&mut self, node: &Ast) -> Result<String, CodegenError> {
        let x = self.visit(node.child(0))?;
        let t = self.fmt_global(FmtStr::TrueLit);
        let f = self.fmt_global(FmtStr::FalseLit);
        let tp = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = getelementptr inbounds [5 x i8], [5 x i8]* @{}, i64 0, i64 0",
            tp, t
        );
        let fp = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = getelementptr inbounds [6 x i8], [6 x i8]* @{}, i64 0, i64 0",
            fp, f
        );
        let r = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = select i1 {}, i8* %{}, i8* %{}",
            r, x, tp, fp
        );
        Ok(format!("%{}", r))
    }

    /// Render a numeric value into a fresh stack buffer.
    fn num_to_str(&mut self, node: &Ast, fmt: FmtStr, ty: &str) -> Result<String, CodegenError> {
        let x = self.visit(node.child(0))?;
        self.declare(SNPRINTF);
        let fmt_reg = self.fmt_global(fmt);
        let buf = self.new_local();
        let _ = writeln!(self.body, "  %{} = alloca [24 x i8]", buf);
        let p = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = getelementptr inbounds [24 x i8], [24 x i8]* %{}, i64 0, i64 0",
            p, buf
        );
        let f = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = getelementptr inbounds [{} x i8], [{} x i8]* @{}, i64 0, i64 0",
            f,
            fmt.len(),
            fmt.len(),
            fmt_reg
        );
        let r = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = call i32 (i8*, i64, i8*, ...) @snprintf(i8* %{}, i64 24, i8* %{}, {} {})",
            r, p, f, ty, x
        );
        Ok(format!("%{}", p))
    }

    // ------------------------------------------------------------------
    // Intrinsics.

    fn read_call(&mut self, args: &Ast) -> Result<(), CodegenError> {
        for target in &args.children {
            if target.kind != NodeKind::VarUse {
                return Err(CodegenError::UnsupportedReadType(target.ty));
            }
            let var_idx = target.index();
            let slot = var_idx + 1;
            match self.program.var_table.ty(var_idx) {
                Type::Int => {
                    self.declare(SCANF);
                    let fmt = self.fmt_global(FmtStr::Int);
                    let p = self.new_local();
                    let _ = writeln!(
                        self.body,
                        "  %{} = getelementptr inbounds [3 x i8], [3 x i8]* @{}, i64 0, i64 0",
                        p, fmt
                    );
                    let r = self.new_local();
                    let _ = writeln!(
                        self.body,
                        "  %{} = call i32 (i8*, ...) @__isoc99_scanf(i8* %{}, i32* %{})",
                        r, p, slot
                    );
                }
                Type::Real => {
                    self.declare(SCANF);
                    let fmt = self.fmt_global(FmtStr::Real);
                    let p = self.new_local();
                    let _ = writeln!(
                        self.body,
                        "  %{} = getelementptr inbounds [4 x i8], [4 x i8]* @{}, i64 0, i64 0",
                        p, fmt
                    );
                    let r = self.new_local();
                    let _ = writeln!(
                        self.body,
                        "  %{} = call i32 (i8*, ...) @__isoc99_scanf(i8* %{}, double* %{})",
                        r, p, slot
                    );
                }
                other => return Err(CodegenError::UnsupportedReadType(other)),
            }
        }
        Ok(())
    }

    fn write_call(&mut self, args: &Ast) -> Result<(), CodegenError> {
        self.declare(PRINTF);
        for arg in &args.children {
            let x = self.visit(arg)?;
            match arg.ty {
                Type::Int => self.print_with_fmt(FmtStr::Int, Some(format!("i32 {}", x))),
                Type::Real => self.print_with_fmt(FmtStr::Real, Some(format!("double {}", x))),
                // printf has no i1 conversion; the %d format takes it.
                Type::Bool => self.print_with_fmt(FmtStr::Int, Some(format!("i1 {}", x))),
                Type::Str => {
                    if x.starts_with('@') {
                        // A literal prints through its own global.
                        let p = self.str_pointer(&x);
                        let r = self.new_local();
                        let _ = writeln!(
                            self.body,
                            "  %{} = call i32 (i8*, ...) @printf(i8* {})",
                            r, p
                        );
                    } else {
                        self.print_with_fmt(FmtStr::Str, Some(format!("i8* {}", x)));
                    }
                }
                Type::NoType => unreachable!("write arguments are always typed"),
            }
        }
        self.print_with_fmt(FmtStr::Newline, None);
        Ok(())
    }

    fn print_with_fmt(&mut self, kind: FmtStr, value: Option<String>) {
        let fmt = self.fmt_global(kind);
        let p = self.new_local();
        let _ = writeln!(
            self.body,
            "  %{} = getelementptr inbounds [{} x i8], [{} x i8]* @{}, i64 0, i64 0",
            p,
            kind.len(),
            kind.len(),
            fmt
        );
        let r = self.new_local();
        match value {
            Some(value) => {
                let _ = writeln!(
                    self.body,
                    "  %{} = call i32 (i8*, ...) @printf(i8* %{}, {})",
                    r, p, value
                );
            }
            None => {
                let _ = writeln!(self.body, "  %{} = call i32 (i8*, ...) @printf(i8* %{})", r, p);
            }
        }
    }

    // ------------------------------------------------------------------
    // Registers, labels, globals.

    fn new_global(&mut self) -> usize {
        let reg = self.global_regs;
        self.global_regs += 1;
        reg
    }

    fn new_local(&mut self) -> usize {
        let reg = self.local_regs;
        self.local_regs += 1;
        reg
    }

    fn new_label(&mut self) -> usize {
        let label = self.labels;
        self.labels += 1;
        label
    }

    fn fmt_global(&mut self, kind: FmtStr) -> usize {
        if let Some(&(_, reg)) = self.fmt_globals.iter().find(|(k, _)| *k == kind) {
            return reg;
        }
        let reg = self.new_global();
        self.fmt_globals.push((kind, reg));
        reg
    }

    fn declare(&mut self, proto: &'static str) {
        if !self.declares.contains(&proto) {
            self.declares.push(proto);
        }
    }

    /// Turn a string operand into an element pointer. A `@N` operand
    /// names a string-table global; register operands already are
    /// pointers.
    fn str_pointer(&mut self, operand: &str) -> String {
        match operand.strip_prefix('@') {
            Some(reg) => {
                let idx: usize = reg.parse().expect("string operands name string globals");
                let len = self.program.str_table.get(idx).len() + 1;
                let p = self.new_local();
                let _ = writeln!(
                    self.body,
                    "  %{} = getelementptr inbounds [{} x i8], [{} x i8]* @{}, i64 0, i64 0",
                    p, len, len, idx
                );
                format!("%{}", p)
            }
            None => operand.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Payload;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use crate::semantic::tables::{ArrayTable, FunctionTable, StrTable, VarTable};
    use crate::semantic::SemanticChecker;

    fn compile(source: &str) -> String {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let checked = SemanticChecker::new().check(&program).unwrap();
        IrEmitter::new(&checked).emit().unwrap()
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn lowers_the_arithmetic_write_scenario() {
        let ir = compile("program P; var a: integer; begin a := 2 + 3; write(a) end.");
        assert_eq!(count(&ir, "alloca i32"), 1);
        assert!(ir.contains("  %2 = add i32 2, 3\n"));
        assert!(ir.contains("  store i32 %2, i32* %1\n"));
        assert!(ir.contains("  %3 = load i32, i32* %1\n"));
        assert!(ir.contains("  %5 = call i32 (i8*, ...) @printf(i8* %4, i32 %3)\n"));
        assert!(ir.contains("@0 = private constant [3 x i8] c\"%d\\00\"\n"));
        // Trailing newline print after the arguments.
        assert!(ir.contains("@1 = private constant [2 x i8] c\"\\0A\\00\"\n"));
        assert!(ir.contains("  %7 = call i32 (i8*, ...) @printf(i8* %6)\n"));
        assert!(ir.contains("declare i32 @printf(i8*, ...)\n"));
    }

    #[test]
    fn body_comes_before_globals_and_externs() {
        let ir = compile("program p; var a: integer; begin write(a) end.");
        let body = ir.find("define void @main()").unwrap();
        let globals = ir.find("@0 = private constant").unwrap();
        let externs = ir.find("declare i32 @printf").unwrap();
        assert!(body < globals);
        assert!(globals < externs);
    }

    #[test]
    fn widening_assignment_round_trips_through_sitofp() {
        let ir = compile("program p; var x: integer; y: real; begin y := x; write(y) end.");
        assert!(ir.contains("  %1 = alloca i32\n"));
        assert!(ir.contains("  %2 = alloca double\n"));
        assert!(ir.contains("  %4 = sitofp i32 %3 to double\n"));
        assert!(ir.contains("  store double %4, double* %2\n"));
        assert!(ir.contains("private constant [4 x i8] c\"%lf\\00\"\n"));
        assert!(ir.contains("double %5)\n"));
    }

    #[test]
    fn if_without_else_uses_two_labels() {
        let ir = compile("program p; var a: boolean; begin if true then a := true end.");
        assert!(ir.contains("  br i1 true, label %L0, label %L1\n"));
        assert!(ir.contains("L0:\n"));
        assert!(ir.contains("L1:\n"));
        assert!(!ir.contains("L2:"));
        assert_eq!(count(&ir, "  br "), 2);
    }

    #[test]
    fn if_with_else_adds_a_false_label() {
        let ir = compile(
            "program p; var a: integer; begin if true then a := 1 else a := 2 end.",
        );
        assert!(ir.contains("  br i1 true, label %L0, label %L1\n"));
        assert!(ir.contains("L0:\n"));
        assert!(ir.contains("L1:\n"));
        assert!(ir.contains("L2:\n"));
        assert_eq!(count(&ir, "  br label %L2\n"), 2);
    }

    #[test]
    fn repeat_branches_back_while_the_guard_is_false() {
        let ir = compile(
            "program p; var i: integer; begin i := 0; repeat i := i + 1 until i = 3 end.",
        );
        assert!(ir.contains("  br label %L0\n"));
        assert!(ir.contains("L0:\n"));
        assert!(ir.contains("  %5 = icmp eq i32 %4, 3\n"));
        assert!(ir.contains("  br i1 %5, label %L1, label %L0\n"));
        assert!(ir.contains("L1:\n"));
    }

    #[test]
    fn string_equality_goes_through_strcmp() {
        let ir = compile("program p; var b: boolean; begin b := 'ab' = 'cd' end.");
        // Both literals become element pointers before the call.
        assert!(ir.contains(
            "  %2 = getelementptr inbounds [3 x i8], [3 x i8]* @0, i64 0, i64 0\n"
        ));
        assert!(ir.contains(
            "  %3 = getelementptr inbounds [3 x i8], [3 x i8]* @1, i64 0, i64 0\n"
        ));
        assert!(ir.contains("  %4 = call i32 @strcmp(i8* %2, i8* %3)\n"));
        assert!(ir.contains("  %5 = icmp eq i32 %4, 0\n"));
        assert!(ir.contains("declare i32 @strcmp(i8*, i8*)\n"));
    }

    #[test]
    fn string_literal_writes_print_their_own_global() {
        let ir = compile("program p; begin write('hi') end.");
        assert!(ir.contains("@0 = private constant [3 x i8] c\"hi\\00\"\n"));
        assert!(ir.contains(
            "  %1 = getelementptr inbounds [3 x i8], [3 x i8]* @0, i64 0, i64 0\n"
        ));
        assert!(ir.contains("  %2 = call i32 (i8*, ...) @printf(i8* %1)\n"));
        // No %s format global is needed for a bare literal.
        assert!(!ir.contains("c\"%s\\00\""));
    }

    #[test]
    fn string_assignment_materializes_the_pointer() {
        let ir = compile("program p; var s: string; begin s := 'hi' end.");
        assert!(ir.contains("  %1 = alloca i8*\n"));
        assert!(ir.contains(
            "  %2 = getelementptr inbounds [3 x i8], [3 x i8]* @0, i64 0, i64 0\n"
        ));
        assert!(ir.contains("  store i8* %2, i8** %1\n"));
    }

    #[test]
    fn read_scans_into_the_variable_slot() {
        let ir = compile("program p; var x: integer; r: real; begin read(x); read(r) end.");
        assert!(ir.contains("@__isoc99_scanf(i8* %3, i32* %1)\n"));
        assert!(ir.contains("@__isoc99_scanf(i8* %5, double* %2)\n"));
        assert!(ir.contains("declare i32 @__isoc99_scanf(i8*, ...)\n"));
    }

    #[test]
    fn reading_a_string_is_a_codegen_error() {
        let tokens = Scanner::new("program p; var s: string; begin read(s) end.")
            .scan_tokens()
            .unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let checked = SemanticChecker::new().check(&program).unwrap();
        let err = IrEmitter::new(&checked).emit().unwrap_err();
        assert_eq!(
            err.to_string(),
            "CODE GENERATION ERROR: cannot read into a variable of type 'string'."
        );
    }

    #[test]
    fn concatenation_copies_then_appends() {
        let ir = compile("program p; var s: string; begin s := 'ab' + 'cd' end.");
        assert!(ir.contains("  %4 = alloca [256 x i8]\n"));
        assert!(ir.contains("call i8* @strcpy(i8* %5, i8* %2)\n"));
        assert!(ir.contains("call i8* @strcat(i8* %5, i8* %3)\n"));
        assert!(ir.contains("  store i8* %5, i8** %1\n"));
        assert!(ir.contains("declare i8* @strcpy(i8*, i8*)\n"));
        assert!(ir.contains("declare i8* @strcat(i8*, i8*)\n"));
    }

    #[test]
    fn int_to_string_renders_through_snprintf() {
        let ir = compile("program p; var s: string; begin s := 'n: ' + 1 end.");
        assert!(ir.contains("  %2 = alloca [24 x i8]\n"));
        assert!(ir.contains(
            "  %5 = call i32 (i8*, i64, i8*, ...) @snprintf(i8* %3, i64 24, i8* %4, i32 1)\n"
        ));
        assert!(ir.contains("declare i32 @snprintf(i8*, i64, i8*, ...)\n"));
    }

    #[test]
    fn bool_to_string_selects_between_the_literals() {
        let ir = compile("program p; var s: string; begin s := true + '!' end.");
        assert!(ir.contains("c\"true\\00\"\n"));
        assert!(ir.contains("c\"false\\00\"\n"));
        assert!(ir.contains("  %4 = select i1 true, i8* %2, i8* %3\n"));
    }

    fn write_program(expr: Ast) -> CheckedProgram {
        let params = Ast::subtree(NodeKind::ParamList, Type::NoType, vec![expr]);
        let ident = Ast::new(
            NodeKind::FuncIdent,
            Payload::Int(WRITE_IDX as i64),
            Type::NoType,
        );
        let call = Ast::subtree(NodeKind::ProcCall, Type::NoType, vec![ident, params]);
        let stmts = Ast::subtree(NodeKind::StatementList, Type::NoType, vec![call]);
        let block = Ast::subtree(NodeKind::Block, Type::NoType, vec![stmts]);
        let heading = Ast::subtree(
            NodeKind::ProgramHeading,
            Type::NoType,
            vec![Ast::new(NodeKind::Identifier, Payload::None, Type::NoType)],
        );
        let ast = Ast::subtree(NodeKind::Program, Type::NoType, vec![heading, block]);
        CheckedProgram {
            ast,
            str_table: StrTable::new(),
            var_table: VarTable::new(),
            fun_table: FunctionTable::new(),
            array_table: ArrayTable::new(),
        }
    }

    fn bool_pair(kind: NodeKind) -> Ast {
        Ast::subtree(
            kind,
            Type::Bool,
            vec![
                Ast::new(NodeKind::BoolVal, Payload::Int(1), Type::Bool),
                Ast::new(NodeKind::BoolVal, Payload::Int(0), Type::Bool),
            ],
        )
    }

    #[test]
    fn bool_equality_compares_directly() {
        let checked = write_program(bool_pair(NodeKind::Eq));
        let ir = IrEmitter::new(&checked).emit().unwrap();
        assert!(ir.contains("  %1 = icmp eq i1 true, false\n"));
        assert!(!ir.contains("zext"));
    }

    #[test]
    fn ordered_bool_comparison_widens_both_sides() {
        let checked = write_program(bool_pair(NodeKind::Gt));
        let ir = IrEmitter::new(&checked).emit().unwrap();
        assert!(ir.contains("  %1 = zext i1 true to i32\n"));
        assert!(ir.contains("  %2 = zext i1 false to i32\n"));
        assert!(ir.contains("  %3 = icmp sgt i32 %1, %2\n"));
    }

    #[test]
    fn label_and_register_numbering_resets_per_compilation() {
        let source =
            "program p; var i: integer; begin if 1 < 2 then i := 1; repeat i := i - 1 until i < 0 end.";
        assert_eq!(compile(source), compile(source));
    }
}
