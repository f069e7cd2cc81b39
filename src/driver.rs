//! Driver that orchestrates the compilation pipeline.

use tracing::debug;

use crate::codegen::IrEmitter;
use crate::diagnostics::CompileError;
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::semantic::SemanticChecker;

/// The compilation driver
pub struct Driver {
    source: String,
    dump_tokens: bool,
    dump_ast: bool,
    dump_tables: bool,
}

impl Driver {
    pub fn new(source: String) -> Self {
        Self {
            source,
            dump_tokens: false,
            dump_ast: false,
            dump_tables: false,
        }
    }

    pub fn set_dump_tokens(&mut self, enabled: bool) {
        self.dump_tokens = enabled;
    }

    pub fn set_dump_ast(&mut self, enabled: bool) {
        self.dump_ast = enabled;
    }

    pub fn set_dump_tables(&mut self, enabled: bool) {
        self.dump_tables = enabled;
    }

    /// Run the compilation pipeline. The first error of any pass aborts
    /// the run.
    pub fn compile(&self) -> Result<String, CompileError> {
        // === Lexical Analysis ===
        let scanner = Scanner::new(&self.source);
        let tokens = scanner.scan_tokens()?;
        debug!(count = tokens.len(), "scanned tokens");

        if self.dump_tokens {
            eprintln!("=== Tokens ===");
            for token in &tokens {
                eprintln!("  {:?}", token);
            }
            eprintln!();
        }

        // === Parsing ===
        let parser = Parser::new(tokens);
        let program = parser.parse()?;
        debug!("parsed program");

        // === Semantic Analysis ===
        let checker = SemanticChecker::new();
        let checked = checker.check(&program)?;
        debug!(
            vars = checked.var_table.len(),
            strings = checked.str_table.len(),
            "semantic analysis complete"
        );

        if self.dump_ast {
            eprintln!("=== AST ===");
            eprintln!(
                "{}",
                checked.ast.to_dot(&checked.var_table, &checked.fun_table)
            );
        }

        if self.dump_tables {
            eprintln!("=== Tables ===");
            eprintln!("{}", checked.str_table);
            eprintln!("{}", checked.var_table);
            eprintln!("{}", checked.fun_table);
            eprintln!("{}", checked.array_table);
        }

        // === Code Generation ===
        let ir = IrEmitter::new(&checked).emit()?;
        debug!(bytes = ir.len(), "emitted IR");

        Ok(ir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_compiles_a_small_program() {
        let source = "\
program demo;
var n: integer;
begin
  n := 6 * 7;
  write('answer: ', n)
end.
";
        let ir = Driver::new(source.to_string()).compile().unwrap();
        assert!(ir.contains("define void @main() {"));
        assert!(ir.contains("mul i32 6, 7"));
        assert!(ir.contains("declare i32 @printf(i8*, ...)"));
    }

    #[test]
    fn pipeline_surfaces_the_first_semantic_error() {
        let source = "\
program demo;
begin
  x := 1
end.
";
        let err = Driver::new(source.to_string()).compile().unwrap_err();
        assert_eq!(
            err.to_string(),
            "SEMANTIC ERROR (3): variable 'x' was not declared."
        );
    }

    #[test]
    fn pipeline_surfaces_syntax_errors() {
        let source = "program demo begin end.";
        let err = Driver::new(source.to_string()).compile().unwrap_err();
        assert!(err.to_string().starts_with("SYNTAX ERROR (1): expected"));
    }
}
