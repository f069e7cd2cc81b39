//! Recursive descent parser producing the concrete parse tree.

mod cst;

pub use cst::{
    AssignStmtCtx, BlockCtx, ExprCtx, FunctionDeclCtx, IfStmtCtx, ProcCallCtx, ProgramCtx,
    ProgramHeadingCtx, RangeCtx, RepeatStmtCtx, StatementCtx, TypeSpecCtx, VarDeclCtx,
};

use tracing::debug;

use crate::diagnostics::ParseError;
use crate::lexer::{Token, TokenKind};

/// Recursive descent parser over the token stream. Stops at the first
/// syntax error.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse a whole program: `program NAME; <block> .`
    pub fn parse(mut self) -> Result<ProgramCtx, ParseError> {
        let heading = self.program_heading()?;
        let block = self.block()?;
        self.expect(TokenKind::Dot, "'.'")?;
        self.expect(TokenKind::Eof, "end of input")?;
        debug!(program = %heading.name.lexeme, "parsed program");
        Ok(ProgramCtx { heading, block })
    }

    fn program_heading(&mut self) -> Result<ProgramHeadingCtx, ParseError> {
        self.expect(TokenKind::Program, "'program'")?;
        let name = self.expect(TokenKind::Identifier, "program name")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(ProgramHeadingCtx { name })
    }

    fn block(&mut self) -> Result<BlockCtx, ParseError> {
        let var_decls = if self.match_token(TokenKind::Var) {
            self.var_decl_list()?
        } else {
            Vec::new()
        };

        let mut functions = Vec::new();
        while self.check(TokenKind::Function) {
            functions.push(self.function_decl()?);
        }

        let body = self.compound()?;
        Ok(BlockCtx {
            var_decls,
            functions,
            body,
        })
    }

    /// One or more `a, b: <type>;` groups after a `var` keyword.
    fn var_decl_list(&mut self) -> Result<Vec<VarDeclCtx>, ParseError> {
        let mut decls = vec![self.var_decl()?];
        self.expect(TokenKind::Semicolon, "';'")?;
        while self.check(TokenKind::Identifier) {
            decls.push(self.var_decl()?);
            self.expect(TokenKind::Semicolon, "';'")?;
        }
        Ok(decls)
    }

    fn var_decl(&mut self) -> Result<VarDeclCtx, ParseError> {
        let names = self.identifier_list()?;
        self.expect(TokenKind::Colon, "':'")?;
        let type_spec = self.type_spec()?;
        Ok(VarDeclCtx { names, type_spec })
    }

    fn identifier_list(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut names = vec![self.expect(TokenKind::Identifier, "identifier")?];
        while self.match_token(TokenKind::Comma) {
            names.push(self.expect(TokenKind::Identifier, "identifier")?);
        }
        Ok(names)
    }

    fn type_spec(&mut self) -> Result<TypeSpecCtx, ParseError> {
        if self.match_token(TokenKind::Array) {
            self.expect(TokenKind::LeftBracket, "'['")?;
            let mut ranges = vec![self.range()?];
            while self.match_token(TokenKind::Comma) {
                ranges.push(self.range()?);
            }
            self.expect(TokenKind::RightBracket, "']'")?;
            self.expect(TokenKind::Of, "'of'")?;
            let elem = self.simple_type()?;
            return Ok(TypeSpecCtx::Array { ranges, elem });
        }
        let keyword = self.simple_type()?;
        Ok(TypeSpecCtx::Simple { keyword })
    }

    fn range(&mut self) -> Result<RangeCtx, ParseError> {
        let lower = self.expect(TokenKind::IntLiteral, "integer bound")?;
        self.expect(TokenKind::DotDot, "'..'")?;
        let upper = self.expect(TokenKind::IntLiteral, "integer bound")?;
        Ok(RangeCtx { lower, upper })
    }

    fn simple_type(&mut self) -> Result<Token, ParseError> {
        if self.peek().kind.is_type_keyword() {
            Ok(self.advance().clone())
        } else {
            Err(self.unexpected("type name"))
        }
    }

    fn function_decl(&mut self) -> Result<FunctionDeclCtx, ParseError> {
        self.expect(TokenKind::Function, "'function'")?;
        let name = self.expect(TokenKind::Identifier, "function name")?;

        let mut params = Vec::new();
        if self.match_token(TokenKind::LeftParen) {
            if !self.check(TokenKind::RightParen) {
                params.push(self.var_decl()?);
                while self.match_token(TokenKind::Semicolon) {
                    params.push(self.var_decl()?);
                }
            }
            self.expect(TokenKind::RightParen, "')'")?;
        }

        self.expect(TokenKind::Colon, "':'")?;
        let return_type = self.type_spec()?;
        self.expect(TokenKind::Semicolon, "';'")?;

        let locals = if self.match_token(TokenKind::Var) {
            self.var_decl_list()?
        } else {
            Vec::new()
        };
        let body = self.compound()?;
        self.expect(TokenKind::Semicolon, "';'")?;

        Ok(FunctionDeclCtx {
            name,
            params,
            return_type,
            locals,
            body,
        })
    }

    fn compound(&mut self) -> Result<Vec<StatementCtx>, ParseError> {
        self.expect(TokenKind::Begin, "'begin'")?;
        let body = self.statement_list(TokenKind::End)?;
        self.expect(TokenKind::End, "'end'")?;
        Ok(body)
    }

    /// Statements separated by ';' up to the terminator keyword. A
    /// trailing ';' before the terminator is allowed.
    fn statement_list(&mut self, terminator: TokenKind) -> Result<Vec<StatementCtx>, ParseError> {
        let mut statements = Vec::new();
        if self.check(terminator) {
            return Ok(statements);
        }
        statements.push(self.statement()?);
        while self.match_token(TokenKind::Semicolon) {
            if self.check(terminator) {
                break;
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<StatementCtx, ParseError> {
        match self.peek().kind {
            TokenKind::Begin => Ok(StatementCtx::Compound(self.compound()?)),
            TokenKind::If => self.if_statement(),
            TokenKind::Repeat => self.repeat_statement(),
            TokenKind::Identifier => self.assign_or_call(),
            _ => Err(self.unexpected("statement")),
        }
    }

    fn if_statement(&mut self) -> Result<StatementCtx, ParseError> {
        let line = self.expect(TokenKind::If, "'if'")?.line;
        let guard = self.expression()?;
        self.expect(TokenKind::Then, "'then'")?;
        let then_branch = Box::new(self.statement()?);
        // An 'else' always attaches to the nearest 'if'.
        let else_branch = if self.match_token(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(StatementCtx::If(IfStmtCtx {
            line,
            guard,
            then_branch,
            else_branch,
        }))
    }

    fn repeat_statement(&mut self) -> Result<StatementCtx, ParseError> {
        let line = self.expect(TokenKind::Repeat, "'repeat'")?.line;
        let body = self.statement_list(TokenKind::Until)?;
        self.expect(TokenKind::Until, "'until'")?;
        let guard = self.expression()?;
        Ok(StatementCtx::Repeat(RepeatStmtCtx { line, body, guard }))
    }

    fn assign_or_call(&mut self) -> Result<StatementCtx, ParseError> {
        let name = self.expect(TokenKind::Identifier, "identifier")?;
        if self.match_token(TokenKind::Assign) {
            let value = self.expression()?;
            return Ok(StatementCtx::Assign(AssignStmtCtx {
                target: name,
                value,
            }));
        }

        self.expect(TokenKind::LeftParen, "':=' or '('")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            args.push(self.expression()?);
            while self.match_token(TokenKind::Comma) {
                args.push(self.expression()?);
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;
        Ok(StatementCtx::ProcCall(ProcCallCtx { name, args }))
    }

    /// expression := simple (relop simple)?
    fn expression(&mut self) -> Result<ExprCtx, ParseError> {
        let lhs = self.simple_expression()?;
        if self.peek().kind.is_relational() {
            let op = self.advance().clone();
            let rhs = self.simple_expression()?;
            return Ok(ExprCtx::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    /// simple := term ((`+` | `-` | `or`) term)*
    fn simple_expression(&mut self) -> Result<ExprCtx, ParseError> {
        let mut expr = self.term()?;
        while matches!(
            self.peek().kind,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Or
        ) {
            let op = self.advance().clone();
            let rhs = self.term()?;
            expr = ExprCtx::Binary {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    /// term := factor ((`*` | `/` | `and`) factor)*
    fn term(&mut self) -> Result<ExprCtx, ParseError> {
        let mut expr = self.factor()?;
        while matches!(
            self.peek().kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::And
        ) {
            let op = self.advance().clone();
            let rhs = self.factor()?;
            expr = ExprCtx::Binary {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<ExprCtx, ParseError> {
        match self.peek().kind {
            TokenKind::IntLiteral => Ok(ExprCtx::IntLit(self.advance().clone())),
            TokenKind::RealLiteral => Ok(ExprCtx::RealLit(self.advance().clone())),
            TokenKind::StringLiteral => Ok(ExprCtx::StrLit(self.advance().clone())),
            TokenKind::True | TokenKind::False => Ok(ExprCtx::BoolLit(self.advance().clone())),
            TokenKind::Identifier => Ok(ExprCtx::Var(self.advance().clone())),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    // === Helper methods ===

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            if kind == TokenKind::Eof {
                return Ok(self.peek().clone());
            }
            Ok(self.advance().clone())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            token.lexeme.clone()
        };
        ParseError::UnexpectedToken {
            line: token.line,
            expected: expected.to_string(),
            found,
        }
    }
}
