//! Scanner for source code tokenization.

use tracing::trace;

use super::token::{lookup_keyword, Token, TokenKind};
use crate::diagnostics::LexError;

/// Scanner that produces tokens from source code
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            line: 1,
        }
    }

    /// Tokenize the entire source. Stops at the first lexical error.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        trace!(count = tokens.len(), "scanned tokens");
        Ok(tokens)
    }

    /// Scan a single token
    fn scan_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();

        match self.advance() {
            None => Ok(Token::eof(self.line)),
            Some(c) => match c {
                '(' => Ok(self.make_token(TokenKind::LeftParen, "(")),
                ')' => Ok(self.make_token(TokenKind::RightParen, ")")),
                '[' => Ok(self.make_token(TokenKind::LeftBracket, "[")),
                ']' => Ok(self.make_token(TokenKind::RightBracket, "]")),
                ',' => Ok(self.make_token(TokenKind::Comma, ",")),
                ';' => Ok(self.make_token(TokenKind::Semicolon, ";")),
                '+' => Ok(self.make_token(TokenKind::Plus, "+")),
                '-' => Ok(self.make_token(TokenKind::Minus, "-")),
                '*' => Ok(self.make_token(TokenKind::Star, "*")),
                '/' => Ok(self.make_token(TokenKind::Slash, "/")),
                '=' => Ok(self.make_token(TokenKind::Equal, "=")),

                ':' => Ok(self.match_compound(&[('=', TokenKind::Assign, ":=")], TokenKind::Colon, ":")),

                '<' => Ok(self.match_compound(
                    &[
                        ('=', TokenKind::LessEqual, "<="),
                        ('>', TokenKind::NotEqual, "<>"),
                    ],
                    TokenKind::Less,
                    "<",
                )),

                '>' => Ok(self.match_compound(
                    &[('=', TokenKind::GreaterEqual, ">=")],
                    TokenKind::Greater,
                    ">",
                )),

                '.' => Ok(self.match_compound(&[('.', TokenKind::DotDot, "..")], TokenKind::Dot, ".")),

                '\'' => self.scan_string(),

                '0'..='9' => Ok(self.scan_number(c)),

                c if is_ident_start(c) => Ok(self.scan_identifier(c)),

                _ => Err(LexError::UnexpectedCharacter {
                    line: self.line,
                    ch: c,
                }),
            },
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                Some('{') => {
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '}' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let result = self.chars.next().map(|(_, c)| c);
        if result == Some('\n') {
            self.line += 1;
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_compound(
        &mut self,
        options: &[(char, TokenKind, &str)],
        default: TokenKind,
        default_lexeme: &str,
    ) -> Token {
        for (c, kind, lexeme) in options {
            if self.match_char(*c) {
                return self.make_token(*kind, lexeme);
            }
        }
        self.make_token(default, default_lexeme)
    }

    fn make_token(&self, kind: TokenKind, lexeme: &str) -> Token {
        Token::new(kind, lexeme, self.line)
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut ident = String::new();
        ident.push(first);

        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = lookup_keyword(&ident).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, &ident)
    }

    fn scan_number(&mut self, first: char) -> Token {
        let mut text = String::new();
        text.push(first);
        let mut is_real = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // A '.' is only part of the number when followed by a digit, so
        // the '..' of a range stays intact.
        if self.peek() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().map_or(false, |(_, c)| c.is_ascii_digit()) {
                text.push('.');
                self.advance();
                is_real = true;

                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let kind = if is_real {
            TokenKind::RealLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.make_token(kind, &text)
    }

    /// Scan a single-quoted string literal. The stored lexeme is the
    /// string contents without the quotes; a doubled quote stands for one
    /// literal quote.
    fn scan_string(&mut self) -> Result<Token, LexError> {
        let start_line = self.line;
        let mut text = String::new();

        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString { line: start_line });
                }
                Some('\'') => {
                    if self.match_char('\'') {
                        text.push('\'');
                    } else {
                        return Ok(Token::new(TokenKind::StringLiteral, text, start_line));
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_xid::UnicodeXID::is_xid_start(c)
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || unicode_xid::UnicodeXID::is_xid_continue(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_a_minimal_program() {
        let toks = kinds("program p; begin end.");
        assert_eq!(
            toks,
            vec![
                TokenKind::Program,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Begin,
                TokenKind::End,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn assign_and_relational_operators() {
        let toks = kinds(":= = <> < <= > >=");
        assert_eq!(
            toks,
            vec![
                TokenKind::Assign,
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn range_dots_do_not_merge_into_the_number() {
        let toks = kinds("1..10");
        assert_eq!(
            toks,
            vec![
                TokenKind::IntLiteral,
                TokenKind::DotDot,
                TokenKind::IntLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn real_literals_keep_their_fraction() {
        let tokens = Scanner::new("3.14").scan_tokens().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::RealLiteral);
        assert_eq!(tokens[0].lexeme, "3.14");
    }

    #[test]
    fn string_literal_strips_quotes_and_unescapes() {
        let tokens = Scanner::new("'it''s fine'").scan_tokens().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].lexeme, "it's fine");
    }

    #[test]
    fn tracks_line_numbers_across_comments() {
        let source = "program p;\n{ a\ncomment }\nvar x: integer;\n";
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let var = tokens.iter().find(|t| t.kind == TokenKind::Var).unwrap();
        assert_eq!(var.line, 4);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let toks = kinds("PROGRAM Begin END");
        assert_eq!(
            toks,
            vec![
                TokenKind::Program,
                TokenKind::Begin,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Scanner::new("'oops").scan_tokens().unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1 });
    }

    #[test]
    fn unexpected_character_reports_its_line() {
        let err = Scanner::new("x\n$").scan_tokens().unwrap_err();
        assert_eq!(err, LexError::UnexpectedCharacter { line: 2, ch: '$' });
    }
}
