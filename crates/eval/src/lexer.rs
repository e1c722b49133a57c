//! Hand-written lexer for Brisk source (spec.md §7).
//!
//! Produces a flat `Vec<Token>` terminated by `TokenKind::Eof` rather than
//! an iterator: the parser needs lookahead and backtracking (for `elif`
//! chains and error synchronization), so a materialized buffer it can index
//! into is simpler than a streaming tokenizer.

use crate::error::{BriskError, ErrorKind};
use crate::token::{Token, TokenKind};
use brisk_core::Position;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(c) = c {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, BriskError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start = self.pos();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, start));
                break;
            };
            let kind = match c {
                '0'..='9' => self.lex_number()?,
                '"' => self.lex_string()?,
                c if is_ident_start(c) => self.lex_ident_or_keyword(),
                '@' => self.lex_at_directive()?,
                _ => self.lex_operator()?,
            };
            tokens.push(Token::new(kind, start));
        }
        Ok(tokens)
    }

    /// Brisk has no statement-terminator *token* the parser looks for:
    /// a newline ends a statement implicitly, and `;` lets several share a
    /// line (spec.md §7, §8 scenario 7's `PI :: 3.14; PI = 3`). Both are
    /// therefore swallowed here rather than given a `TokenKind`.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ';' => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, BriskError> {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        let mut is_float = false;
        // A `.` only starts a fractional part if followed by a digit —
        // otherwise it is the start of a `..` range (`10..20`).
        if self.peek() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                text.push(self.advance().unwrap());
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    text.push(self.advance().unwrap());
                }
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| BriskError::new(ErrorKind::ParseError(format!("invalid float literal '{text}'")), self.pos()))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| BriskError::new(ErrorKind::ParseError(format!("invalid integer literal '{text}'")), self.pos()))
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, BriskError> {
        let start = self.pos();
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(BriskError::new(
                        ErrorKind::ParseError("unterminated string literal".into()),
                        start,
                    ));
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('\\') => s.push('\\'),
                    Some('"') => s.push('"'),
                    Some('0') => s.push('\0'),
                    Some(other) => s.push(other),
                    None => {
                        return Err(BriskError::new(
                            ErrorKind::ParseError("unterminated escape sequence".into()),
                            start,
                        ));
                    }
                },
                Some(c) => s.push(c),
            }
        }
        Ok(TokenKind::Str(s))
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut s = String::new();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            s.push(self.advance().unwrap());
        }
        match s.as_str() {
            "fn" => TokenKind::Fn,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "match" => TokenKind::Match,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "defer" => TokenKind::Defer,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            // Word-form logical operators (spec.md §4.3.2: "Binary `and` /
            // `or`", "Unary `not` / `!`") reuse the same token kinds as
            // their symbol counterparts so the parser needs only one case
            // per operator.
            "and" => TokenKind::AndAnd,
            "or" => TokenKind::OrOr,
            "not" => TokenKind::Bang,
            _ => TokenKind::Ident(s),
        }
    }

    /// `@import "path"` and `@c { ... }` (spec.md §7). The `@c` body is
    /// captured verbatim, brace-depth aware, so nested `{}` inside the C
    /// snippet does not prematurely close the block.
    fn lex_at_directive(&mut self) -> Result<TokenKind, BriskError> {
        let start = self.pos();
        self.advance(); // '@'
        let mut word = String::new();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            word.push(self.advance().unwrap());
        }
        match word.as_str() {
            "import" => Ok(TokenKind::Import),
            "c" => {
                self.skip_whitespace_and_comments();
                if !self.bump_if('{') {
                    return Err(BriskError::new(
                        ErrorKind::ParseError("expected '{' after @c".into()),
                        self.pos(),
                    ));
                }
                let mut depth = 1usize;
                let mut body = String::new();
                loop {
                    match self.advance() {
                        None => {
                            return Err(BriskError::new(
                                ErrorKind::ParseError("unterminated @c block".into()),
                                start,
                            ));
                        }
                        Some('{') => {
                            depth += 1;
                            body.push('{');
                        }
                        Some('}') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            body.push('}');
                        }
                        Some(c) => body.push(c),
                    }
                }
                Ok(TokenKind::CBlock(body))
            }
            other => Err(BriskError::new(
                ErrorKind::ParseError(format!("unknown directive '@{other}'")),
                start,
            )),
        }
    }

    fn lex_operator(&mut self) -> Result<TokenKind, BriskError> {
        let start = self.pos();
        let c = self.advance().unwrap();
        let kind = match c {
            ':' => {
                if self.bump_if('=') {
                    TokenKind::ColonEq
                } else if self.bump_if(':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '=' => {
                if self.bump_if('=') {
                    TokenKind::EqEq
                } else if self.bump_if('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.bump_if('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.bump_if('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.bump_if('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.bump_if('&') {
                    TokenKind::AndAnd
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.bump_if('|') {
                    TokenKind::OrOr
                } else {
                    return Err(BriskError::new(
                        ErrorKind::ParseError("unexpected character '|'".into()),
                        start,
                    ));
                }
            }
            '.' => {
                if self.bump_if('.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            other => {
                return Err(BriskError::new(
                    ErrorKind::ParseError(format!("unexpected character '{other}'")),
                    start,
                ));
            }
        };
        Ok(kind)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn declares_and_operators() {
        assert_eq!(
            kinds("x := 1"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::ColonEq,
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x :: 2"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::ColonColon,
                TokenKind::Int(2),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x == y"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::EqEq,
                TokenKind::Ident("y".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x != y"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::NotEq,
                TokenKind::Ident("y".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn range_vs_float_disambiguation() {
        assert_eq!(
            kinds("10..20"),
            vec![
                TokenKind::Int(10),
                TokenKind::DotDot,
                TokenKind::Int(20),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("1.5"),
            vec![TokenKind::Float(1.5), TokenKind::Eof]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::Str("a\nb".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn hash_comment_is_skipped() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn c_block_keeps_nested_braces() {
        let toks = kinds("@c { int f() { return 1; } }");
        assert_eq!(
            toks,
            vec![
                TokenKind::CBlock(" int f() { return 1; } ".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn word_form_logical_operators_match_symbol_forms() {
        assert_eq!(kinds("a and b"), kinds("a && b"));
        assert_eq!(kinds("a or b"), kinds("a || b"));
        assert_eq!(kinds("not a"), kinds("!a"));
    }

    #[test]
    fn import_directive() {
        assert_eq!(
            kinds(r#"@import "math.h""#),
            vec![TokenKind::Import, TokenKind::Str("math.h".into()), TokenKind::Eof]
        );
    }
}
