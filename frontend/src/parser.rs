use crate::surface::{Span, Syntax, SyntaxKind};
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}: unexpected end of input")]
    UnexpectedEof(Span),
    #[error("{1}: unexpected character `{0}`")]
    UnexpectedChar(char, Span),
    #[error("{0}: unmatched closing delimiter")]
    UnmatchedParen(Span),
    #[error("{1}: number out of range: {0}")]
    BadNumber(String, Span),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedEof(span)
            | ParseError::UnexpectedChar(_, span)
            | ParseError::UnmatchedParen(span)
            | ParseError::BadNumber(_, span) => *span,
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}' | ';')
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            chars: input.chars().peekable(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn current_span(&self) -> Span {
        Span {
            start: self.pos,
            end: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.next();
            } else if c == ';' {
                // comment runs to end of line
                while let Some(nc) = self.peek() {
                    if nc == '\n' {
                        break;
                    }
                    self.next();
                }
            } else {
                break;
            }
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            s.push(c);
            self.next();
        }
        s
    }
}

/// Reader for the s-expression syntax of scripts.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input),
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Syntax>, ParseError> {
        let mut exprs = Vec::new();
        self.lexer.skip_whitespace();
        while self.lexer.peek().is_some() {
            exprs.push(self.parse_expr()?);
            self.lexer.skip_whitespace();
        }
        Ok(exprs)
    }

    fn span_from(&self, start: Span) -> Span {
        Span {
            end: self.lexer.pos,
            ..start
        }
    }

    fn parse_list(&mut self, close: char) -> Result<Vec<Syntax>, ParseError> {
        let mut list = Vec::new();
        loop {
            self.lexer.skip_whitespace();
            match self.lexer.peek() {
                Some(c) if c == close => {
                    self.lexer.next();
                    return Ok(list);
                }
                Some(')') | Some('}') => {
                    return Err(ParseError::UnmatchedParen(self.lexer.current_span()))
                }
                None => return Err(ParseError::UnexpectedEof(self.lexer.current_span())),
                Some(_) => list.push(self.parse_expr()?),
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Syntax, ParseError> {
        self.lexer.skip_whitespace();
        let start = self.lexer.current_span();

        let kind = match self.lexer.peek() {
            Some('(') => {
                self.lexer.next();
                SyntaxKind::List(self.parse_list(')')?)
            }
            Some('{') => {
                self.lexer.next();
                SyntaxKind::BracedList(self.parse_list('}')?)
            }
            Some(')') | Some('}') => return Err(ParseError::UnmatchedParen(start)),
            Some(c) if c.is_ascii_digit() => {
                let digits = self.lexer.take_while(|c| c.is_ascii_digit());
                match self.lexer.peek() {
                    Some(c) if !is_delimiter(c) => {
                        return Err(ParseError::UnexpectedChar(c, self.lexer.current_span()))
                    }
                    _ => {}
                }
                let n = digits
                    .parse()
                    .map_err(|_| ParseError::BadNumber(digits.clone(), start))?;
                SyntaxKind::Int(n)
            }
            Some(_) => SyntaxKind::Symbol(self.lexer.take_while(|c| !is_delimiter(c))),
            None => return Err(ParseError::UnexpectedEof(start)),
        };
        Ok(Syntax {
            kind,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<Syntax>, ParseError> {
        Parser::new(input).parse()
    }

    #[test]
    fn reads_nested_lists_and_comments() {
        let syntax = parse("; leading comment\n(forall (x A) {y A} (= x y)) ; trailing\n").unwrap();
        assert_eq!(syntax.len(), 1);
        assert_eq!(syntax[0].pretty_print(), "(forall (x A) {y A} (= x y))");
        assert_eq!(syntax[0].span.line, 2);
        assert_eq!(syntax[0].span.col, 1);
    }

    #[test]
    fn spans_track_lines_and_columns() {
        let syntax = parse("(goal\n  (P a))").unwrap();
        let SyntaxKind::List(items) = &syntax[0].kind else {
            panic!("expected a list");
        };
        assert_eq!((items[1].span.line, items[1].span.col), (2, 3));
    }

    #[test]
    fn unicode_symbols_are_allowed() {
        let syntax = parse("(rw ← h)").unwrap();
        assert_eq!(syntax[0].pretty_print(), "(rw ← h)");
    }

    #[test]
    fn numbers_are_read() {
        let syntax = parse("(Sort 2)").unwrap();
        let SyntaxKind::List(items) = &syntax[0].kind else {
            panic!("expected a list");
        };
        assert_eq!(items[1].kind, SyntaxKind::Int(2));
    }

    #[test]
    fn reports_structural_errors() {
        assert!(matches!(parse("(goal (P a)"), Err(ParseError::UnexpectedEof(_))));
        assert!(matches!(parse("(goal))"), Err(ParseError::UnmatchedParen(_))));
        assert!(matches!(parse("(f {x)"), Err(ParseError::UnmatchedParen(_))));
        assert!(matches!(parse("12ab"), Err(ParseError::UnexpectedChar('a', _))));
        assert!(matches!(parse("99999999999"), Err(ParseError::BadNumber(..))));
    }
}
