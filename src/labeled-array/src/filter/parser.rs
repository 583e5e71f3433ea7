// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for filter expressions.
//!
//! `&&` and `||` share one precedence level and associate to the left, so
//! `a || b && c` groups as `(a || b) && c`. Chained comparisons expand
//! into conjunctions: `1 < a < 3` is `1 < a && a < 3`.

use regex::Regex;

use super::lexer::{Lexer, Spanned, Token};
use super::{ArithOp, CmpOp, Expr, Pattern};
use crate::common::{ErrorCode, FilterError, FilterResult};
use crate::filter_err;
use crate::value::Value;

/// TokenKind discriminant for peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    True,
    False,
    In,
    NotWord,
    Exists,
    Bang,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Match,
    NotMatch,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Ident,
    Num,
    Str,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::True => TokenKind::True,
            Token::False => TokenKind::False,
            Token::In => TokenKind::In,
            Token::NotWord => TokenKind::NotWord,
            Token::Exists => TokenKind::Exists,
            Token::Bang => TokenKind::Bang,
            Token::Eq => TokenKind::Eq,
            Token::Neq => TokenKind::Neq,
            Token::Lt => TokenKind::Lt,
            Token::Lte => TokenKind::Lte,
            Token::Gt => TokenKind::Gt,
            Token::Gte => TokenKind::Gte,
            Token::Match => TokenKind::Match,
            Token::NotMatch => TokenKind::NotMatch,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::Mod => TokenKind::Mod,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::LBracket => TokenKind::LBracket,
            Token::RBracket => TokenKind::RBracket,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
            Token::Str(_) => TokenKind::Str,
        }
    }
}

/// Comparison operators usable in a chain.
enum ChainOp {
    Cmp(CmpOp),
    Match { negated: bool },
}

struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    fn new(lexer: Lexer<'input>) -> FilterResult<Self> {
        let mut tokens = Vec::new();
        for result in lexer {
            tokens.push(result?);
        }
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.pos + offset)
            .map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected<T>(&self) -> FilterResult<T> {
        if let Some((start, _, end)) = self.peek() {
            filter_err!(UnrecognizedToken, *start, *end)
        } else {
            let pos = self.eof_position();
            filter_err!(UnrecognizedEof, pos, pos + 1)
        }
    }

    fn expect(&mut self, expected: TokenKind) -> FilterResult<Spanned<Token<'input>>> {
        if self.peek_kind() == Some(expected) {
            if let Some(tok) = self.advance() {
                return Ok(tok);
            }
        }
        self.unexpected()
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    fn parse_filter(&mut self) -> FilterResult<Expr> {
        if self.tokens.is_empty() {
            return filter_err!(UnrecognizedEof, 0, 0);
        }

        let expr = self.parse_logical()?;

        if let Some((start, _, end)) = self.peek() {
            return filter_err!(ExtraToken, *start, *end);
        }

        Ok(expr)
    }

    /// `&&` and `||`, left associative at the same level
    fn parse_logical(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_not()?;

        loop {
            let is_and = match self.peek_kind() {
                Some(TokenKind::And) => true,
                Some(TokenKind::Or) => false,
                _ => break,
            };
            self.advance();
            let right = self.parse_not()?;
            left = if is_and {
                Expr::And(Box::new(left), Box::new(right))
            } else {
                Expr::Or(Box::new(left), Box::new(right))
            };
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> FilterResult<Expr> {
        if self.peek_kind() == Some(TokenKind::Bang) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn peek_chain_op(&self) -> Option<ChainOp> {
        let op = match self.peek_kind()? {
            TokenKind::Eq => ChainOp::Cmp(CmpOp::Eq),
            TokenKind::Neq => ChainOp::Cmp(CmpOp::Neq),
            TokenKind::Lt => ChainOp::Cmp(CmpOp::Lt),
            TokenKind::Lte => ChainOp::Cmp(CmpOp::Lte),
            TokenKind::Gt => ChainOp::Cmp(CmpOp::Gt),
            TokenKind::Gte => ChainOp::Cmp(CmpOp::Gte),
            TokenKind::Match => ChainOp::Match { negated: false },
            TokenKind::NotMatch => ChainOp::Match { negated: true },
            _ => return None,
        };
        Some(op)
    }

    /// Comparisons, membership tests and chained comparisons.
    fn parse_comparison(&mut self) -> FilterResult<Expr> {
        let left = self.parse_additive()?;

        match self.peek_kind() {
            Some(TokenKind::In) => {
                self.advance();
                let right = self.parse_additive()?;
                return Ok(Expr::In(Box::new(left), Box::new(right)));
            }
            Some(TokenKind::NotWord) if self.peek_kind_at(1) == Some(TokenKind::In) => {
                self.advance();
                self.advance();
                let right = self.parse_additive()?;
                let membership = Expr::In(Box::new(left), Box::new(right));
                return Ok(Expr::Not(Box::new(membership)));
            }
            _ => {}
        }

        let mut links: Vec<Expr> = Vec::new();
        let mut prev = left;
        while let Some(op) = self.peek_chain_op() {
            let op_start = self.peek().map(|(s, _, _)| *s).unwrap_or(0);
            self.advance();
            let rhs_start = self.peek().map(|(s, _, _)| *s).unwrap_or(op_start);
            let right = self.parse_additive()?;
            let rhs_end = self.tokens[..self.pos]
                .last()
                .map(|(_, _, e)| *e)
                .unwrap_or(rhs_start);
            let link = match op {
                ChainOp::Cmp(op) => Expr::Cmp(op, Box::new(prev.clone()), Box::new(right.clone())),
                ChainOp::Match { negated } => {
                    let pattern = compile_pattern(&right, rhs_start, rhs_end)?;
                    Expr::Match(Box::new(prev.clone()), pattern, negated)
                }
            };
            links.push(link);
            prev = right;
        }

        let mut links = links.into_iter();
        match links.next() {
            None => Ok(prev),
            Some(first) => Ok(links.fold(first, |acc, link| {
                Expr::And(Box::new(acc), Box::new(link))
            })),
        }
    }

    fn parse_additive(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_modulo()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => ArithOp::Mul,
                Some(TokenKind::Div) => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_modulo()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_modulo(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_unary()?;

        while self.peek_kind() == Some(TokenKind::Mod) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arith(ArithOp::Mod, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FilterResult<Expr> {
        if self.peek_kind() == Some(TokenKind::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            // fold negative literals so they print back the same way
            return Ok(match inner {
                Expr::Const(Value::Int(n)) => Expr::Const(Value::Int(-n)),
                Expr::Const(Value::Float(n)) => Expr::Const(Value::Float(-n)),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> FilterResult<Expr> {
        let (start, tok, end) = match self.peek() {
            Some(tok) => *tok,
            None => return self.unexpected(),
        };

        match tok {
            Token::Num(text) => {
                self.advance();
                match Value::parse(text) {
                    Value::Str(_) => filter_err!(ExpectedNumber, start, end),
                    value => Ok(Expr::Const(value)),
                }
            }
            Token::Str(text) => {
                self.advance();
                Ok(Expr::Const(Value::Str(text.to_string())))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Const(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Const(Value::Bool(false)))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Var(name.to_string()))
            }
            Token::Exists => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let name = match self.peek() {
                    Some((_, Token::Ident(name), _)) => name.to_string(),
                    _ => return self.unexpected(),
                };
                self.advance();
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Exists(name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_logical()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if self.peek_kind() == Some(TokenKind::RBracket) {
                    self.advance();
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.parse_additive()?);
                    match self.peek_kind() {
                        Some(TokenKind::Comma) => {
                            self.advance();
                        }
                        Some(TokenKind::RBracket) => {
                            self.advance();
                            break;
                        }
                        _ => return self.unexpected(),
                    }
                }
                Ok(Expr::List(items))
            }
            _ => self.unexpected(),
        }
    }
}

/// The right-hand side of `=~` must be a constant; it is matched at the
/// start of the stringified left-hand side.
fn compile_pattern(expr: &Expr, start: usize, end: usize) -> FilterResult<Pattern> {
    let source = match expr {
        Expr::Const(value) => value.to_string(),
        _ => return filter_err!(InvalidRegex, start, end),
    };
    match Regex::new(&format!("^(?:{source})")) {
        Ok(regex) => Ok(Pattern { source, regex }),
        Err(_) => Err(FilterError {
            start: start as u16,
            end: end as u16,
            code: ErrorCode::InvalidRegex,
        }),
    }
}

pub fn parse(text: &str) -> FilterResult<Expr> {
    let mut parser = Parser::new(Lexer::new(text))?;
    parser.parse_filter()
}
