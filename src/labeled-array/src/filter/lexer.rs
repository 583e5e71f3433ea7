// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::str::CharIndices;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_xid::UnicodeXID;

use self::Token::*;
use crate::common::ErrorCode::*;
use crate::common::{ErrorCode, FilterError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'input> {
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
    Ident(&'input str),
    Num(&'input str),
    /// String contents, without the surrounding quotes.
    Str(&'input str),
}

fn error<T>(code: ErrorCode, start: usize, end: usize) -> Result<T, FilterError> {
    Err(FilterError {
        start: start as u16,
        end: end as u16,
        code,
    })
}

pub type Spanned<T> = (usize, T, usize);

pub struct Lexer<'input> {
    text: &'input str,
    chars: CharIndices<'input>,
    lookahead: Option<(usize, char)>,
}

const KEYWORDS: &[(&str, Token<'static>)] = &[
    ("True", True),
    ("False", False),
    ("in", In),
    ("not", NotWord),
    ("exists", Exists),
];

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        let mut t = Lexer {
            text: input,
            chars: input.char_indices(),
            lookahead: None,
        };
        t.bump();
        t
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.bump_n(1)
    }

    fn bump_n(&mut self, n: usize) -> Option<(usize, char)> {
        debug_assert!(n > 0);
        self.lookahead = self.chars.nth(n - 1);
        self.lookahead
    }

    fn take_while<F>(&mut self, mut keep_going: F) -> Option<usize>
    where
        F: FnMut(char) -> bool,
    {
        self.take_until(|c| !keep_going(c))
    }

    fn take_until<F>(&mut self, mut terminate: F) -> Option<usize>
    where
        F: FnMut(char) -> bool,
    {
        loop {
            match self.lookahead {
                None => {
                    return None;
                }
                Some((idx1, c)) => {
                    if terminate(c) {
                        return Some(idx1);
                    } else {
                        self.bump();
                    }
                }
            }
        }
    }

    fn identifierish(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        let end = self
            .take_while(is_identifier_continue)
            .unwrap_or(self.text.len());
        let word = &self.text[idx0..end];

        // keywords are case sensitive, so `true` is a plain identifier
        let tok = KEYWORDS
            .iter()
            .filter(|&&(w, _)| w == word)
            .map(|(_, t)| *t)
            .next()
            .unwrap_or(Ident(word));

        (idx0, tok, end)
    }

    fn number(&mut self, idx0: usize) -> Spanned<Token<'input>> {
        lazy_static! {
            static ref NUMBER_RE: Regex = Regex::new(r"^\d+(\.\d*)?([eE][-+]?\d+)?").unwrap();
        }

        let len = NUMBER_RE
            .find(&self.text[idx0..])
            .map(|m| m.end())
            .unwrap_or(1);
        self.bump_n(len);

        let end = idx0 + len;
        (idx0, Num(&self.text[idx0..end]), end)
    }

    fn string(&mut self, idx0: usize) -> Result<Spanned<Token<'input>>, FilterError> {
        // eat the opening quote
        self.bump();

        match self.take_until(|c| c == '\'') {
            Some(idx1) => {
                // eat the closing quote
                self.bump();
                Ok((idx0, Str(&self.text[idx0 + 1..idx1]), idx1 + 1))
            }
            None => error(UnclosedString, idx0, self.text.len()),
        }
    }

    fn consume(
        &mut self,
        i: usize,
        tok: Token<'input>,
        len: usize,
    ) -> Option<Result<Spanned<Token<'input>>, FilterError>> {
        self.bump();
        Some(Ok((i, tok, i + len)))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Result<Spanned<Token<'input>>, FilterError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.lookahead {
                Some((i, '=')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Eq, 2),
                    Some((_, '~')) => self.consume(i, Match, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 1)),
                },
                Some((i, '!')) => {
                    match self.bump() {
                        Some((_, '=')) => self.consume(i, Neq, 2),
                        Some((_, '~')) => self.consume(i, NotMatch, 2),
                        // we've already bumped, don't consume
                        _ => Some(Ok((i, Bang, i + 1))),
                    }
                }
                Some((i, '<')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Lte, 2),
                    _ => Some(Ok((i, Lt, i + 1))),
                },
                Some((i, '>')) => match self.bump() {
                    Some((_, '=')) => self.consume(i, Gte, 2),
                    _ => Some(Ok((i, Gt, i + 1))),
                },
                Some((i, '&')) => match self.bump() {
                    Some((_, '&')) => self.consume(i, And, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 1)),
                },
                Some((i, '|')) => match self.bump() {
                    Some((_, '|')) => self.consume(i, Or, 2),
                    _ => Some(error(UnrecognizedToken, i, i + 1)),
                },
                Some((i, '+')) => self.consume(i, Plus, 1),
                Some((i, '-')) => self.consume(i, Minus, 1),
                Some((i, '*')) => self.consume(i, Mul, 1),
                Some((i, '/')) => self.consume(i, Div, 1),
                Some((i, '%')) => self.consume(i, Mod, 1),
                Some((i, '(')) => self.consume(i, LParen, 1),
                Some((i, ')')) => self.consume(i, RParen, 1),
                Some((i, '[')) => self.consume(i, LBracket, 1),
                Some((i, ']')) => self.consume(i, RBracket, 1),
                Some((i, ',')) => self.consume(i, Comma, 1),
                Some((i, '\'')) => Some(self.string(i)),
                Some((i, c)) if is_identifier_start(c) => Some(Ok(self.identifierish(i))),
                Some((i, c)) if c.is_ascii_digit() => Some(Ok(self.number(i))),
                Some((_, c)) if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                Some((i, _)) => {
                    self.bump(); // eat whatever is killing us
                    let end = match self.lookahead {
                        Some((end, _)) => end,
                        None => self.text.len(),
                    };
                    Some(error(InvalidToken, i, end))
                }
                None => None,
            };
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    UnicodeXID::is_xid_start(c) || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    UnicodeXID::is_xid_continue(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test(input: &str, expected: Vec<(&str, Token)>) {
        let tokenizer = Lexer::new(input);
        let len = expected.len();
        for (token, (expected_span, expected_tok)) in tokenizer.zip(expected.into_iter()) {
            let expected_start = expected_span.find('~').unwrap();
            let expected_end = expected_span.rfind('~').unwrap() + 1;
            assert_eq!(Ok((expected_start, expected_tok, expected_end)), token);
        }

        let tokenizer = Lexer::new(input);
        assert_eq!(None, tokenizer.skip(len).next());
    }

    fn test_err(input: &str, expected: (&str, ErrorCode)) {
        let tokenizer = Lexer::new(input);
        let token = tokenizer.into_iter().find(|t| t.is_err()).unwrap();
        let (expected_span, expected_code) = expected;
        let expected_start = expected_span.find('~').unwrap();
        let expected_end = expected_span.rfind('~').unwrap() + 1;
        let expected_err = FilterError {
            start: expected_start as u16,
            end: expected_end as u16,
            code: expected_code,
        };
        assert_eq!(Err(expected_err), token);
    }

    #[test]
    fn comparison() {
        test(
            "c == 'c1'",
            vec![
                ("~        ", Ident("c")),
                ("  ~~     ", Eq),
                ("     ~~~~", Str("c1")),
            ],
        );
    }

    #[test]
    fn operators() {
        test(
            "!= <= >= =~ !~ && || !",
            vec![
                ("~~                    ", Neq),
                ("   ~~                 ", Lte),
                ("      ~~              ", Gte),
                ("         ~~           ", Match),
                ("            ~~        ", NotMatch),
                ("               ~~     ", And),
                ("                  ~~  ", Or),
                ("                     ~", Bang),
            ],
        );
    }

    #[test]
    fn keywords() {
        test(
            "a not in [True, False] && exists(b)",
            vec![
                ("~                                  ", Ident("a")),
                ("  ~~~                              ", NotWord),
                ("      ~~                           ", In),
                ("         ~                         ", LBracket),
                ("          ~~~~                     ", True),
                ("              ~                    ", Comma),
                ("                ~~~~~              ", False),
                ("                     ~             ", RBracket),
                ("                       ~~          ", And),
                ("                          ~~~~~~   ", Exists),
                ("                                ~  ", LParen),
                ("                                 ~ ", Ident("b")),
                ("                                  ~", RParen),
            ],
        );
    }

    #[test]
    fn numbers() {
        test(
            "1 2.5 3e2 -4",
            vec![
                ("~           ", Num("1")),
                ("  ~~~       ", Num("2.5")),
                ("      ~~~   ", Num("3e2")),
                ("          ~ ", Minus),
                ("           ~", Num("4")),
            ],
        );
    }

    #[test]
    fn errors() {
        test_err("a = 1", ("  ~  ", UnrecognizedToken));
        test_err("a & b", ("  ~  ", UnrecognizedToken));
        test_err("a == 'b", ("     ~~", UnclosedString));
        test_err("a $ b", ("  ~  ", InvalidToken));
    }
}
