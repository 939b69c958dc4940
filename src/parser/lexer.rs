//! Small hand-written lexer shared by the TSET and LVLTEXT parsers.
//!
//! Both languages are line oriented, so lexing happens in two steps:
//! `source_lines` strips `;` comments and blank lines, then `Lexer` breaks a
//! single line into `Token`s. No keywords are recognised here; the parsers
//! classify the first word of each line themselves.
//
//  Lexical items (informal):
//
//      Pair   ::= Key '=' ( '"' .*? '"' | \S+ )
//      Key    ::= [A-Za-z0-9_]+
//      Word   ::= \S+              (anything that is not a Pair)
//
//  Whitespace separates tokens. A quote that is never closed is not special;
//  the value then runs to the next whitespace like any other value.

use std::iter::Peekable;
use std::str::Chars;

use crate::model::SourceLine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pair { key: String, value: String },
}

/// A token and the 1-based column where it starts. For pairs, `value_col`
/// is where the value starts (after the opening quote, if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub col: usize,
    pub value_col: usize,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    rest: &'a str,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            rest: src,
            col: 1,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.rest = &self.rest[c.len_utf8()..];
        self.col += 1;
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    /// Quoted value if the quote is closed on this line, otherwise `None`
    /// and nothing is consumed.
    fn read_quoted(&mut self) -> Option<String> {
        let body = self.rest.strip_prefix('"')?;
        let end = body.find('"')?;
        let text = body[..end].to_string();
        // opening quote, body, closing quote
        for _ in 0..text.chars().count() + 2 {
            self.next_char();
        }
        Some(text)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Spanned;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }

        let col = self.col;
        let first = self.next_char()?;
        let mut text = String::new();
        text.push(first);

        if is_key_char(first) {
            self.consume_while(is_key_char, &mut text);
            if self.peek_char() == Some('=') {
                self.next_char();
                let value_col = self.col;
                if let Some(quoted) = self.read_quoted() {
                    return Some(Spanned {
                        token: Token::Pair {
                            key: text,
                            value: quoted,
                        },
                        col,
                        value_col: value_col + 1,
                    });
                }
                let mut value = String::new();
                self.consume_while(|c| !c.is_whitespace(), &mut value);
                if !value.is_empty() {
                    return Some(Spanned {
                        token: Token::Pair { key: text, value },
                        col,
                        value_col,
                    });
                }
                text.push('=');
            }
        }

        self.consume_while(|c| !c.is_whitespace(), &mut text);
        Some(Spanned {
            token: Token::Word(text),
            col,
            value_col: col,
        })
    }
}

/// Strip `;` comments and drop blank lines. `#` stays usable as a map char.
pub fn source_lines(src: &str) -> Vec<SourceLine> {
    src.lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let code = match raw.find(';') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let trimmed = code.trim_start();
            let indent = code.chars().count() - trimmed.chars().count();
            let text = trimmed.trim_end();
            if text.is_empty() {
                None
            } else {
                Some(SourceLine {
                    line: idx + 1,
                    col: indent + 1,
                    text: text.to_string(),
                })
            }
        })
        .collect()
}

/// One line split into positional words and `key=value` pairs.
#[derive(Debug, Clone, Default)]
pub struct LineTokens {
    pub words: Vec<(String, usize)>,
    pairs: Vec<(String, String, usize, usize)>,
}

impl LineTokens {
    /// Columns are absolute: `base_col` is the column of `text` in the raw line.
    pub fn lex(text: &str, base_col: usize) -> Self {
        let mut out = Self::default();
        for sp in Lexer::new(text) {
            let col = sp.col + base_col - 1;
            match sp.token {
                Token::Word(w) => out.words.push((w, col)),
                Token::Pair { key, value } => {
                    let value_col = sp.value_col + base_col - 1;
                    match out.pairs.iter_mut().find(|(k, ..)| *k == key) {
                        // later duplicates win, first position is kept
                        Some(slot) => {
                            slot.1 = value;
                            slot.3 = value_col;
                        }
                        None => out.pairs.push((key, value, col, value_col)),
                    }
                }
            }
        }
        out
    }

    pub fn of(line: &SourceLine) -> Self {
        Self::lex(&line.text, line.col)
    }

    pub fn word(&self, idx: usize) -> Option<&str> {
        self.words.get(idx).map(|(w, _)| w.as_str())
    }

    pub fn word_col(&self, idx: usize) -> usize {
        self.words.get(idx).map(|(_, c)| *c).unwrap_or(1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, ..)| k == key)
            .map(|(_, v, ..)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Column of the key; 1 when absent.
    pub fn key_col(&self, key: &str) -> usize {
        self.pairs
            .iter()
            .find(|(k, ..)| k == key)
            .map(|(_, _, c, _)| *c)
            .unwrap_or(1)
    }

    /// Column of the value; 1 when absent.
    pub fn value_col(&self, key: &str) -> usize {
        self.pairs
            .iter()
            .find(|(k, ..)| k == key)
            .map(|(.., c)| *c)
            .unwrap_or(1)
    }

    /// Pairs in first-seen order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v, ..)| (k.as_str(), v.as_str()))
    }
}
