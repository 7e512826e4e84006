//! Tokenizer for the DF-ISE text format.

use std::io::BufRead;

use crate::error::{DfiseError, Result};

/// A token produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text; for quoted strings, the unquoted content
    pub text: String,
}

/// Token types in the DF-ISE grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A bare identifier or number literal
    Word,
    /// A double-quoted string (quotes stripped, escapes resolved)
    QuotedString,
    /// One of the standalone characters `= { } [ ] ( )`
    Punctuation,
}

impl Token {
    fn word(text: impl Into<String>) -> Self {
        Token {
            kind: TokenKind::Word,
            text: text.into(),
        }
    }

    fn quoted(text: impl Into<String>) -> Self {
        Token {
            kind: TokenKind::QuotedString,
            text: text.into(),
        }
    }

    fn punctuation(c: char) -> Self {
        Token {
            kind: TokenKind::Punctuation,
            text: c.to_string(),
        }
    }

    /// True for the punctuation token with the given character.
    pub fn is_punctuation(&self, c: char) -> bool {
        self.kind == TokenKind::Punctuation && self.text.len() == 1 && self.text.starts_with(c)
    }
}

/// Tokenizer over a buffered reader.
///
/// Buffers one physical line of normalized tokens at a time and re-fetches
/// on exhaustion. The produced sequence is lazy, forward-only and
/// non-restartable.
pub struct Tokenizer<R> {
    input: R,
    line: Vec<Token>,
    cursor: usize,
    eof: bool,
}

fn is_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\n' || c == '\r'
}

fn is_standalone(c: char) -> bool {
    matches!(c, '=' | '{' | '}' | '[' | ']' | '(' | ')')
}

fn is_comment_token(c: char) -> bool {
    c == '#'
}

impl<R: BufRead> Tokenizer<R> {
    /// Create a new tokenizer for the given input.
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: Vec::new(),
            cursor: 0,
            eof: false,
        }
    }

    /// True once the input is exhausted and no tokens remain buffered.
    pub fn at_end(&self) -> bool {
        self.eof && self.cursor == self.line.len()
    }

    /// Get the next token, fetching further physical lines as needed.
    pub fn next_token(&mut self) -> Result<Token> {
        while self.cursor == self.line.len() {
            if self.eof {
                return Err(DfiseError::EndOfInput);
            }
            self.refill()?;
        }
        let token = self.line[self.cursor].clone();
        self.cursor += 1;
        Ok(token)
    }

    /// Consume one token and require its text to match `expected`.
    pub fn expect(&mut self, expected: &str, context: &'static str) -> Result<()> {
        let token = self.next_token()?;
        if token.text != expected {
            return Err(DfiseError::syntax(context, expected, token.text));
        }
        Ok(())
    }

    fn read_physical_line(&mut self, buf: &mut String) -> Result<usize> {
        buf.clear();
        let n = self.input.read_line(buf).map_err(|source| DfiseError::Io {
            path: "<input>".to_string(),
            source,
        })?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Tokenize the next physical line into the internal buffer.
    ///
    /// A quoted string may run past the end of the line, in which case
    /// further physical lines are pulled in until the closing quote; the
    /// embedded newlines stay part of the token text.
    fn refill(&mut self) -> Result<()> {
        self.line.clear();
        self.cursor = 0;

        let mut buf = String::new();
        if self.read_physical_line(&mut buf)? == 0 {
            return Ok(());
        }

        let mut chars: Vec<char> = buf.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if is_whitespace(c) {
                i += 1;
            } else if is_comment_token(c) {
                break;
            } else if is_standalone(c) {
                self.line.push(Token::punctuation(c));
                i += 1;
            } else if c == '"' {
                i += 1;
                let mut text = String::new();
                loop {
                    if i == chars.len() {
                        // the string continues on the next physical line
                        if self.read_physical_line(&mut buf)? == 0 {
                            return Err(DfiseError::UnterminatedString);
                        }
                        chars.extend(buf.chars());
                    }
                    match chars[i] {
                        '"' => {
                            i += 1;
                            break;
                        }
                        '\\' => {
                            i += 1;
                            if i == chars.len() {
                                if self.read_physical_line(&mut buf)? == 0 {
                                    return Err(DfiseError::UnterminatedString);
                                }
                                chars.extend(buf.chars());
                            }
                            text.push(chars[i]);
                            i += 1;
                        }
                        other => {
                            text.push(other);
                            i += 1;
                        }
                    }
                }
                self.line.push(Token::quoted(text));
            } else {
                let start = i;
                while i < chars.len()
                    && !is_whitespace(chars[i])
                    && !is_comment_token(chars[i])
                    && !is_standalone(chars[i])
                    && chars[i] != '"'
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                self.line.push(Token::word(text));
            }
        }

        Ok(())
    }
}
