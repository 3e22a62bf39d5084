//! Lexer for path expressions
//!
//! The same cursor serves two grammars. `tokenize_path` produces the
//! punctuation, names and indices of the path syntax, capturing each filter
//! predicate as one raw token. `tokenize_filter` splits a predicate into
//! literals, operators, parentheses and embedded sub-paths.
//!
//! Offsets are character indices into the original path source, so tokens
//! lexed from a predicate report positions relative to the whole path.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::error::SyntaxError;
use crate::evaluator::operations::is_operator_char;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Path grammar
    Dollar,
    At,
    Dot,
    DotDot,
    Star,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Int(i64),
    Ident(String),
    Str(String),
    /// Raw predicate text between `?(` and its matching `)`.
    Filter(String),

    // Filter grammar
    Number(BigDecimal),
    Path(String),
    Op(String),
    LParen,
    RParen,

    Eof,
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Source text the token was read from
    pub value: String,
    /// Offset of the first character
    pub start: usize,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, start: usize) -> Self {
        Self {
            token_type,
            value: value.into(),
            start,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.token_type == TokenType::Eof
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    /// Offset of `input[0]` within the whole path source
    base: usize,
}

impl Lexer {
    pub fn new(input: &str, base: usize) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            base,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current();
        if self.pos < self.input.len() {
            self.pos += 1;
        }
        c
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn text_from(&self, start: usize) -> String {
        self.input[start..self.pos].iter().collect()
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.current().map_or(false, &pred) {
            self.pos += 1;
        }
        self.text_from(start)
    }

    fn skip_whitespace(&mut self) {
        self.skip_while(char::is_whitespace);
    }

    fn error(&self, message: impl Into<String>, pos: usize) -> SyntaxError {
        SyntaxError::new(message, self.base + pos)
    }

    /// Tokenize the path grammar, ending with `Eof`.
    pub fn tokenize_path(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let c = match self.advance() {
                Some(c) => c,
                None => break,
            };
            let token_type = match c {
                '$' => TokenType::Dollar,
                '@' => TokenType::At,
                '.' if self.current() == Some('.') => {
                    self.advance();
                    TokenType::DotDot
                }
                '.' => TokenType::Dot,
                '*' => TokenType::Star,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                ',' => TokenType::Comma,
                ':' => TokenType::Colon,
                '\'' | '"' => TokenType::Str(self.read_string(c, start)?),
                '?' => {
                    if self.current() != Some('(') {
                        return Err(self.error("expected '(' after '?'", start));
                    }
                    self.advance();
                    TokenType::Filter(self.scan_balanced(start)?)
                }
                '-' => {
                    if !self.current().map_or(false, |d| d.is_ascii_digit()) {
                        return Err(self.error("expected an integer after the minus '-' sign", start));
                    }
                    self.read_int(start)?
                }
                c if c.is_ascii_digit() => self.read_int(start)?,
                c if is_ident_start(c) => {
                    self.skip_while(is_ident_char);
                    TokenType::Ident(self.text_from(start))
                }
                other => {
                    return Err(self.error(format!("unexpected character '{}'", other), start));
                }
            };
            tokens.push(Token::new(token_type, self.text_from(start), self.base + start));
        }
        tokens.push(Token::new(TokenType::Eof, "", self.offset()));
        Ok(tokens)
    }

    /// Tokenize a filter predicate, ending with `Eof`.
    pub fn tokenize_filter(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let c = match self.current() {
                Some(c) => c,
                None => break,
            };
            // A '-' directly before a digit is a sign only where an operand is expected
            let operand_expected = match tokens.last().map(|t| &t.token_type) {
                None | Some(TokenType::Op(_)) | Some(TokenType::LParen) => true,
                _ => false,
            };
            let token_type = match c {
                '(' => {
                    self.advance();
                    TokenType::LParen
                }
                ')' => {
                    self.advance();
                    TokenType::RParen
                }
                '\'' | '"' => {
                    self.advance();
                    TokenType::Str(self.read_string(c, start)?)
                }
                '$' | '@' => TokenType::Path(self.read_path_operand()),
                '-' if operand_expected && self.peek(1).map_or(false, |d| d.is_ascii_digit()) => {
                    self.advance();
                    self.read_number(start)?
                }
                c if c.is_ascii_digit() => self.read_number(start)?,
                c if is_ident_start(c) => TokenType::Ident(self.skip_while(is_ident_char)),
                c if is_operator_char(c) => TokenType::Op(self.read_operator()),
                other => {
                    return Err(self.error(format!("unexpected character '{}'", other), start));
                }
            };
            tokens.push(Token::new(token_type, self.text_from(start), self.base + start));
        }
        tokens.push(Token::new(TokenType::Eof, "", self.offset()));
        Ok(tokens)
    }

    /// Read a quoted string; the opening quote is already consumed.
    fn read_string(&mut self, quote: char, start: usize) -> Result<String, SyntaxError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("bad string: unterminated quote", start)),
                Some(c) if c == quote => return Ok(s),
                Some('\\') => match self.advance() {
                    None => return Err(self.error("bad string: unterminated quote", start)),
                    Some('n') => s.push('\n'),
                    Some('r') => s.push('\r'),
                    Some('t') => s.push('\t'),
                    Some(other) => s.push(other),
                },
                Some(c) => s.push(c),
            }
        }
    }

    /// Read an optionally signed integer; `start` points at the first character.
    fn read_int(&mut self, start: usize) -> Result<TokenType, SyntaxError> {
        self.skip_while(|c| c.is_ascii_digit());
        let text = self.text_from(start);
        text.parse::<i64>()
            .map(TokenType::Int)
            .map_err(|_| self.error(format!("integer '{}' is out of range", text), start))
    }

    fn read_number(&mut self, start: usize) -> Result<TokenType, SyntaxError> {
        self.skip_while(|c| c.is_ascii_digit());
        if self.current() == Some('.') && self.peek(1).map_or(false, |d| d.is_ascii_digit()) {
            self.advance();
            self.skip_while(|c| c.is_ascii_digit());
        }
        if matches!(self.current(), Some('e') | Some('E')) {
            let sign = usize::from(matches!(self.peek(1), Some('+') | Some('-')));
            if self.peek(1 + sign).map_or(false, |d| d.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.skip_while(|c| c.is_ascii_digit());
            }
        }
        let text = self.text_from(start);
        BigDecimal::from_str(&text)
            .map(TokenType::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text), start))
    }

    /// Longest run of operator characters. A trailing '-' that starts a
    /// negative literal is left for the next token.
    fn read_operator(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current() {
            if !is_operator_char(c) {
                break;
            }
            if c == '-' && self.pos > start && self.peek(1).map_or(false, |d| d.is_ascii_digit()) {
                break;
            }
            self.pos += 1;
        }
        self.text_from(start)
    }

    /// Read an embedded `$...` or `@...` path up to the first top-level
    /// whitespace, ',', ')' or operator character.
    fn read_path_operand(&mut self) -> String {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        while let Some(c) = self.current() {
            if let Some(q) = quote {
                if c == '\\' {
                    self.pos += 1;
                } else if c == q {
                    quote = None;
                }
                self.pos += 1;
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' if depth == 0 => break,
                ']' | ')' => depth -= 1,
                _ if depth > 0 => {}
                c if c.is_whitespace() || c == ',' => break,
                '*' if self.pos > start && matches!(self.input[self.pos - 1], '.' | '[') => {}
                c if is_operator_char(c) => break,
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.input.len());
        self.text_from(start)
    }

    /// Scan a predicate body after `?(`, up to the matching `)`, skipping
    /// nested brackets and quoted text. Consumes the closing `)`.
    fn scan_balanced(&mut self, start: usize) -> Result<String, SyntaxError> {
        let body_start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        while let Some(c) = self.advance() {
            if let Some(q) = quote {
                if c == '\\' {
                    self.advance();
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' if depth == 0 => {
                    let body: String = self.input[body_start..self.pos - 1].iter().collect();
                    return Ok(body);
                }
                ')' | ']' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        let message = if quote.is_some() {
            "bad string: unterminated quote in filter"
        } else {
            "unterminated filter expression"
        };
        Err(self.error(message, start))
    }
}

/// Tokenize path text whose first character sits at `base`.
pub fn tokenize_path(input: &str, base: usize) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(input, base).tokenize_path()
}

/// Tokenize predicate text whose first character sits at `base`.
pub fn tokenize_filter(input: &str, base: usize) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(input, base).tokenize_filter()
}
