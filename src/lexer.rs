//! Lexical analysis of expression fragments.

use num_bigint::BigInt;
use thiserror::Error;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal such as `42`, `0xff`, `0o17` or `0b101`, of any size.
    Int(BigInt),
    /// Float literal such as `1.5`, `.5`, `2.` or `1e3`.
    Float(f64),
    /// Quoted string literal with escapes already resolved.
    Str(String),
    /// A variable name.
    Ident(String),
    Plus,
    Minus,
    Star,
    /// `**`
    DoubleStar,
    Slash,
    /// `//`
    DoubleSlash,
    Percent,
    LParen,
    RParen,
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unfinished string literal")]
    UnfinishedQuote,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("malformed number literal {0:?}")]
    MalformedNumber(String),
}

struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(fragment: &str) -> Self {
        Lexer {
            input: fragment.chars().collect(),
            pos: 0,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.pos += 1;
                }
                '0'..='9' => out.push(self.read_number()?),
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                    out.push(self.read_number()?)
                }
                '\'' | '"' => {
                    self.pos += 1;
                    out.push(Token::Str(self.read_string(ch)?));
                }
                c if c.is_alphabetic() || c == '_' => out.push(Token::Ident(self.read_ident())),
                _ => {
                    self.pos += 1;
                    out.push(self.read_operator(ch)?);
                }
            }
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn eat_digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek_char().filter(char::is_ascii_digit) {
            text.push(c);
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, LexingError> {
        if self.peek_char() == Some('0') {
            let radix = match self.peek_nth(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                return self.read_radix_int(radix);
            }
        }

        let mut text = String::new();
        let mut is_float = false;

        self.eat_digits(&mut text);
        if self.peek_char() == Some('.') {
            is_float = true;
            text.push('.');
            self.pos += 1;
            self.eat_digits(&mut text);
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            is_float = true;
            text.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek_char() {
                text.push(sign);
                self.pos += 1;
            }
            let before = text.len();
            self.eat_digits(&mut text);
            if text.len() == before {
                return Err(LexingError::MalformedNumber(text));
            }
        }

        // `3x` or `1.5abc` is not a number followed by a name
        if let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                return Err(LexingError::MalformedNumber(text));
            }
        }

        if is_float {
            return text
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexingError::MalformedNumber(text));
        }

        // decimal integers may not carry leading zeros, except zero itself
        if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
            return Err(LexingError::MalformedNumber(text));
        }
        text.parse::<BigInt>()
            .map(Token::Int)
            .map_err(|_| LexingError::MalformedNumber(text))
    }

    /// Reads `0x..`, `0o..` or `0b..`; the cursor sits on the leading zero.
    fn read_radix_int(&mut self, radix: u32) -> Result<Token, LexingError> {
        let mut text: String = self.input[self.pos..self.pos + 2].iter().collect();
        self.pos += 2;

        let mut digits = String::new();
        while let Some(c) = self.peek_char().filter(|c| c.is_alphanumeric()) {
            digits.push(c);
            self.pos += 1;
        }
        text.push_str(&digits);

        if digits.is_empty() || self.peek_char() == Some('_') {
            return Err(LexingError::MalformedNumber(text));
        }
        BigInt::parse_bytes(digits.as_bytes(), radix)
            .map(Token::Int)
            .ok_or(LexingError::MalformedNumber(text))
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexingError> {
        let mut buffer = String::new();
        loop {
            match self.read_char() {
                None => return Err(LexingError::UnfinishedQuote),
                Some(c) if c == quote => return Ok(buffer),
                Some('\\') => match self.read_char() {
                    None => return Err(LexingError::UnfinishedQuote),
                    Some('n') => buffer.push('\n'),
                    Some('t') => buffer.push('\t'),
                    Some('r') => buffer.push('\r'),
                    Some('0') => buffer.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => buffer.push(c),
                    Some(c) => {
                        // unknown escapes are kept verbatim
                        buffer.push('\\');
                        buffer.push(c);
                    }
                },
                Some(c) => buffer.push(c),
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    fn read_operator(&mut self, ch: char) -> Result<Token, LexingError> {
        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '*' if self.peek_char() == Some('*') => {
                self.pos += 1;
                Token::DoubleStar
            }
            '*' => Token::Star,
            '/' if self.peek_char() == Some('/') => {
                self.pos += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            other => return Err(LexingError::UnexpectedChar(other)),
        };
        Ok(token)
    }
}

/// Split an expression fragment into tokens.
pub fn split_into_tokens(fragment: &str) -> Result<Vec<Token>, LexingError> {
    Lexer::new(fragment).make_tokens()
}
