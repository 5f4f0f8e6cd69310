//! Lexer (tokenizer) for pattern source code
//!
//! Converts preprocessed source text into a flat [`Token`] stream consumed by
//! the parser. Numeric literals are decoded here, so every number token already
//! carries a tagged [`Value`] with its width and signedness.

use super::ast::{BuiltinType, SourceLocation};
use crate::memory::value::Value;
use std::fmt;
use thiserror::Error;

/// All token variants produced by the lexer.
///
/// Every variant carries a [`SourceLocation`] so that parse errors can report
/// an accurate line and column without a separate token→location table.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    NumberLiteral(Value, SourceLocation),
    CharLiteral(u8, SourceLocation),
    StringLiteral(String, SourceLocation),

    // Identifiers and built-in type names
    Ident(String, SourceLocation),
    Type(BuiltinType, SourceLocation),

    // Keywords
    Using(SourceLocation),
    Struct(SourceLocation),
    Union(SourceLocation),
    Enum(SourceLocation),
    Bitfield(SourceLocation),
    Be(SourceLocation),
    Le(SourceLocation),
    If(SourceLocation),
    Else(SourceLocation),
    True(SourceLocation),
    False(SourceLocation),
    Parent(SourceLocation),
    AddressOf(SourceLocation),
    Sizeof(SourceLocation),
    While(SourceLocation),
    Fn(SourceLocation),
    Return(SourceLocation),
    Namespace(SourceLocation),

    // Placement
    Dollar(SourceLocation), // $
    At(SourceLocation),     // @

    // Arithmetic
    Plus(SourceLocation),    // +
    Minus(SourceLocation),   // -
    Star(SourceLocation),    // *
    Slash(SourceLocation),   // /
    Percent(SourceLocation), // %

    // Comparison
    EqEq(SourceLocation),  // ==
    NotEq(SourceLocation), // !=
    Lt(SourceLocation),    // <
    LtEq(SourceLocation),  // <=
    Gt(SourceLocation),    // >
    GtEq(SourceLocation),  // >=

    // Logical
    AndAnd(SourceLocation), // &&
    OrOr(SourceLocation),   // ||
    Bang(SourceLocation),   // !

    // Bitwise
    Amp(SourceLocation),   // &
    Pipe(SourceLocation),  // |
    Caret(SourceLocation), // ^
    Tilde(SourceLocation), // ~
    LtLt(SourceLocation),  // <<
    GtGt(SourceLocation),  // >>

    Eq(SourceLocation), // =

    Dot(SourceLocation),        // .
    Question(SourceLocation),   // ?
    Colon(SourceLocation),      // :
    ColonColon(SourceLocation), // ::

    // Punctuation
    LParen(SourceLocation),    // (
    RParen(SourceLocation),    // )
    LBrace(SourceLocation),    // {
    RBrace(SourceLocation),    // }
    LBracket(SourceLocation),  // [
    RBracket(SourceLocation),  // ]
    Semicolon(SourceLocation), // ;
    Comma(SourceLocation),     // ,

    // End of file
    Eof(SourceLocation),
}

impl Token {
    /// Returns the source location where this token appears.
    pub fn location(&self) -> SourceLocation {
        match self {
            Token::NumberLiteral(_, loc)
            | Token::CharLiteral(_, loc)
            | Token::StringLiteral(_, loc)
            | Token::Ident(_, loc)
            | Token::Type(_, loc)
            | Token::Using(loc)
            | Token::Struct(loc)
            | Token::Union(loc)
            | Token::Enum(loc)
            | Token::Bitfield(loc)
            | Token::Be(loc)
            | Token::Le(loc)
            | Token::If(loc)
            | Token::Else(loc)
            | Token::True(loc)
            | Token::False(loc)
            | Token::Parent(loc)
            | Token::AddressOf(loc)
            | Token::Sizeof(loc)
            | Token::While(loc)
            | Token::Fn(loc)
            | Token::Return(loc)
            | Token::Namespace(loc)
            | Token::Dollar(loc)
            | Token::At(loc)
            | Token::Plus(loc)
            | Token::Minus(loc)
            | Token::Star(loc)
            | Token::Slash(loc)
            | Token::Percent(loc)
            | Token::EqEq(loc)
            | Token::NotEq(loc)
            | Token::Lt(loc)
            | Token::LtEq(loc)
            | Token::Gt(loc)
            | Token::GtEq(loc)
            | Token::AndAnd(loc)
            | Token::OrOr(loc)
            | Token::Bang(loc)
            | Token::Amp(loc)
            | Token::Pipe(loc)
            | Token::Caret(loc)
            | Token::Tilde(loc)
            | Token::LtLt(loc)
            | Token::GtGt(loc)
            | Token::Eq(loc)
            | Token::Dot(loc)
            | Token::Question(loc)
            | Token::Colon(loc)
            | Token::ColonColon(loc)
            | Token::LParen(loc)
            | Token::RParen(loc)
            | Token::LBrace(loc)
            | Token::RBrace(loc)
            | Token::LBracket(loc)
            | Token::RBracket(loc)
            | Token::Semicolon(loc)
            | Token::Comma(loc)
            | Token::Eof(loc) => *loc,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::NumberLiteral(v, _) => write!(f, "number literal {}", v),
            Token::CharLiteral(c, _) => {
                if c.is_ascii_graphic() || *c == b' ' {
                    write!(f, "char literal '{}'", *c as char)
                } else {
                    write!(f, "char literal '\\x{:02x}'", c)
                }
            }
            Token::StringLiteral(s, _) => write!(f, "string literal \"{}\"", s),
            Token::Ident(s, _) => write!(f, "identifier '{}'", s),
            Token::Type(ty, _) => write!(f, "type '{}'", ty.name()),
            Token::Using(_) => write!(f, "'using'"),
            Token::Struct(_) => write!(f, "'struct'"),
            Token::Union(_) => write!(f, "'union'"),
            Token::Enum(_) => write!(f, "'enum'"),
            Token::Bitfield(_) => write!(f, "'bitfield'"),
            Token::Be(_) => write!(f, "'be'"),
            Token::Le(_) => write!(f, "'le'"),
            Token::If(_) => write!(f, "'if'"),
            Token::Else(_) => write!(f, "'else'"),
            Token::True(_) => write!(f, "'true'"),
            Token::False(_) => write!(f, "'false'"),
            Token::Parent(_) => write!(f, "'parent'"),
            Token::AddressOf(_) => write!(f, "'addressof'"),
            Token::Sizeof(_) => write!(f, "'sizeof'"),
            Token::While(_) => write!(f, "'while'"),
            Token::Fn(_) => write!(f, "'fn'"),
            Token::Return(_) => write!(f, "'return'"),
            Token::Namespace(_) => write!(f, "'namespace'"),
            Token::Dollar(_) => write!(f, "'$'"),
            Token::At(_) => write!(f, "'@'"),
            Token::Plus(_) => write!(f, "'+'"),
            Token::Minus(_) => write!(f, "'-'"),
            Token::Star(_) => write!(f, "'*'"),
            Token::Slash(_) => write!(f, "'/'"),
            Token::Percent(_) => write!(f, "'%'"),
            Token::EqEq(_) => write!(f, "'=='"),
            Token::NotEq(_) => write!(f, "'!='"),
            Token::Lt(_) => write!(f, "'<'"),
            Token::LtEq(_) => write!(f, "'<='"),
            Token::Gt(_) => write!(f, "'>'"),
            Token::GtEq(_) => write!(f, "'>='"),
            Token::AndAnd(_) => write!(f, "'&&'"),
            Token::OrOr(_) => write!(f, "'||'"),
            Token::Bang(_) => write!(f, "'!'"),
            Token::Amp(_) => write!(f, "'&'"),
            Token::Pipe(_) => write!(f, "'|'"),
            Token::Caret(_) => write!(f, "'^'"),
            Token::Tilde(_) => write!(f, "'~'"),
            Token::LtLt(_) => write!(f, "'<<'"),
            Token::GtGt(_) => write!(f, "'>>'"),
            Token::Eq(_) => write!(f, "'='"),
            Token::Dot(_) => write!(f, "'.'"),
            Token::Question(_) => write!(f, "'?'"),
            Token::Colon(_) => write!(f, "':'"),
            Token::ColonColon(_) => write!(f, "'::'"),
            Token::LParen(_) => write!(f, "'('"),
            Token::RParen(_) => write!(f, "')'"),
            Token::LBrace(_) => write!(f, "'{{'"),
            Token::RBrace(_) => write!(f, "'}}'"),
            Token::LBracket(_) => write!(f, "'['"),
            Token::RBracket(_) => write!(f, "']'"),
            Token::Semicolon(_) => write!(f, "';'"),
            Token::Comma(_) => write!(f, "','"),
            Token::Eof(_) => write!(f, "end of file"),
        }
    }
}

/// Lexer error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lexer error at line {}, column {}: {message}", .location.line, .location.column)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

/// Lexer for pattern source code
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                tokens.push(Token::Eof(self.current_location()));
                break;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            location: loc,
        })?;

        match ch {
            '"' => self.string_literal(loc),
            '\'' => self.char_literal(loc),
            '0'..='9' => self.number_literal(ch, loc),
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.identifier_or_keyword(ch, loc)),

            '=' => Ok(self.either('=', Token::EqEq(loc), Token::Eq(loc))),
            '!' => Ok(self.either('=', Token::NotEq(loc), Token::Bang(loc))),
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    Ok(Token::LtLt(loc))
                } else {
                    Ok(self.either('=', Token::LtEq(loc), Token::Lt(loc)))
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    Ok(Token::GtGt(loc))
                } else {
                    Ok(self.either('=', Token::GtEq(loc), Token::Gt(loc)))
                }
            }
            '&' => Ok(self.either('&', Token::AndAnd(loc), Token::Amp(loc))),
            '|' => Ok(self.either('|', Token::OrOr(loc), Token::Pipe(loc))),
            ':' => Ok(self.either(':', Token::ColonColon(loc), Token::Colon(loc))),
            '+' => Ok(Token::Plus(loc)),
            '-' => Ok(Token::Minus(loc)),
            '*' => Ok(Token::Star(loc)),
            '/' => Ok(Token::Slash(loc)),
            '%' => Ok(Token::Percent(loc)),
            '^' => Ok(Token::Caret(loc)),
            '~' => Ok(Token::Tilde(loc)),
            '.' => Ok(Token::Dot(loc)),
            '?' => Ok(Token::Question(loc)),
            '$' => Ok(Token::Dollar(loc)),
            '@' => Ok(Token::At(loc)),
            '(' => Ok(Token::LParen(loc)),
            ')' => Ok(Token::RParen(loc)),
            '{' => Ok(Token::LBrace(loc)),
            '}' => Ok(Token::RBrace(loc)),
            '[' => Ok(Token::LBracket(loc)),
            ']' => Ok(Token::RBracket(loc)),
            ';' => Ok(Token::Semicolon(loc)),
            ',' => Ok(Token::Comma(loc)),

            _ => Err(LexError {
                message: format!("Unexpected character: '{}'", ch),
                location: loc,
            }),
        }
    }

    /// Two-character operator if the next char is `second`, otherwise `single`
    fn either(&mut self, second: char, double: Token, single: Token) -> Token {
        if self.peek() == Some(second) {
            self.advance();
            double
        } else {
            single
        }
    }

    /// Decode the character after a backslash
    fn escape_sequence(&mut self) -> Result<char, LexError> {
        let escaped = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file in escape sequence".to_string(),
            location: self.current_location(),
        })?;

        let unescaped = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '0' => '\0',
            'x' => {
                let hex: String = (0..2).filter_map(|_| self.advance()).collect();
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| LexError {
                    message: format!("Invalid hex escape sequence: \\x{}", hex),
                    location: self.current_location(),
                })?;
                char::from(byte)
            }
            _ => {
                return Err(LexError {
                    message: format!("Unknown escape sequence: \\{}", escaped),
                    location: self.current_location(),
                });
            }
        };

        Ok(unescaped)
    }

    /// Parse string literal
    fn string_literal(&mut self, loc: SourceLocation) -> Result<Token, LexError> {
        let mut string = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(Token::StringLiteral(string, loc));
                }
                '\n' => break,
                '\\' => {
                    self.advance();
                    string.push(self.escape_sequence()?);
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError {
            message: "Unterminated string literal".to_string(),
            location: loc,
        })
    }

    /// Parse character literal
    fn char_literal(&mut self, loc: SourceLocation) -> Result<Token, LexError> {
        let ch = match self.advance() {
            Some('\\') => self.escape_sequence()?,
            Some(ch) if ch != '\'' && ch != '\n' => ch,
            _ => {
                return Err(LexError {
                    message: "Invalid character literal".to_string(),
                    location: loc,
                });
            }
        };

        if self.advance() != Some('\'') {
            return Err(LexError {
                message: "Unterminated character literal".to_string(),
                location: loc,
            });
        }

        let byte = u8::try_from(u32::from(ch)).map_err(|_| LexError {
            message: format!("Character literal '{}' does not fit into one byte", ch),
            location: loc,
        })?;

        Ok(Token::CharLiteral(byte, loc))
    }

    /// Parse numeric literal: prefix, digits, optional fraction/exponent, suffix
    fn number_literal(&mut self, first_digit: char, loc: SourceLocation) -> Result<Token, LexError> {
        let invalid = |text: &str| LexError {
            message: format!("Invalid number literal: {}", text),
            location: loc,
        };

        let radix = match (first_digit, self.peek()) {
            ('0', Some('x' | 'X')) => 16,
            ('0', Some('o' | 'O')) => 8,
            ('0', Some('b' | 'B')) => 2,
            _ => 10,
        };

        let mut digits = String::new();
        if radix == 10 {
            digits.push(first_digit);
        } else {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if radix == 10 {
            if self.peek() == Some('.') && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                digits.push('.');
                self.advance();
                while let Some(ch) = self.peek().filter(|c| c.is_ascii_digit()) {
                    digits.push(ch);
                    self.advance();
                }
            }

            let exponent_follows = match (self.peek(), self.peek_ahead(1), self.peek_ahead(2)) {
                (Some('e' | 'E'), Some(d), _) if d.is_ascii_digit() => true,
                (Some('e' | 'E'), Some('+' | '-'), Some(d)) if d.is_ascii_digit() => true,
                _ => false,
            };
            if exponent_follows {
                is_float = true;
                digits.push('e');
                self.advance();
                if let Some(sign) = self.peek().filter(|c| *c == '+' || *c == '-') {
                    digits.push(sign);
                    self.advance();
                }
                while let Some(ch) = self.peek().filter(|c| c.is_ascii_digit()) {
                    digits.push(ch);
                    self.advance();
                }
            }
        }

        let mut suffix = String::new();
        while let Some(ch) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
            suffix.push(ch);
            self.advance();
        }

        if digits.is_empty() {
            return Err(invalid(&suffix));
        }
        let text = format!("{}{}", digits, suffix);

        if is_float || matches!(suffix.as_str(), "F" | "f" | "D" | "d") {
            let value: f64 = digits.parse().map_err(|_| invalid(&text))?;
            let literal = match suffix.as_str() {
                "F" | "f" => Value::Float(f64::from(value as f32), 4),
                "" | "D" | "d" => Value::Float(value, 8),
                _ => return Err(invalid(&text)),
            };
            return Ok(Token::NumberLiteral(literal, loc));
        }

        let raw = u128::from_str_radix(&digits, radix).map_err(|_| invalid(&text))?;
        let literal = match suffix.as_str() {
            "" => match raw {
                v if v <= i32::MAX as u128 => Value::Signed(v as i128, 4),
                v if v <= i64::MAX as u128 => Value::Signed(v as i128, 8),
                v => Value::signed(v as i128, 16),
            },
            "U" | "u" => match raw {
                v if v <= u128::from(u32::MAX) => Value::Unsigned(v, 4),
                v if v <= u128::from(u64::MAX) => Value::Unsigned(v, 8),
                v => Value::Unsigned(v, 16),
            },
            _ => {
                let ty = BuiltinType::from_keyword(&suffix)
                    .filter(|ty| matches!(ty, BuiltinType::Unsigned(_) | BuiltinType::Signed(_)))
                    .ok_or_else(|| invalid(&text))?;
                let (BuiltinType::Unsigned(width) | BuiltinType::Signed(width)) = ty else {
                    return Err(invalid(&text));
                };
                if width < 16 && raw >> (u32::from(width) * 8) != 0 {
                    return Err(LexError {
                        message: format!("Number literal {} does not fit into {}", text, ty.name()),
                        location: loc,
                    });
                }
                match ty {
                    BuiltinType::Signed(_) => Value::signed(raw as i128, width),
                    _ => Value::Unsigned(raw, width),
                }
            }
        };

        Ok(Token::NumberLiteral(literal, loc))
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, first_char: char, loc: SourceLocation) -> Token {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if let Some(ty) = BuiltinType::from_keyword(&ident) {
            return Token::Type(ty, loc);
        }

        match ident.as_str() {
            "using" => Token::Using(loc),
            "struct" => Token::Struct(loc),
            "union" => Token::Union(loc),
            "enum" => Token::Enum(loc),
            "bitfield" => Token::Bitfield(loc),
            "be" => Token::Be(loc),
            "le" => Token::Le(loc),
            "if" => Token::If(loc),
            "else" => Token::Else(loc),
            "true" => Token::True(loc),
            "false" => Token::False(loc),
            "parent" => Token::Parent(loc),
            "addressof" => Token::AddressOf(loc),
            "sizeof" => Token::Sizeof(loc),
            "while" => Token::While(loc),
            "fn" => Token::Fn(loc),
            "return" => Token::Return(loc),
            "namespace" => Token::Namespace(loc),
            _ => Token::Ident(ident, loc),
        }
    }

    /// Skip whitespace and any comments the preprocessor left behind
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    while let Some(ch) = self.advance() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_ahead(1) == Some('*') => {
                    let start_loc = self.current_location();
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Err(LexError {
                                message: "Unterminated block comment".to_string(),
                                location: start_loc,
                            });
                        }
                        if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().unwrap()
    }

    #[test]
    fn test_simple_declaration() {
        let tokens = lex("struct Header { be u32 magic; } header @ 0x00;");

        assert!(matches!(tokens[0], Token::Struct(_)));
        assert!(matches!(tokens[1], Token::Ident(ref s, _) if s == "Header"));
        assert!(matches!(tokens[2], Token::LBrace(_)));
        assert!(matches!(tokens[3], Token::Be(_)));
        assert!(matches!(tokens[4], Token::Type(BuiltinType::Unsigned(4), _)));
        assert!(matches!(tokens[5], Token::Ident(ref s, _) if s == "magic"));
        assert!(matches!(tokens[6], Token::Semicolon(_)));
        assert!(matches!(tokens[7], Token::RBrace(_)));
        assert!(matches!(tokens[9], Token::At(_)));
        assert!(matches!(tokens[10], Token::NumberLiteral(Value::Signed(0, 4), _)));
        assert!(matches!(tokens[12], Token::Eof(_)));
    }

    #[test]
    fn test_operators_use_maximal_munch() {
        let tokens = lex(":: : << <= < >> >= == = && & || |");

        assert!(matches!(tokens[0], Token::ColonColon(_)));
        assert!(matches!(tokens[1], Token::Colon(_)));
        assert!(matches!(tokens[2], Token::LtLt(_)));
        assert!(matches!(tokens[3], Token::LtEq(_)));
        assert!(matches!(tokens[4], Token::Lt(_)));
        assert!(matches!(tokens[5], Token::GtGt(_)));
        assert!(matches!(tokens[6], Token::GtEq(_)));
        assert!(matches!(tokens[7], Token::EqEq(_)));
        assert!(matches!(tokens[8], Token::Eq(_)));
        assert!(matches!(tokens[9], Token::AndAnd(_)));
        assert!(matches!(tokens[10], Token::Amp(_)));
        assert!(matches!(tokens[11], Token::OrOr(_)));
        assert!(matches!(tokens[12], Token::Pipe(_)));
    }

    #[test]
    fn test_number_literals() {
        let tokens = lex("42 0x10 0b101 0o17 7U 3000000000 255u8 1.5 2F 1e3");
        let values: Vec<Value> = tokens
            .into_iter()
            .filter_map(|t| match t {
                Token::NumberLiteral(v, _) => Some(v),
                _ => None,
            })
            .collect();

        assert_eq!(values[0], Value::Signed(42, 4));
        assert_eq!(values[1], Value::Signed(16, 4));
        assert_eq!(values[2], Value::Signed(5, 4));
        assert_eq!(values[3], Value::Signed(15, 4));
        assert_eq!(values[4], Value::Unsigned(7, 4));
        assert_eq!(values[5], Value::Signed(3_000_000_000, 8));
        assert_eq!(values[6], Value::Unsigned(255, 1));
        assert_eq!(values[7], Value::Float(1.5, 8));
        assert_eq!(values[8], Value::Float(2.0, 4));
        assert_eq!(values[9], Value::Float(1000.0, 8));
    }

    #[test]
    fn test_literal_out_of_suffix_range() {
        let err = Lexer::new("256u8").tokenize().unwrap_err();
        assert!(err.message.contains("u8"));
    }

    #[test]
    fn test_string_and_char_literals() {
        let tokens = lex(r#""hello\nworld" 'A' '\x41'"#);

        assert!(matches!(tokens[0], Token::StringLiteral(ref s, _) if s == "hello\nworld"));
        assert!(matches!(tokens[1], Token::CharLiteral(b'A', _)));
        assert!(matches!(tokens[2], Token::CharLiteral(0x41, _)));
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let err = Lexer::new("u8 a;\n\"oops").tokenize().unwrap_err();
        assert_eq!(err.location.line, 2);
        assert!(err.message.contains("Unterminated"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("u8 a` ;").tokenize().unwrap_err();
        assert_eq!(err.location.column, 5);
    }

    #[test]
    fn test_locations_track_lines() {
        let tokens = lex("u8 a;\n  u16 b;");
        assert_eq!(tokens[3].location(), SourceLocation::new(2, 3));
    }
}
