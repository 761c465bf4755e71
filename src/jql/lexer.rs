//! JQL Lexer (Tokenizer)
//!
//! This module converts JQL strings into a stream of tokens.

use super::token::Token;
use crate::error::{Error, Result};

/// Characters that may form a comparison operator
const OPERATOR_CHARS: &[char] = &['<', '>', '=', '!', '%'];

/// JQL Lexer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Current position in input
    position: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        if self.is_at_end() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                return Ok(Token::LParen);
            }
            ')' => {
                self.advance();
                return Ok(Token::RParen);
            }
            ',' => {
                self.advance();
                return Ok(Token::Comma);
            }
            '.' => {
                self.advance();
                return Ok(Token::Dot);
            }
            '*' => {
                self.advance();
                return Ok(Token::Asterisk);
            }
            '-' => {
                self.advance();
                // Negative number
                if !self.is_at_end() && self.current_char().is_ascii_digit() {
                    return self.read_number(true);
                }
                return Err(Error::UnexpectedCharacter('-', self.position - 1));
            }
            ':' => {
                return self.read_placeholder();
            }
            '\'' => {
                return self.read_string();
            }
            c if OPERATOR_CHARS.contains(&c) => {
                return Ok(self.read_operator());
            }
            _ => {}
        }

        // Numbers
        if ch.is_ascii_digit() {
            return self.read_number(false);
        }

        // Identifiers, including the `#rowid` column
        if is_identifier_start(ch) {
            return Ok(self.read_identifier());
        }

        Err(Error::UnexpectedCharacter(ch, self.position))
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get the current character
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    /// Peek at the next character
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    /// Read a string literal (single-quoted, `\` escapes the next character)
    fn read_string(&mut self) -> Result<Token> {
        let start_pos = self.position;
        self.advance(); // skip opening quote

        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();

            match ch {
                '\\' => {
                    self.advance();
                    if self.is_at_end() {
                        break;
                    }
                    value.push(self.current_char());
                    self.advance();
                }
                '\'' => {
                    self.advance(); // skip closing quote
                    return Ok(Token::StringLiteral(value));
                }
                _ => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Err(Error::UnterminatedString(start_pos))
    }

    /// Read a `:name` placeholder
    fn read_placeholder(&mut self) -> Result<Token> {
        let start_pos = self.position;
        self.advance(); // skip ':'

        let mut name = String::new();
        while !self.is_at_end() && is_identifier_char(self.current_char()) {
            name.push(self.current_char());
            self.advance();
        }

        if name.is_empty() {
            return Err(Error::UnexpectedCharacter(':', start_pos));
        }
        Ok(Token::Placeholder(name))
    }

    /// Read an operator made of `< > = ! %`
    fn read_operator(&mut self) -> Token {
        let mut op = String::new();
        while !self.is_at_end() && OPERATOR_CHARS.contains(&self.current_char()) {
            op.push(self.current_char());
            self.advance();
        }
        Token::Operator(op)
    }

    /// Read a number (integer or float), the sign already consumed
    fn read_number(&mut self, negative: bool) -> Result<Token> {
        let start_pos = if negative {
            self.position - 1
        } else {
            self.position
        };
        let mut value = String::new();
        if negative {
            value.push('-');
        }
        let mut is_float = false;

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '.' && !is_float && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            value
                .parse::<f64>()
                .map(Token::FloatLiteral)
                .map_err(|_| Error::InvalidNumber(start_pos))
        } else {
            value
                .parse::<i64>()
                .map(Token::IntegerLiteral)
                .map_err(|_| Error::InvalidNumber(start_pos))
        }
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> Token {
        let mut value = String::new();

        while !self.is_at_end() && is_identifier_char(self.current_char()) {
            value.push(self.current_char());
            self.advance();
        }

        Token::Identifier(value)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '#'
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '#'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Token {
        Token::Identifier(s.to_string())
    }

    #[test]
    fn test_simple_select() {
        let mut lexer = Lexer::new("users.select(*)");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                ident("users"),
                Token::Dot,
                ident("select"),
                Token::LParen,
                Token::Asterisk,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_where_condition() {
        let mut lexer = Lexer::new("t.select(a).where(#rowid >= -2, b %! 3)");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[7], ident("where"));
        assert_eq!(tokens[9], ident("#rowid"));
        assert_eq!(tokens[10], Token::Operator(">=".to_string()));
        assert_eq!(tokens[11], Token::IntegerLiteral(-2));
        assert_eq!(tokens[14], Token::Operator("%!".to_string()));
    }

    #[test]
    fn test_escaped_string() {
        let mut lexer = Lexer::new(r"'it\'s 3\.5\, ok\\'");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0], Token::StringLiteral(r"it's 3.5, ok\".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("'open");
        assert!(matches!(lexer.tokenize(), Err(Error::UnterminatedString(0))));
    }

    #[test]
    fn test_numbers_and_placeholders() {
        let mut lexer = Lexer::new("3.5, 42, :name");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0], Token::FloatLiteral(3.5));
        assert_eq!(tokens[2], Token::IntegerLiteral(42));
        assert_eq!(tokens[4], Token::Placeholder("name".to_string()));
    }

    #[test]
    fn test_negative_number_bounds() {
        let mut lexer = Lexer::new("-9223372036854775808, -0.25, 9223372036854775808");
        let tokens = lexer.tokenize();
        assert!(matches!(tokens, Err(Error::InvalidNumber(29))));

        let mut lexer = Lexer::new("-9223372036854775808, -0.25");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0], Token::IntegerLiteral(i64::MIN));
        assert_eq!(tokens[2], Token::FloatLiteral(-0.25));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("t.select(@)");
        assert!(matches!(
            lexer.tokenize(),
            Err(Error::UnexpectedCharacter('@', 9))
        ));
    }
}
