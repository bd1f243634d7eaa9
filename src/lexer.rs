//! Lexer for the SQL-subset conditional expression language.
//!
//! Produces a flat token stream in which every token carries its character
//! offset, so the parser can report positioned errors. Keywords are
//! case-insensitive and `--` starts a line comment.

use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    And,
    Or,
    Not,
    In,
    Is,
    Null,
    Like,
    Between,
    Exists,
    Select,
    From,
    Where,
    Asc,
    Desc,
    True,
    False,

    // CASE expression keywords
    Case,
    When,
    Then,
    Else,
    End,

    // Identifiers and literals
    Identifier(String),
    Variable(String), // @name or ?name parameter placeholder
    Integer(i64),
    Float(f64),
    String(String),

    // Operators
    Assign,        // =
    Equal,         // ==
    NotEqual,      // != or <>
    LessThan,      // <
    LessThanEq,    // <=
    GreaterThan,   // >
    GreaterThanEq, // >=
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %

    // Delimiters
    Dot,        // .
    Comma,      // ,
    LeftParen,  // (
    RightParen, // )

    // Special
    Eof,
}

/// A token plus the character offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> QueryResult<Token> {
        let start = self.position;
        let mut num_str = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_numeric() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && matches!(self.peek_char(), Some(c) if c.is_numeric())
            {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| QueryError::parse(format!("Invalid float number: {}", num_str), start))
        } else {
            num_str.parse::<i64>().map(Token::Integer).map_err(|_| {
                QueryError::parse(format!("Invalid integer number: {}", num_str), start)
            })
        }
    }

    fn read_string(&mut self) -> QueryResult<Token> {
        let start = self.position;
        let quote = self.current_char.unwrap();
        self.advance(); // Skip opening quote

        let mut string = String::new();

        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance(); // Skip closing quote
                return Ok(Token::String(string));
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char {
                    string.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        _ => escaped,
                    });
                    self.advance();
                }
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(QueryError::parse("Unterminated string", start))
    }

    fn read_quoted_identifier(&mut self) -> QueryResult<Token> {
        let start = self.position;
        self.advance(); // Skip opening backtick

        let mut ident = String::new();

        while let Some(ch) = self.current_char {
            if ch == '`' {
                self.advance(); // Skip closing backtick
                return Ok(Token::Identifier(ident));
            }
            ident.push(ch);
            self.advance();
        }

        Err(QueryError::parse("Unterminated quoted identifier", start))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.to_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "IN" => Token::In,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "LIKE" => Token::Like,
            "BETWEEN" => Token::Between,
            "EXISTS" => Token::Exists,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "CASE" => Token::Case,
            "WHEN" => Token::When,
            "THEN" => Token::Then,
            "ELSE" => Token::Else,
            "END" => Token::End,
            _ => Token::Identifier(ident),
        }
    }

    /// Read a parameter placeholder: `@name` or `?name`.
    fn read_variable(&mut self) -> QueryResult<Token> {
        let start = self.position;
        self.advance(); // Skip '@' or '?'

        let mut name = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if name.is_empty() {
            return Err(QueryError::parse(
                "Expected parameter name after placeholder marker",
                start,
            ));
        }

        Ok(Token::Variable(name))
    }

    fn next_token(&mut self) -> QueryResult<Spanned> {
        self.skip_whitespace();

        let offset = self.position;

        let token = match self.current_char {
            None => Token::Eof,

            Some(ch) if ch.is_numeric() => {
                return Ok(Spanned {
                    token: self.read_number()?,
                    offset,
                });
            }

            Some('"') | Some('\'') => {
                return Ok(Spanned {
                    token: self.read_string()?,
                    offset,
                });
            }

            Some('`') => {
                return Ok(Spanned {
                    token: self.read_quoted_identifier()?,
                    offset,
                });
            }

            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                return Ok(Spanned {
                    token: self.read_identifier(),
                    offset,
                });
            }

            Some('@') | Some('?') => {
                return Ok(Spanned {
                    token: self.read_variable()?,
                    offset,
                });
            }

            Some('=') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::Equal
                } else {
                    Token::Assign
                }
            }

            Some('!') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    return Err(QueryError::parse("Unexpected character: !", offset));
                }
            }

            Some('<') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::LessThanEq
                } else if self.current_char == Some('>') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::LessThan
                }
            }

            Some('>') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterThanEq
                } else {
                    Token::GreaterThan
                }
            }

            Some('+') => {
                self.advance();
                Token::Plus
            }
            Some('-') => {
                self.advance();
                if self.current_char == Some('-') {
                    // Comment: skip until end of line
                    self.advance();
                    while let Some(ch) = self.current_char {
                        if ch == '\n' {
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                    return self.next_token();
                }
                Token::Minus
            }
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some('/') => {
                self.advance();
                Token::Slash
            }
            Some('%') => {
                self.advance();
                Token::Percent
            }
            Some('.') => {
                self.advance();
                Token::Dot
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some('(') => {
                self.advance();
                Token::LeftParen
            }
            Some(')') => {
                self.advance();
                Token::RightParen
            }

            Some(ch) => {
                return Err(QueryError::parse(
                    format!("Unexpected character: {}", ch),
                    offset,
                ));
            }
        };

        Ok(Spanned { token, offset })
    }

    pub fn tokenize(&mut self) -> QueryResult<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("AND OR NOT IN IS NULL LIKE BETWEEN EXISTS");
        assert_eq!(tokens[0], Token::And);
        assert_eq!(tokens[1], Token::Or);
        assert_eq!(tokens[2], Token::Not);
        assert_eq!(tokens[3], Token::In);
        assert_eq!(tokens[4], Token::Is);
        assert_eq!(tokens[5], Token::Null);
        assert_eq!(tokens[6], Token::Like);
        assert_eq!(tokens[7], Token::Between);
        assert_eq!(tokens[8], Token::Exists);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(tokenize("and")[0], Token::And);
        assert_eq!(tokenize("And")[0], Token::And);
        assert_eq!(tokenize("between")[0], Token::Between);
        assert_eq!(tokenize("select")[0], Token::Select);
    }

    #[test]
    fn test_case_keywords() {
        let tokens = tokenize("CASE WHEN THEN ELSE END");
        assert_eq!(tokens[0], Token::Case);
        assert_eq!(tokens[1], Token::When);
        assert_eq!(tokens[2], Token::Then);
        assert_eq!(tokens[3], Token::Else);
        assert_eq!(tokens[4], Token::End);
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(tokenize("myCol")[0], Token::Identifier("myCol".to_string()));
        assert_eq!(
            tokenize("_private")[0],
            Token::Identifier("_private".to_string())
        );
        assert_eq!(
            tokenize("col123")[0],
            Token::Identifier("col123".to_string())
        );
    }

    #[test]
    fn test_quoted_identifier() {
        assert_eq!(
            tokenize("`my field`")[0],
            Token::Identifier("my field".to_string())
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(tokenize("@name")[0], Token::Variable("name".to_string()));
        assert_eq!(tokenize("?param0")[0], Token::Variable("param0".to_string()));
        assert_eq!(tokenize("@_id")[0], Token::Variable("_id".to_string()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("123")[0], Token::Integer(123));
        assert_eq!(tokenize("0")[0], Token::Integer(0));
        assert_eq!(tokenize("3.14")[0], Token::Float(3.14));
    }

    #[test]
    fn test_strings() {
        assert_eq!(tokenize("\"hello\"")[0], Token::String("hello".to_string()));
        assert_eq!(tokenize("'world'")[0], Token::String("world".to_string()));
        assert_eq!(
            tokenize("'it\\'s'")[0],
            Token::String("it's".to_string())
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(tokenize("=")[0], Token::Assign);
        assert_eq!(tokenize("==")[0], Token::Equal);
        assert_eq!(tokenize("!=")[0], Token::NotEqual);
        assert_eq!(tokenize("<>")[0], Token::NotEqual);
        assert_eq!(tokenize("<")[0], Token::LessThan);
        assert_eq!(tokenize("<=")[0], Token::LessThanEq);
        assert_eq!(tokenize(">")[0], Token::GreaterThan);
        assert_eq!(tokenize(">=")[0], Token::GreaterThanEq);
    }

    #[test]
    fn test_arithmetic_operators() {
        let tokens = tokenize("+ - * / %");
        assert_eq!(tokens[0], Token::Plus);
        assert_eq!(tokens[1], Token::Minus);
        assert_eq!(tokens[2], Token::Star);
        assert_eq!(tokens[3], Token::Slash);
        assert_eq!(tokens[4], Token::Percent);
    }

    #[test]
    fn test_delimiters() {
        let tokens = tokenize(". , ( )");
        assert_eq!(tokens[0], Token::Dot);
        assert_eq!(tokens[1], Token::Comma);
        assert_eq!(tokens[2], Token::LeftParen);
        assert_eq!(tokens[3], Token::RightParen);
    }

    #[test]
    fn test_offsets() {
        let spanned = Lexer::new("A = 1").tokenize().unwrap();
        assert_eq!(spanned[0].offset, 0);
        assert_eq!(spanned[1].offset, 2);
        assert_eq!(spanned[2].offset, 4);
    }

    #[test]
    fn test_eof() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0], Token::Eof);
    }

    #[test]
    fn test_comment_single_line() {
        let tokens = tokenize("A = 1 -- trailing comment\nAND B = 2");
        assert_eq!(tokens[0], Token::Identifier("A".to_string()));
        assert_eq!(tokens[3], Token::And);
    }

    #[test]
    fn test_minus_not_comment() {
        let tokens = tokenize("5 - 3");
        assert_eq!(tokens[0], Token::Integer(5));
        assert_eq!(tokens[1], Token::Minus);
        assert_eq!(tokens[2], Token::Integer(3));
    }

    #[test]
    fn test_dotted_column() {
        let tokens = tokenize("t.Name");
        assert_eq!(tokens[0], Token::Identifier("t".to_string()));
        assert_eq!(tokens[1], Token::Dot);
        assert_eq!(tokens[2], Token::Identifier("Name".to_string()));
    }

    #[test]
    fn test_error_unterminated_string() {
        let result = Lexer::new("'unterminated").tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn test_error_empty_variable() {
        let result = Lexer::new("@ ").tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn test_error_unexpected_char_position() {
        let err = Lexer::new("A = #").tokenize().unwrap_err();
        match err {
            crate::error::QueryError::Parse { position, .. } => assert_eq!(position, 4),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
