//! Parser for the SQL-subset conditional expression language.
//!
//! Converts a tokenized expression into a [`ConditionalTerm`] tree with
//! SQL operator precedence, parenthesis grouping, and the multi-token
//! constructs (`IS [NOT] NULL`, `BETWEEN`, `IN (...)`, `CASE WHEN ... END`,
//! `EXISTS (SELECT ...)`).

mod clauses;
mod expressions;
mod special;

pub(crate) use clauses::split_top_level_commas;

use crate::error::{QueryError, QueryResult};
use crate::lexer::{Lexer, Spanned, Token};
use crate::term::{Conditional, ConditionalContainer, ConditionalTerm};

/// Parser over a spanned token stream.
pub struct Parser {
    pub(crate) tokens: Vec<Spanned>,
    pub(crate) position: usize,
}

impl Parser {
    /// Create a new parser from an input string.
    pub fn new(input: &str) -> QueryResult<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    pub(crate) fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    /// Character offset of the current token, for positioned errors.
    pub(crate) fn offset(&self) -> usize {
        self.tokens
            .get(self.position.min(self.tokens.len() - 1))
            .map(|s| s.offset)
            .unwrap_or(0)
    }

    pub(crate) fn peek(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.position + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    pub(crate) fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    pub(crate) fn expect(&mut self, expected: Token) -> QueryResult<()> {
        if self.current() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current()
            )))
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::parse(message, self.offset())
    }

    fn expect_eof(&self) -> QueryResult<()> {
        if self.current() == &Token::Eof {
            Ok(())
        } else {
            Err(self.error(format!(
                "Unexpected token after expression: {:?}",
                self.current()
            )))
        }
    }

    /// Parse the whole input as a conditional container.
    pub fn parse(&mut self) -> QueryResult<ConditionalContainer> {
        let container = self.parse_container()?;
        self.expect_eof()?;
        Ok(container)
    }
}

/// Decides whether a token closes a comparison and starts a new term.
pub(crate) fn is_conditional_operator(token: &Token) -> bool {
    matches!(
        token,
        Token::Assign
            | Token::Equal
            | Token::NotEqual
            | Token::LessThan
            | Token::LessThanEq
            | Token::GreaterThan
            | Token::GreaterThanEq
            | Token::Is
    )
}

/// Parse a conditional expression string into a container.
pub fn parse(input: &str) -> QueryResult<ConditionalContainer> {
    tracing::debug!(len = input.len(), "parsing conditional expression");
    let mut parser = Parser::new(input)?;
    parser.parse()
}

/// Parse a single term, unwrapping a single-conditional container.
///
/// This is the "get term" entry point: a container with exactly one
/// conditional unwraps to that conditional, and a bare conditional with no
/// operator unwraps further to its left term.
pub fn parse_term(input: &str) -> QueryResult<ConditionalTerm> {
    let mut parser = Parser::new(input)?;
    let mut container = parser.parse_container()?;
    parser.expect_eof()?;

    let term = if container.len() == 1 {
        container.items.remove(0)
    } else {
        return Ok(ConditionalTerm::Container(container));
    };

    Ok(match term {
        ConditionalTerm::Conditional(c) => match *c {
            Conditional {
                left: Some(left),
                op: None,
                right: None,
            } => *left,
            other => ConditionalTerm::Conditional(Box::new(other)),
        },
        other => other,
    })
}
