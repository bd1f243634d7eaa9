//! Expression parsing: containers, comparisons, and the arithmetic
//! precedence chain.
//!
//! Precedence (lowest to highest):
//! 1. AND/OR container joining
//! 2. Comparison: `=`, `==`, `!=`, `<>`, `<`, `<=`, `>`, `>=`, `IS`,
//!    `LIKE`, `IN`, `BETWEEN`
//! 3. Additive: `+`, `-`
//! 4. Multiplicative: `*`, `/`, `%`
//! 5. Unary minus
//! 6. Primary: columns, constants, variables, function calls, CASE,
//!    parenthesized groups, sub-selects

use super::{is_conditional_operator, Parser};
use crate::error::QueryResult;
use crate::lexer::Token;
use crate::term::{
    ComparisonOp, Conditional, ConditionalContainer, ConditionalTerm, Formula, FormulaOp,
    MinusTerm,
};

impl Parser {
    /// Parse a sequence of conditionals joined by AND/OR.
    pub(crate) fn parse_container(&mut self) -> QueryResult<ConditionalContainer> {
        let mut container = ConditionalContainer::new();

        let first = self.parse_container_item()?;
        container.add(crate::term::Connector::And, first);

        loop {
            let connector = match self.current() {
                Token::And => crate::term::Connector::And,
                Token::Or => crate::term::Connector::Or,
                _ => break,
            };
            self.advance();
            let item = self.parse_container_item()?;
            container.add(connector, item);
        }

        Ok(container)
    }

    /// One container sibling: either a parenthesized sub-container or a
    /// single conditional.
    fn parse_container_item(&mut self) -> QueryResult<ConditionalTerm> {
        if self.current() == &Token::LeftParen && self.paren_group_is_container() {
            self.advance();
            let inner = self.parse_container()?;
            self.expect(Token::RightParen)?;
            return Ok(ConditionalTerm::Container(inner));
        }
        self.parse_conditional()
    }

    /// Parse one comparison (or a bare term wrapped as a conditional).
    pub(crate) fn parse_conditional(&mut self) -> QueryResult<ConditionalTerm> {
        // EXISTS is unary: no left side.
        if self.current() == &Token::Exists {
            self.advance();
            let right = self.parse_term_expr()?;
            return Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
                None,
                Some(ComparisonOp::Exists),
                Some(right),
            ))));
        }

        let left = self.parse_term_expr()?;

        // NOT only prefixes the keyword operators IN and LIKE here.
        let negated = if self.current() == &Token::Not
            && matches!(self.peek(1), Token::In | Token::Like)
        {
            self.advance();
            true
        } else {
            false
        };

        match self.current() {
            Token::Is => self.parse_is(left),
            Token::In => self.parse_in(left, negated),
            Token::Between => self.parse_between(left),
            Token::Like => {
                self.advance();
                let right = self.parse_term_expr()?;
                let op = if negated {
                    ComparisonOp::NotLike
                } else {
                    ComparisonOp::Like
                };
                Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
                    Some(left),
                    Some(op),
                    Some(right),
                ))))
            }
            token if is_conditional_operator(token) => {
                let op = match token {
                    Token::Assign | Token::Equal => ComparisonOp::Eq,
                    Token::NotEqual => ComparisonOp::NotEq,
                    Token::LessThan => ComparisonOp::Lt,
                    Token::LessThanEq => ComparisonOp::LtEq,
                    Token::GreaterThan => ComparisonOp::Gt,
                    Token::GreaterThanEq => ComparisonOp::GtEq,
                    _ => return Err(self.error(format!("Unexpected operator: {:?}", token))),
                };
                self.advance();
                let right = self.parse_term_expr()?;
                Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
                    Some(left),
                    Some(op),
                    Some(right),
                ))))
            }
            _ => {
                // A bare term (e.g. a boolean column reference) stands
                // alone; parenthesized conditionals pass through as-is.
                if matches!(
                    left,
                    ConditionalTerm::Conditional(_) | ConditionalTerm::Container(_)
                ) {
                    Ok(left)
                } else {
                    Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
                        Some(left),
                        None,
                        None,
                    ))))
                }
            }
        }
    }

    /// Term-level expression: the arithmetic formula chain.
    pub(crate) fn parse_term_expr(&mut self) -> QueryResult<ConditionalTerm> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> QueryResult<ConditionalTerm> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Token::Plus => FormulaOp::Add,
                Token::Minus => FormulaOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = ConditionalTerm::Formula(Box::new(Formula { left, op, right }));
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> QueryResult<ConditionalTerm> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current() {
                Token::Star => FormulaOp::Mul,
                Token::Slash => FormulaOp::Div,
                Token::Percent => FormulaOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = ConditionalTerm::Formula(Box::new(Formula { left, op, right }));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> QueryResult<ConditionalTerm> {
        if self.current() == &Token::Minus {
            self.advance();
            let term = self.parse_unary()?;
            return Ok(ConditionalTerm::Minus(MinusTerm {
                term: Box::new(term),
            }));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> QueryResult<ConditionalTerm> {
        match self.current().clone() {
            Token::LeftParen => {
                if self.peek(1) == &Token::Select {
                    self.advance();
                    let query = self.parse_select()?;
                    self.expect(Token::RightParen)?;
                    return Ok(ConditionalTerm::Query(crate::term::QueryTerm {
                        query: Box::new(query),
                    }));
                }
                if self.paren_group_has_conditional() {
                    self.advance();
                    let mut inner = self.parse_container()?;
                    self.expect(Token::RightParen)?;
                    // A single grouped conditional passes through bare;
                    // anything joined by AND/OR stays a nested container.
                    let term = if inner.len() == 1 {
                        inner.items.remove(0)
                    } else {
                        ConditionalTerm::Container(inner)
                    };
                    return Ok(term);
                }
                // Plain arithmetic grouping.
                self.advance();
                let expr = self.parse_term_expr()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            Token::Case => self.parse_case(),

            Token::Integer(i) => {
                self.advance();
                Ok(ConditionalTerm::constant(i.to_string()))
            }
            Token::Float(x) => {
                self.advance();
                Ok(ConditionalTerm::constant(x.to_string()))
            }
            Token::String(s) => {
                self.advance();
                // Re-escape so the stored lexical form re-lexes to the
                // same string.
                let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
                Ok(ConditionalTerm::constant(format!("'{}'", escaped)))
            }
            Token::True => {
                self.advance();
                Ok(ConditionalTerm::constant("TRUE"))
            }
            Token::False => {
                self.advance();
                Ok(ConditionalTerm::constant("FALSE"))
            }
            Token::Null => {
                self.advance();
                Ok(ConditionalTerm::constant("NULL"))
            }

            Token::Variable(name) => {
                self.advance();
                Ok(ConditionalTerm::variable(name))
            }

            Token::Identifier(name) => {
                if self.peek(1) == &Token::LeftParen {
                    self.advance(); // name
                    self.advance(); // (
                    let args = self.parse_function_args()?;
                    self.expect(Token::RightParen)?;
                    return Ok(ConditionalTerm::FunctionCall(crate::term::FunctionCall {
                        name,
                        args,
                    }));
                }
                let column = self.parse_column_path()?;
                Ok(ConditionalTerm::Column(column))
            }

            other => Err(self.error(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_function_args(&mut self) -> QueryResult<Vec<ConditionalTerm>> {
        let mut args = Vec::new();

        if self.current() == &Token::RightParen {
            return Ok(args);
        }

        loop {
            args.push(self.parse_term_expr()?);
            if self.current() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(args)
    }

    /// Parse a dotted column path. The current token must be an identifier.
    pub(crate) fn parse_column_path(&mut self) -> QueryResult<crate::term::Column> {
        let mut parts = Vec::new();

        match self.current() {
            Token::Identifier(name) => {
                parts.push(name.clone());
                self.advance();
            }
            other => return Err(self.error(format!("Expected column name, got {:?}", other))),
        }

        while self.current() == &Token::Dot {
            self.advance();
            match self.current() {
                Token::Identifier(name) => {
                    parts.push(name.clone());
                    self.advance();
                }
                other => {
                    return Err(self.error(format!("Expected identifier after '.', got {:?}", other)))
                }
            }
        }

        let name = parts.pop();
        let owner = if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        };
        Ok(crate::term::Column { owner, name })
    }

    /// True when the parenthesized group starting at the current `(` holds
    /// a top-level AND/OR, i.e. should become a nested container. The AND
    /// belonging to a BETWEEN is not a connective and is skipped.
    fn paren_group_is_container(&self) -> bool {
        if self.peek(1) == &Token::Select {
            return false;
        }

        let mut depth = 1;
        let mut pos = self.position + 1;
        let mut pending_between = false;

        while let Some(spanned) = self.tokens.get(pos) {
            match &spanned.token {
                Token::LeftParen => depth += 1,
                Token::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return false;
                    }
                }
                Token::Between if depth == 1 => pending_between = true,
                Token::And if depth == 1 => {
                    if pending_between {
                        pending_between = false;
                    } else {
                        return true;
                    }
                }
                Token::Or if depth == 1 => return true,
                Token::Eof => return false,
                _ => {}
            }
            pos += 1;
        }
        false
    }

    /// True when the parenthesized group starting at the current `(` holds
    /// a comparison at top level, i.e. is a grouped conditional rather
    /// than arithmetic grouping.
    fn paren_group_has_conditional(&self) -> bool {
        let mut depth = 1;
        let mut pos = self.position + 1;

        while let Some(spanned) = self.tokens.get(pos) {
            match &spanned.token {
                Token::LeftParen => depth += 1,
                Token::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return false;
                    }
                }
                token if depth == 1
                    && (is_conditional_operator(token)
                        || matches!(
                            token,
                            Token::Like | Token::Between | Token::Exists | Token::In
                        )) =>
                {
                    return true;
                }
                Token::Eof => return false,
                _ => {}
            }
            pos += 1;
        }
        false
    }
}
