//! Multi-token constructs: `IS [NOT] NULL`, `IN (...)`, `BETWEEN`,
//! `CASE WHEN ... THEN ... [ELSE ...] END`, and nested sub-selects.

use super::Parser;
use crate::error::QueryResult;
use crate::lexer::Token;
use crate::query::{ProjectionEntry, QueryInfo};
use crate::term::{
    CaseConditional, CaseWhenExpression, ComparisonOp, Conditional, ConditionalTerm, QueryTerm,
    ValuesArray,
};

impl Parser {
    /// Parse `IS [NOT] <term>` after the left side. `IS [NOT] NULL` keeps
    /// NULL as a constant on the right.
    pub(crate) fn parse_is(&mut self, left: ConditionalTerm) -> QueryResult<ConditionalTerm> {
        self.expect(Token::Is)?;

        let op = if self.current() == &Token::Not {
            self.advance();
            ComparisonOp::IsNot
        } else {
            ComparisonOp::Is
        };

        let right = if self.current() == &Token::Null {
            self.advance();
            ConditionalTerm::constant("NULL")
        } else {
            self.parse_term_expr()?
        };

        Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
            Some(left),
            Some(op),
            Some(right),
        ))))
    }

    /// Parse `[NOT] IN (value, ...)` or `[NOT] IN (SELECT ...)`.
    pub(crate) fn parse_in(
        &mut self,
        left: ConditionalTerm,
        negated: bool,
    ) -> QueryResult<ConditionalTerm> {
        self.expect(Token::In)?;
        self.expect(Token::LeftParen)?;

        let right = if self.current() == &Token::Select {
            let query = self.parse_select()?;
            ConditionalTerm::Query(QueryTerm {
                query: Box::new(query),
            })
        } else {
            let mut values = Vec::new();
            loop {
                values.push(self.parse_term_expr()?);
                if self.current() == &Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            ConditionalTerm::ValuesArray(ValuesArray { values })
        };

        self.expect(Token::RightParen)?;

        let op = if negated {
            ComparisonOp::NotIn
        } else {
            ComparisonOp::In
        };
        Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
            Some(left),
            Some(op),
            Some(right),
        ))))
    }

    /// Parse `BETWEEN lo AND hi`. The bounds land in a two-element
    /// `ValuesArray` on the right side.
    pub(crate) fn parse_between(&mut self, left: ConditionalTerm) -> QueryResult<ConditionalTerm> {
        self.expect(Token::Between)?;

        let lo = self.parse_term_expr()?;
        self.expect(Token::And)?;
        let hi = self.parse_term_expr()?;

        Ok(ConditionalTerm::Conditional(Box::new(Conditional::new(
            Some(left),
            Some(ComparisonOp::Between),
            Some(ConditionalTerm::ValuesArray(ValuesArray {
                values: vec![lo, hi],
            })),
        ))))
    }

    /// Parse a searched CASE: `CASE WHEN cond THEN result ... [ELSE d] END`.
    pub(crate) fn parse_case(&mut self) -> QueryResult<ConditionalTerm> {
        self.expect(Token::Case)?;

        let mut whens = Vec::new();
        while self.current() == &Token::When {
            self.advance();

            let expression = self.parse_condition_group()?;
            self.expect(Token::Then)?;
            let result = self.parse_term_expr()?;

            whens.push(CaseWhenExpression { expression, result });
        }

        if whens.is_empty() {
            return Err(self.error("CASE expression requires at least one WHEN clause"));
        }

        let default = if self.current() == &Token::Else {
            self.advance();
            Some(Box::new(self.parse_term_expr()?))
        } else {
            None
        };

        self.expect(Token::End)?;

        Ok(ConditionalTerm::Case(CaseConditional { whens, default }))
    }

    /// Parse a condition that may span AND/OR, unwrapping a single-item
    /// container to its sole conditional.
    fn parse_condition_group(&mut self) -> QueryResult<ConditionalTerm> {
        let mut container = self.parse_container()?;
        if container.len() == 1 {
            Ok(container.items.remove(0))
        } else {
            Ok(ConditionalTerm::Container(container))
        }
    }

    /// Parse a nested sub-select: `SELECT cols FROM entity [WHERE ...]`.
    /// The caller owns the surrounding parentheses.
    pub(crate) fn parse_select(&mut self) -> QueryResult<QueryInfo> {
        self.expect(Token::Select)?;

        let mut projection = Vec::new();
        if self.current() == &Token::Star {
            self.advance();
        } else {
            loop {
                let column = self.parse_column_path()?;
                let name = match column.name {
                    Some(name) => name,
                    None => return Err(self.error("Expected projected column name")),
                };
                projection.push(ProjectionEntry {
                    owner: column.owner,
                    name,
                });
                if self.current() == &Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect(Token::From)?;

        let entity = match self.current() {
            Token::Identifier(name) => {
                let entity = name.clone();
                self.advance();
                entity
            }
            other => return Err(self.error(format!("Expected entity name, got {:?}", other))),
        };

        let mut query = QueryInfo::new(entity);
        query.projection = projection;

        if self.current() == &Token::Where {
            self.advance();
            query.where_clause = Some(self.parse_container()?);
        }

        Ok(query)
    }
}
