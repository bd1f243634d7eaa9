//! Sort translation.
//!
//! Keys are recorded in visitation order and rendered in *reverse* of
//! that order: `order_by(a).then_by(b)` renders `"b ASC, a ASC"`. This
//! mirrors how chained sort calls are visited outside-in; the rendered
//! order is contractual and locked in by a regression test.

use crate::error::{QueryError, QueryResult};
use crate::translate::expr::TypedExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Default)]
pub struct OrderByTranslator {
    keys: Vec<(String, SortDirection)>,
}

impl OrderByTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the primary sort key.
    pub fn order_by(&mut self, key: &TypedExpr, direction: SortDirection) -> QueryResult<()> {
        self.keys.push((key_name(key)?, direction));
        Ok(())
    }

    /// Record a secondary sort key; requires a preceding `order_by`.
    pub fn then_by(&mut self, key: &TypedExpr, direction: SortDirection) -> QueryResult<()> {
        if self.keys.is_empty() {
            return Err(QueryError::NotSupported(
                "then_by without a preceding order_by".to_string(),
            ));
        }
        self.keys.push((key_name(key)?, direction));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Render the ORDER BY clause, last-visited key first.
    pub fn render(&self) -> String {
        self.keys
            .iter()
            .rev()
            .map(|(name, direction)| format!("{} {}", name, direction.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn key_name(key: &TypedExpr) -> QueryResult<String> {
    match key {
        TypedExpr::Property { owner: None, name } => Ok(name.clone()),
        TypedExpr::Property {
            owner: Some(owner),
            name,
        } => Ok(format!("{}.{}", owner, name)),
        other => Err(QueryError::NotSupported(format!(
            "sort key must be a property access, got {:?}",
            other
        ))),
    }
}
