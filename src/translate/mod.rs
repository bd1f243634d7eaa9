//! Typed query expressions and their translation into [`QueryInfo`].
//!
//! A [`QueryExpr`] is a pipeline of operators over an entity, built with
//! combinator methods. [`QueryTranslator`] walks the pipeline, hands each
//! operator to its specialized sub-translator, and assembles the final
//! query model. The WHERE fragment each predicate produces is fed back
//! through the conditional parser, so the typed path and the text path
//! converge on the same AST.

mod expr;
mod limits;
mod order_by;
mod projection;
mod where_clause;
#[cfg(test)]
mod tests;

pub use expr::{prop, prop_of, value, BinaryOp, MatchKind, TypedExpr};
pub use order_by::{OrderByTranslator, SortDirection};
pub use projection::ProjectionTranslator;
pub use where_clause::WhereTranslator;

use crate::error::{QueryError, QueryResult};
use crate::parser;
use crate::query::{QueryInfo, ResultShape, Sort};
use crate::term::ConditionalTerm;
use limits::eval_count;

/// One operator in a query pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    Where(TypedExpr),
    Select(Vec<TypedExpr>),
    OrderBy {
        key: TypedExpr,
        direction: SortDirection,
    },
    ThenBy {
        key: TypedExpr,
        direction: SortDirection,
    },
    Skip(TypedExpr),
    Take(TypedExpr),
    GroupBy(Vec<TypedExpr>),
    Count,
    First {
        use_default: bool,
    },
}

/// A typed query pipeline over one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpr {
    pub entity: String,
    pub ops: Vec<QueryOp>,
}

impl QueryExpr {
    pub fn from_entity(entity: impl Into<String>) -> Self {
        QueryExpr {
            entity: entity.into(),
            ops: Vec::new(),
        }
    }

    fn with(mut self, op: QueryOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn filter(self, predicate: TypedExpr) -> Self {
        self.with(QueryOp::Where(predicate))
    }

    pub fn select(self, selectors: impl IntoIterator<Item = TypedExpr>) -> Self {
        self.with(QueryOp::Select(selectors.into_iter().collect()))
    }

    pub fn order_by(self, key: TypedExpr) -> Self {
        self.with(QueryOp::OrderBy {
            key,
            direction: SortDirection::Ascending,
        })
    }

    pub fn order_by_desc(self, key: TypedExpr) -> Self {
        self.with(QueryOp::OrderBy {
            key,
            direction: SortDirection::Descending,
        })
    }

    pub fn then_by(self, key: TypedExpr) -> Self {
        self.with(QueryOp::ThenBy {
            key,
            direction: SortDirection::Ascending,
        })
    }

    pub fn then_by_desc(self, key: TypedExpr) -> Self {
        self.with(QueryOp::ThenBy {
            key,
            direction: SortDirection::Descending,
        })
    }

    pub fn skip(self, count: impl Into<TypedExpr>) -> Self {
        self.with(QueryOp::Skip(count.into()))
    }

    pub fn take(self, count: impl Into<TypedExpr>) -> Self {
        self.with(QueryOp::Take(count.into()))
    }

    pub fn group_by(self, keys: impl IntoIterator<Item = TypedExpr>) -> Self {
        self.with(QueryOp::GroupBy(keys.into_iter().collect()))
    }

    pub fn count(self) -> Self {
        self.with(QueryOp::Count)
    }

    pub fn first(self) -> Self {
        self.with(QueryOp::First { use_default: false })
    }

    pub fn first_or_default(self) -> Self {
        self.with(QueryOp::First { use_default: true })
    }

    /// Translate this pipeline into the query model.
    pub fn translate(&self) -> QueryResult<QueryInfo> {
        QueryTranslator::translate(self)
    }
}

/// Orchestrates the sub-translators over a pipeline.
pub struct QueryTranslator;

impl QueryTranslator {
    pub fn translate(expr: &QueryExpr) -> QueryResult<QueryInfo> {
        tracing::debug!(
            entity = %expr.entity,
            ops = expr.ops.len(),
            "translating query expression"
        );

        let mut query = QueryInfo::new(expr.entity.as_str());
        let mut where_translator = WhereTranslator::new();
        let mut fragments: Vec<String> = Vec::new();
        let mut projection = ProjectionTranslator::new();
        let mut order = OrderByTranslator::new();

        for op in &expr.ops {
            match op {
                QueryOp::Where(predicate) => {
                    fragments.push(where_translator.translate(predicate)?);
                }
                QueryOp::Select(selectors) => {
                    for selector in selectors {
                        projection.add(selector)?;
                    }
                }
                QueryOp::OrderBy { key, direction } => order.order_by(key, *direction)?,
                QueryOp::ThenBy { key, direction } => order.then_by(key, *direction)?,
                QueryOp::Skip(count) => query.skip = Some(eval_count(count, "Skip")?),
                QueryOp::Take(count) => query.take = Some(eval_count(count, "Take")?),
                QueryOp::GroupBy(keys) => {
                    for key in keys {
                        query.group_by.add(group_key(key)?);
                    }
                }
                QueryOp::Count => set_shape(&mut query, ResultShape::Count)?,
                QueryOp::First { use_default } => {
                    set_shape(
                        &mut query,
                        ResultShape::First {
                            use_default: *use_default,
                        },
                    )?;
                    // First is an implicit Take(1).
                    query.take = Some(1);
                }
            }
        }

        if !fragments.is_empty() {
            // Multiple filters conjoin; each keeps its own grouping.
            let text = if fragments.len() == 1 {
                fragments.remove(0)
            } else {
                fragments
                    .iter()
                    .map(|f| format!("({})", f))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            };
            let mut container = parser::parse(&text)?;
            container.parameters = where_translator.into_parameters();
            query.where_clause = Some(container);
        }

        if !order.is_empty() {
            query.sort = Sort::parse(&order.render())?;
        }

        query.projection = projection.into_entries();

        Ok(query)
    }
}

fn set_shape(query: &mut QueryInfo, shape: ResultShape) -> QueryResult<()> {
    if query.shape != ResultShape::Rows {
        return Err(QueryError::NotSupported(
            "query has more than one terminal operator".to_string(),
        ));
    }
    query.shape = shape;
    Ok(())
}

fn group_key(key: &TypedExpr) -> QueryResult<ConditionalTerm> {
    match key {
        TypedExpr::Property { owner: None, name } => Ok(ConditionalTerm::column(name.clone())),
        TypedExpr::Property {
            owner: Some(owner),
            name,
        } => Ok(ConditionalTerm::column_of(owner.clone(), name.clone())),
        other => Err(QueryError::NotSupported(format!(
            "group key must be a property access, got {:?}",
            other
        ))),
    }
}
