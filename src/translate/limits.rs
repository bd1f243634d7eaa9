//! Skip/Take counts. A count operand must already be a folded integer
//! constant by the time it reaches the translator.

use crate::error::{QueryError, QueryResult};
use crate::translate::expr::TypedExpr;

pub(crate) fn eval_count(expr: &TypedExpr, operator: &str) -> QueryResult<u64> {
    match expr {
        TypedExpr::Value(value) => value.as_u64().ok_or_else(|| {
            QueryError::NotSupported(format!(
                "{} requires a non-negative integer, got {}",
                operator, value
            ))
        }),
        other => Err(QueryError::NotSupported(format!(
            "{} requires a constant count, got {:?}",
            operator, other
        ))),
    }
}
