//! Predicate translation: a [`TypedExpr`] tree becomes a SQL-text
//! fragment plus the parameters it references, in encounter order.

use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::query::ParameterSet;
use crate::translate::expr::{BinaryOp, MatchKind, TypedExpr};

/// Walks a predicate tree and emits WHERE-clause text. Every literal
/// becomes a `?param{N}` placeholder appended to the parameter set; the
/// emitted text references parameters positionally by name, so encounter
/// order is part of the contract.
#[derive(Debug, Default)]
pub struct WhereTranslator {
    params: ParameterSet,
}

impl WhereTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, expr: &TypedExpr) -> QueryResult<String> {
        self.render(expr)
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn into_parameters(self) -> ParameterSet {
        self.params
    }

    fn render(&mut self, expr: &TypedExpr) -> QueryResult<String> {
        match expr {
            TypedExpr::Property { owner, name } => Ok(render_property(owner, name)),

            TypedExpr::Value(v) => Ok(self.bind(v.clone())),

            TypedExpr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => Ok(format!(
                "{} {} {}",
                self.render_operand(left)?,
                op.as_sql(),
                self.render_operand(right)?
            )),

            TypedExpr::Binary { op, left, right } => self.render_comparison(*op, left, right),

            TypedExpr::StringMatch {
                target,
                kind,
                pattern,
            } => {
                let target = self.render(target)?;
                let placeholder = self.bind_pattern(*kind, pattern)?;
                Ok(format!("{} LIKE {}", target, placeholder))
            }

            TypedExpr::Not(inner) => self.render_negated(inner),
        }
    }

    /// AND/OR operands keep their own grouping explicit.
    fn render_operand(&mut self, expr: &TypedExpr) -> QueryResult<String> {
        let text = self.render(expr)?;
        if matches!(
            expr,
            TypedExpr::Binary {
                op: BinaryOp::And | BinaryOp::Or,
                ..
            }
        ) {
            Ok(format!("({})", text))
        } else {
            Ok(text)
        }
    }

    fn render_comparison(
        &mut self,
        op: BinaryOp,
        left: &TypedExpr,
        right: &TypedExpr,
    ) -> QueryResult<String> {
        // `x == true` collapses to just the member reference.
        if op == BinaryOp::Eq {
            if is_true(right) {
                return self.render(left);
            }
            if is_true(left) {
                return self.render(right);
            }
        }

        // Null comparisons use IS / IS NOT, never = / <>.
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) && (is_null(left) || is_null(right)) {
            let side = if is_null(right) { left } else { right };
            let keyword = if op == BinaryOp::Eq { "IS" } else { "IS NOT" };
            let side = self.render(side)?;
            let placeholder = self.bind(Value::Null);
            return Ok(format!("{} {} {}", side, keyword, placeholder));
        }

        Ok(format!(
            "{} {} {}",
            self.render(left)?,
            op.as_sql(),
            self.render(right)?
        ))
    }

    /// NOT has no direct textual form in the emitted subset; it rewrites
    /// into the inverted comparison (De Morgan for connectives).
    fn render_negated(&mut self, expr: &TypedExpr) -> QueryResult<String> {
        match expr {
            TypedExpr::Not(inner) => self.render(inner),

            TypedExpr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => Ok(format!(
                "({}) OR ({})",
                self.render_negated(left)?,
                self.render_negated(right)?
            )),

            TypedExpr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => Ok(format!(
                "({}) AND ({})",
                self.render_negated(left)?,
                self.render_negated(right)?
            )),

            TypedExpr::Binary { op, left, right } => {
                let inverted = match op {
                    BinaryOp::Eq => BinaryOp::NotEq,
                    BinaryOp::NotEq => BinaryOp::Eq,
                    BinaryOp::Gt => BinaryOp::LtEq,
                    BinaryOp::GtEq => BinaryOp::Lt,
                    BinaryOp::Lt => BinaryOp::GtEq,
                    BinaryOp::LtEq => BinaryOp::Gt,
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                };
                self.render_comparison(inverted, left, right)
            }

            TypedExpr::StringMatch {
                target,
                kind,
                pattern,
            } => {
                let target = self.render(target)?;
                let placeholder = self.bind_pattern(*kind, pattern)?;
                Ok(format!("{} NOT LIKE {}", target, placeholder))
            }

            other => Err(QueryError::NotSupported(format!(
                "NOT is not supported over {:?}",
                other
            ))),
        }
    }

    fn bind_pattern(&mut self, kind: MatchKind, pattern: &TypedExpr) -> QueryResult<String> {
        let text = match pattern {
            TypedExpr::Value(Value::String(s)) => s.clone(),
            other => {
                return Err(QueryError::NotSupported(format!(
                    "string match pattern must be a string constant, got {:?}",
                    other
                )));
            }
        };
        let wrapped = match kind {
            MatchKind::Contains => format!("%{}%", text),
            MatchKind::StartsWith => format!("{}%", text),
            MatchKind::EndsWith => format!("%{}", text),
        };
        Ok(self.bind(Value::String(wrapped)))
    }

    /// Append a literal as the next positional parameter and return its
    /// placeholder text.
    fn bind(&mut self, value: Value) -> String {
        let name = self.params.next_name();
        self.params.push(name.as_str(), value);
        format!("?{}", name)
    }
}

fn render_property(owner: &Option<String>, name: &str) -> String {
    match owner {
        Some(owner) => format!("{}.{}", owner, name),
        None => name.to_string(),
    }
}

fn is_true(expr: &TypedExpr) -> bool {
    matches!(expr, TypedExpr::Value(Value::Bool(true)))
}

fn is_null(expr: &TypedExpr) -> bool {
    matches!(expr, TypedExpr::Value(Value::Null))
}
