//! Typed predicate expressions.
//!
//! `TypedExpr` is the closed tree the query builder hands to the
//! translators. Captured Rust values are folded into `TypedExpr::Value`
//! at construction, so by the time a translator walks the tree every
//! literal is already a concrete `serde_json::Value`.

use serde_json::Value;

/// Comparison/connective operator inside a [`TypedExpr::Binary`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl BinaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
        }
    }
}

/// String pattern-match flavor, rendered as a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// A typed predicate/selector expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedExpr {
    /// A field access, optionally one level deep (`owner.name`).
    Property {
        owner: Option<String>,
        name: String,
    },
    /// A captured literal.
    Value(Value),
    Binary {
        op: BinaryOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Not(Box<TypedExpr>),
    StringMatch {
        target: Box<TypedExpr>,
        kind: MatchKind,
        pattern: Box<TypedExpr>,
    },
}

/// A bare field access: `prop("Name")`.
pub fn prop(name: impl Into<String>) -> TypedExpr {
    TypedExpr::Property {
        owner: None,
        name: name.into(),
    }
}

/// A one-level-deep field access: `prop_of("Address", "City")`.
pub fn prop_of(owner: impl Into<String>, name: impl Into<String>) -> TypedExpr {
    TypedExpr::Property {
        owner: Some(owner.into()),
        name: name.into(),
    }
}

/// A captured literal value.
pub fn value(v: impl Into<Value>) -> TypedExpr {
    TypedExpr::Value(v.into())
}

impl TypedExpr {
    fn binary(self, op: BinaryOp, other: impl Into<TypedExpr>) -> TypedExpr {
        TypedExpr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::NotEq, other)
    }

    pub fn gt(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::GtEq, other)
    }

    pub fn lt(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::LtEq, other)
    }

    pub fn and(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<TypedExpr>) -> TypedExpr {
        self.binary(BinaryOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> TypedExpr {
        TypedExpr::Not(Box::new(self))
    }

    fn string_match(self, kind: MatchKind, pattern: impl Into<TypedExpr>) -> TypedExpr {
        TypedExpr::StringMatch {
            target: Box::new(self),
            kind,
            pattern: Box::new(pattern.into()),
        }
    }

    pub fn contains(self, pattern: impl Into<TypedExpr>) -> TypedExpr {
        self.string_match(MatchKind::Contains, pattern)
    }

    pub fn starts_with(self, pattern: impl Into<TypedExpr>) -> TypedExpr {
        self.string_match(MatchKind::StartsWith, pattern)
    }

    pub fn ends_with(self, pattern: impl Into<TypedExpr>) -> TypedExpr {
        self.string_match(MatchKind::EndsWith, pattern)
    }
}

impl From<Value> for TypedExpr {
    fn from(v: Value) -> Self {
        TypedExpr::Value(v)
    }
}

impl From<bool> for TypedExpr {
    fn from(v: bool) -> Self {
        TypedExpr::Value(Value::Bool(v))
    }
}

impl From<i64> for TypedExpr {
    fn from(v: i64) -> Self {
        TypedExpr::Value(Value::from(v))
    }
}

impl From<u64> for TypedExpr {
    fn from(v: u64) -> Self {
        TypedExpr::Value(Value::from(v))
    }
}

impl From<f64> for TypedExpr {
    fn from(v: f64) -> Self {
        TypedExpr::Value(Value::from(v))
    }
}

impl From<&str> for TypedExpr {
    fn from(v: &str) -> Self {
        TypedExpr::Value(Value::String(v.to_string()))
    }
}

impl From<String> for TypedExpr {
    fn from(v: String) -> Self {
        TypedExpr::Value(Value::String(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combinators_build_binary_tree() {
        let expr = prop("Age").ge(18i64).and(prop("Name").eq("bob"));
        match expr {
            TypedExpr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                assert!(matches!(
                    *left,
                    TypedExpr::Binary {
                        op: BinaryOp::GtEq,
                        ..
                    }
                ));
                assert!(matches!(
                    *right,
                    TypedExpr::Binary {
                        op: BinaryOp::Eq,
                        ..
                    }
                ));
            }
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn test_values_fold_at_construction() {
        let expr = prop("Age").gt(21i64);
        match expr {
            TypedExpr::Binary { right, .. } => {
                assert_eq!(*right, TypedExpr::Value(json!(21)));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_prop_of_is_one_level_deep() {
        assert_eq!(
            prop_of("Address", "City"),
            TypedExpr::Property {
                owner: Some("Address".to_string()),
                name: "City".to_string(),
            }
        );
    }

    #[test]
    fn test_null_value() {
        assert_eq!(value(Value::Null), TypedExpr::Value(Value::Null));
    }
}
