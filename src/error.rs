//! Error types for condql.
//!
//! Parsing, translation, and deserialization all fail synchronously to the
//! immediate caller; nothing in this crate retries or returns partial trees.

use thiserror::Error;

/// condql error type
#[derive(Error, Debug)]
pub enum QueryError {
    /// Malformed text input to the lexer or conditional parser. `position`
    /// is the character offset of the failing token.
    #[error("Parse error at offset {position}: {message}")]
    Parse { message: String, position: usize },

    /// A typed query expression shape with no mapping. Names the offending
    /// member or operator.
    #[error("Translation not supported: {0}")]
    NotSupported(String),

    /// An unrecognized serialization type-tag. Never coerced to a default
    /// variant.
    #[error("Invalid conditional type: {0}")]
    InvalidType(String),

    /// A malformed wire payload (truncated binary data, bad XML).
    #[error("Wire format error: {0}")]
    Wire(String),

    /// A query's declared projection does not match the returned row shape.
    #[error("Validation failed for fields: {0:?}")]
    InvalidFields(Vec<String>),
}

/// Result type for condql operations
pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        QueryError::Parse {
            message: message.into(),
            position,
        }
    }
}

impl serde::Serialize for QueryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QueryError::parse("unexpected token", 7);
        assert_eq!(err.to_string(), "Parse error at offset 7: unexpected token");

        let err = QueryError::NotSupported("method Reverse".to_string());
        assert_eq!(err.to_string(), "Translation not supported: method Reverse");

        let err = QueryError::InvalidType("Bogus".to_string());
        assert_eq!(err.to_string(), "Invalid conditional type: Bogus");
    }

    #[test]
    fn test_result_type() {
        let ok_result: QueryResult<i32> = Ok(42);
        assert_eq!(ok_result.unwrap(), 42);

        let err_result: QueryResult<i32> = Err(QueryError::Wire("truncated".to_string()));
        assert!(err_result.is_err());
    }
}
