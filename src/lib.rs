//! condql - Storage-independent conditional query layer.
//!
//! This crate models SQL-subset boolean conditions as a closed AST, parses
//! them from text, translates typed query pipelines into the same model,
//! and serializes everything over two wire formats. Execution stays behind
//! a trait; no storage engine is involved.
//!
//! # Main Components
//!
//! - **Term AST**: `ConditionalTerm`, a closed tagged union over every
//!   node kind (columns, constants, comparisons, containers, CASE, ...)
//! - **Parser**: SQL-subset condition text into the AST
//! - **Translate**: typed query pipelines (`QueryExpr`) into `QueryInfo`
//! - **Wire**: a compact binary format and an XML format, both round-trip
//! - **Source/Bind**: the execution and row-binding boundary traits
//!
//! # Example
//!
//! ```rust
//! use condql::{parser, prop, QueryExpr};
//!
//! // Parse a SQL-subset condition into an AST.
//! let container = parser::parse("Age >= 18 AND Name LIKE '%bo%'").unwrap();
//! assert_eq!(container.len(), 2);
//!
//! // Build the equivalent query with typed expressions.
//! let query = QueryExpr::from_entity("users")
//!     .filter(prop("Age").ge(18i64))
//!     .order_by(prop("Name"))
//!     .take(10u64)
//!     .translate()
//!     .unwrap();
//! assert_eq!(query.entity, "users");
//! assert_eq!(query.take, Some(10));
//! assert!(query.where_clause.is_some());
//!
//! // Either tree serializes over both wire formats.
//! let bytes = condql::wire::binary::query_to_bytes(&query);
//! let decoded = condql::wire::binary::query_from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, query);
//! ```

pub mod bind;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod source;
pub mod term;
pub mod translate;
pub mod wire;

// Re-export main types for convenience
pub use bind::{validate, BindStrategy, BindStrategyCache, NamedFieldStrategy, Validation};
pub use error::{QueryError, QueryResult};
pub use lexer::{Lexer, Token};
pub use parser::Parser;
pub use query::{
    GroupBy, GroupByEntry, JoinInfo, JoinType, Parameter, ParameterSet, ProjectionEntry,
    QueryInfo, ResultShape, Sort, SortEntry, WhereClause,
};
pub use source::{InMemoryDataSource, ProviderLocator, QueryDataSource, Row};
pub use term::{
    CaseConditional, CaseWhenExpression, Column, ComparisonOp, Conditional,
    ConditionalContainer, ConditionalTerm, Connector, Constant, Formula, FormulaOp,
    FunctionCall, MinusTerm, Operator, QueryTerm, ValuesArray, Variable,
};
pub use translate::{
    prop, prop_of, value, BinaryOp, MatchKind, OrderByTranslator, ProjectionTranslator,
    QueryExpr, QueryOp, QueryTranslator, SortDirection, TypedExpr, WhereTranslator,
};
