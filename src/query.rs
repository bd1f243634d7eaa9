//! The materialized query model.
//!
//! `QueryInfo` is the provider-agnostic payload handed to a
//! [`crate::source::QueryDataSource`]: projection, WHERE tree, grouping,
//! sorting, joins, paging, and the terminal result shape. Builder methods
//! append clauses before dispatch; after that the tree is treated as
//! read-only (clone to customize).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::term::{ComparisonOp, ConditionalContainer, ConditionalTerm, Connector};

/// A named parameter bound to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

/// Ordered collection of named parameters. Order matters: the emitted SQL
/// text references parameters positionally by name (`?param0`, `?param1`,
/// ...) in encounter order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.params.push(Parameter {
            name: name.into(),
            value,
        });
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// The next positional parameter name (`param{N}`).
    pub fn next_name(&self) -> String {
        format!("param{}", self.params.len())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }
}

/// One projected field: `owner.name` or a bare `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionEntry {
    pub owner: Option<String>,
    pub name: String,
}

impl fmt::Display for ProjectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}.{}", owner, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByEntry {
    pub term: ConditionalTerm,
}

/// Ordered grouping keys. `parse` lives in the parser module; `add` is the
/// builder used before dispatch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupBy {
    pub entries: Vec<GroupByEntry>,
}

impl GroupBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: ConditionalTerm) {
        self.entries.push(GroupByEntry { term });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One sort key; `reverse` is true for DESC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortEntry {
    pub term: ConditionalTerm,
    pub reverse: bool,
}

impl SortEntry {
    /// The underlying column name of this sort key.
    ///
    /// Walks through a `ConditionalContainer` only when it has exactly one
    /// child; a multi-child container never resolves to a name.
    pub fn name(&self) -> Option<String> {
        fn column_name(term: &ConditionalTerm) -> Option<String> {
            match term {
                ConditionalTerm::Column(c) => c.name.clone(),
                ConditionalTerm::Container(c) => c.single().and_then(column_name),
                _ => None,
            }
        }
        column_name(&self.term)
    }
}

/// Ordered sort keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sort {
    pub entries: Vec<SortEntry>,
}

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: ConditionalTerm, reverse: bool) {
        self.entries.push(SortEntry { term, reverse });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for a WHERE/HAVING clause container.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    container: ConditionalContainer,
}

impl WhereClause {
    /// Start a clause with its first conditional.
    pub fn start(term: ConditionalTerm) -> Self {
        let mut container = ConditionalContainer::new();
        container.add(Connector::And, term);
        WhereClause { container }
    }

    pub fn and(mut self, term: ConditionalTerm) -> Self {
        self.container.add(Connector::And, term);
        self
    }

    pub fn or(mut self, term: ConditionalTerm) -> Self {
        self.container.add(Connector::Or, term);
        self
    }

    pub fn into_container(self) -> ConditionalContainer {
        self.container
    }
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "Inner",
            JoinType::Left => "Left",
            JoinType::Right => "Right",
            JoinType::Cross => "Cross",
        }
    }

    pub fn parse(text: &str) -> Option<JoinType> {
        match text.to_uppercase().as_str() {
            "INNER" => Some(JoinType::Inner),
            "LEFT" => Some(JoinType::Left),
            "RIGHT" => Some(JoinType::Right),
            "CROSS" => Some(JoinType::Cross),
            _ => None,
        }
    }
}

/// Join metadata; the ON condition is a full conditional container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinInfo {
    pub left: String,
    pub right: String,
    pub conditional: ConditionalContainer,
    pub kind: JoinType,
}

/// How the caller post-processes results: full rows, a scalar count, or a
/// single row (`use_default` distinguishes "default if empty" from "fail
/// if empty").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultShape {
    Rows,
    Count,
    First { use_default: bool },
}

impl Default for ResultShape {
    fn default() -> Self {
        ResultShape::Rows
    }
}

/// A fully materialized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    pub entity: String,
    pub projection: Vec<ProjectionEntry>,
    pub where_clause: Option<ConditionalContainer>,
    pub group_by: GroupBy,
    pub sort: Sort,
    pub joins: Vec<JoinInfo>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub shape: ResultShape,
    pub unions: Vec<QueryInfo>,
}

impl QueryInfo {
    pub fn new(entity: impl Into<String>) -> Self {
        QueryInfo {
            entity: entity.into(),
            projection: Vec::new(),
            where_clause: None,
            group_by: GroupBy::new(),
            sort: Sort::new(),
            joins: Vec::new(),
            skip: None,
            take: None,
            shape: ResultShape::default(),
            unions: Vec::new(),
        }
    }

    /// Append a comparison to the WHERE clause with an AND connector.
    pub fn and_where(
        &mut self,
        left: ConditionalTerm,
        op: ComparisonOp,
        right: ConditionalTerm,
    ) {
        let term = ConditionalTerm::comparison(left, op, right);
        self.where_clause
            .get_or_insert_with(ConditionalContainer::new)
            .add(Connector::And, term);
    }
}

impl fmt::Display for QueryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.projection.is_empty() {
            write!(f, "*")?;
        } else {
            for (i, entry) in self.projection.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", entry)?;
            }
        }
        write!(f, " FROM {}", self.entity)?;
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {}", where_clause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Column, ComparisonOp};
    use serde_json::json;

    #[test]
    fn test_parameter_set_order_and_naming() {
        let mut params = ParameterSet::new();
        assert_eq!(params.next_name(), "param0");
        params.push("param0", json!(1));
        assert_eq!(params.next_name(), "param1");
        params.push("param1", json!("x"));

        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["param0", "param1"]);
        assert_eq!(params.get("param1"), Some(&json!("x")));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_where_clause_builder() {
        let container = WhereClause::start(ConditionalTerm::comparison(
            ConditionalTerm::column("A"),
            ComparisonOp::Eq,
            ConditionalTerm::constant("1"),
        ))
        .or(ConditionalTerm::comparison(
            ConditionalTerm::column("B"),
            ComparisonOp::Eq,
            ConditionalTerm::constant("2"),
        ))
        .into_container();

        assert_eq!(container.len(), 2);
        assert_eq!(container.connectors, vec![Connector::Or]);
        assert_eq!(container.to_string(), "A = 1 OR B = 2");
    }

    #[test]
    fn test_sort_entry_name_plain_column() {
        let entry = SortEntry {
            term: ConditionalTerm::column("Age"),
            reverse: false,
        };
        assert_eq!(entry.name(), Some("Age".to_string()));
    }

    #[test]
    fn test_sort_entry_name_unwraps_single_child_container() {
        let mut container = ConditionalContainer::new();
        container.add(Connector::And, ConditionalTerm::column("Age"));
        let entry = SortEntry {
            term: ConditionalTerm::Container(container),
            reverse: true,
        };
        assert_eq!(entry.name(), Some("Age".to_string()));
    }

    #[test]
    fn test_sort_entry_name_multi_child_container_is_opaque() {
        let mut container = ConditionalContainer::new();
        container.add(Connector::And, ConditionalTerm::column("A"));
        container.add(Connector::And, ConditionalTerm::column("B"));
        let entry = SortEntry {
            term: ConditionalTerm::Container(container),
            reverse: false,
        };
        assert_eq!(entry.name(), None);
    }

    #[test]
    fn test_sort_entry_name_non_column() {
        let entry = SortEntry {
            term: ConditionalTerm::constant("1"),
            reverse: false,
        };
        assert_eq!(entry.name(), None);
    }

    #[test]
    fn test_column_parse_used_for_projection() {
        let col = Column::parse("o.Total");
        assert_eq!(col.owner, Some("o".to_string()));
        assert_eq!(col.name, Some("Total".to_string()));
    }

    #[test]
    fn test_query_info_display() {
        let mut query = QueryInfo::new("users");
        query.projection.push(ProjectionEntry {
            owner: None,
            name: "Name".to_string(),
        });
        query.and_where(
            ConditionalTerm::column("Age"),
            ComparisonOp::Gt,
            ConditionalTerm::constant("18"),
        );
        assert_eq!(query.to_string(), "SELECT Name FROM users WHERE Age > 18");
    }

    #[test]
    fn test_result_shape_default() {
        assert_eq!(ResultShape::default(), ResultShape::Rows);
    }
}
