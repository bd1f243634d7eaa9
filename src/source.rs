//! Execution boundary.
//!
//! The crate produces [`QueryInfo`] payloads; running them belongs to an
//! external backend behind [`QueryDataSource`]. Providers are looked up
//! through an explicitly constructed [`ProviderLocator`], never through
//! ambient global state.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::QueryResult;
use crate::query::{QueryInfo, ResultShape};

/// One result row: parallel field names and values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub fields: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(fields: Vec<String>, values: Vec<Value>) -> Self {
        Row { fields, values }
    }

    /// Field lookup by name, case-insensitive.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .position(|f| f.eq_ignore_ascii_case(field))
            .map(|i| &self.values[i])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An execution backend. The core only produces the payload; executing
/// it, including any timeout policy, lives behind this trait.
pub trait QueryDataSource: Send + Sync {
    fn execute(&self, query: &QueryInfo) -> QueryResult<Vec<Row>>;
    fn name(&self) -> &str;
}

/// Explicit provider registry.
#[derive(Default)]
pub struct ProviderLocator {
    providers: HashMap<String, Arc<dyn QueryDataSource>>,
}

impl ProviderLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn QueryDataSource>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn locate(&self, name: &str) -> Option<Arc<dyn QueryDataSource>> {
        self.providers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Testing backend over a fixed row set. Honors paging and the count
/// shape; filtering and sorting are up to the caller preparing the rows.
pub struct InMemoryDataSource {
    name: String,
    rows: Vec<Row>,
}

impl InMemoryDataSource {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        InMemoryDataSource {
            name: name.into(),
            rows,
        }
    }
}

impl QueryDataSource for InMemoryDataSource {
    fn execute(&self, query: &QueryInfo) -> QueryResult<Vec<Row>> {
        tracing::debug!(source = %self.name, entity = %query.entity, "executing in-memory query");

        let skip = query.skip.unwrap_or(0) as usize;
        let take = query.take.map(|t| t as usize).unwrap_or(usize::MAX);
        let page: Vec<Row> = self
            .rows
            .iter()
            .skip(skip)
            .take(take)
            .cloned()
            .collect();

        if query.shape == ResultShape::Count {
            return Ok(vec![Row::new(
                vec!["count".to_string()],
                vec![Value::from(page.len() as u64)],
            )]);
        }

        Ok(page)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
