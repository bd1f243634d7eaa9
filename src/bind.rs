//! Result-shape validation and row binding.
//!
//! Validation is two-phase by design: `validate` returns a structured
//! outcome and the caller decides whether to escalate it through
//! [`Validation::throw_if_invalid`]. Binding strategies turn raw rows
//! into values; the bounded [`BindStrategyCache`] keeps one strategy per
//! key with an access-count eviction policy.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{QueryError, QueryResult};
use crate::query::QueryInfo;
use crate::source::Row;

/// Outcome of a projection/row shape check.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    None,
    InvalidFields(Vec<String>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::None)
    }

    /// Escalate an invalid outcome into an error.
    pub fn throw_if_invalid(self) -> QueryResult<()> {
        match self {
            Validation::None => Ok(()),
            Validation::InvalidFields(fields) => Err(QueryError::InvalidFields(fields)),
        }
    }
}

/// Compare a query's declared projection against the shape of a returned
/// row: field count plus case-insensitive names. A query without a
/// declared projection accepts any row shape.
pub fn validate(query: &QueryInfo, row: &Row) -> Validation {
    if query.projection.is_empty() {
        return Validation::None;
    }

    let mut invalid: Vec<String> = query
        .projection
        .iter()
        .filter(|entry| row.get(&entry.name).is_none())
        .map(|entry| entry.name.clone())
        .collect();

    for field in &row.fields {
        if !query
            .projection
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(field))
        {
            invalid.push(field.clone());
        }
    }

    if invalid.is_empty() && query.projection.len() == row.len() {
        Validation::None
    } else {
        Validation::InvalidFields(invalid)
    }
}

/// Turns one row into a bound value.
pub trait BindStrategy: Send + Sync {
    fn bind(&self, row: &Row) -> QueryResult<Value>;
}

/// Binds a row to a JSON object keyed by the declared projection names.
pub struct NamedFieldStrategy {
    fields: Vec<String>,
}

impl NamedFieldStrategy {
    pub fn new(fields: Vec<String>) -> Self {
        NamedFieldStrategy { fields }
    }

    pub fn for_query(query: &QueryInfo) -> Self {
        NamedFieldStrategy {
            fields: query.projection.iter().map(|e| e.name.clone()).collect(),
        }
    }
}

impl BindStrategy for NamedFieldStrategy {
    fn bind(&self, row: &Row) -> QueryResult<Value> {
        let mut object = Map::new();
        for field in &self.fields {
            let value = row.get(field).ok_or_else(|| {
                QueryError::InvalidFields(vec![field.clone()])
            })?;
            object.insert(field.clone(), value.clone());
        }
        Ok(Value::Object(object))
    }
}

struct CacheEntry {
    key: String,
    strategy: Arc<dyn BindStrategy>,
    hits: u64,
}

/// Bounded key → strategy cache.
///
/// A single mutex guards both the lookup and the eviction scan: eviction
/// inspects and mutates the whole table, so the two must not interleave.
/// Contention is low in practice; correctness wins over throughput here.
pub struct BindStrategyCache {
    capacity: usize,
    entries: Mutex<Vec<CacheEntry>>,
}

impl BindStrategyCache {
    pub fn new(capacity: usize) -> Self {
        BindStrategyCache {
            capacity: capacity.max(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the strategy for `key`, creating and inserting it on a miss.
    /// When the cache is full the least-accessed entry is replaced.
    pub fn get_or_insert_with<F>(&self, key: &str, create: F) -> Arc<dyn BindStrategy>
    where
        F: FnOnce() -> Arc<dyn BindStrategy>,
    {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.iter_mut().find(|e| e.key == key) {
            entry.hits += 1;
            return entry.strategy.clone();
        }

        let strategy = create();

        if entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.hits)
                .map(|(i, _)| i);
            if let Some(victim) = victim {
                entries.swap_remove(victim);
            }
        }

        entries.push(CacheEntry {
            key: key.to_string(),
            strategy: strategy.clone(),
            hits: 1,
        });
        strategy
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
