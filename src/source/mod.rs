//! Data source collaborators
//!
//! The builder reads documents through a [`ConnectionProvider`]: one
//! connection runs the count query, and every partition opens its own
//! connection for a paginated data query. Rows carry named, possibly null
//! columns.

pub mod error;
pub mod memory;

pub use error::{SourceError, SourceResult};
pub use memory::MemorySource;

use crate::types::Value;

/// Opens independent connections to the data store.
pub trait ConnectionProvider: Send + Sync {
    fn connect(&self) -> SourceResult<Box<dyn Connection>>;
}

/// A single open connection.
pub trait Connection: Send {
    /// Run a scalar count query.
    fn count(&mut self, query: &str) -> SourceResult<u64>;

    /// Run a data query with the zero-based row `offset` and row `limit`
    /// bound to its two positional parameters.
    fn query(&mut self, query: &str, offset: u64, limit: u64)
    -> SourceResult<Box<dyn RowCursor>>;
}

/// Forward-only reader over query results.
pub trait RowCursor: Send {
    fn next_row(&mut self) -> SourceResult<Option<Row>>;
}

/// One result row: column names with their values, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
