use super::{Connection, ConnectionProvider, Row, RowCursor, SourceError, SourceResult};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Table {
    rows: Vec<Row>,
    /// Absolute row index at which reads fail.
    fail_at: Option<u64>,
}

/// Connection provider over in-memory tables.
///
/// A table is registered under its count query and its data query text. The
/// count query returns the number of rows; the data query returns rows
/// `[offset, offset + limit)`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    by_count: HashMap<String, Arc<Table>>,
    by_data: HashMap<String, Arc<Table>>,
    unavailable: Option<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose every `connect` fails with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_table(
        self,
        count_query: impl Into<String>,
        data_query: impl Into<String>,
        rows: Vec<Row>,
    ) -> Self {
        self.insert(count_query.into(), data_query.into(), Table { rows, fail_at: None })
    }

    /// Register a table whose cursors fail when they reach row `fail_at`.
    pub fn with_failing_table(
        self,
        count_query: impl Into<String>,
        data_query: impl Into<String>,
        rows: Vec<Row>,
        fail_at: u64,
    ) -> Self {
        self.insert(
            count_query.into(),
            data_query.into(),
            Table {
                rows,
                fail_at: Some(fail_at),
            },
        )
    }

    fn insert(mut self, count_query: String, data_query: String, table: Table) -> Self {
        let table = Arc::new(table);
        self.by_count.insert(count_query, Arc::clone(&table));
        self.by_data.insert(data_query, table);
        self
    }
}

impl ConnectionProvider for MemorySource {
    fn connect(&self) -> SourceResult<Box<dyn Connection>> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceError::Connection(reason.clone()));
        }
        Ok(Box::new(MemoryConnection {
            source: self.clone(),
        }))
    }
}

struct MemoryConnection {
    source: MemorySource,
}

impl Connection for MemoryConnection {
    fn count(&mut self, query: &str) -> SourceResult<u64> {
        let table = self
            .source
            .by_count
            .get(query)
            .ok_or_else(|| unknown_query(query))?;
        Ok(table.rows.len() as u64)
    }

    fn query(
        &mut self,
        query: &str,
        offset: u64,
        limit: u64,
    ) -> SourceResult<Box<dyn RowCursor>> {
        let table = self
            .source
            .by_data
            .get(query)
            .ok_or_else(|| unknown_query(query))?;
        let len = table.rows.len() as u64;
        let start = offset.min(len);
        let end = offset.saturating_add(limit).min(len);
        Ok(Box::new(MemoryCursor {
            table: Arc::clone(table),
            position: start,
            end,
        }))
    }
}

struct MemoryCursor {
    table: Arc<Table>,
    position: u64,
    end: u64,
}

impl RowCursor for MemoryCursor {
    fn next_row(&mut self) -> SourceResult<Option<Row>> {
        if self.position >= self.end {
            return Ok(None);
        }
        if self.table.fail_at == Some(self.position) {
            return Err(SourceError::Read {
                offset: self.position,
                reason: "injected failure".to_string(),
            });
        }
        let row = usize::try_from(self.position)
            .ok()
            .and_then(|index| self.table.rows.get(index))
            .cloned();
        self.position += 1;
        Ok(row)
    }
}

fn unknown_query(query: &str) -> SourceError {
    SourceError::Query {
        query: query.to_string(),
        reason: "no table registered for this query".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| Row::new().with("id", i as i64)).collect()
    }

    fn drain(cursor: &mut dyn RowCursor) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(row) = cursor.next_row().unwrap() {
            ids.push(row.get("id").and_then(|v| v.as_i64()).unwrap());
        }
        ids
    }

    #[test]
    fn test_count_and_pages() {
        let source = MemorySource::new().with_table("count", "data", rows(5));
        let mut conn = source.connect().unwrap();

        assert_eq!(conn.count("count").unwrap(), 5);
        assert_eq!(drain(conn.query("data", 0, 3).unwrap().as_mut()), vec![0, 1, 2]);
        assert_eq!(drain(conn.query("data", 3, 3).unwrap().as_mut()), vec![3, 4]);
        assert!(drain(conn.query("data", 9, 3).unwrap().as_mut()).is_empty());
    }

    #[test]
    fn test_unknown_query() {
        let mut conn = MemorySource::new().connect().unwrap();
        assert!(matches!(conn.count("nope"), Err(SourceError::Query { .. })));
        assert!(conn.query("nope", 0, 1).is_err());
    }

    #[test]
    fn test_unavailable_source() {
        let source = MemorySource::unavailable("server closed the connection");
        match source.connect() {
            Err(SourceError::Connection(reason)) => {
                assert_eq!(reason, "server closed the connection");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connect should fail"),
        }
    }

    #[test]
    fn test_injected_failure() {
        let source = MemorySource::new().with_failing_table("count", "data", rows(4), 2);
        let mut conn = source.connect().unwrap();
        let mut cursor = conn.query("data", 0, 4).unwrap();

        assert!(cursor.next_row().unwrap().is_some());
        assert!(cursor.next_row().unwrap().is_some());
        assert!(matches!(cursor.next_row(), Err(SourceError::Read { offset: 2, .. })));
    }
}
