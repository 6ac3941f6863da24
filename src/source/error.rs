use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {reason} (query: {query})")]
    Query { query: String, reason: String },

    #[error("Row read failed at offset {offset}: {reason}")]
    Read { offset: u64, reason: String },
}

pub type SourceResult<T> = Result<T, SourceError>;
