use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by persistence, snippet loading and process setup.
///
/// The typing engine itself (exclusion, clock, input handling) has no error path.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("snippet json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stats database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv export error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no embedded snippet for `{0}`")]
    SnippetNotFound(String),
    #[error("no snippet files found in `{0}`")]
    EmptySnippetDir(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
}
