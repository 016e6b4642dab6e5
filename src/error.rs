use thiserror::Error;

/// Failures a query can surface across the tool boundary. Per-file and
/// per-symbol degradations never reach here; they are contained to the
/// build unit that produced them.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no graph built yet; call init_project first")]
    NotReady,

    #[error("build timed out after {elapsed_ms}ms; previous graph retained")]
    BuildTimeout { elapsed_ms: u64 },

    #[error("symbol not found: '{name}'")]
    SymbolNotFound { name: String, suggestions: Vec<String> },

    #[error("file not found in graph: '{path}'")]
    UnknownFile { path: String },
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NotReady => "not_ready",
            QueryError::BuildTimeout { .. } => "build_timeout",
            QueryError::SymbolNotFound { .. } => "symbol_not_found",
            QueryError::UnknownFile { .. } => "unknown_file",
        }
    }
}
