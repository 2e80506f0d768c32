//! Error types for the Scriptorium domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Conflict detection is deliberately absent from this taxonomy: a detected
//! contradiction is a first-class result attached to the evolved note, not a
//! failure, and never blocks a write.

use thiserror::Error;

/// The top-level error type for all Scriptorium operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Note store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Chain / bedside-note errors ---
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    // --- Text generation errors ---
    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the persistence collaborator. Always propagated untouched —
/// silently losing a write would corrupt chain integrity.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Structural failures in chain and bedside-note operations.
/// These are fail-fast: a missing note or missing scope is a programming
/// error at the call site, not recoverable input.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("Project-scoped operation invoked without a project id: {operation}")]
    MissingScope { operation: String },

    #[error("Chain version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u32, actual: u32 },

    #[error("Invalid section mutation: {0}")]
    InvalidMutation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    #[error("Generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Generator not configured")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_error_displays_correctly() {
        let err = Error::Chain(ChainError::VersionConflict {
            expected: 3,
            actual: 4,
        });
        assert!(err.to_string().contains("expected 3"));
        assert!(err.to_string().contains("found 4"));
    }

    #[test]
    fn missing_scope_names_the_operation() {
        let err = Error::Chain(ChainError::MissingScope {
            operation: "evolve_bedside_note".into(),
        });
        assert!(err.to_string().contains("evolve_bedside_note"));
        assert!(err.to_string().contains("without a project id"));
    }

    #[test]
    fn store_error_converts_through_chain() {
        let err: ChainError = StoreError::Storage("disk full".into()).into();
        assert!(err.to_string().contains("disk full"));
    }
}
