//! Error types for the audit engine

use thiserror::Error;

/// Result type alias for audit-engine operations
pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {

    // =============================
    // Input Errors
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Batch error: {0}")]
    Batch(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("LLM error: {0}")]
    Llm(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
