//! Error types for the Switchboard domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Switchboard operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation ---
    #[error("Invalid request: {0}")]
    Validation(String),

    // --- Unknown actor / chat ---
    #[error("Not found: {0}")]
    NotFound(String),

    // --- Provider configuration errors ---
    #[error("Provider configuration error: {0}")]
    ProviderConfiguration(String),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

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

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed for model '{model}': {message} (status: {status_code})")]
    ApiError {
        model: String,
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation failed after trying models [{}]: {last_error}", attempted.join(", "))]
    AllModelsFailed {
        attempted: Vec<String>,
        last_error: String,
    },
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Write conflict on '{key}': expected version {expected}, found {found}")]
    WriteConflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Record serialization failed: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            model: "gpt-4o".into(),
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("gpt-4o"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn all_models_failed_names_every_attempt() {
        let err = ProviderError::AllModelsFailed {
            attempted: vec!["gemini-1.5-pro".into(), "gemini-1.5-flash".into()],
            last_error: "status 500".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gemini-1.5-pro"));
        assert!(msg.contains("gemini-1.5-flash"));
        assert!(msg.contains("status 500"));
    }

    #[test]
    fn write_conflict_names_versions() {
        let err = StoreError::WriteConflict {
            key: "chats/c1".into(),
            expected: 3,
            found: 4,
        };
        assert!(err.to_string().contains("chats/c1"));
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('4'));
    }
}
