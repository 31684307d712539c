//! Desk error taxonomy.
//!
//! Every variant is recovered inside the per-message task: the engine maps
//! it to a user reply and, except for validation, clears the session.

use thiserror::Error;

/// Result type for fulfillment operations.
pub type DeskResult<T> = Result<T, DeskError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeskError {
    /// Bad input at the current step. Session unchanged.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Portal rejected the credentials or issued no session.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Upstream answered, but with data we cannot use.
    #[error("Upstream data error: {0}")]
    UpstreamData(String),

    /// Network or I/O failure talking to a collaborator.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DeskError {
    /// Short label for structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authentication(_) => "authentication",
            Self::UpstreamData(_) => "upstream_data",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for DeskError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::UpstreamData(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<rusqlite::Error> for DeskError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Transport(format!("sqlite: {e}"))
    }
}

impl From<tokio::task::JoinError> for DeskError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Transport(format!("blocking task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(DeskError::Validation("x".into()).kind(), "validation");
        assert_eq!(DeskError::Authentication("x".into()).kind(), "authentication");
        assert_eq!(DeskError::UpstreamData("x".into()).kind(), "upstream_data");
        assert_eq!(DeskError::Transport("x".into()).kind(), "transport");
    }

    #[test]
    fn test_display() {
        let err = DeskError::Authentication("Invalid username or password.".into());
        assert_eq!(
            err.to_string(),
            "Authentication failed: Invalid username or password."
        );
    }
}
