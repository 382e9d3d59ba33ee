use std::path::PathBuf;

use thiserror::Error;

/// Reasons an edit proposal could not be applied.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("No workspace folder found")]
    NoWorkspace,

    #[error("Failed to apply edit")]
    Rejected,

    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("No response from {0}")]
    NoResponse(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0} did not answer within {1} seconds")]
    Timeout(String, u64),
}
