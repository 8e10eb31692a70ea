//! Error types for brekkie-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::remote::GatewayError;

/// Result type alias using brekkie-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in brekkie-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Recipe, meal, or profile not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote table or storage call failed
    #[error(transparent)]
    Remote(#[from] GatewayError),

    /// Auth API or session persistence failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Operation requires a signed-in user
    #[error("Please log in to continue")]
    NotAuthenticated,

    /// Remote backend is not configured for this build
    #[error("Remote backend is not configured")]
    NotConfigured,
}
