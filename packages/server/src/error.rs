//! Server startup and runtime errors.

use thiserror::Error;

use crate::domain::RepositoryError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Failed to open the chat database: {0}")]
    Database(#[from] RepositoryError),
}
