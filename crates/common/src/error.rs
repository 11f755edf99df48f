use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy '{0}' already exists")]
    DuplicateName(String),

    #[error("Strategy '{0}' not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
