use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures outside of parsing itself, which always yields a tree
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Invalid options: {0}")]
    Options(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_tree<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidTree(e.to_string())
    }

    pub fn options<E: std::fmt::Display>(e: E) -> Self {
        Self::Options(e.to_string())
    }
}
