use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog engine error type
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status}: {url}")]
    Http { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Species not resolved yet: {0}")]
    Unresolved(String),

    #[error("Unknown range id: {0}")]
    UnknownRange(u32),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let http = CatalogError::Http { status: 404, url: "https://x/pokemon/0/".into() };
        assert_eq!(http.to_string(), "HTTP error 404: https://x/pokemon/0/");
        assert_eq!(CatalogError::UnknownRange(12).to_string(), "Unknown range id: 12");
        assert_eq!(CatalogError::Cancelled.to_string(), "Operation was cancelled");
    }
}
