use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API configuration: {0}")]
    Config(String),
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Malformed response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ApiError::Http { source, .. } | ApiError::Body { source, .. } => source.is_timeout(),
            ApiError::Config(_) => false,
        }
    }
}
