//! Error types for bm-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for bm-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bm-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file or setting error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bucket name that cannot be used as a local directory
    #[error("Invalid bucket name: {0}")]
    InvalidBucket(String),

    /// Object key that cannot be mapped under the destination root
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// The initial bucket listing failed
    #[error("Listing bucket '{bucket}' failed: {source}")]
    ListingFailed {
        bucket: String,
        #[source]
        source: Box<Error>,
    },

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Wrap a backend error as a listing failure for `bucket`
    pub fn listing_failed(bucket: impl Into<String>, source: Error) -> Self {
        Error::ListingFailed {
            bucket: bucket.into(),
            source: Box::new(source),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_)
            | Error::InvalidBucket(_)
            | Error::InvalidKey(_)
            | Error::TomlParse(_)
            | Error::InvalidUrl(_) => 2, // UsageError
            Error::Network(_) => 3,  // NetworkError
            Error::Auth(_) => 4,     // AuthError
            Error::NotFound(_) => 5, // NotFound
            Error::ListingFailed { source, .. } => source.exit_code(),
            _ => 1, // GeneralError
        }
    }
}
