//! Errors surfaced by the exchange transport.

use thiserror::Error;

/// Failure of a single exchange request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExchangeError {
    /// Request could not be sent or the connection failed
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Exchange answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Exchange answered with `success: false` or a non-zero code
    #[error("Exchange error {code}: {message}")]
    Api { code: i64, message: String },

    /// Body did not match the expected shape
    #[error("Failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
