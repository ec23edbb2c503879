//! Transport error types.

use reqwest::StatusCode;

/// Why a single protocol request did not produce the expected response.
#[derive(Debug, thiserror::Error)]
pub enum RequestFailure {
    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("transport error after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors produced by the TUS transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("location path is not set")]
    NoRemoteResource,

    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    #[error("cannot create a remote upload: {0}")]
    CreationRejected(RequestFailure),

    #[error("cannot fetch offset and length: {0}")]
    OffsetQueryFailed(RequestFailure),

    #[error("cannot upload a chunk: {0}")]
    PatchRejected(RequestFailure),
}

impl TransportError {
    /// Returns `true` if the server answered with an unexpected status, as
    /// opposed to the request never getting a response.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::CreationRejected(RequestFailure::Status(_))
                | Self::OffsetQueryFailed(RequestFailure::Status(_))
                | Self::PatchRejected(RequestFailure::Status(_))
        )
    }
}
