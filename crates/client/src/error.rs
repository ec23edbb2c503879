//! Upload error types.

use tus_stream::StreamError;
use tus_transport::TransportError;

/// Why an upload broke after data transfer started.
#[derive(Debug, thiserror::Error)]
pub enum BrokenCause {
    #[error("cannot send a chunk: {0}")]
    Patch(TransportError),

    #[error("server acknowledged offset {actual}, expected {expected}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("source producer failed: {0}")]
    Producer(std::io::Error),
}

/// Errors produced by an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("cannot upload a stream of unknown size")]
    UnknownLength,

    #[error("server does not support the '{0}' extension")]
    UnsupportedOperation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Any failure of the data transfer step. The cause is kept so callers
    /// can still tell a server rejection from a dropped connection.
    #[error("broken upload: {0}")]
    BrokenUpload(BrokenCause),

    #[error("source error: {0}")]
    Source(#[from] StreamError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` for failures of the data transfer step, whatever
    /// their cause.
    pub fn is_broken_upload(&self) -> bool {
        matches!(self, Self::BrokenUpload(_))
    }
}
