//! Upload sources for the TUS client.
//!
//! Every source is read through an [`ObservedStream`], which reports
//! progress before each read. Two concrete sources exist: [`FileSource`]
//! for local files and [`PipeSource`], which is fed by a background
//! [`ProducerWorker`] pulling a remote HTTP body.

mod observed;
mod pipe;
mod remote;
mod source;

pub use observed::{ObservedStream, ProgressCallback, SharedSource};
pub use pipe::{PipeSource, ProducerWorker};
pub use remote::RemoteSource;
pub use source::{FileSource, UploadSource};

/// Capacity of the in-memory pipe between download and upload (256 KiB).
pub const DEFAULT_PIPE_CAPACITY: usize = 256 * 1024;

/// Largest single read issued against a source while streaming a body.
pub const STREAM_BUFFER_SIZE: usize = 256 * 1024;

/// Errors produced while opening or reading a source.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source responded with status {0}")]
    Status(reqwest::StatusCode),
}
