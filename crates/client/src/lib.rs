//! Resumable uploads to TUS servers.
//!
//! [`Client`] negotiates capabilities with the server, creates an upload
//! resource, reconciles the offset and streams the data in a single
//! `PATCH`. Sources can be local files, remote URLs (downloaded and
//! uploaded concurrently) or any [`UploadSource`].

mod client;
mod config;
mod error;
mod session;

pub use client::{Client, Uploaded};
pub use config::ClientConfig;
pub use error::{BrokenCause, UploadError};
pub use session::UploadSession;

pub use tus_protocol::Metadata;
pub use tus_stream::{FileSource, ProgressCallback, UploadSource};
