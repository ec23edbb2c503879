//! TUS transport.
//!
//! Issues the protocol operations (capability query, resource creation,
//! offset query, data patch) against a single server over a pooled
//! `reqwest` client, and turns non-conforming responses into typed errors.

pub mod error;
pub mod transport;

pub use error::{RequestFailure, TransportError};
pub use transport::{OffsetState, Transport, TransportOptions};

use std::time::Duration;

/// Default timeout for establishing a connection to the server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
