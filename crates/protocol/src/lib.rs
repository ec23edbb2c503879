//! Wire-level building blocks of the TUS resumable upload protocol.
//!
//! Holds the protocol constants, header names and the small codecs the
//! client needs: `Upload-Metadata` serialization, `Tus-Extension` parsing
//! and offset header parsing.

pub mod constants;
pub mod headers;
pub mod metadata;

pub use constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_RETRIES, EXTENSION_CREATION, OFFSET_OCTET_STREAM, TUS_VERSION,
};
pub use headers::{parse_extensions, parse_offset};
pub use metadata::{Metadata, MetadataError};
