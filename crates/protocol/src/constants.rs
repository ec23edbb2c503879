use reqwest::header::HeaderName;

/// Protocol version sent in every `Tus-Resumable` header.
pub const TUS_VERSION: &str = "1.0.0";

/// Default upper bound for a single read from an upload source (50 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 50 * 1024 * 1024;

/// Default number of attempts for retried requests.
pub const DEFAULT_RETRIES: u32 = 5;

/// Media type required on every `PATCH` body.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Extension a server must advertise before uploads can be created.
pub const EXTENSION_CREATION: &str = "creation";

/// The version of the protocol used by the client or the server.
pub const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");

/// Comma-separated list of extensions supported by the server.
pub const TUS_EXTENSION: HeaderName = HeaderName::from_static("tus-extension");

/// Byte offset within an upload resource.
pub const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");

/// Size of the entire upload, in bytes.
pub const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");

/// Serialized key/value pairs describing the upload.
pub const UPLOAD_METADATA: HeaderName = HeaderName::from_static("upload-metadata");
