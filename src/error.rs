//! Error definitions for schema resolution, overlay, and CMS access.

use thiserror::Error;

#[derive(Debug, Error)]
/// Top-level error type returned by public APIs.
pub enum StrapiError {
    /// A path references a root tag that is missing from the data environment
    /// or that is not backed by the CMS.
    #[error("configuration error: {0}")]
    ConfigError(String),
    /// A JSON value that cannot be read as a CMS schema tree.
    #[error("schema error: {0}")]
    SchemaError(String),
    /// Textual path that cannot be parsed into steps.
    #[error("path error: {0}")]
    PathError(String),
    /// Malformed data-environment document or missing configuration value.
    #[error("environment error: {0}")]
    EnvError(String),
    /// HTTP request, body read, or response decoding failure.
    #[error("fetch error: {0}")]
    FetchError(String),
    /// Output serialization failure.
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// Filesystem I/O error from CLI or callers that propagate I/O.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
