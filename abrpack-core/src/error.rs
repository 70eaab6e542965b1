//! Error types shared across the packager.

use thiserror::Error;

/// Packager error type.
///
/// Every stage of packaging (validation, graph assembly, job execution)
/// reports failures through this one type so that callers see a single
/// status with a kind and a message.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied parameter or stream descriptor is invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested combination of options is not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// A file operation failed.
    #[error("File failure: {0}")]
    FileFailure(String),

    /// A downstream parser or notifier rejected the data.
    #[error("Parser failure: {0}")]
    ParserFailure(String),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packager result type.
pub type Result<T> = std::result::Result<T, Error>;
