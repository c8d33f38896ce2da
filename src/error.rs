use std::path::PathBuf;
use thiserror::Error;

/// Classification of a failed operation.
///
/// Every fault raised inside the archive layer maps onto exactly one of
/// these, which is what ends up attached to a failed [`crate::Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Declared archive type and path extension disagree
    FormatMismatch,
    /// Operation requested against a format with no implementation
    UnsupportedFormat,
    /// Extracted content does not match the checksum manifest
    IntegrityFailure,
    /// Native archiving tool missing or exited non-zero
    BackendFault,
    /// File system or codec error
    IoFailure,
    /// Malformed or out-of-sequence line at the session layer
    ProtocolFault,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid archive type. Expected {expected} archive, got {}", path.display())]
    FormatMismatch {
        expected: &'static str,
        path: PathBuf,
    },

    #[error("{0}")]
    Unsupported(String),

    #[error("Checksum verification failed: {0}")]
    Integrity(String),

    #[error("{tool} `{verb}` failed: {detail}")]
    Backend {
        tool: String,
        verb: &'static str,
        detail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            ArchiveError::Unsupported(_) => ErrorKind::UnsupportedFormat,
            ArchiveError::Integrity(_) => ErrorKind::IntegrityFailure,
            ArchiveError::Backend { .. } => ErrorKind::BackendFault,
            ArchiveError::Io(_) | ArchiveError::Zip(_) => ErrorKind::IoFailure,
            ArchiveError::Protocol(_) => ErrorKind::ProtocolFault,
        }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ArchiveError>;
