//! Error taxonomy for source classification, allocation and provisioning.
//!
//! Per-candidate failures (`NotFound`, `Unsupported`, `ExternalToolFailure`)
//! are recovered by the slot allocator. `InvalidArgument` raised while loading
//! configuration and `CapacityExhausted` raised after allocation are fatal to
//! startup.

use thiserror::Error;

/// Coarse classification of a [`ProvisionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Unsupported,
    ExternalToolFailure,
    CapacityExhausted,
    Server,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("link-control command `{command}` failed ({})", describe_status(.status))]
    ExternalToolFailure {
        command: String,
        status: Option<i32>,
    },

    #[error("not enough cameras: filled {filled} of {capacity} slots")]
    CapacityExhausted { filled: usize, capacity: usize },

    #[error("stream server error: {0}")]
    Server(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument(detail.into())
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::Unsupported(detail.into())
    }

    pub fn server(detail: impl Into<String>) -> Self {
        Self::Server(detail.into())
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The error kind. I/O failures map to `NotFound` when the OS reports a
    /// missing entry and to `InvalidArgument` otherwise.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::ExternalToolFailure { .. } => ErrorKind::ExternalToolFailure,
            Self::CapacityExhausted { .. } => ErrorKind::CapacityExhausted,
            Self::Server(_) => ErrorKind::Server,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Io { .. } => ErrorKind::InvalidArgument,
        }
    }

    /// True for failures that only disqualify one candidate source.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::Unsupported | ErrorKind::ExternalToolFailure
        )
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated without an exit status".to_string(),
    }
}
