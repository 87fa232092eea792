//! Error taxonomy for the sidecar
//!
//! Every failure is folded into one of four kinds. The kind only selects the
//! log prefix; whether an error is fatal is decided by the caller.

use thiserror::Error;
use tracing::error;

/// Classification of a sidecar failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Metadata,
    Context,
    RemoteAccess,
    Unknown,
}

#[derive(Debug, Error)]
pub enum SidecarError {
    /// Task metadata could not be fetched or decoded
    #[error("Error importing task metadata: {0}")]
    Metadata(String),

    /// Discovered task context violates an invariant
    #[error("Task context incorrect: {0}")]
    Context(String),

    /// A control-plane call exhausted retries or failed permanently
    #[error("Unable to access AWS API: {0}")]
    RemoteAccess(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SidecarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SidecarError::Metadata(_) => ErrorKind::Metadata,
            SidecarError::Context(_) => ErrorKind::Context,
            SidecarError::RemoteAccess(_) => ErrorKind::RemoteAccess,
            SidecarError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Log the error with its kind prefix
    ///
    /// When `fatal` is set an extra line announces that the process is about
    /// to exit uncleanly. The caller is responsible for actually exiting.
    pub fn report(&self, fatal: bool) {
        error!(kind = ?self.kind(), "{}", self);
        if fatal {
            error!("Previous error was fatal, exiting process uncleanly");
        }
    }
}
