use thiserror::Error;

/// Failures reported by a host's auxiliary surface.
///
/// These never reach application code. The detector retries or skips the
/// current tick and, at most, logs them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("auxiliary surface is not attached to the document yet")]
    NotReady,

    #[error("auxiliary surface content is unreadable")]
    Unreadable,

    #[error("host error: {0}")]
    Host(String),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;
