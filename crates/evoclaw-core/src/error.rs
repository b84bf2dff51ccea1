//! Typed error kinds shared by every EvoClaw subsystem.
//!
//! Library crates return `Result<T, Error>` at their public boundary;
//! `evoclaw-server` maps `ErrorKind` to an HTTP status code.
//! Internal plumbing is free to use `anyhow::Result` and attach `.context(...)`
//! before converting into one of these kinds at the seam.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Unauthorized,
    Forbidden,
    Unavailable,
    Timeout,
    Cancelled,
    Internal,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_kind() {
        assert_eq!(Error::not_found("x").kind, ErrorKind::NotFound);
        assert_eq!(Error::invalid_argument("x").kind, ErrorKind::InvalidArgument);
        assert_eq!(Error::unauthorized("x").kind, ErrorKind::Unauthorized);
        assert_eq!(Error::forbidden("x").kind, ErrorKind::Forbidden);
        assert_eq!(Error::unavailable("x").kind, ErrorKind::Unavailable);
        assert_eq!(Error::timeout("x").kind, ErrorKind::Timeout);
        assert_eq!(Error::cancelled("x").kind, ErrorKind::Cancelled);
        assert_eq!(Error::internal("x").kind, ErrorKind::Internal);
    }
}
