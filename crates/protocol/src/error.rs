//! Error taxonomy shared by the copy core and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Side;

/// Category of a copy failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    /// Treated as success wherever "delete if exists" is meant.
    NotFound,
    NegotiationFailed,
    EmptyChecksum,
    ChecksumMismatch,
    /// The checksum could not be retrieved at all.
    ChecksumUnavailable,
    Cancelled,
    TransferFailed,
    FinalizeFailed,
    DestinationExists,
    /// Deleting an existing destination failed.
    OverwriteFailed,
    ParentDirFailed,
    AbortFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotFound => "not found",
            ErrorKind::NegotiationFailed => "negotiation failed",
            ErrorKind::EmptyChecksum => "empty checksum",
            ErrorKind::ChecksumMismatch => "checksum mismatch",
            ErrorKind::ChecksumUnavailable => "checksum unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::TransferFailed => "transfer failed",
            ErrorKind::FinalizeFailed => "finalize failed",
            ErrorKind::DestinationExists => "destination exists",
            ErrorKind::OverwriteFailed => "overwrite failed",
            ErrorKind::ParentDirFailed => "parent directory creation failed",
            ErrorKind::AbortFailed => "abort failed",
        };
        f.write_str(name)
    }
}

/// The one error surfaced to the caller of a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{side} {kind}: {message}")]
pub struct ErrorRecord {
    pub side: Side,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(side: Side, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            side,
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(Side::None, ErrorKind::Cancelled, "copy cancelled before transfer")
    }
}

/// Error vocabulary spoken by control planes and transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorCode {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    PermissionDenied,
    Unsupported,
    TimedOut,
    Io,
    Other,
}

impl fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendErrorCode::NotFound => "not found",
            BackendErrorCode::InvalidArgument => "invalid argument",
            BackendErrorCode::AlreadyExists => "already exists",
            BackendErrorCode::PermissionDenied => "permission denied",
            BackendErrorCode::Unsupported => "unsupported",
            BackendErrorCode::TimedOut => "timed out",
            BackendErrorCode::Io => "I/O error",
            BackendErrorCode::Other => "error",
        };
        f.write_str(name)
    }
}

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: BackendErrorCode,
    pub message: String,
}

impl BackendError {
    pub fn new(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == BackendErrorCode::NotFound
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let code = match e.kind() {
            Io::NotFound => BackendErrorCode::NotFound,
            Io::AlreadyExists => BackendErrorCode::AlreadyExists,
            Io::PermissionDenied => BackendErrorCode::PermissionDenied,
            Io::InvalidInput => BackendErrorCode::InvalidArgument,
            Io::TimedOut => BackendErrorCode::TimedOut,
            Io::Unsupported => BackendErrorCode::Unsupported,
            _ => BackendErrorCode::Io,
        };
        Self::new(code, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_record_display() {
        let e = ErrorRecord::new(Side::Source, ErrorKind::EmptyChecksum, "empty source checksum");
        assert_eq!(e.to_string(), "source empty checksum: empty source checksum");
    }

    #[test]
    fn cancelled_has_no_side() {
        let e = ErrorRecord::cancelled();
        assert_eq!(e.side, Side::None);
        assert_eq!(e.kind, ErrorKind::Cancelled);
    }

    #[test]
    fn io_errors_map_to_backend_codes() {
        let e = BackendError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(e.is_not_found());

        let e = BackendError::from(std::io::Error::from(std::io::ErrorKind::AlreadyExists));
        assert_eq!(e.code, BackendErrorCode::AlreadyExists);

        let e = BackendError::from(std::io::Error::other("disk on fire"));
        assert_eq!(e.code, BackendErrorCode::Io);
    }

    #[test]
    fn error_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::ChecksumMismatch).unwrap(),
            "\"checksum_mismatch\""
        );
    }
}
