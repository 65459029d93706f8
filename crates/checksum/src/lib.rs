//! Checksum naming, normalized comparison and local computation.
//!
//! Control planes report checksums as strings in whatever case and padding
//! their backend prefers; [`checksums_match`] is the single place that decides
//! whether two of them agree.

mod algorithm;
mod compare;
mod compute;

pub use algorithm::ChecksumAlgorithm;
pub use compare::{checksums_match, normalize_checksum};
pub use compute::{calculate_file_checksum, checksum_bytes};

/// Errors produced by the checksum crate.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
