//! Shared data model for third-party copies.
//!
//! Every crate in the workspace speaks these types: the request a caller
//! hands in, the negotiation results for each side, the checksum state that
//! accumulates while a copy runs, and the single outcome handed back.

pub mod error;
pub mod events;
pub mod types;

// Re-export primary types for convenience.
pub use error::{BackendError, BackendErrorCode, ErrorKind, ErrorRecord};
pub use events::{EventStage, TransferEvent};
pub use types::{
    ChecksumState, EndpointNegotiation, FileStat, Phase, ProbeInfo, QuirkProfile, Reservation,
    Role, Side, TransferOutcome, TransferParams, TransferRequest, TransportOptions, UserChecksum,
};
