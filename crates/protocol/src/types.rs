use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorRecord;

/// Which part of a copy an error or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Destination,
    Transfer,
    None,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Source => "source",
            Side::Destination => "destination",
            Side::Transfer => "transfer",
            Side::None => "none",
        };
        f.write_str(name)
    }
}

/// Direction of an endpoint negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read access on the source.
    Get,
    /// Write access on the destination.
    Put,
}

impl Role {
    /// The side a negotiation in this role belongs to.
    pub fn side(self) -> Side {
        match self {
            Role::Get => Side::Source,
            Role::Put => Side::Destination,
        }
    }
}

/// Copy phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    ResolveSource,
    ResolveDestination,
    Transfer,
    VerifyChecksum,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::ResolveSource => "resolve_source",
            Phase::ResolveDestination => "resolve_destination",
            Phase::Transfer => "transfer",
            Phase::VerifyChecksum => "verify_checksum",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// A checksum declared by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChecksum {
    /// Algorithm name. Empty means "use the configured default".
    #[serde(default)]
    pub algorithm: String,
    /// Expected value. Empty means only the algorithm was chosen.
    #[serde(default)]
    pub value: String,
}

impl UserChecksum {
    pub fn new(algorithm: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value: value.into(),
        }
    }

    /// Parses `ALGORITHM[:VALUE]`.
    pub fn parse(input: &str) -> Self {
        match input.split_once(':') {
            Some((algorithm, value)) => Self::new(algorithm.trim(), value.trim()),
            None => Self::new(input.trim(), ""),
        }
    }
}

/// Per-request copy parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferParams {
    /// Delete an existing destination before writing.
    pub replace_existing: bool,
    /// Create the destination's parent directory if missing.
    pub create_parent_dir: bool,
    /// Verify checksums on both sides.
    pub checksum_check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_checksum: Option<UserChecksum>,
    pub strict_copy_mode: bool,
}

/// One copy operation: a source, a destination, and how to treat them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub params: TransferParams,
}

impl TransferRequest {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        params: TransferParams,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            params,
        }
    }
}

/// Options handed to the transport layer for the actual byte movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    pub checksum_check: bool,
    pub replace_existing: bool,
    pub create_parent_dir: bool,
    pub strict_copy_mode: bool,
}

impl From<&TransferParams> for TransportOptions {
    fn from(params: &TransferParams) -> Self {
        Self {
            checksum_check: params.checksum_check,
            replace_existing: params.replace_existing,
            create_parent_dir: params.create_parent_dir,
            strict_copy_mode: params.strict_copy_mode,
        }
    }
}

/// A reservation granted by a control plane for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub transfer_endpoint: String,
    pub token: String,
}

/// Result of resolving one side of a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointNegotiation {
    pub transfer_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_token: Option<String>,
    pub is_indirect: bool,
}

impl EndpointNegotiation {
    /// The identifier is already transferable as-is.
    pub fn direct(identifier: impl Into<String>) -> Self {
        Self {
            transfer_endpoint: identifier.into(),
            reservation_token: None,
            is_indirect: false,
        }
    }

    /// Wraps a reservation. An empty token is stored as `None`.
    pub fn negotiated(reservation: Reservation) -> Self {
        let token = (!reservation.token.is_empty()).then_some(reservation.token);
        Self {
            transfer_endpoint: reservation.transfer_endpoint,
            reservation_token: token,
            is_indirect: true,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.reservation_token.as_deref()
    }
}

/// Checksums gathered while a copy runs.
///
/// Each value is written at most once; later writes are ignored and only
/// the first measurement is compared against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumState {
    algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_declared: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination_value: Option<String>,
}

impl ChecksumState {
    pub fn new(algorithm: impl Into<String>, user_declared: Option<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            user_declared: user_declared.filter(|v| !v.is_empty()),
            source_value: None,
            destination_value: None,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn user_declared(&self) -> Option<&str> {
        self.user_declared.as_deref()
    }

    pub fn source_value(&self) -> Option<&str> {
        self.source_value.as_deref()
    }

    pub fn destination_value(&self) -> Option<&str> {
        self.destination_value.as_deref()
    }

    /// Records the source checksum. Returns `false` if one was already set.
    pub fn record_source(&mut self, value: impl Into<String>) -> bool {
        set_once(&mut self.source_value, value.into())
    }

    /// Records the destination checksum. Returns `false` if one was already set.
    pub fn record_destination(&mut self, value: impl Into<String>) -> bool {
        set_once(&mut self.destination_value, value.into())
    }
}

fn set_once(slot: &mut Option<String>, value: String) -> bool {
    if slot.is_some() || value.is_empty() {
        return false;
    }
    *slot = Some(value);
    true
}

/// Terminal record of one copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub phase_reached: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(default)]
    pub checksums: ChecksumState,
}

impl TransferOutcome {
    pub fn succeeded(checksums: ChecksumState) -> Self {
        Self {
            phase_reached: Phase::Done,
            error: None,
            checksums,
        }
    }

    pub fn failed(phase: Phase, error: ErrorRecord, checksums: ChecksumState) -> Self {
        Self {
            phase_reached: phase,
            error: Some(error),
            checksums,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Records `error` as having stopped the copy at `phase`, unless an
    /// error is already present.
    ///
    /// Returns the error back when it was not recorded. A recorded error
    /// never leaves the outcome at [`Phase::Done`].
    pub fn record_if_absent(&mut self, phase: Phase, error: ErrorRecord) -> Option<ErrorRecord> {
        if self.error.is_some() {
            return Some(error);
        }
        self.phase_reached = phase;
        self.error = Some(error);
        None
    }
}

/// Size information for an identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub size: u64,
}

/// Introspection metadata returned by a control-plane probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeInfo {
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ProbeInfo {
    pub const BACKEND_TYPE: &'static str = "backend_type";

    pub fn with_backend_type(backend: impl Into<String>) -> Self {
        let mut extra = BTreeMap::new();
        extra.insert(Self::BACKEND_TYPE.to_string(), backend.into());
        Self { extra }
    }

    pub fn backend_type(&self) -> Option<&str> {
        self.extra.get(Self::BACKEND_TYPE).map(String::as_str)
    }
}

/// Backend incompatibilities detected for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuirkProfile {
    /// Backend identity reported by the probe, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    /// The transport must not reuse sessions or stat on open.
    pub needs_session_isolation: bool,
}

impl QuirkProfile {
    /// Nothing to adapt (direct endpoints, or a compatible backend).
    pub fn none() -> Self {
        Self::default()
    }

    /// The backend could not be identified; assume it may be quirky.
    pub fn unknown() -> Self {
        Self {
            backend_type: None,
            needs_session_isolation: true,
        }
    }

    pub fn identified(backend_type: impl Into<String>, needs_session_isolation: bool) -> Self {
        Self {
            backend_type: Some(backend_type.into()),
            needs_session_isolation,
        }
    }
}
