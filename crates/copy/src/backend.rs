//! Collaborator traits.
//!
//! Storage backends implement these on top of their own clients. Keeping
//! them as traits decouples the copy sequence from any wire protocol and
//! makes every phase testable with fakes.

use std::future::Future;
use std::pin::Pin;

use tpcopy_protocol::{BackendError, FileStat, ProbeInfo, Reservation, TransportOptions};

/// Boxed future returned by collaborator calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Decides which identifiers need a transfer URL negotiated first.
pub trait EndpointRegistry: Send + Sync {
    fn requires_negotiation(&self, identifier: &str) -> bool;
}

/// Control-plane operations on storage identifiers.
///
/// Negotiation calls are atomic from the caller's point of view: a failed
/// `resolve_*` leaves no reservation behind.
pub trait ControlPlane: Send + Sync {
    /// Reserves read access and returns a transfer URL for it.
    fn resolve_get(&self, identifier: &str) -> BackendFuture<'_, Reservation>;

    /// Reserves write access for `expected_size` bytes (0 when unknown).
    fn resolve_put(&self, identifier: &str, expected_size: u64) -> BackendFuture<'_, Reservation>;

    /// Commits a completed PUT reservation.
    fn finalize_put(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()>;

    /// Cancels an unfinished PUT reservation.
    fn abort_put(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()>;

    /// Releases a GET reservation.
    fn release_get(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()>;

    fn delete(&self, identifier: &str) -> BackendFuture<'_, ()>;

    /// Creates `directory` and any missing ancestors.
    fn make_parent_dirs(&self, directory: &str) -> BackendFuture<'_, ()>;

    fn stat(&self, identifier: &str) -> BackendFuture<'_, FileStat>;

    /// Returns the stored checksum; an empty string means none is known.
    fn checksum(&self, identifier: &str, algorithm: &str) -> BackendFuture<'_, String>;

    /// Lightweight liveness/introspection call.
    fn probe(&self, identifier: &str) -> BackendFuture<'_, ProbeInfo>;
}

/// Moves bytes between two transfer URLs.
pub trait Transport: Send + Sync {
    fn transfer(
        &self,
        source: &str,
        destination: &str,
        options: &TransportOptions,
    ) -> BackendFuture<'_, ()>;
}

/// The collaborators one copy runs against.
#[derive(Clone, Copy)]
pub struct Endpoints<'a> {
    pub registry: &'a dyn EndpointRegistry,
    pub control: &'a dyn ControlPlane,
    pub transport: &'a dyn Transport,
}

impl<'a> Endpoints<'a> {
    pub fn new(
        registry: &'a dyn EndpointRegistry,
        control: &'a dyn ControlPlane,
        transport: &'a dyn Transport,
    ) -> Self {
        Self {
            registry,
            control,
            transport,
        }
    }
}
