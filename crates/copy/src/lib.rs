//! Third-party copy orchestration.
//!
//! Turns a source and destination identifier into a verified copy. Many
//! storage endpoints cannot be written or read by name: a transfer URL and
//! a reservation token must first be negotiated through a control plane,
//! and the reservation must later be finalized, aborted or released. This
//! crate owns that sequence; the byte movement itself is delegated to a
//! [`Transport`].
//!
//! # Pipeline
//!
//! 1. **Prepare**: probe both backends for quirks, resolve checksum policy
//! 2. **Resolve source**: validate the source checksum, negotiate GET
//! 3. **Resolve destination**: stat the source, delete/create-parent, negotiate PUT
//! 4. **Transfer**: hand both transfer URLs to the transport, finalize the PUT
//! 5. **Verify checksum**: compare destination against source and user values
//! 6. **Cleanup**: always runs; rolls back the destination on failure and
//!    releases the source

pub mod backend;
pub mod checksum;
pub mod events;
pub mod orchestrator;
pub mod quirks;
pub mod resolver;
pub mod rollback;

#[cfg(test)]
pub(crate) mod fake;

// Re-export primary types for convenience.
pub use backend::{BackendFuture, ControlPlane, EndpointRegistry, Endpoints, Transport};
pub use checksum::{ChecksumPolicy, ChecksumReconciler};
pub use events::EventEmitter;
pub use orchestrator::CopyOrchestrator;
pub use quirks::{QuirkDetector, apply_session_isolation};
pub use resolver::{EndpointResolver, is_absent, parent_identifier};
pub use rollback::{CleanupAction, CleanupReport, RollbackManager};
