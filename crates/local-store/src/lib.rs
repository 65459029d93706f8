//! Filesystem-backed collaborators for the copy orchestrator.
//!
//! `file://` paths (and bare absolute paths) are transferred directly.
//! `stage://` paths behave like a storage element that hands out transfer
//! URLs: a GET pins the file, a PUT writes to a staging sibling that is
//! renamed into place on finalize.

mod control;
mod path;
mod transport;

pub use control::{LocalControlPlane, LocalRegistry};
pub use path::{FILE_SCHEME, STAGE_SCHEME, file_url, staging_path, to_path};
pub use transport::LocalTransport;

use tpcopy_copy::Endpoints;

/// Registry, control plane and transport for local storage.
#[derive(Debug, Default)]
pub struct LocalStore {
    pub registry: LocalRegistry,
    pub control: LocalControlPlane,
    pub transport: LocalTransport,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `backend` as the probed backend type of every path.
    pub fn with_backend_type(backend: impl Into<String>) -> Self {
        Self {
            control: LocalControlPlane::new().with_backend_type(backend),
            ..Self::default()
        }
    }

    pub fn endpoints(&self) -> Endpoints<'_> {
        Endpoints::new(&self.registry, &self.control, &self.transport)
    }
}
