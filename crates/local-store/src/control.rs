use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tpcopy_checksum::{ChecksumAlgorithm, calculate_file_checksum};
use tpcopy_copy::{BackendFuture, ControlPlane, EndpointRegistry};
use tpcopy_protocol::{
    BackendError, BackendErrorCode, FileStat, ProbeInfo, Reservation,
};
use uuid::Uuid;

use crate::path::{STAGE_SCHEME, file_url, io_error, staging_path, to_path};

/// `stage://` identifiers must be negotiated; everything else is direct.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRegistry;

impl EndpointRegistry for LocalRegistry {
    fn requires_negotiation(&self, identifier: &str) -> bool {
        identifier.starts_with(STAGE_SCHEME)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lease {
    /// Source pinned for reading.
    Pin { path: PathBuf },
    /// Destination being written through a staging file.
    Put { target: PathBuf, staging: PathBuf },
}

/// Control plane over the local filesystem.
///
/// Reservations live in memory and are keyed by a random token.
#[derive(Debug, Default)]
pub struct LocalControlPlane {
    backend_type: Option<String>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl LocalControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `backend` from [`ControlPlane::probe`].
    pub fn with_backend_type(mut self, backend: impl Into<String>) -> Self {
        self.backend_type = Some(backend.into());
        self
    }

    /// Number of reservations not yet finalized, aborted or released.
    pub fn open_reservations(&self) -> usize {
        self.leases().len()
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<String, Lease>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_lease(&self, token: &str, identifier: &str) -> Result<Lease, BackendError> {
        self.leases().remove(token).ok_or_else(|| {
            BackendError::new(
                BackendErrorCode::InvalidArgument,
                format!("unknown reservation {token} for {identifier}"),
            )
        })
    }
}

impl ControlPlane for LocalControlPlane {
    fn resolve_get(&self, identifier: &str) -> BackendFuture<'_, Reservation> {
        let identifier = identifier.to_string();
        Box::pin(async move {
            let path = to_path(&identifier)?;
            let meta = tokio::fs::metadata(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            if meta.is_dir() {
                return Err(BackendError::new(
                    BackendErrorCode::InvalidArgument,
                    format!("{} is a directory", path.display()),
                ));
            }
            let token = Uuid::new_v4().to_string();
            let turl = file_url(&path);
            self.leases().insert(token.clone(), Lease::Pin { path });
            tracing::debug!(identifier = %identifier, token = %token, "source pinned");
            Ok(Reservation {
                transfer_endpoint: turl,
                token,
            })
        })
    }

    fn resolve_put(&self, identifier: &str, expected_size: u64) -> BackendFuture<'_, Reservation> {
        let identifier = identifier.to_string();
        Box::pin(async move {
            let target = to_path(&identifier)?;
            if tokio::fs::try_exists(&target)
                .await
                .map_err(|e| io_error(&target, e))?
            {
                return Err(BackendError::new(
                    BackendErrorCode::AlreadyExists,
                    format!("{} already exists", target.display()),
                ));
            }
            if let Some(parent) = target.parent()
                && !tokio::fs::try_exists(parent).await.unwrap_or(false)
            {
                return Err(BackendError::not_found(format!(
                    "parent directory {} does not exist",
                    parent.display()
                )));
            }

            let token = Uuid::new_v4().to_string();
            let staging = staging_path(&target, &token);
            let turl = file_url(&staging);
            tracing::debug!(
                identifier = %identifier,
                token = %token,
                expected_size,
                staging = %staging.display(),
                "destination reserved"
            );
            self.leases()
                .insert(token.clone(), Lease::Put { target, staging });
            Ok(Reservation {
                transfer_endpoint: turl,
                token,
            })
        })
    }

    fn finalize_put(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()> {
        let identifier = identifier.to_string();
        let token = token.to_string();
        Box::pin(async move {
            let Lease::Put { target, staging } = self.take_lease(&token, &identifier)? else {
                return Err(BackendError::new(
                    BackendErrorCode::InvalidArgument,
                    format!("reservation {token} is not a PUT"),
                ));
            };
            if let Err(e) = tokio::fs::rename(&staging, &target).await {
                // Keep the lease so an abort can still remove the staging file.
                self.leases()
                    .insert(token, Lease::Put { target, staging: staging.clone() });
                return Err(io_error(&staging, e));
            }
            tracing::debug!(identifier = %identifier, "destination committed");
            Ok(())
        })
    }

    fn abort_put(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()> {
        let identifier = identifier.to_string();
        let token = token.to_string();
        Box::pin(async move {
            let Lease::Put { staging, .. } = self.take_lease(&token, &identifier)? else {
                return Err(BackendError::new(
                    BackendErrorCode::InvalidArgument,
                    format!("reservation {token} is not a PUT"),
                ));
            };
            match tokio::fs::remove_file(&staging).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&staging, e)),
            }
            tracing::debug!(identifier = %identifier, "destination reservation aborted");
            Ok(())
        })
    }

    fn release_get(&self, identifier: &str, token: &str) -> BackendFuture<'_, ()> {
        let identifier = identifier.to_string();
        let token = token.to_string();
        Box::pin(async move {
            match self.take_lease(&token, &identifier)? {
                Lease::Pin { .. } => {
                    tracing::debug!(identifier = %identifier, "source released");
                    Ok(())
                }
                lease => {
                    self.leases().insert(token.clone(), lease);
                    Err(BackendError::new(
                        BackendErrorCode::InvalidArgument,
                        format!("reservation {token} is not a GET"),
                    ))
                }
            }
        })
    }

    fn delete(&self, identifier: &str) -> BackendFuture<'_, ()> {
        let identifier = identifier.to_string();
        Box::pin(async move {
            let path = to_path(&identifier)?;
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            tracing::debug!(path = %path.display(), "file deleted");
            Ok(())
        })
    }

    fn make_parent_dirs(&self, directory: &str) -> BackendFuture<'_, ()> {
        let directory = directory.to_string();
        Box::pin(async move {
            let path = to_path(&directory)?;
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| io_error(&path, e))
        })
    }

    fn stat(&self, identifier: &str) -> BackendFuture<'_, FileStat> {
        let identifier = identifier.to_string();
        Box::pin(async move {
            let path = to_path(&identifier)?;
            let meta = tokio::fs::metadata(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
            Ok(FileStat { size: meta.len() })
        })
    }

    fn checksum(&self, identifier: &str, algorithm: &str) -> BackendFuture<'_, String> {
        let identifier = identifier.to_string();
        let algorithm = algorithm.to_string();
        Box::pin(async move {
            let algorithm: ChecksumAlgorithm = algorithm
                .parse()
                .map_err(|e| BackendError::new(BackendErrorCode::Unsupported, format!("{e}")))?;
            let path = to_path(&identifier)?;
            let hashed = path.clone();
            tokio::task::spawn_blocking(move || calculate_file_checksum(&hashed, algorithm))
                .await
                .map_err(|e| BackendError::new(BackendErrorCode::Other, e.to_string()))?
                .map_err(|e| match e {
                    tpcopy_checksum::ChecksumError::Io(io) => io_error(&path, io),
                    other => BackendError::new(BackendErrorCode::Unsupported, other.to_string()),
                })
        })
    }

    fn probe(&self, identifier: &str) -> BackendFuture<'_, ProbeInfo> {
        let identifier = identifier.to_string();
        Box::pin(async move {
            to_path(&identifier)?;
            let mut info = match &self.backend_type {
                Some(backend) => ProbeInfo::with_backend_type(backend.clone()),
                None => ProbeInfo::default(),
            };
            info.extra
                .insert("reservations".into(), self.open_reservations().to_string());
            Ok(info)
        })
    }
}
