//! Endpoint negotiation and destination preparation.

use tpcopy_protocol::{
    BackendError, BackendErrorCode, EndpointNegotiation, ErrorKind, ErrorRecord, EventStage, Role,
    Side, TransferParams,
};

use crate::backend::{ControlPlane, EndpointRegistry, Endpoints};
use crate::events::EventEmitter;

/// Whether a delete failure means the object was never there.
///
/// Some backends answer "invalid argument" for a missing path.
pub fn is_absent(error: &BackendError) -> bool {
    matches!(
        error.code,
        BackendErrorCode::NotFound | BackendErrorCode::InvalidArgument
    )
}

/// Parent of `identifier`, never cutting into the `scheme://` prefix.
///
/// Trailing slashes are ignored. Returns `None` when no parent exists.
pub fn parent_identifier(identifier: &str) -> Option<String> {
    let trimmed = identifier.trim_end_matches('/');
    let floor = identifier.find("://").map_or(0, |i| i + 3);
    let cut = trimmed.rfind('/')?;
    (cut > floor).then(|| trimmed[..cut].to_string())
}

/// Negotiates transfer URLs for one side of a copy.
pub struct EndpointResolver<'a> {
    registry: &'a dyn EndpointRegistry,
    control: &'a dyn ControlPlane,
    events: &'a EventEmitter,
}

impl<'a> EndpointResolver<'a> {
    pub fn new(endpoints: Endpoints<'a>, events: &'a EventEmitter) -> Self {
        Self {
            registry: endpoints.registry,
            control: endpoints.control,
            events,
        }
    }

    /// Returns the transfer URL for `identifier` in the given role.
    ///
    /// Direct identifiers come back unchanged with no control-plane call.
    /// `expected_size` is only meaningful for [`Role::Put`].
    pub async fn resolve(
        &self,
        identifier: &str,
        role: Role,
        expected_size: Option<u64>,
    ) -> Result<EndpointNegotiation, ErrorRecord> {
        if !self.registry.requires_negotiation(identifier) {
            return Ok(EndpointNegotiation::direct(identifier));
        }

        let side = role.side();
        let result = match role {
            Role::Get => self.control.resolve_get(identifier).await,
            Role::Put => {
                self.control
                    .resolve_put(identifier, expected_size.unwrap_or(0))
                    .await
            }
        };

        let reservation = result.map_err(|e| {
            let kind = match (role, e.code) {
                (Role::Put, BackendErrorCode::AlreadyExists) => ErrorKind::DestinationExists,
                _ => ErrorKind::NegotiationFailed,
            };
            tracing::debug!(identifier, %side, error = %e, "negotiation failed");
            ErrorRecord::new(side, kind, format!("{identifier}: {e}"))
        })?;

        let negotiation = EndpointNegotiation::negotiated(reservation);
        tracing::debug!(
            identifier,
            %side,
            turl = %negotiation.transfer_endpoint,
            "transfer URL resolved"
        );
        self.events.emit(
            side,
            EventStage::TurlResolved,
            format!("Got TURL {identifier} => {}", negotiation.transfer_endpoint),
        );
        Ok(negotiation)
    }

    /// Runs delete-existing then create-parent, each only if requested.
    pub async fn prepare_destination(
        &self,
        destination: &str,
        params: &TransferParams,
    ) -> Result<(), ErrorRecord> {
        self.delete_existing(destination, params.replace_existing)
            .await?;
        self.create_parent(destination, params.create_parent_dir)
            .await
    }

    /// Deletes `destination` if `replace` is set.
    ///
    /// Returns whether something was actually deleted. An absent object is
    /// not an error.
    pub async fn delete_existing(
        &self,
        destination: &str,
        replace: bool,
    ) -> Result<bool, ErrorRecord> {
        if !replace {
            return Ok(false);
        }
        match self.control.delete(destination).await {
            Ok(()) => {
                tracing::debug!(destination, "existing destination deleted");
                self.events.emit(
                    Side::Destination,
                    EventStage::OverwriteDestination,
                    format!("Deleted {destination}"),
                );
                Ok(true)
            }
            Err(e) if is_absent(&e) => {
                tracing::debug!(destination, code = %e.code, "destination absent, nothing to delete");
                Ok(false)
            }
            Err(e) => Err(ErrorRecord::new(
                Side::Destination,
                ErrorKind::OverwriteFailed,
                format!("failed to delete {destination}: {e}"),
            )),
        }
    }

    /// Creates the parent directory of `destination` if `create` is set.
    pub async fn create_parent(&self, destination: &str, create: bool) -> Result<(), ErrorRecord> {
        if !create {
            return Ok(());
        }
        let Some(parent) = parent_identifier(destination) else {
            return Err(ErrorRecord::new(
                Side::Destination,
                ErrorKind::InvalidArgument,
                format!("no parent directory can be derived from {destination}"),
            ));
        };
        tracing::debug!(destination, parent = %parent, "creating parent directory");
        self.control.make_parent_dirs(&parent).await.map_err(|e| {
            ErrorRecord::new(
                Side::Destination,
                ErrorKind::ParentDirFailed,
                format!("failed to create {parent}: {e}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeBackend, Op, PUT_TOKEN, err, put_turl};

    fn resolver<'a>(fake: &'a FakeBackend, events: &'a EventEmitter) -> EndpointResolver<'a> {
        EndpointResolver::new(fake.endpoints(), events)
    }

    #[test]
    fn parent_of_nested_path() {
        assert_eq!(
            parent_identifier("proto://b/dir/file").as_deref(),
            Some("proto://b/dir")
        );
        assert_eq!(parent_identifier("proto://b/file").as_deref(), Some("proto://b"));
        assert_eq!(
            parent_identifier("proto://b/dir/").as_deref(),
            Some("proto://b")
        );
        assert_eq!(parent_identifier("/tmp/x").as_deref(), Some("/tmp"));
        assert_eq!(parent_identifier("/x"), None);
        assert_eq!(parent_identifier("/tmp/dir/x").as_deref(), Some("/tmp/dir"));
    }

    #[test]
    fn parent_never_cuts_into_scheme() {
        assert_eq!(parent_identifier("proto://host"), None);
        assert_eq!(parent_identifier("proto://"), None);
        assert_eq!(parent_identifier("file"), None);
    }

    #[test]
    fn absence_codes() {
        assert!(is_absent(&err(BackendErrorCode::NotFound)));
        assert!(is_absent(&err(BackendErrorCode::InvalidArgument)));
        assert!(!is_absent(&err(BackendErrorCode::PermissionDenied)));
    }

    #[tokio::test]
    async fn direct_identifier_is_returned_unchanged() {
        let fake = FakeBackend::new();
        let (events, _rx) = EventEmitter::channel(8);
        let n = resolver(&fake, &events)
            .resolve("proto://a/file", Role::Get, None)
            .await
            .unwrap();
        assert_eq!(n, EndpointNegotiation::direct("proto://a/file"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn put_negotiation_passes_size_and_emits_turl() {
        let fake = FakeBackend::new().negotiate("proto://b/");
        let (events, mut rx) = EventEmitter::channel(8);
        let n = resolver(&fake, &events)
            .resolve("proto://b/file", Role::Put, Some(1024))
            .await
            .unwrap();

        assert!(n.is_indirect);
        assert_eq!(n.transfer_endpoint, put_turl("proto://b/file"));
        assert_eq!(n.token(), Some(PUT_TOKEN));
        assert_eq!(
            fake.calls(),
            vec![Call::ResolvePut("proto://b/file".into(), 1024)]
        );

        let e = rx.recv().await.unwrap();
        assert_eq!(e.side, Side::Destination);
        assert_eq!(e.stage, EventStage::TurlResolved);
        assert!(e.description.contains("proto://b/file"));
    }

    #[tokio::test]
    async fn negotiation_failure_is_tagged_with_side() {
        let fake = FakeBackend::new()
            .negotiate("proto://")
            .fail(Op::ResolveGet, err(BackendErrorCode::TimedOut));
        let (events, _rx) = EventEmitter::channel(8);
        let e = resolver(&fake, &events)
            .resolve("proto://a/file", Role::Get, None)
            .await
            .unwrap_err();
        assert_eq!(e.side, Side::Source);
        assert_eq!(e.kind, ErrorKind::NegotiationFailed);
    }

    #[tokio::test]
    async fn existing_put_target_maps_to_destination_exists() {
        let fake = FakeBackend::new()
            .negotiate("proto://")
            .fail(Op::ResolvePut, err(BackendErrorCode::AlreadyExists));
        let (events, _rx) = EventEmitter::channel(8);
        let e = resolver(&fake, &events)
            .resolve("proto://b/file", Role::Put, None)
            .await
            .unwrap_err();
        assert_eq!(e.side, Side::Destination);
        assert_eq!(e.kind, ErrorKind::DestinationExists);
        assert_eq!(fake.calls(), vec![Call::ResolvePut("proto://b/file".into(), 0)]);
    }

    #[tokio::test]
    async fn delete_existing_is_idempotent() {
        let fake = FakeBackend::new().fail(Op::Delete, err(BackendErrorCode::NotFound));
        let (events, mut rx) = EventEmitter::channel(8);
        let r = resolver(&fake, &events);

        assert!(!r.delete_existing("proto://b/file", true).await.unwrap());
        assert!(!r.delete_existing("proto://b/file", true).await.unwrap());
        drop(events);
        assert!(rx.recv().await.is_none(), "no overwrite event for absent object");
    }

    #[tokio::test]
    async fn invalid_argument_on_delete_counts_as_absent() {
        let fake = FakeBackend::new().fail(Op::Delete, err(BackendErrorCode::InvalidArgument));
        let (events, _rx) = EventEmitter::channel(8);
        assert!(
            !resolver(&fake, &events)
                .delete_existing("proto://b/file", true)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn actual_delete_emits_overwrite() {
        let fake = FakeBackend::new();
        let (events, mut rx) = EventEmitter::channel(8);
        assert!(
            resolver(&fake, &events)
                .delete_existing("proto://b/file", true)
                .await
                .unwrap()
        );
        let e = rx.recv().await.unwrap();
        assert_eq!(e.stage, EventStage::OverwriteDestination);
        assert_eq!(e.side, Side::Destination);
    }

    #[tokio::test]
    async fn delete_permission_error_fails_overwrite() {
        let fake = FakeBackend::new().fail(Op::Delete, err(BackendErrorCode::PermissionDenied));
        let (events, _rx) = EventEmitter::channel(8);
        let e = resolver(&fake, &events)
            .delete_existing("proto://b/file", true)
            .await
            .unwrap_err();
        assert_eq!(e.kind, ErrorKind::OverwriteFailed);
        assert_eq!(e.side, Side::Destination);
    }

    #[tokio::test]
    async fn no_flags_means_no_calls() {
        let fake = FakeBackend::new();
        let (events, _rx) = EventEmitter::channel(8);
        resolver(&fake, &events)
            .prepare_destination("proto://b/file", &TransferParams::default())
            .await
            .unwrap();
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn create_parent_without_parent_is_invalid() {
        let fake = FakeBackend::new();
        let (events, _rx) = EventEmitter::channel(8);
        let e = resolver(&fake, &events)
            .create_parent("proto://host", true)
            .await
            .unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidArgument);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn create_parent_failure_is_reported() {
        let fake = FakeBackend::new().fail(Op::MakeParentDirs, err(BackendErrorCode::Io));
        let (events, _rx) = EventEmitter::channel(8);
        let e = resolver(&fake, &events)
            .create_parent("proto://b/dir/file", true)
            .await
            .unwrap_err();
        assert_eq!(e.kind, ErrorKind::ParentDirFailed);
        assert_eq!(fake.calls(), vec![Call::MakeParentDirs("proto://b/dir".into())]);
    }
}
