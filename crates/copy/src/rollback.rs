//! Compensating actions run after every copy.
//!
//! Nothing here turns a successful copy into a failure. Errors from
//! compensating calls are logged and collected in a [`CleanupReport`];
//! only a failed abort may become the surfaced error, and only when no
//! other error was recorded.

use tpcopy_protocol::{
    BackendError, EndpointNegotiation, ErrorKind, ErrorRecord, Phase, Side, TransferOutcome,
    TransferRequest,
};

use crate::backend::{ControlPlane, EndpointRegistry, Endpoints};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    /// Delete a destination written directly or already committed.
    DeleteDestination,
    /// Cancel an unfinished PUT reservation.
    AbortReservation,
    /// Delete leftovers after an aborted reservation.
    ForceDeleteDestination,
    /// Release the source GET reservation.
    ReleaseSource,
}

/// What cleanup attempted and which failures it swallowed.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub performed: Vec<CleanupAction>,
    pub suppressed: Vec<(CleanupAction, BackendError)>,
}

impl CleanupReport {
    pub fn ran(&self, action: CleanupAction) -> bool {
        self.performed.contains(&action)
    }

    pub fn suppressed(&self, action: CleanupAction) -> Option<&BackendError> {
        self.suppressed
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, e)| e)
    }

    pub fn is_clean(&self) -> bool {
        self.suppressed.is_empty()
    }

    fn attempt(&mut self, action: CleanupAction) {
        self.performed.push(action);
    }

    fn suppress(&mut self, action: CleanupAction, error: BackendError) {
        self.suppressed.push((action, error));
    }
}

pub struct RollbackManager<'a> {
    registry: &'a dyn EndpointRegistry,
    control: &'a dyn ControlPlane,
}

impl<'a> RollbackManager<'a> {
    pub fn new(endpoints: Endpoints<'a>) -> Self {
        Self {
            registry: endpoints.registry,
            control: endpoints.control,
        }
    }

    /// Rolls back the destination if needed and releases the source.
    ///
    /// `source` and `destination` are the negotiations that completed, if
    /// any. `outcome` gains an error only when an abort fails on an
    /// otherwise error-free outcome.
    pub async fn cleanup(
        &self,
        request: &TransferRequest,
        source: Option<&EndpointNegotiation>,
        destination: Option<&EndpointNegotiation>,
        transfer_finished: bool,
        outcome: &mut TransferOutcome,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        let dst = request.destination.as_str();
        let failed_kind = outcome.error.as_ref().map(|e| e.kind);
        let direct_destination = !self.registry.requires_negotiation(dst);

        // A destination that existed before the copy is not ours to delete.
        let owns_failure = failed_kind.is_some_and(|k| k != ErrorKind::DestinationExists);
        let destination_token = destination.and_then(EndpointNegotiation::token);

        if owns_failure && (transfer_finished || direct_destination) {
            report.attempt(CleanupAction::DeleteDestination);
            match self.control.delete(dst).await {
                Ok(()) => tracing::debug!(destination = dst, "destination removed"),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(destination = dst, "no destination to remove")
                }
                Err(e) => {
                    tracing::warn!(destination = dst, error = %e, "failed to remove destination");
                    report.suppress(CleanupAction::DeleteDestination, e);
                }
            }
        } else if !transfer_finished && let Some(token) = destination_token {
            self.abort(dst, token, outcome, &mut report).await;
        }

        if let Some(token) = source.and_then(EndpointNegotiation::token) {
            let src = request.source.as_str();
            report.attempt(CleanupAction::ReleaseSource);
            match self.control.release_get(src, token).await {
                Ok(()) => tracing::debug!(source = src, "source released"),
                Err(e) => {
                    tracing::warn!(source = src, error = %e, "failed to release source");
                    report.suppress(CleanupAction::ReleaseSource, e);
                }
            }
        }

        report
    }

    async fn abort(
        &self,
        dst: &str,
        token: &str,
        outcome: &mut TransferOutcome,
        report: &mut CleanupReport,
    ) {
        report.attempt(CleanupAction::AbortReservation);
        if let Err(e) = self.control.abort_put(dst, token).await {
            let record = ErrorRecord::new(
                Side::Destination,
                ErrorKind::AbortFailed,
                format!("failed to abort reservation on {dst}: {e}"),
            );
            // An open reservation means the transfer never completed.
            if outcome.record_if_absent(Phase::Transfer, record).is_some() {
                tracing::warn!(destination = dst, error = %e, "abort failed");
                report.suppress(CleanupAction::AbortReservation, e);
            }
        }

        report.attempt(CleanupAction::ForceDeleteDestination);
        match self.control.delete(dst).await {
            Ok(()) => tracing::debug!(destination = dst, "partial destination removed"),
            Err(e) if e.is_not_found() => {
                tracing::debug!(destination = dst, "no partial destination left")
            }
            Err(e) => {
                tracing::warn!(destination = dst, error = %e, "failed to remove partial destination");
                report.suppress(CleanupAction::ForceDeleteDestination, e);
            }
        }
    }
}
