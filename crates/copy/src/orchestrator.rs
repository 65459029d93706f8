//! Copy orchestrator.
//!
//! Runs one copy through its phases in strict order and always finishes
//! with cleanup, whatever phase it stopped at.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tpcopy_config::ConfigHandle;
use tpcopy_protocol::{
    BackendErrorCode, ChecksumState, EndpointNegotiation, ErrorKind, ErrorRecord, EventStage,
    Phase, Role, Side, TransferEvent, TransferOutcome, TransferRequest, TransportOptions,
};

use crate::backend::Endpoints;
use crate::checksum::{ChecksumPolicy, ChecksumReconciler};
use crate::events::EventEmitter;
use crate::quirks::{QuirkDetector, apply_session_isolation};
use crate::resolver::EndpointResolver;
use crate::rollback::RollbackManager;

/// Mutable state of one run, read by cleanup once the run stops.
#[derive(Debug)]
struct RunState {
    phase: Phase,
    source: Option<EndpointNegotiation>,
    destination: Option<EndpointNegotiation>,
    transfer_finished: bool,
    checksums: ChecksumState,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: Phase::Prepare,
            source: None,
            destination: None,
            transfer_finished: false,
            checksums: ChecksumState::default(),
        }
    }
}

/// Orchestrates third-party copies.
pub struct CopyOrchestrator {
    config: ConfigHandle,
    events: EventEmitter,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
    cancel: CancellationToken,
}

impl CopyOrchestrator {
    /// Creates an orchestrator reading and adjusting `config`.
    pub fn new(config: ConfigHandle) -> Self {
        let (events, events_rx) = EventEmitter::channel(256);
        Self {
            config,
            events,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Returns the token checked before the transport call.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Copies `request.source` to `request.destination`.
    ///
    /// Never fails as such: the returned outcome carries the phase reached
    /// and, on failure, the single error surfaced to the caller.
    pub async fn copy(&self, request: &TransferRequest, endpoints: Endpoints<'_>) -> TransferOutcome {
        let mut state = RunState::new();
        let result = self.run(request, endpoints, &mut state).await;

        let mut outcome = match result {
            Ok(()) => TransferOutcome::succeeded(state.checksums.clone()),
            Err(e) => TransferOutcome::failed(state.phase, e, state.checksums.clone()),
        };

        let report = RollbackManager::new(endpoints)
            .cleanup(
                request,
                state.source.as_ref(),
                state.destination.as_ref(),
                state.transfer_finished,
                &mut outcome,
            )
            .await;
        if !report.is_clean() {
            debug!(
                suppressed = report.suppressed.len(),
                "cleanup finished with suppressed errors"
            );
        }

        match &outcome.error {
            None => info!(
                source = %request.source,
                destination = %request.destination,
                "copy completed"
            ),
            Some(e) => error!(
                source = %request.source,
                destination = %request.destination,
                phase = %outcome.phase_reached,
                error = %e,
                "copy failed"
            ),
        }
        outcome
    }

    async fn run(
        &self,
        request: &TransferRequest,
        endpoints: Endpoints<'_>,
        state: &mut RunState,
    ) -> Result<(), ErrorRecord> {
        let src = request.source.as_str();
        let dst = request.destination.as_str();
        let params = &request.params;

        // Prepare
        state.phase = Phase::Prepare;
        let detector = QuirkDetector::new(endpoints, self.config.quirks());
        let src_profile = detector.probe(src).await;
        let dst_profile = detector.probe(dst).await;
        apply_session_isolation(&self.config, &[&src_profile, &dst_profile]);
        self.events.emit(Side::None, EventStage::PrepareEnter, "");

        let policy = ChecksumPolicy::resolve(params, &self.config.checksum());
        if policy.enabled {
            debug!(
                algorithm = policy.algorithm.as_deref().unwrap_or(""),
                allow_empty_source = policy.allow_empty_source,
                user_value = policy.user_value.as_deref().unwrap_or(""),
                "checksum policy"
            );
            if policy.algorithm.is_none() {
                warn!("checksum check requested but no algorithm is configured, skipping");
            }
        }
        state.checksums = ChecksumState::new(
            policy.algorithm.clone().unwrap_or_default(),
            policy.user_value.clone(),
        );
        let algorithm = policy.active_algorithm();
        let user_value = policy.user_value.as_deref();

        // ResolveSource
        state.phase = Phase::ResolveSource;
        let reconciler = ChecksumReconciler::new(endpoints.control, &self.events);
        if let Some(alg) = algorithm
            && let Some(value) = reconciler
                .validate_source(src, alg, user_value, policy.allow_empty_source)
                .await?
        {
            state.checksums.record_source(value);
        }

        let resolver = EndpointResolver::new(endpoints, &self.events);
        let source = resolver.resolve(src, Role::Get, None).await?;
        let source_turl = source.transfer_endpoint.clone();
        state.source = Some(source);

        // ResolveDestination
        state.phase = Phase::ResolveDestination;
        let destination = if endpoints.registry.requires_negotiation(dst) {
            let size = match endpoints.control.stat(src).await {
                Ok(stat) => stat.size,
                Err(e) => {
                    debug!(source = src, error = %e, "source stat failed, size unknown");
                    0
                }
            };
            resolver.prepare_destination(dst, params).await?;
            resolver.resolve(dst, Role::Put, Some(size)).await?
        } else {
            resolver.resolve(dst, Role::Put, None).await?
        };
        let destination_turl = destination.transfer_endpoint.clone();
        let destination_token = destination.token().unwrap_or_default().to_string();
        let destination_indirect = destination.is_indirect;
        state.destination = Some(destination);
        self.events.emit(Side::None, EventStage::PrepareExit, "");

        if self.cancel.is_cancelled() {
            info!(source = src, destination = dst, "copy cancelled before transfer");
            return Err(ErrorRecord::cancelled());
        }

        // Transfer
        state.phase = Phase::Transfer;
        let mut options = TransportOptions::from(params);
        options.checksum_check = false;
        if destination_indirect {
            options.replace_existing = false;
            options.strict_copy_mode = true;
        }
        debug!(
            source = %source_turl,
            destination = %destination_turl,
            ?options,
            "starting transfer"
        );
        endpoints
            .transport
            .transfer(&source_turl, &destination_turl, &options)
            .await
            .map_err(|e| {
                let message = format!("{source_turl} => {destination_turl}: {e}");
                // Only a direct destination can hold an object the copy did not create.
                if !destination_indirect && e.code == BackendErrorCode::AlreadyExists {
                    ErrorRecord::new(Side::Destination, ErrorKind::DestinationExists, message)
                } else {
                    ErrorRecord::new(Side::Transfer, ErrorKind::TransferFailed, message)
                }
            })?;

        self.events
            .emit(Side::Destination, EventStage::FinalizeEnter, dst);
        let finalized = if destination_indirect {
            endpoints
                .control
                .finalize_put(dst, &destination_token)
                .await
                .map_err(|e| {
                    ErrorRecord::new(
                        Side::Destination,
                        ErrorKind::FinalizeFailed,
                        format!("failed to finalize {dst}: {e}"),
                    )
                })
        } else {
            Ok(())
        };
        self.events
            .emit(Side::Destination, EventStage::FinalizeExit, dst);
        finalized?;
        state.transfer_finished = true;

        // VerifyChecksum
        if let Some(alg) = algorithm {
            state.phase = Phase::VerifyChecksum;
            let value = reconciler
                .validate_destination(dst, alg, user_value, state.checksums.source_value())
                .await?;
            state.checksums.record_destination(value);
        }

        state.phase = Phase::Done;
        Ok(())
    }
}
