use std::future::Future;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use tokio::sync::mpsc;
use tpcopy_config::{ConfigHandle, CopyConfig};
use tpcopy_copy::CopyOrchestrator;
use tpcopy_local::LocalStore;
use tpcopy_protocol::{ErrorKind, EventStage, TransferEvent, TransferOutcome};

use crate::args::CopyArgs;

/// Exit status of a copy stopped by the user (128 + SIGINT).
const INTERRUPTED: u8 = 130;

/// Loads the configuration: strictly from `path` if given, else leniently.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CopyConfig> {
    match path {
        Some(p) => CopyConfig::load_from(p)
            .with_context(|| format!("failed to load configuration from {}", p.display())),
        None => Ok(CopyConfig::load()),
    }
}

/// Runs one copy and reports its outcome.
///
/// A first Ctrl-C before the transfer cancels the copy and lets cleanup
/// run. A Ctrl-C once the transfer has started, or a second one, stops
/// the process with exit status 130.
pub async fn copy(args: &CopyArgs, config: CopyConfig) -> anyhow::Result<ExitCode> {
    let request = args.to_request();
    let store = match &args.backend_type {
        Some(backend) => LocalStore::with_backend_type(backend.clone()),
        None => LocalStore::new(),
    };

    let mut orch = CopyOrchestrator::new(ConfigHandle::new(config));
    let events = orch
        .take_events()
        .context("event receiver already taken")?;
    let transfer_started = Arc::new(AtomicBool::new(false));
    let printer = tokio::spawn(log_events(events, Arc::clone(&transfer_started)));

    let cancel = orch.cancel_token();
    let finish = supervise(
        orch.copy(&request, store.endpoints()),
        &transfer_started,
        ctrl_c,
        move || cancel.cancel(),
    )
    .await;
    drop(orch);
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "event printer stopped");
    }

    let outcome = match finish {
        Finish::Completed(outcome) => outcome,
        Finish::Interrupted => {
            tracing::warn!(
                destination = %request.destination,
                "copy interrupted during transfer, destination may be incomplete"
            );
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&request.source, &request.destination, &outcome);
    }

    Ok(exit_code(&outcome))
}

/// How a supervised copy ended.
#[derive(Debug)]
enum Finish {
    Completed(TransferOutcome),
    Interrupted,
}

/// Races `copy` against user interrupts.
///
/// `transfer_started` is set once the copy has passed its cancellation
/// checkpoint; from then on cancelling has no effect, so an interrupt
/// stops waiting for the copy instead.
async fn supervise<C, I, F>(
    copy: C,
    transfer_started: &AtomicBool,
    mut interrupt: I,
    cancel: impl FnOnce(),
) -> Finish
where
    C: Future<Output = TransferOutcome>,
    I: FnMut() -> F,
    F: Future<Output = ()>,
{
    tokio::pin!(copy);

    tokio::select! {
        outcome = &mut copy => return Finish::Completed(outcome),
        () = interrupt() => {}
    }
    if transfer_started.load(Ordering::Acquire) {
        return Finish::Interrupted;
    }

    tracing::warn!("interrupted, cancelling copy (press Ctrl-C again to stop)");
    cancel();
    tokio::select! {
        outcome = &mut copy => Finish::Completed(outcome),
        () = interrupt() => Finish::Interrupted,
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn exit_code(outcome: &TransferOutcome) -> ExitCode {
    match &outcome.error {
        None => ExitCode::SUCCESS,
        Some(e) if e.kind == ErrorKind::Cancelled => ExitCode::from(INTERRUPTED),
        Some(_) => ExitCode::FAILURE,
    }
}

async fn log_events(
    mut events: mpsc::Receiver<TransferEvent>,
    transfer_started: Arc<AtomicBool>,
) {
    while let Some(event) = events.recv().await {
        if event.stage == EventStage::PrepareExit {
            transfer_started.store(true, Ordering::Release);
        }
        tracing::debug!(
            side = %event.side,
            stage = ?event.stage,
            description = %event.description,
            "event"
        );
    }
}

fn print_outcome(source: &str, destination: &str, outcome: &TransferOutcome) {
    match &outcome.error {
        None => {
            println!("{source} -> {destination}: done");
            let checksums = &outcome.checksums;
            if let Some(value) = checksums.destination_value() {
                println!("  {} {value}", checksums.algorithm());
            }
        }
        Some(e) => {
            eprintln!(
                "{source} -> {destination}: failed during {}: {e}",
                outcome.phase_reached
            );
        }
    }
}
