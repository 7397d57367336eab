use std::{future, io, path::Path, time::Duration};

use tokio::{
    fs,
    signal::unix::{signal, SignalKind},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*};

use crate::{
    cli::{self, Args},
    error::PrefetchResult,
    machine::{MachineTypeFetcher, MetadataServer},
    policy::should_prefetch,
    warmup::{LsWarmup, Warmup, WarmupHandle, WarmupOutcome},
};

/// How a single warm-up pass ended, before the daemon parks.
#[derive(Debug, PartialEq, Eq)]
enum WarmupStatus {
    /// Policy decided against warming.
    Skipped,
    /// The traversal subprocess could not be spawned.
    StartFailed,
    /// The traversal was joined, successfully or not.
    Joined(WarmupOutcome),
}

fn init_tracing() {
    let json_log = std::env::var("GCSFUSE_PREFETCH_JSON_LOG")
        .ok()
        .and_then(|json_log| json_log.parse().ok())
        .unwrap_or_default();

    if json_log {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .json(),
            )
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .pretty()
                    .with_line_number(true),
            )
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }
}

pub(crate) async fn main() -> PrefetchResult<()> {
    init_tracing();

    info!(
        "Initializing gcsfuse-prefetch, version {}.",
        env!("CARGO_PKG_VERSION")
    );

    let args = cli::parse_args();

    // The SIGTERM listener goes in before anything can suspend, so a
    // termination arriving during classification or warm-up is not lost.
    let mut sigterm = signal(SignalKind::terminate())?;
    let cancellation = CancellationToken::new();
    let fetcher = MetadataServer::new();

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Caught SIGTERM signal: Terminating.");
            cancellation.cancel();
        }

        _ = run_daemon(&args, &fetcher, &LsWarmup, &cancellation) => {
            unreachable!("the daemon parks forever");
        }
    }

    Ok(())
}

/// The daemon body: one warm-up pass, then park until the process is
/// terminated. Never returns and never fails, the sidecar container must
/// stay alive for the pod's whole lifetime.
async fn run_daemon<F, W>(args: &Args, fetcher: &F, warmup: &W, cancellation: &CancellationToken)
where
    F: MachineTypeFetcher + Sync,
    W: Warmup,
{
    warm_caches(args, fetcher, warmup, cancellation).await;

    info!("Going to sleep.");
    future::pending::<()>().await
}

async fn warm_caches<F, W>(
    args: &Args,
    fetcher: &F,
    warmup: &W,
    cancellation: &CancellationToken,
) -> WarmupStatus
where
    F: MachineTypeFetcher + Sync,
    W: Warmup,
{
    let machine_type = match timeout(
        Duration::from_secs(args.metadata_timeout),
        fetcher.fetch(),
    )
    .await
    {
        Ok(Ok(machine_type)) => machine_type,
        Ok(Err(error)) => {
            warn!(%error, "Unable to fetch machine type, leaving it unclassified");
            String::new()
        }
        Err(_) => {
            warn!(
                timeout_secs = args.metadata_timeout,
                "Machine type fetch timed out, leaving it unclassified"
            );
            String::new()
        }
    };

    if !should_prefetch(args.metadata_prefetch, &machine_type) {
        info!("Metadata prefetch disabled.");
        return WarmupStatus::Skipped;
    }

    let mut handle = match warmup.start(&args.mount_root) {
        Ok(handle) => handle,
        Err(error) => {
            error!(%error, "Error starting the warm-up traversal");
            return WarmupStatus::StartFailed;
        }
    };

    // Purely diagnostic, the traversal covers the volumes either way.
    match list_volume_dirs(&args.mount_root).await {
        Ok(volumes) => info!("Warming metadata caches for volume(s): {}", volumes.join(", ")),
        Err(error) => warn!(%error, "Failed to list mount root"),
    }

    let outcome = handle.join(cancellation).await;
    match &outcome {
        WarmupOutcome::Completed => info!("Metadata prefetch complete."),
        WarmupOutcome::Failed(reason) => error!(%reason, "Warm-up traversal failed"),
        WarmupOutcome::Cancelled => info!("Warm-up traversal abandoned on shutdown."),
    }

    WarmupStatus::Joined(outcome)
}

/// Names of the immediate subdirectories of the mount root, one per mounted
/// volume.
async fn list_volume_dirs(mount_root: &Path) -> io::Result<Vec<String>> {
    let mut volumes = Vec::new();

    let mut entries = fs::read_dir(mount_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            volumes.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    Ok(volumes)
}
