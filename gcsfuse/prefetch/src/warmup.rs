use std::{io, path::Path, process::Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Terminal state of a joined warm-up task.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WarmupOutcome {
    /// The traversal visited the whole mount root.
    Completed,
    /// The traversal died on its own; the caches are partially warm at best.
    Failed(String),
    /// Shutdown was requested while the traversal was still running.
    Cancelled,
}

/// A cache warm-up that can be started without blocking and joined later,
/// so the daemon can do other work while it runs.
pub(crate) trait Warmup {
    type Handle: WarmupHandle + Send;

    fn start(&self, mount_root: &Path) -> io::Result<Self::Handle>;
}

#[async_trait]
pub(crate) trait WarmupHandle {
    /// Waits for the warm-up to finish, or for `cancellation`, whichever
    /// comes first. Cancellation kills the underlying work best-effort and
    /// returns without waiting for it to wind down.
    async fn join(&mut self, cancellation: &CancellationToken) -> WarmupOutcome;
}

/// Warms the dentry/attribute caches by walking the mount root with a
/// recursive `ls` subprocess, output discarded. Listing every entry is
/// enough to make gcsfuse populate its metadata caches for all of them.
pub(crate) struct LsWarmup;

impl Warmup for LsWarmup {
    type Handle = LsWarmupHandle;

    // TODO(prefetch): running one `ls -R` over the whole root serializes the
    // walk; a per-volume subprocess would warm independent buckets in
    // parallel.
    fn start(&self, mount_root: &Path) -> io::Result<LsWarmupHandle> {
        let child = Command::new("ls")
            .arg("-R")
            .arg(mount_root)
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(LsWarmupHandle { child })
    }
}

pub(crate) struct LsWarmupHandle {
    child: Child,
}

#[async_trait]
impl WarmupHandle for LsWarmupHandle {
    async fn join(&mut self, cancellation: &CancellationToken) -> WarmupOutcome {
        tokio::select! {
            status = self.child.wait() => match status {
                Ok(status) if status.success() => WarmupOutcome::Completed,
                Ok(status) => WarmupOutcome::Failed(format!("ls exited with {status}")),
                Err(error) => WarmupOutcome::Failed(format!("failed to await ls: {error}")),
            },
            _ = cancellation.cancelled() => {
                let _ = self.child.start_kill();
                WarmupOutcome::Cancelled
            }
        }
    }
}
