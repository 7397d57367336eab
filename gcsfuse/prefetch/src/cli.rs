#![deny(missing_docs)]

use std::path::PathBuf;

use clap::Parser;

use crate::policy::PrefetchOverride;

/// Cache warm-up helper for the gcsfuse sidecar.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// Directory under which the CSI node plugin bind-mounts the pod's
    /// Cloud Storage volumes, one subdirectory per volume.
    #[arg(long, default_value = "/volumes/")]
    pub mount_root: PathBuf,

    /// Operator override for the prefetch decision. `TRUE` forces warm-up
    /// on, `FALSE` forces it off, anything else (unset included) enables it
    /// only on accelerator machine families.
    #[arg(long, env = "USER_ENABLED_METADATA_PREFETCH", default_value = "")]
    pub metadata_prefetch: PrefetchOverride,

    /// Upper bound, in seconds, on the machine-type metadata query. On
    /// timeout the machine stays unclassified and warm-up falls back to the
    /// override alone.
    #[arg(long, default_value_t = 10)]
    pub metadata_timeout: u64,
}

pub(crate) fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|err| err.exit())
}
