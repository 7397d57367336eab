use std::{convert::Infallible, str::FromStr};

use crate::machine::is_accelerated_family;

/// Operator override for the prefetch decision, taken from the
/// `USER_ENABLED_METADATA_PREFETCH` environment variable.
///
/// The external contract is case-sensitive: exactly `TRUE` and `FALSE` are
/// recognized, every other value (unset included) defers to the machine-type
/// classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PrefetchOverride {
    ForceOn,
    ForceOff,
    #[default]
    Auto,
}

impl FromStr for PrefetchOverride {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw {
            "TRUE" => PrefetchOverride::ForceOn,
            "FALSE" => PrefetchOverride::ForceOff,
            _ => PrefetchOverride::Auto,
        })
    }
}

/// The daemon's one policy decision, computed once per process start.
pub(crate) fn should_prefetch(override_: PrefetchOverride, machine_type: &str) -> bool {
    match override_ {
        PrefetchOverride::ForceOn => true,
        PrefetchOverride::ForceOff => false,
        PrefetchOverride::Auto => is_accelerated_family(machine_type),
    }
}
