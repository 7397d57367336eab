use thiserror::Error;

/// Errors that can escape the prefetch daemon's entrypoint.
///
/// Almost everything the daemon does is recovered locally (logged and
/// defaulted), so this only covers failures before the daemon is armed.
#[derive(Debug, Error)]
pub(crate) enum PrefetchError {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
}

pub(crate) type PrefetchResult<T, E = PrefetchError> = std::result::Result<T, E>;
