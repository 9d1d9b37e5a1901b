use crate::{generator::GenerateError, worker::AssignError};

/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the registry can surface to its callers.
///
/// Every variant is returned synchronously to the immediate caller. Only
/// [`Error::Generation`] is ever recovered from locally, and only once per
/// call (see [`Registry::next_id`]).
///
/// [`Registry::next_id`]: crate::Registry::next_id
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key is not part of the configured domain set.
    ///
    /// Reported before any side effect: no wait on a refresh, no worker id
    /// assignment, no mapping mutation.
    #[error("domain `{key}` is not configured")]
    InvalidDomain { key: String },

    /// The worker id provider could not supply a token.
    #[error("worker id assignment failed: {0}")]
    Assignment(#[from] AssignError),

    /// The generator failed to produce or decode an id.
    #[error("uid generation failed: {0}")]
    Generation(#[from] GenerateError),

    /// A configured domain resolved to no generator.
    ///
    /// This is an internal invariant violation and should never be observed.
    #[error("domain `{key}` resolved to no generator")]
    UnresolvedDomain { key: String },

    /// The registry or layout configuration was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    pub(crate) fn invalid_domain(key: &str) -> Self {
        Self::InvalidDomain {
            key: key.to_owned(),
        }
    }

    pub(crate) fn unresolved_domain(key: &str) -> Self {
        Self::UnresolvedDomain {
            key: key.to_owned(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
