use pkg_types::kind::{GroupKind, GroupResource};

use crate::client::StoreFailure;

/// Failures surfaced by listers, evaluators and the admission check.
///
/// Every failure is per-request; nothing here is fatal to the process.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    /// Transient store failure (connection loss, timeout). Retry with backoff.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store rejected the request, e.g. a malformed selector. Not retryable.
    #[error("store rejected request: {0}")]
    StoreError(String),
    /// The informer cache for this resource has not completed a full list.
    #[error("cache for {0} has not synced")]
    IndexNotSynced(GroupResource),
    /// A lister failure while computing usage for `kind`.
    #[error("failed to compute usage for {kind}: {source}")]
    UsageComputationFailed {
        kind: GroupKind,
        source: Box<QuotaError>,
    },
    /// The caller cancelled the request or its deadline elapsed.
    #[error("request cancelled")]
    Cancelled,
}

impl QuotaError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            QuotaError::StoreUnavailable(_) | QuotaError::IndexNotSynced(_) => true,
            QuotaError::UsageComputationFailed { source, .. } => source.is_retryable(),
            QuotaError::StoreError(_) | QuotaError::Cancelled => false,
        }
    }

    /// The innermost lister-level error.
    pub fn root_cause(&self) -> &QuotaError {
        match self {
            QuotaError::UsageComputationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<StoreFailure> for QuotaError {
    fn from(failure: StoreFailure) -> Self {
        match failure {
            StoreFailure::Unavailable(_) | StoreFailure::Timeout(_) | StoreFailure::Expired(_) => {
                QuotaError::StoreUnavailable(failure.to_string())
            }
            StoreFailure::NotFound(_) | StoreFailure::Forbidden(_) | StoreFailure::Invalid(_) => {
                QuotaError::StoreError(failure.to_string())
            }
        }
    }
}
