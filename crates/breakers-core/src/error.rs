//! Errors returned from guarded calls.

use thiserror::Error;

/// Outcome of a guarded call that did not succeed.
///
/// `Open` means the call was never attempted. `Inner` carries the wrapped
/// operation's own error after the breaker has recorded it.
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    #[error("Circuit breaker open for service `{service}`")]
    Open { service: String },

    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the call was rejected without being attempted.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Borrow the operation's error, if the call was attempted.
    pub fn inner(&self) -> Option<&E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }

    /// Take the operation's error, if the call was attempted.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }

    /// Map the wrapped operation error, leaving rejections unchanged.
    pub fn map_inner<F, M>(self, f: M) -> BreakerError<F>
    where
        M: FnOnce(E) -> F,
    {
        match self {
            BreakerError::Inner(e) => BreakerError::Inner(f(e)),
            BreakerError::Open { service } => BreakerError::Open { service },
        }
    }
}
