//! # Worker Error Types

use thiserror::Error;

/// Failure of a single unit of stage work.
///
/// Stages wrap their own error types with [`WorkError::failed`]; the worker
/// never inspects the inner error, it only hands it to the stage's
/// [`on_error`](crate::Stage::on_error) policy and logs it.
#[derive(Error, Debug)]
pub enum WorkError {
    /// The stage returned an error.
    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The stage panicked inside `do_work`.
    #[error("work unit panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    /// Wraps any error type.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed(Box::new(error))
    }

    /// Returns the wrapped error if it is an `E`.
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed(inner) => inner.downcast_ref::<E>(),
            Self::Panicked(_) => None,
        }
    }
}

/// Result of one unit of stage work: `Ok(true)` means more work remains.
pub type WorkResult = Result<bool, WorkError>;
