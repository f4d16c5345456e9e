use thiserror::Error;

/// Errors produced by group and observer-registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// A position argument was outside the valid bounds for the operation.
    #[error("position {position} out of range for length {len}")]
    IndexOutOfRange { position: usize, len: usize },

    /// The observer is already registered with this source.
    #[error("observer is already registered")]
    DuplicateObserver,

    /// The observer is not registered with this source.
    #[error("observer is not registered")]
    ObserverNotFound,
}

/// Convenience alias for group results.
pub type GroupResult<T> = Result<T, GroupError>;
