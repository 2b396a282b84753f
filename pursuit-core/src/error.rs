//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum PursuitError {
    /// More steps were inserted than the horizon of the buffer.
    #[error("Buffer capacity exceeded: horizon is {0}")]
    CapacityExceeded(usize),

    /// The buffer does not hold `horizon` steps yet.
    #[error("Buffer is not filled: {filled} of {horizon} steps")]
    NotFilled {
        /// Steps written so far.
        filled: usize,
        /// Steps required.
        horizon: usize,
    },

    /// The bootstrap observation was inserted twice without clearing.
    #[error("Bootstrap observation is already set")]
    BootstrapAlreadySet,

    /// Sampling was requested before the bootstrap observation was inserted.
    #[error("Bootstrap observation is missing")]
    MissingBootstrap,

    /// The partner buffer does not have the same grid as this buffer.
    #[error("Partner buffer mismatch: expected (num_envs, horizon) = {expected:?}, got {got:?}")]
    PartnerMismatch {
        /// `(num_envs, horizon)` of this buffer.
        expected: (usize, usize),
        /// `(num_envs, horizon)` of the partner buffer.
        got: (usize, usize),
    },

    /// Data given to the buffer has an unexpected size.
    #[error("Shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Name of the mismatching item.
        what: String,
        /// Expected number of elements.
        expected: usize,
        /// Given number of elements.
        got: usize,
    },

    /// Minibatch size must be positive.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),

    /// The environment did not return a state after reset or step.
    #[error("Environment returned no state after {0}")]
    MissingEnvState(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
