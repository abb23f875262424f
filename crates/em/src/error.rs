//! Error types for the mneme-em crate.

/// Error type for all fallible operations in the mneme-em crate.
///
/// Configuration and data errors are raised at `fit`/`transform` entry,
/// before any computation. Numerical errors surface only after diagonal
/// loading failed to restore invertibility.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmError {
    /// Returned when the observation matrix has no variables or no timesteps.
    #[error("input data is empty")]
    EmptyData,

    /// Returned when there are too few timesteps for the requested model.
    #[error("insufficient data: got {n} timesteps, need at least {min}")]
    InsufficientData {
        /// Number of timesteps provided.
        n: usize,
        /// Minimum number of timesteps required.
        min: usize,
    },

    /// Returned when an observed entry is NaN or infinite.
    #[error("observed entries contain non-finite values")]
    NonFiniteData,

    /// Returned when an explicit mask does not have the shape of the data.
    #[error("mask shape {got:?} does not match data shape {expected:?}")]
    ShapeMismatch {
        /// Shape of the data, `(n_vars, n_times)`.
        expected: (usize, usize),
        /// Shape of the mask.
        got: (usize, usize),
    },

    /// Returned when data passed to a fitted model has the wrong number of variables.
    #[error("expected {expected} variables, got {got}")]
    DimensionMismatch {
        /// Number of variables the model was fitted on.
        expected: usize,
        /// Number of variables provided.
        got: usize,
    },

    /// Returned when a variable has no observed entry.
    #[error("variable {index} has no observed entries")]
    FullyMissingVariable {
        /// Row index of the variable.
        index: usize,
    },

    /// Returned when a completion method name is not recognised.
    #[error("unknown method {0:?} (expected \"sample\" or \"mle\")")]
    InvalidMethod(String),

    /// Returned when an information criterion name is not recognised.
    #[error("unknown criterion {0:?} (expected \"aic\" or \"bic\")")]
    InvalidCriterion(String),

    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the offending value.
        reason: String,
    },

    /// Returned when a lag order exceeds what the sample length can support.
    #[error("lag order {p} too large for {n_times} timesteps of {n_vars} variables")]
    LagOrderTooLarge {
        /// Requested (maximum) lag order.
        p: usize,
        /// Number of timesteps.
        n_times: usize,
        /// Number of variables.
        n_vars: usize,
    },

    /// Returned when a matrix stays singular after diagonal loading.
    #[error("singular matrix in {context} after regularisation")]
    SingularMatrix {
        /// Where the factorisation failed.
        context: &'static str,
    },

    /// Returned when no VAR candidate could be fitted during lag selection.
    #[error("all VAR candidates failed (max_lag_order={max_lag_order})")]
    AllCandidatesFailed {
        /// Maximum lag order attempted.
        max_lag_order: usize,
    },
}
