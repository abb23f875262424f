//! EM imputer (unfitted).

use ndarray::{Array2, ArrayView2};

use crate::config::EmConfig;
use crate::error::EmError;
use crate::fit::EmFit;

/// An unfitted EM imputer.
///
/// Holds only configuration. Call [`EmImputer::fit()`] to estimate the
/// process parameters and obtain an [`EmFit`].
///
/// # Typestate Workflow
///
/// ```mermaid
/// graph LR
///     A["EmImputer::new(config)"] -->|".fit(x, mask)?"| B["EmFit"]
///     B -->|".transform(x)?"| C["completed Array2"]
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmImputer {
    config: EmConfig,
}

impl EmImputer {
    /// Creates an imputer with the given configuration.
    pub fn new(config: EmConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EmConfig {
        &self.config
    }

    /// Estimates the process parameters from `x` of shape `(n_vars, n_times)`.
    ///
    /// Missing entries are NaN, or `true` in `mask` when one is given.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`EmError::InvalidConfig`] | configuration out of range |
    /// | [`EmError::EmptyData`] | no variables or no timesteps |
    /// | [`EmError::ShapeMismatch`] | `mask` shape differs from `x` |
    /// | [`EmError::NonFiniteData`] | an observed entry is NaN or infinite |
    /// | [`EmError::FullyMissingVariable`] | a variable has no observed entry |
    /// | [`EmError::InsufficientData`] | fewer than 2 timesteps |
    /// | [`EmError::LagOrderTooLarge`] | lag order exceeds what `n_times` supports |
    /// | [`EmError::AllCandidatesFailed`] | automatic lag selection found no candidate |
    /// | [`EmError::SingularMatrix`] | a factorisation failed after regularisation |
    ///
    /// # Example
    ///
    /// ```
    /// use mneme_em::{EmConfig, EmImputer, Method};
    /// use ndarray::array;
    ///
    /// let x = array![
    ///     [1.0, 2.0, f64::NAN, 1.5, 0.5, 1.0],
    ///     [2.0, 4.1, 3.0, 3.1, 0.9, f64::NAN],
    /// ];
    /// let imputer = EmImputer::new(EmConfig::new().with_method(Method::Mle));
    /// let fit = imputer.fit(x.view(), None).unwrap();
    /// let completed = fit.transform(x.view()).unwrap();
    /// assert!(completed.iter().all(|v| v.is_finite()));
    /// ```
    pub fn fit(
        &self,
        x: ArrayView2<f64>,
        mask: Option<ArrayView2<bool>>,
    ) -> Result<EmFit, EmError> {
        crate::engine::fit_em(&self.config, x, mask)
    }

    /// Fits on `x` and returns `x` completed by the fitted model.
    ///
    /// Equivalent to `self.fit(x, None)?.transform(x)`.
    pub fn fit_transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EmError> {
        self.fit(x, None)?.transform(x)
    }
}
