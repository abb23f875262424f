//! Fitted EM imputer.

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::config::EmConfig;
use crate::engine;
use crate::error::EmError;
use crate::model::VarModel;
use crate::monitor::ConvergenceStatus;
use crate::params::ProcessParams;

/// The result of [`EmImputer::fit()`](crate::EmImputer::fit).
///
/// Immutable. Holds the estimated [`ProcessParams`], the log-likelihood
/// trace and the termination status, and completes new data with
/// [`EmFit::transform()`].
///
/// ```mermaid
/// graph LR
///     B["EmFit"] --> C[".params()"]
///     B --> D[".loglik_trace()"]
///     B --> E[".status()"]
///     B --> F[".transform(x)"]
///     B --> G[".transform_with_mask(x, mask, &mut rng)"]
/// ```
#[derive(Clone, Debug)]
pub struct EmFit {
    config: EmConfig,
    params: ProcessParams,
    model: VarModel,
    trace: Vec<f64>,
    status: ConvergenceStatus,
}

impl EmFit {
    pub(crate) fn new(
        config: EmConfig,
        params: ProcessParams,
        model: VarModel,
        trace: Vec<f64>,
        status: ConvergenceStatus,
    ) -> Self {
        Self {
            config,
            params,
            model,
            trace,
            status,
        }
    }

    /// Returns the configuration used for the fit.
    pub fn config(&self) -> &EmConfig {
        &self.config
    }

    /// Returns the estimated process parameters.
    pub fn params(&self) -> &ProcessParams {
        &self.params
    }

    /// Returns the lag order used (fixed or selected).
    pub fn lag_order(&self) -> usize {
        self.params.lag_order()
    }

    /// Returns the completed-data log-likelihood after each EM iteration.
    pub fn loglik_trace(&self) -> &[f64] {
        &self.trace
    }

    /// Returns how the EM loop terminated.
    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    /// Returns the number of EM iterations run.
    pub fn n_iter(&self) -> usize {
        self.trace.len()
    }

    /// Returns `true` if a convergence rule stopped the loop.
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    /// Completes `x` (shape `(n_vars, n_times)`, NaN = missing) with one
    /// E-step under the fitted parameters.
    ///
    /// Missing entries start from linear interpolation. In `sample` mode the
    /// sampler is seeded from `random_state` when set. Fully observed input
    /// is returned unchanged.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`EmError::EmptyData`] | no variables or no timesteps |
    /// | [`EmError::DimensionMismatch`] | `x` has a different number of variables |
    /// | [`EmError::NonFiniteData`] | an entry is infinite |
    /// | [`EmError::FullyMissingVariable`] | a variable has no observed entry |
    /// | [`EmError::InsufficientData`] | `n_times <= p` with missing entries |
    /// | [`EmError::SingularMatrix`] | exact conditioning failed after regularisation |
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, EmError> {
        let mut rng = engine::make_rng(self.config.random_state());
        self.transform_with_mask(x, None, &mut rng)
    }

    /// Like [`EmFit::transform()`], with an optional explicit mask
    /// (`true` = missing) and a caller-supplied random source.
    ///
    /// # Errors
    ///
    /// As [`EmFit::transform()`], plus [`EmError::ShapeMismatch`] when the
    /// mask shape differs from `x`.
    #[tracing::instrument(skip_all, fields(n_vars = x.nrows(), n_times = x.ncols()))]
    pub fn transform_with_mask<R: Rng + ?Sized>(
        &self,
        x: ArrayView2<f64>,
        mask: Option<ArrayView2<bool>>,
        rng: &mut R,
    ) -> Result<Array2<f64>, EmError> {
        let (n_vars, n_times) = x.dim();
        if n_vars == 0 || n_times == 0 {
            return Err(EmError::EmptyData);
        }
        if n_vars != self.params.n_vars() {
            return Err(EmError::DimensionMismatch {
                expected: self.params.n_vars(),
                got: n_vars,
            });
        }
        engine::complete_once(&self.config, &self.model, x, mask, rng)
    }
}
