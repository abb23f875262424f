//! Fitted process parameters.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::EmError;

/// Parameters of a centred VAR(p) process
/// `x_t - B = Σ_k A_k (x_{t-k} - B) + ε_t`, `ε_t ~ N(0, Σ)`.
///
/// With `p = 0` the coefficient list is empty and the model is a plain
/// multivariate normal `N(B, Σ)`.
///
/// Derives serde traits so an embedding application can persist a fit.
/// Deserialisation goes through [`ProcessParams::new`], so a stored set is
/// checked the same way as a constructed one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParams")]
pub struct ProcessParams {
    mean: Array1<f64>,
    coefs: Vec<Array2<f64>>,
    cov: Array2<f64>,
}

/// Unchecked wire form of [`ProcessParams`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParams {
    mean: Array1<f64>,
    coefs: Vec<Array2<f64>>,
    cov: Array2<f64>,
}

impl TryFrom<RawParams> for ProcessParams {
    type Error = EmError;

    fn try_from(raw: RawParams) -> Result<Self, Self::Error> {
        Self::new(raw.mean, raw.coefs, raw.cov)
    }
}

impl ProcessParams {
    /// Creates a parameter set, checking that every block is
    /// `n_vars`-dimensional and finite.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`EmError::EmptyData`] | `mean` is empty |
    /// | [`EmError::DimensionMismatch`] | `cov` or a coefficient matrix is not `n_vars x n_vars` |
    /// | [`EmError::NonFiniteData`] | any entry is NaN or infinite |
    pub fn new(
        mean: Array1<f64>,
        coefs: Vec<Array2<f64>>,
        cov: Array2<f64>,
    ) -> Result<Self, EmError> {
        let n = mean.len();
        if n == 0 {
            return Err(EmError::EmptyData);
        }
        for m in coefs.iter().chain(std::iter::once(&cov)) {
            if m.dim() != (n, n) {
                let got = if m.nrows() != n { m.nrows() } else { m.ncols() };
                return Err(EmError::DimensionMismatch { expected: n, got });
            }
        }
        let all_finite = mean.iter().all(|x| x.is_finite())
            && cov.iter().all(|x| x.is_finite())
            && coefs.iter().all(|a| a.iter().all(|x| x.is_finite()));
        if !all_finite {
            return Err(EmError::NonFiniteData);
        }
        Ok(Self { mean, coefs, cov })
    }

    /// Returns the mean vector `B`.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Returns the autoregressive coefficient matrices `A_1..A_p`.
    pub fn coefs(&self) -> &[Array2<f64>] {
        &self.coefs
    }

    /// Returns the innovation covariance `Σ`.
    pub fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Returns the lag order `p`.
    pub fn lag_order(&self) -> usize {
        self.coefs.len()
    }

    /// Returns the number of variables.
    pub fn n_vars(&self) -> usize {
        self.mean.len()
    }

    /// Largest absolute entry-wise difference to `other`.
    ///
    /// Returns infinity when the two sets have different shapes.
    pub(crate) fn max_abs_diff(&self, other: &ProcessParams) -> f64 {
        if self.n_vars() != other.n_vars() || self.lag_order() != other.lag_order() {
            return f64::INFINITY;
        }
        let diff = |a: &Array2<f64>, b: &Array2<f64>| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max)
        };
        let mut max = self
            .mean
            .iter()
            .zip(other.mean.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        max = max.max(diff(&self.cov, &other.cov));
        for (a, b) in self.coefs.iter().zip(other.coefs.iter()) {
            max = max.max(diff(a, b));
        }
        max
    }
}
