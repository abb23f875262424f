//! Dense linear-algebra helpers: SPD repair, regularised Cholesky and
//! Gaussian log-likelihood terms.
//!
//! Small `n_vars x n_vars` blocks live in `nalgebra`; the data matrices stay
//! in `ndarray` and are converted at the boundary.

use nalgebra::{Cholesky, DMatrix, Dyn};
use ndarray::Array2;
use tracing::warn;

use crate::error::EmError;

/// Number of times the diagonal jitter is multiplied by 10 before giving up.
const MAX_JITTER_ATTEMPTS: usize = 12;

pub(crate) fn symmetrize(a: &DMatrix<f64>) -> DMatrix<f64> {
    (a + a.transpose()) * 0.5
}

/// First jitter tried, relative to the scale of the diagonal.
fn base_jitter(a: &DMatrix<f64>) -> f64 {
    let n = a.nrows().max(1) as f64;
    let scale = a.diagonal().iter().map(|d| d.abs()).sum::<f64>() / n;
    (scale * 1e-10).max(1e-12)
}

/// Cholesky factorisation with escalating diagonal loading.
///
/// Tries the matrix as-is first, then adds `jitter * I` with the jitter
/// growing tenfold per attempt.
pub(crate) fn regularized_cholesky(
    a: &DMatrix<f64>,
    context: &'static str,
) -> Result<Cholesky<f64, Dyn>, EmError> {
    if a.iter().any(|x| !x.is_finite()) {
        return Err(EmError::SingularMatrix { context });
    }
    if let Some(chol) = a.clone().cholesky() {
        return Ok(chol);
    }

    let n = a.nrows();
    let mut jitter = base_jitter(a);
    for _ in 0..MAX_JITTER_ATTEMPTS {
        let candidate = a + DMatrix::<f64>::identity(n, n) * jitter;
        if let Some(chol) = candidate.cholesky() {
            warn!(context, jitter, "diagonal loading applied");
            return Ok(chol);
        }
        jitter *= 10.0;
    }

    Err(EmError::SingularMatrix { context })
}

/// Symmetrises `a`, floors its diagonal at `min_diag` and adds jitter until
/// it is positive definite.
pub(crate) fn ensure_spd(
    a: &DMatrix<f64>,
    min_diag: f64,
    context: &'static str,
) -> Result<DMatrix<f64>, EmError> {
    let mut s = symmetrize(a);
    for i in 0..s.nrows() {
        if !s[(i, i)].is_finite() {
            return Err(EmError::SingularMatrix { context });
        }
        if s[(i, i)] < min_diag {
            s[(i, i)] = min_diag;
        }
    }
    if s.clone().cholesky().is_some() {
        return Ok(s);
    }

    let n = s.nrows();
    let mut jitter = base_jitter(&s).max(min_diag);
    for _ in 0..MAX_JITTER_ATTEMPTS {
        let candidate = &s + DMatrix::<f64>::identity(n, n) * jitter;
        if candidate.clone().cholesky().is_some() {
            warn!(context, jitter, "covariance repaired by diagonal loading");
            return Ok(candidate);
        }
        jitter *= 10.0;
    }

    Err(EmError::SingularMatrix { context })
}

/// `ln|A|` from the Cholesky factor of `A`.
pub(crate) fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>()
}

/// Gaussian log-likelihood of `n_obs` residual vectors of dimension
/// `n_vars`, given `ln|Σ|` and the summed Mahalanobis terms `Σ εᵀ Σ⁻¹ ε`.
pub(crate) fn gaussian_log_likelihood(n_obs: usize, n_vars: usize, log_det: f64, quad: f64) -> f64 {
    let n_obs = n_obs as f64;
    let ln_2pi = (2.0 * std::f64::consts::PI).ln();
    -0.5 * (n_obs * (n_vars as f64 * ln_2pi + log_det) + quad)
}

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (r, c) = a.dim();
    DMatrix::from_fn(r, c, |i, j| a[[i, j]])
}
