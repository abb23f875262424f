//! Parameter re-estimation (M-step) from a completed matrix.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView2};

use crate::error::EmError;
use crate::linalg;
use crate::params::ProcessParams;

/// Estimates [`ProcessParams`] of a VAR(`p`) process from a complete
/// observation matrix of shape `(n_vars, n_times)`.
///
/// `B` is the sample mean. For `p >= 1`, `A_1..A_p` solve the least-squares
/// regression of each centred timestep on its `p` centred predecessors and
/// `Σ` is the residual covariance (divisor `n_times - p`). For `p = 0`, `Σ`
/// is the sample covariance (divisor `n_times`).
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`EmError::EmptyData`] | no variables or no timesteps |
/// | [`EmError::NonFiniteData`] | any entry is NaN or infinite |
/// | [`EmError::InsufficientData`] | `n_times - p <= n_vars * p` (no more rows than lagged regressors) |
/// | [`EmError::SingularMatrix`] | normal equations singular after regularisation |
///
/// # Example
///
/// ```
/// use mneme_em::estimate_params;
/// use ndarray::array;
///
/// let x = array![[1.0, 2.0, 3.0, 2.0], [0.5, 0.1, -0.2, 0.4]];
/// let params = estimate_params(x.view(), 0).unwrap();
/// assert_eq!(params.mean()[0], 2.0);
/// ```
pub fn estimate_params(x: ArrayView2<f64>, p: usize) -> Result<ProcessParams, EmError> {
    let (n_vars, n_times) = x.dim();
    if n_vars == 0 || n_times == 0 {
        return Err(EmError::EmptyData);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EmError::NonFiniteData);
    }
    let y = Array2::from_shape_fn((n_times, n_vars), |(t, j)| x[[j, t]]);
    estimate(&y, p, p)
}

/// M-step on a time-major matrix, regressing rows `start..T` (`start >= p`).
///
/// A `start` larger than `p` lets the lag selector score every candidate on
/// the same rows.
pub(crate) fn estimate(y: &Array2<f64>, p: usize, start: usize) -> Result<ProcessParams, EmError> {
    let (n_times, n) = y.dim();
    if n_times == 0 || n == 0 {
        return Err(EmError::EmptyData);
    }
    let start = start.max(p);

    let means: Vec<f64> = (0..n)
        .map(|j| mneme_stats::mean(&y.column(j).to_vec()))
        .collect();

    if p == 0 {
        let mut cov = Array2::<f64>::zeros((n, n));
        for t in 0..n_times {
            for i in 0..n {
                let di = y[[t, i]] - means[i];
                for j in 0..=i {
                    cov[[i, j]] += di * (y[[t, j]] - means[j]);
                }
            }
        }
        let denom = n_times as f64;
        for i in 0..n {
            for j in 0..=i {
                let v = cov[[i, j]] / denom;
                cov[[i, j]] = v;
                cov[[j, i]] = v;
            }
        }
        return ProcessParams::new(Array1::from(means), Vec::new(), cov);
    }

    // An exactly determined regression leaves a zero residual covariance.
    let n_reg = n * p;
    let usable = n_times.saturating_sub(start);
    if usable <= n_reg {
        return Err(EmError::InsufficientData {
            n: n_times,
            min: start + n_reg + 1,
        });
    }

    // Normal equations ZᵀZ C = ZᵀY with z_t = [y_{t-1}; ...; y_{t-p}] centred.
    let mut zz = DMatrix::<f64>::zeros(n_reg, n_reg);
    let mut zy = DMatrix::<f64>::zeros(n_reg, n);
    let mut z = DVector::<f64>::zeros(n_reg);
    for t in start..n_times {
        lagged_into(y, &means, t, p, &mut z);
        for a in 0..n_reg {
            for b in 0..=a {
                zz[(a, b)] += z[a] * z[b];
            }
            for j in 0..n {
                zy[(a, j)] += z[a] * (y[[t, j]] - means[j]);
            }
        }
    }
    for a in 0..n_reg {
        for b in 0..a {
            zz[(b, a)] = zz[(a, b)];
        }
    }

    let chol = linalg::regularized_cholesky(&zz, "lagged normal equations")?;
    let c = chol.solve(&zy);

    // Block k of C holds A_kᵀ.
    let coefs: Vec<Array2<f64>> = (0..p)
        .map(|k| Array2::from_shape_fn((n, n), |(i, j)| c[(k * n + j, i)]))
        .collect();

    let mut cov = Array2::<f64>::zeros((n, n));
    let mut e = vec![0.0; n];
    for t in start..n_times {
        lagged_into(y, &means, t, p, &mut z);
        for (i, ei) in e.iter_mut().enumerate() {
            let mut fitted = 0.0;
            for a in 0..n_reg {
                fitted += c[(a, i)] * z[a];
            }
            *ei = y[[t, i]] - means[i] - fitted;
        }
        for i in 0..n {
            for j in 0..=i {
                cov[[i, j]] += e[i] * e[j];
            }
        }
    }
    let denom = usable as f64;
    for i in 0..n {
        for j in 0..=i {
            let v = cov[[i, j]] / denom;
            cov[[i, j]] = v;
            cov[[j, i]] = v;
        }
    }

    ProcessParams::new(Array1::from(means), coefs, cov)
}

/// Stacks the `p` centred predecessors of row `t` into `z`.
fn lagged_into(y: &Array2<f64>, means: &[f64], t: usize, p: usize, z: &mut DVector<f64>) {
    let n = means.len();
    for k in 0..p {
        let s = t - k - 1;
        for j in 0..n {
            z[k * n + j] = y[[s, j]] - means[j];
        }
    }
}
