//! Quadratic form of the Gaussian / VAR(p) likelihood.
//!
//! All matrices here are time-major: shape `(n_times, n_vars)`, row `t`
//! is the state at timestep `t`. For residuals
//! `ε_t = (x_t - B) - Σ_k A_k (x_{t-k} - B)` over `t = p..T`, the negative
//! log-likelihood is `L(X) = ½ Σ_t ε_tᵀ Σ⁻¹ ε_t + const`. Its gradient and
//! its Hessian-vector product share one kernel, [`VarModel::precision_product`],
//! because `L` is quadratic.
//!
//! **Not part of the public API.**

use nalgebra::DMatrix;
use ndarray::Array2;

use crate::error::EmError;
use crate::linalg;
use crate::params::ProcessParams;

/// Precomputed quantities for one parameter set.
#[derive(Clone, Debug)]
pub(crate) struct VarModel {
    mean: Vec<f64>,
    zeros: Vec<f64>,
    coefs: Vec<DMatrix<f64>>,
    cov: DMatrix<f64>,
    prec: DMatrix<f64>,
    log_det: f64,
    cond_diag: Vec<f64>,
}

/// Reusable buffers for [`VarModel::precision_product`].
pub(crate) struct Workspace {
    resid: Array2<f64>,
    weighted: Array2<f64>,
    product: Array2<f64>,
}

impl Workspace {
    pub(crate) fn new(n_times: usize, n_vars: usize) -> Self {
        Self {
            resid: Array2::zeros((n_times, n_vars)),
            weighted: Array2::zeros((n_times, n_vars)),
            product: Array2::zeros((n_times, n_vars)),
        }
    }

    /// Result of the last [`VarModel::precision_product`] call.
    pub(crate) fn product(&self) -> &Array2<f64> {
        &self.product
    }
}

impl VarModel {
    /// Builds the model, repairing `Σ` into a positive-definite matrix with
    /// diagonal floor `min_variance`.
    pub(crate) fn new(params: &ProcessParams, min_variance: f64) -> Result<Self, EmError> {
        let n = params.n_vars();
        let cov = linalg::ensure_spd(
            &linalg::to_dmatrix(params.cov()),
            min_variance,
            "innovation covariance",
        )?;
        let chol = linalg::regularized_cholesky(&cov, "innovation covariance")?;
        let log_det = linalg::log_det(&chol);
        let prec = linalg::symmetrize(&chol.inverse());
        let coefs: Vec<DMatrix<f64>> = params.coefs().iter().map(linalg::to_dmatrix).collect();

        // diag(Σ⁻¹ + Σ_k A_kᵀ Σ⁻¹ A_k): conditional precision of a single entry.
        let mut cond_diag: Vec<f64> = (0..n).map(|j| prec[(j, j)]).collect();
        for a in &coefs {
            let pa = &prec * a;
            for (j, d) in cond_diag.iter_mut().enumerate() {
                *d += a.column(j).dot(&pa.column(j));
            }
        }

        Ok(Self {
            mean: params.mean().to_vec(),
            zeros: vec![0.0; n],
            coefs,
            cov,
            prec,
            log_det,
            cond_diag,
        })
    }

    pub(crate) fn lag_order(&self) -> usize {
        self.coefs.len()
    }

    pub(crate) fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// The repaired (positive-definite) innovation covariance.
    pub(crate) fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Diagonal of the single-timestep conditional precision, one entry per variable.
    pub(crate) fn cond_diag(&self) -> &[f64] {
        &self.cond_diag
    }

    /// Writes `ε_t` for `t >= p` into `out`; rows `0..p` are zeroed.
    ///
    /// With `centred = false` the mean is taken as zero, which turns the
    /// residual map into its linear part.
    fn residuals_into(&self, x: &Array2<f64>, centred: bool, out: &mut Array2<f64>) {
        let (n_times, n) = x.dim();
        let p = self.lag_order();
        let m = if centred { &self.mean } else { &self.zeros };

        for t in 0..p.min(n_times) {
            out.row_mut(t).fill(0.0);
        }
        for t in p..n_times {
            for i in 0..n {
                let mut v = x[[t, i]] - m[i];
                for (k, a) in self.coefs.iter().enumerate() {
                    let s = t - k - 1;
                    for j in 0..n {
                        v -= a[(i, j)] * (x[[s, j]] - m[j]);
                    }
                }
                out[[t, i]] = v;
            }
        }
    }

    /// Computes `∇L(x)` (`centred = true`) or `H x` (`centred = false`) into
    /// `ws.product`.
    ///
    /// Reads only `x`; all intermediate and output buffers belong to `ws`.
    pub(crate) fn precision_product(&self, x: &Array2<f64>, centred: bool, ws: &mut Workspace) {
        let (n_times, n) = x.dim();
        let p = self.lag_order();
        self.residuals_into(x, centred, &mut ws.resid);

        for t in p..n_times {
            for i in 0..n {
                let mut w = 0.0;
                for j in 0..n {
                    w += self.prec[(i, j)] * ws.resid[[t, j]];
                }
                ws.weighted[[t, i]] = w;
            }
        }

        ws.product.fill(0.0);
        for t in p..n_times {
            for i in 0..n {
                ws.product[[t, i]] += ws.weighted[[t, i]];
            }
            for (k, a) in self.coefs.iter().enumerate() {
                let s = t - k - 1;
                for j in 0..n {
                    let mut acc = 0.0;
                    for i in 0..n {
                        acc += a[(i, j)] * ws.weighted[[t, i]];
                    }
                    ws.product[[s, j]] -= acc;
                }
            }
        }
    }

    /// Completed-data log-likelihood: full Gaussian for `p = 0`, conditional
    /// on the first `p` rows otherwise.
    pub(crate) fn log_likelihood(&self, x: &Array2<f64>, ws: &mut Workspace) -> f64 {
        let (n_times, n) = x.dim();
        let p = self.lag_order();
        if n_times <= p {
            return 0.0;
        }
        self.residuals_into(x, true, &mut ws.resid);

        let mut quad = 0.0;
        for t in p..n_times {
            for i in 0..n {
                let mut w = 0.0;
                for j in 0..n {
                    w += self.prec[(i, j)] * ws.resid[[t, j]];
                }
                quad += ws.resid[[t, i]] * w;
            }
        }
        linalg::gaussian_log_likelihood(n_times - p, n, self.log_det, quad)
    }
}
