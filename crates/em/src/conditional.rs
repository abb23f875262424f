//! Exact conditional expectation of the missing entries.
//!
//! For `p = 0` every timestep is an independent draw from `N(B, Σ)` and the
//! missing part of a row is obtained by Gaussian conditioning on its
//! observed part. For `p >= 1` the whole series is one Gaussian whose
//! precision `H` is block-banded; the conditional mean solves
//! `H_mm d = -∇L(x⁰)_m` from any starting point `x⁰`, here by
//! Jacobi-preconditioned conjugate gradients using
//! [`VarModel::precision_product`] for `H v`.

use std::collections::HashMap;

use nalgebra::DMatrix;
use ndarray::Array2;
use tracing::{debug, warn};

use crate::error::EmError;
use crate::linalg;
use crate::model::{VarModel, Workspace};

/// Relative residual at which CG stops.
const CG_TOLERANCE: f64 = 1e-10;
/// Upper bound on CG iterations regardless of problem size.
const CG_MAX_ITER: usize = 5000;
/// Diagonal loadings tried (×10 each) after non-positive curvature.
const MAX_LOADING_ATTEMPTS: usize = 8;

/// Replaces every missing entry of `state` by its conditional expectation
/// given the observed entries.
pub(crate) fn impute(
    model: &VarModel,
    state: &mut Array2<f64>,
    missing: &Array2<bool>,
    missing_idx: &[(usize, usize)],
    ws: &mut Workspace,
) -> Result<(), EmError> {
    if missing_idx.is_empty() {
        return Ok(());
    }
    if model.lag_order() == 0 {
        rowwise(model, state, missing)
    } else {
        banded(model, state, missing_idx, ws)
    }
}

/// Conditioning gain for one missingness pattern.
struct Gain {
    observed: Vec<usize>,
    absent: Vec<usize>,
    /// `Σ_mo Σ_oo⁻¹`, shape `(|m|, |o|)`.
    matrix: DMatrix<f64>,
}

impl Gain {
    fn new(cov: &DMatrix<f64>, pattern: &[bool]) -> Result<Self, EmError> {
        let observed: Vec<usize> = (0..pattern.len()).filter(|&j| !pattern[j]).collect();
        let absent: Vec<usize> = (0..pattern.len()).filter(|&j| pattern[j]).collect();
        if observed.is_empty() {
            return Ok(Self {
                observed,
                absent,
                matrix: DMatrix::zeros(0, 0),
            });
        }
        let s_oo = DMatrix::from_fn(observed.len(), observed.len(), |a, b| {
            cov[(observed[a], observed[b])]
        });
        let s_om = DMatrix::from_fn(observed.len(), absent.len(), |a, b| {
            cov[(observed[a], absent[b])]
        });
        let chol = linalg::regularized_cholesky(&s_oo, "observed covariance block")?;
        let matrix = chol.solve(&s_om).transpose();
        Ok(Self {
            observed,
            absent,
            matrix,
        })
    }
}

fn rowwise(model: &VarModel, state: &mut Array2<f64>, missing: &Array2<bool>) -> Result<(), EmError> {
    let mean = model.mean();
    let mut cache: HashMap<Vec<bool>, Gain> = HashMap::new();

    for t in 0..state.nrows() {
        let pattern: Vec<bool> = missing.row(t).to_vec();
        if !pattern.iter().any(|&m| m) {
            continue;
        }
        if !cache.contains_key(&pattern) {
            let gain = Gain::new(model.cov(), &pattern)?;
            cache.insert(pattern.clone(), gain);
        }
        let Some(gain) = cache.get(&pattern) else {
            continue;
        };

        for (a, &j) in gain.absent.iter().enumerate() {
            let mut v = mean[j];
            for (b, &o) in gain.observed.iter().enumerate() {
                v += gain.matrix[(a, b)] * (state[[t, o]] - mean[o]);
            }
            state[[t, j]] = v;
        }
    }
    debug!(patterns = cache.len(), "row-wise conditioning done");
    Ok(())
}

fn banded(
    model: &VarModel,
    state: &mut Array2<f64>,
    missing_idx: &[(usize, usize)],
    ws: &mut Workspace,
) -> Result<(), EmError> {
    model.precision_product(state, true, ws);
    let rhs: Vec<f64> = missing_idx
        .iter()
        .map(|&(t, j)| -ws.product()[[t, j]])
        .collect();

    let cond = model.cond_diag();
    let base = 1e-8 * mneme_stats::mean(cond);
    let mut direction = Array2::<f64>::zeros(state.dim());

    let mut loading = 0.0;
    for attempt in 0..=MAX_LOADING_ATTEMPTS {
        if let Some(step) = conjugate_gradient(model, missing_idx, &rhs, loading, &mut direction, ws) {
            if attempt > 0 {
                warn!(loading, "missing-entry precision block loaded");
            }
            for (&(t, j), d) in missing_idx.iter().zip(step) {
                state[[t, j]] += d;
            }
            return Ok(());
        }
        loading = if attempt == 0 { base } else { loading * 10.0 };
    }

    Err(EmError::SingularMatrix {
        context: "missing-entry precision block",
    })
}

/// Solves `(H_mm + loading·I) d = rhs`. Returns `None` on non-positive
/// curvature.
fn conjugate_gradient(
    model: &VarModel,
    missing_idx: &[(usize, usize)],
    rhs: &[f64],
    loading: f64,
    direction: &mut Array2<f64>,
    ws: &mut Workspace,
) -> Option<Vec<f64>> {
    let m = rhs.len();
    let cond = model.cond_diag();
    let precond: Vec<f64> = missing_idx.iter().map(|&(_, j)| 1.0 / (cond[j] + loading)).collect();

    let rhs_norm = dot(rhs, rhs).sqrt();
    let mut x = vec![0.0; m];
    if rhs_norm == 0.0 {
        return Some(x);
    }

    let mut r = rhs.to_vec();
    let mut z: Vec<f64> = r.iter().zip(&precond).map(|(r, p)| r * p).collect();
    let mut p = z.clone();
    let mut rz = dot(&r, &z);
    let mut ap = vec![0.0; m];

    let max_iter = (m + 20).min(CG_MAX_ITER);
    for iter in 0..max_iter {
        for (&(t, j), v) in missing_idx.iter().zip(&p) {
            direction[[t, j]] = *v;
        }
        model.precision_product(direction, false, ws);
        for ((&(t, j), a), v) in missing_idx.iter().zip(ap.iter_mut()).zip(&p) {
            *a = ws.product()[[t, j]] + loading * v;
        }

        let curvature = dot(&p, &ap);
        if !(curvature.is_finite() && curvature > 0.0) {
            return None;
        }
        let alpha = rz / curvature;
        for k in 0..m {
            x[k] += alpha * p[k];
            r[k] -= alpha * ap[k];
        }
        if dot(&r, &r).sqrt() <= CG_TOLERANCE * rhs_norm {
            debug!(iter, "CG converged");
            return Some(x);
        }
        for k in 0..m {
            z[k] = r[k] * precond[k];
        }
        let rz_next = dot(&r, &z);
        let beta = rz_next / rz;
        rz = rz_next;
        for k in 0..m {
            p[k] = z[k] + beta * p[k];
        }
    }

    debug!(max_iter, "CG stopped at iteration cap");
    Some(x)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
