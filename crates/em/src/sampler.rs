//! Preconditioned Langevin relaxation of the missing entries.

use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::model::{VarModel, Workspace};

/// Discretised Ornstein-Uhlenbeck sampler targeting `exp(-L(X))` over the
/// missing entries, with Jacobi step sizes `γ_j = 1 / Q_jj`.
///
/// An approximation: `n_iter` and `dt` control how close the chain gets to
/// the conditional distribution.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OuSampler {
    n_iter: usize,
    dt: f64,
    ampli: f64,
}

impl OuSampler {
    pub(crate) fn new(n_iter: usize, dt: f64, ampli: f64) -> Self {
        Self { n_iter, dt, ampli }
    }

    /// Runs `n_iter` steps on `state` in place, writing only `missing_idx`.
    ///
    /// Each gradient is taken on the state left by the previous step and
    /// lands in `ws`, so all entries move from the same snapshot.
    pub(crate) fn sample<R: Rng + ?Sized>(
        &self,
        model: &VarModel,
        state: &mut Array2<f64>,
        missing_idx: &[(usize, usize)],
        ws: &mut Workspace,
        rng: &mut R,
    ) {
        if missing_idx.is_empty() {
            return;
        }
        let gamma: Vec<f64> = model.cond_diag().iter().map(|q| 1.0 / q).collect();
        let noise: Vec<f64> = gamma
            .iter()
            .map(|g| self.ampli * (2.0 * g * self.dt).sqrt())
            .collect();

        for _ in 0..self.n_iter {
            model.precision_product(state, true, ws);
            let grad = ws.product();
            for &(t, j) in missing_idx {
                let xi: f64 = StandardNormal.sample(rng);
                state[[t, j]] += -gamma[j] * grad[[t, j]] * self.dt + noise[j] * xi;
            }
        }
    }
}
