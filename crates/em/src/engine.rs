//! The EM loop.
//!
//! Pipeline:
//! 1. Validate configuration and data
//! 2. Fill missing entries by linear interpolation
//! 3. Select the lag order if none is fixed
//! 4. Initial M-step on the interpolated matrix
//! 5. Alternate E-step / M-step until the monitor stops
//!
//! **Not part of the public API.**

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::conditional;
use crate::config::{EmConfig, Method};
use crate::data::Observations;
use crate::error::EmError;
use crate::fit::EmFit;
use crate::model::{VarModel, Workspace};
use crate::monitor::ConvergenceMonitor;
use crate::mstep;
use crate::sampler::OuSampler;
use crate::selection;

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// A fixed lag order `p >= 1` needs `n_times > (n_vars + 1) * p` so the
/// lagged regression has more rows than unknowns.
fn check_lag_capacity(p: usize, n_times: usize, n_vars: usize) -> Result<(), EmError> {
    if p > 0 && n_times <= (n_vars + 1).saturating_mul(p) {
        return Err(EmError::LagOrderTooLarge { p, n_times, n_vars });
    }
    Ok(())
}

/// E-step strategy, chosen once per fit.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Completion {
    Sample(OuSampler),
    Exact,
}

impl Completion {
    pub(crate) fn from_config(config: &EmConfig) -> Self {
        match config.method() {
            Method::Sample => Self::Sample(OuSampler::new(
                config.n_iter_ou(),
                config.dt(),
                config.ampli(),
            )),
            Method::Mle => Self::Exact,
        }
    }

    /// Updates the missing entries of `state` under `model`.
    pub(crate) fn complete<R: Rng + ?Sized>(
        &self,
        model: &VarModel,
        state: &mut Array2<f64>,
        obs: &Observations,
        ws: &mut Workspace,
        rng: &mut R,
    ) -> Result<(), EmError> {
        match self {
            Self::Sample(sampler) => {
                sampler.sample(model, state, obs.missing_idx(), ws, rng);
                Ok(())
            }
            Self::Exact => conditional::impute(model, state, obs.missing(), obs.missing_idx(), ws),
        }
    }
}

#[tracing::instrument(skip_all, fields(n_vars = x.nrows(), n_times = x.ncols(), method = %config.method()))]
pub(crate) fn fit_em(
    config: &EmConfig,
    x: ArrayView2<f64>,
    mask: Option<ArrayView2<bool>>,
) -> Result<EmFit, EmError> {
    // 1. Validate configuration against the shape, then the data
    config.validate()?;
    let (n_vars, n_times) = x.dim();
    if n_vars == 0 || n_times == 0 {
        return Err(EmError::EmptyData);
    }
    if n_times < 2 {
        return Err(EmError::InsufficientData { n: n_times, min: 2 });
    }
    match config.lag_order() {
        Some(p) => check_lag_capacity(p, n_times, n_vars)?,
        None => selection::check_max_lag(config.max_lag_order(), n_times, n_vars)?,
    }
    let obs = Observations::new(x, mask)?;

    // 2-3. Interpolated start, lag order
    let mut state = obs.filled().clone();
    let p = match config.lag_order() {
        Some(p) => p,
        None => {
            let p = selection::select_time_major(&state, config.max_lag_order(), config.criterion())?;
            debug!(p, "lag order selected");
            p
        }
    };

    // 4. Initial M-step
    let mut params = mstep::estimate(&state, p, p)?;
    let mut model = VarModel::new(&params, config.min_variance())?;

    // 5. EM iterations
    let completion = Completion::from_config(config);
    let mut rng = make_rng(config.random_state());
    let mut ws = Workspace::new(n_times, n_vars);
    let mut monitor = ConvergenceMonitor::new(config);
    loop {
        completion.complete(&model, &mut state, &obs, &mut ws, &mut rng)?;
        let next = mstep::estimate(&state, p, p)?;
        let param_change = next.max_abs_diff(&params);
        model = VarModel::new(&next, config.min_variance())?;
        params = next;

        let loglik = model.log_likelihood(&state, &mut ws);
        let status = monitor.record(loglik, param_change);
        debug!(iteration = monitor.n_iter(), loglik, param_change, "EM iteration");
        if status.is_terminal() {
            break;
        }
    }

    info!(
        status = ?monitor.status(),
        n_iter = monitor.n_iter(),
        lag_order = p,
        n_missing = obs.n_missing(),
        "EM finished"
    );
    let status = monitor.status();
    Ok(EmFit::new(
        config.clone(),
        params,
        model,
        monitor.into_trace(),
        status,
    ))
}

/// One E-step on new data with fitted parameters.
pub(crate) fn complete_once<R: Rng + ?Sized>(
    config: &EmConfig,
    model: &VarModel,
    x: ArrayView2<f64>,
    mask: Option<ArrayView2<bool>>,
    rng: &mut R,
) -> Result<Array2<f64>, EmError> {
    let obs = Observations::new(x, mask)?;
    if obs.n_missing() == 0 {
        return Ok(x.to_owned());
    }
    let p = model.lag_order();
    if obs.n_times() <= p {
        return Err(EmError::InsufficientData {
            n: obs.n_times(),
            min: p + 1,
        });
    }

    let mut state = obs.filled().clone();
    let mut ws = Workspace::new(obs.n_times(), obs.n_vars());
    Completion::from_config(config).complete(model, &mut state, &obs, &mut ws, rng)?;
    Ok(obs.completed(x, &state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn seeded_rng_is_reproducible() {
        let a: f64 = make_rng(Some(7)).random();
        let b: f64 = make_rng(Some(7)).random();
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_lag_capacity() {
        assert!(check_lag_capacity(0, 2, 10).is_ok());
        assert!(check_lag_capacity(2, 7, 2).is_ok());
        // 6 timesteps leave 4 rows for 4 regressors.
        assert!(matches!(
            check_lag_capacity(2, 6, 2),
            Err(EmError::LagOrderTooLarge {
                p: 2,
                n_times: 6,
                n_vars: 2
            })
        ));
    }

    #[test]
    fn lag_capacity_is_checked_before_the_data() {
        // The second variable is fully missing, but the shape already rules out p = 2.
        let x = array![
            [1.0, 2.0, 0.5, 1.5, 0.0, 1.0],
            [f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN],
        ];
        let fixed = EmConfig::new().with_lag_order(Some(2));
        assert!(matches!(
            fit_em(&fixed, x.view(), None),
            Err(EmError::LagOrderTooLarge { p: 2, .. })
        ));
        let selected = EmConfig::new().with_lag_order(None).with_max_lag_order(3);
        assert!(matches!(
            fit_em(&selected, x.view(), None),
            Err(EmError::LagOrderTooLarge { p: 3, .. })
        ));
        assert!(matches!(
            fit_em(&EmConfig::new(), x.view(), None),
            Err(EmError::FullyMissingVariable { index: 1 })
        ));
    }

    #[test]
    fn completion_follows_method() {
        let sample = Completion::from_config(&EmConfig::new());
        assert!(matches!(sample, Completion::Sample(_)));
        let exact = Completion::from_config(&EmConfig::new().with_method(Method::Mle));
        assert!(matches!(exact, Completion::Exact));
    }

    #[test]
    fn single_timestep_is_insufficient() {
        let x = array![[1.0], [2.0]];
        let err = fit_em(&EmConfig::new(), x.view(), None).err().unwrap();
        assert!(matches!(err, EmError::InsufficientData { n: 1, min: 2 }));
    }

    #[test]
    fn fully_observed_converges_immediately() {
        let x = array![[1.0, 2.0, 4.0, 3.0], [0.5, 0.0, 1.0, -1.0]];
        let fit = fit_em(&EmConfig::new().with_random_state(1), x.view(), None).unwrap();
        assert_eq!(fit.n_iter(), 1);
        assert!(fit.converged());
    }
}
