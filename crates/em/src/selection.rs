//! Information-criterion VAR lag-order selection.

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::config::Criterion;
use crate::error::EmError;
use crate::linalg;
use crate::mstep;

/// Selects the VAR lag order in `1..=max_lag_order` that minimises the
/// information criterion on a complete matrix of shape `(n_vars, n_times)`.
///
/// Every candidate is fitted by least squares on the common sample of rows
/// `max_lag_order..n_times` and scored as `ln|Σ̂_p| + penalty(p)`. Ties go
/// to the smaller order. Candidates with no more sample rows than
/// regressors, or whose regression fails, are skipped.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`EmError::EmptyData`] | no variables or no timesteps |
/// | [`EmError::NonFiniteData`] | any entry is NaN or infinite |
/// | [`EmError::InvalidConfig`] | `max_lag_order == 0` |
/// | [`EmError::LagOrderTooLarge`] | `max_lag_order * n_vars >= n_times` |
/// | [`EmError::AllCandidatesFailed`] | no candidate could be fitted |
#[tracing::instrument(skip_all, fields(n_vars = x.nrows(), n_times = x.ncols(), max_lag_order = max_lag_order, criterion = %criterion))]
pub fn select_lag_order(
    x: ArrayView2<f64>,
    max_lag_order: usize,
    criterion: Criterion,
) -> Result<usize, EmError> {
    let (n_vars, n_times) = x.dim();
    if n_vars == 0 || n_times == 0 {
        return Err(EmError::EmptyData);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EmError::NonFiniteData);
    }
    check_max_lag(max_lag_order, n_times, n_vars)?;
    let y = Array2::from_shape_fn((n_times, n_vars), |(t, j)| x[[j, t]]);
    select_time_major(&y, max_lag_order, criterion)
}

/// Rejects a zero maximum and one the sample length cannot support.
pub(crate) fn check_max_lag(max_lag_order: usize, n_times: usize, n_vars: usize) -> Result<(), EmError> {
    if max_lag_order == 0 {
        return Err(EmError::InvalidConfig {
            reason: "max_lag_order must be >= 1".to_string(),
        });
    }
    if max_lag_order.saturating_mul(n_vars) >= n_times {
        return Err(EmError::LagOrderTooLarge {
            p: max_lag_order,
            n_times,
            n_vars,
        });
    }
    Ok(())
}

/// Selection on a validated time-major matrix.
pub(crate) fn select_time_major(
    y: &Array2<f64>,
    max_lag_order: usize,
    criterion: Criterion,
) -> Result<usize, EmError> {
    let (n_times, n) = y.dim();
    let n_eff = (n_times - max_lag_order) as f64;
    let n_sq = (n * n) as f64;

    let mut best: Option<(usize, f64)> = None;
    for p in 1..=max_lag_order {
        if n_times - max_lag_order <= n * p {
            debug!(p, "skipping saturated VAR candidate");
            break;
        }
        let score = match candidate_log_det(y, p, max_lag_order) {
            Ok(log_det) => {
                let k = p as f64 * n_sq;
                let penalty = match criterion {
                    Criterion::Aic => 2.0 * k / n_eff,
                    Criterion::Bic => n_eff.ln() * k / n_eff,
                };
                log_det + penalty
            }
            Err(e) => {
                debug!(p, error = %e, "skipping VAR candidate");
                continue;
            }
        };
        debug!(p, score, "VAR candidate scored");
        if best.is_none_or(|(_, s)| score < s) {
            best = Some((p, score));
        }
    }

    best.map(|(p, _)| p)
        .ok_or(EmError::AllCandidatesFailed { max_lag_order })
}

fn candidate_log_det(y: &Array2<f64>, p: usize, start: usize) -> Result<f64, EmError> {
    let params = mstep::estimate(y, p, start)?;
    let chol = linalg::regularized_cholesky(&linalg::to_dmatrix(params.cov()), "candidate covariance")?;
    let log_det = linalg::log_det(&chol);
    if log_det.is_finite() {
        Ok(log_det)
    } else {
        Err(EmError::SingularMatrix {
            context: "candidate covariance",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn ar(coefs: &[f64], n: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut y = Array2::<f64>::zeros((n, 1));
        for t in 0..n {
            let mut v = normal.sample(&mut rng);
            for (k, a) in coefs.iter().enumerate() {
                if t > k {
                    v += a * y[[t - k - 1, 0]];
                }
            }
            y[[t, 0]] = v;
        }
        y
    }

    #[test]
    fn picks_ar1() {
        let y = ar(&[0.8], 2000, 3);
        assert_eq!(select_time_major(&y, 4, Criterion::Bic).unwrap(), 1);
    }

    #[test]
    fn picks_ar2() {
        let y = ar(&[0.5, 0.3], 2000, 4);
        assert_eq!(select_time_major(&y, 5, Criterion::Bic).unwrap(), 2);
    }

    #[test]
    fn aic_never_picks_below_true_order_on_long_series() {
        let y = ar(&[0.5, 0.3], 3000, 9);
        assert!(select_time_major(&y, 5, Criterion::Aic).unwrap() >= 2);
    }

    #[test]
    fn zero_max_is_invalid() {
        assert!(matches!(
            check_max_lag(0, 100, 2),
            Err(EmError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn capacity_is_checked() {
        assert!(matches!(
            check_max_lag(5, 10, 2),
            Err(EmError::LagOrderTooLarge {
                p: 5,
                n_times: 10,
                n_vars: 2
            })
        ));
        assert!(check_max_lag(4, 10, 2).is_ok());
    }

    #[test]
    fn saturated_order_is_never_selected() {
        // 9 timesteps, 2 vars, max 3: p = 3 has 6 rows for 6 regressors.
        let normal = Normal::new(0.0, 1.0).unwrap();
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let y = Array2::from_shape_fn((9, 2), |_| normal.sample(&mut rng));
            let p = select_time_major(&y, 3, Criterion::Bic).unwrap();
            assert!(p < 3, "seed {seed} selected saturated order {p}");
        }
    }

    #[test]
    fn all_saturated_candidates_fail() {
        // 5 timesteps, 4 vars, max 1: p = 1 has 4 rows for 4 regressors.
        let y = Array2::from_shape_fn((5, 4), |(t, j)| ((t * 3 + j) % 7) as f64);
        assert!(matches!(
            select_time_major(&y, 1, Criterion::Aic),
            Err(EmError::AllCandidatesFailed { max_lag_order: 1 })
        ));
    }

    #[test]
    fn public_entry_rejects_nan() {
        let x = ndarray::array![[1.0, f64::NAN, 0.0, 1.0, 2.0, 3.0]];
        assert!(matches!(
            select_lag_order(x.view(), 1, Criterion::Bic),
            Err(EmError::NonFiniteData)
        ));
    }
}
