//! Integration tests for EmError variants.

use mneme_em::{
    Criterion, EmConfig, EmError, EmImputer, Method, estimate_params, select_lag_order,
};
use ndarray::{Array2, array};

fn series(n_vars: usize, n_times: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_vars, n_times), |(j, t)| ((t * 3 + j * 5) % 7) as f64 - 3.0)
}

#[test]
fn error_empty_data() {
    let imputer = EmImputer::default();
    let x = Array2::<f64>::zeros((0, 5));
    assert!(matches!(imputer.fit(x.view(), None), Err(EmError::EmptyData)));
    let x = Array2::<f64>::zeros((3, 0));
    assert!(matches!(imputer.fit(x.view(), None), Err(EmError::EmptyData)));
}

#[test]
fn error_insufficient_data() {
    let x = array![[1.0], [2.0]];
    assert!(matches!(
        EmImputer::default().fit(x.view(), None),
        Err(EmError::InsufficientData { n: 1, min: 2 })
    ));
}

#[test]
fn error_non_finite_infinity() {
    let mut x = series(2, 10);
    x[[1, 4]] = f64::NEG_INFINITY;
    assert!(matches!(
        EmImputer::default().fit(x.view(), None),
        Err(EmError::NonFiniteData)
    ));
}

#[test]
fn error_non_finite_under_explicit_mask() {
    let mut x = series(2, 10);
    x[[0, 3]] = f64::NAN;
    let mask = Array2::from_elem((2, 10), false);
    assert!(matches!(
        EmImputer::default().fit(x.view(), Some(mask.view())),
        Err(EmError::NonFiniteData)
    ));
}

#[test]
fn error_shape_mismatch() {
    let x = series(2, 10);
    let mask = Array2::from_elem((2, 9), false);
    assert!(matches!(
        EmImputer::default().fit(x.view(), Some(mask.view())),
        Err(EmError::ShapeMismatch {
            expected: (2, 10),
            got: (2, 9)
        })
    ));
}

#[test]
fn error_fully_missing_variable() {
    let mut x = series(3, 10);
    for t in 0..10 {
        x[[2, t]] = f64::NAN;
    }
    assert!(matches!(
        EmImputer::default().fit(x.view(), None),
        Err(EmError::FullyMissingVariable { index: 2 })
    ));
}

#[test]
fn error_fully_missing_variable_under_mask() {
    let x = series(2, 6);
    let mut mask = Array2::from_elem((2, 6), false);
    for t in 0..6 {
        mask[[0, t]] = true;
    }
    assert!(matches!(
        EmImputer::default().fit(x.view(), Some(mask.view())),
        Err(EmError::FullyMissingVariable { index: 0 })
    ));
}

#[test]
fn error_dimension_mismatch_on_transform() {
    let fit = EmImputer::new(EmConfig::new().with_method(Method::Mle))
        .fit(series(2, 20).view(), None)
        .unwrap();
    let other = series(3, 20);
    assert!(matches!(
        fit.transform(other.view()),
        Err(EmError::DimensionMismatch {
            expected: 2,
            got: 3
        })
    ));
}

#[test]
fn error_invalid_method() {
    let err = "gibbs".parse::<Method>().unwrap_err();
    assert!(matches!(err, EmError::InvalidMethod(ref s) if s == "gibbs"));
}

#[test]
fn error_invalid_criterion() {
    let err = "hqic".parse::<Criterion>().unwrap_err();
    assert!(matches!(err, EmError::InvalidCriterion(ref s) if s == "hqic"));
}

#[test]
fn error_invalid_config_raised_before_data() {
    let x = series(2, 10);
    for config in [
        EmConfig::new().with_max_iter_em(0),
        EmConfig::new().with_n_iter_ou(0),
        EmConfig::new().with_dt(0.0),
        EmConfig::new().with_dt(f64::NAN),
        EmConfig::new().with_ampli(-1.0),
        EmConfig::new().with_loglik_tolerance(-1.0),
        EmConfig::new().with_lag_order(None).with_max_lag_order(0),
    ] {
        assert!(
            matches!(
                EmImputer::new(config.clone()).fit(x.view(), None),
                Err(EmError::InvalidConfig { .. })
            ),
            "{config:?}"
        );
    }
}

#[test]
fn error_fixed_lag_order_too_large() {
    // VAR(3) on 2 variables needs more than 9 timesteps.
    let imputer = EmImputer::new(EmConfig::new().with_lag_order(Some(3)));
    for n_times in [8, 9] {
        let x = series(2, n_times);
        assert!(matches!(
            imputer.fit(x.view(), None),
            Err(EmError::LagOrderTooLarge { p: 3, n_vars: 2, .. })
        ));
    }
}

#[test]
fn error_max_lag_order_too_large() {
    let x = series(2, 10);
    let imputer = EmImputer::new(EmConfig::new().with_lag_order(None).with_max_lag_order(5));
    assert!(matches!(
        imputer.fit(x.view(), None),
        Err(EmError::LagOrderTooLarge { p: 5, .. })
    ));
    assert!(matches!(
        select_lag_order(x.view(), 5, Criterion::Bic),
        Err(EmError::LagOrderTooLarge { p: 5, .. })
    ));
}

#[test]
fn error_select_zero_max() {
    let x = series(1, 30);
    assert!(matches!(
        select_lag_order(x.view(), 0, Criterion::Aic),
        Err(EmError::InvalidConfig { .. })
    ));
}

#[test]
fn error_estimate_params_insufficient() {
    // 5 timesteps, p = 2, 2 variables: 3 usable rows for 4 regressors.
    let x = series(2, 5);
    assert!(matches!(
        estimate_params(x.view(), 2),
        Err(EmError::InsufficientData { n: 5, .. })
    ));
    // 6 timesteps leave 4 rows for 4 regressors: still rejected.
    let x = series(2, 6);
    assert!(matches!(
        estimate_params(x.view(), 2),
        Err(EmError::InsufficientData { n: 6, min: 7 })
    ));
}

#[test]
fn error_lag_too_large_wins_over_fully_missing_variable() {
    let mut x = series(2, 8);
    x.row_mut(1).fill(f64::NAN);
    let imputer = EmImputer::new(EmConfig::new().with_lag_order(Some(3)));
    assert!(matches!(
        imputer.fit(x.view(), None),
        Err(EmError::LagOrderTooLarge { p: 3, .. })
    ));
}

#[test]
fn errors_display_and_propagate() {
    fn fallible() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let x = Array2::<f64>::zeros((0, 0));
        EmImputer::default().fit(x.view(), None)?;
        Ok(())
    }
    let err = fallible().unwrap_err();
    assert_eq!(err.to_string(), "input data is empty");
}
