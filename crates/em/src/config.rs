//! Configuration for EM imputation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EmError;

/// How the E-step completes missing entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Draw the missing entries by Langevin (Ornstein-Uhlenbeck-style)
    /// relaxation toward their conditional distribution.
    #[default]
    Sample,
    /// Replace the missing entries by their exact conditional expectation.
    Mle,
}

impl FromStr for Method {
    type Err = EmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sample" => Ok(Self::Sample),
            "mle" => Ok(Self::Mle),
            _ => Err(EmError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample => f.write_str("sample"),
            Self::Mle => f.write_str("mle"),
        }
    }
}

/// Information criterion used to select the VAR lag order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Akaike: `ln|Σ| + 2·k / N`.
    Aic,
    /// Bayesian (Schwarz): `ln|Σ| + ln(N)·k / N`.
    #[default]
    Bic,
}

impl FromStr for Criterion {
    type Err = EmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aic" => Ok(Self::Aic),
            "bic" => Ok(Self::Bic),
            _ => Err(EmError::InvalidCriterion(s.to_string())),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aic => f.write_str("aic"),
            Self::Bic => f.write_str("bic"),
        }
    }
}

/// Configuration for an EM imputation run.
///
/// Use the builder methods to customise parameters.
///
/// # Example
///
/// ```
/// use mneme_em::{Criterion, EmConfig, Method};
///
/// let config = EmConfig::new()
///     .with_method(Method::Mle)
///     .with_lag_order(None)
///     .with_criterion(Criterion::Aic);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmConfig {
    method: Method,
    max_iter_em: usize,
    n_iter_ou: usize,
    lag_order: Option<usize>,
    max_lag_order: usize,
    criterion: Criterion,
    stagnation_loglik: usize,
    loglik_lag: usize,
    loglik_tolerance: f64,
    param_tolerance: f64,
    dt: f64,
    ampli: f64,
    min_variance: f64,
    random_state: Option<u64>,
}

impl EmConfig {
    /// Creates a new configuration with defaults.
    ///
    /// Defaults: `method = Sample`, `max_iter_em = 200`, `n_iter_ou = 50`,
    /// `lag_order = Some(0)` (multivariate normal), `max_lag_order = 5`,
    /// `criterion = Bic`, `stagnation_loglik = 2`, `loglik_lag = 5`,
    /// `loglik_tolerance = 1e-3`, `param_tolerance = 1e-7`, `dt = 2e-2`,
    /// `ampli = 1.0`, `min_variance = 1e-10`, `random_state = None`.
    pub fn new() -> Self {
        Self {
            method: Method::Sample,
            max_iter_em: 200,
            n_iter_ou: 50,
            lag_order: Some(0),
            max_lag_order: 5,
            criterion: Criterion::Bic,
            stagnation_loglik: 2,
            loglik_lag: 5,
            loglik_tolerance: 1e-3,
            param_tolerance: 1e-7,
            dt: 2e-2,
            ampli: 1.0,
            min_variance: 1e-10,
            random_state: None,
        }
    }

    /// Sets the E-step completion method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the maximum number of EM iterations.
    pub fn with_max_iter_em(mut self, max_iter_em: usize) -> Self {
        self.max_iter_em = max_iter_em;
        self
    }

    /// Sets the number of inner Langevin steps per stochastic E-step.
    pub fn with_n_iter_ou(mut self, n_iter_ou: usize) -> Self {
        self.n_iter_ou = n_iter_ou;
        self
    }

    /// Sets the VAR lag order. `None` selects it from the data.
    pub fn with_lag_order(mut self, lag_order: Option<usize>) -> Self {
        self.lag_order = lag_order;
        self
    }

    /// Sets the largest lag order considered by automatic selection.
    pub fn with_max_lag_order(mut self, max_lag_order: usize) -> Self {
        self.max_lag_order = max_lag_order;
        self
    }

    /// Sets the information criterion for automatic lag selection.
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Sets how many consecutive stagnant log-likelihood checks end the fit.
    pub fn with_stagnation_loglik(mut self, stagnation_loglik: usize) -> Self {
        self.stagnation_loglik = stagnation_loglik;
        self
    }

    /// Sets how many iterations back the stagnation check compares against.
    pub fn with_loglik_lag(mut self, loglik_lag: usize) -> Self {
        self.loglik_lag = loglik_lag;
        self
    }

    /// Sets the absolute log-likelihood change considered stagnant.
    pub fn with_loglik_tolerance(mut self, loglik_tolerance: f64) -> Self {
        self.loglik_tolerance = loglik_tolerance;
        self
    }

    /// Sets the parameter change below which the fit is converged.
    ///
    /// Zero disables the parameter check.
    pub fn with_param_tolerance(mut self, param_tolerance: f64) -> Self {
        self.param_tolerance = param_tolerance;
        self
    }

    /// Sets the Langevin step size.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Sets the amplitude of the noise injected by the sampler.
    pub fn with_ampli(mut self, ampli: f64) -> Self {
        self.ampli = ampli;
        self
    }

    /// Sets the floor applied to covariance diagonals.
    pub fn with_min_variance(mut self, min_variance: f64) -> Self {
        self.min_variance = min_variance;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    // --- Accessors ---

    /// Returns the E-step completion method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the maximum number of EM iterations.
    pub fn max_iter_em(&self) -> usize {
        self.max_iter_em
    }

    /// Returns the number of inner Langevin steps.
    pub fn n_iter_ou(&self) -> usize {
        self.n_iter_ou
    }

    /// Returns the fixed lag order, or `None` for automatic selection.
    pub fn lag_order(&self) -> Option<usize> {
        self.lag_order
    }

    /// Returns the largest lag order considered by automatic selection.
    pub fn max_lag_order(&self) -> usize {
        self.max_lag_order
    }

    /// Returns the information criterion.
    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Returns the number of consecutive stagnant checks that end the fit.
    pub fn stagnation_loglik(&self) -> usize {
        self.stagnation_loglik
    }

    /// Returns the stagnation comparison lag.
    pub fn loglik_lag(&self) -> usize {
        self.loglik_lag
    }

    /// Returns the stagnation tolerance.
    pub fn loglik_tolerance(&self) -> f64 {
        self.loglik_tolerance
    }

    /// Returns the parameter-change tolerance.
    pub fn param_tolerance(&self) -> f64 {
        self.param_tolerance
    }

    /// Returns the Langevin step size.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Returns the noise amplitude.
    pub fn ampli(&self) -> f64 {
        self.ampli
    }

    /// Returns the covariance diagonal floor.
    pub fn min_variance(&self) -> f64 {
        self.min_variance
    }

    /// Returns the random seed, if set.
    pub fn random_state(&self) -> Option<u64> {
        self.random_state
    }

    /// Validates this configuration.
    ///
    /// Data-dependent checks (lag order against sample length) happen at
    /// `fit` entry, once the data shape is known.
    pub fn validate(&self) -> Result<(), EmError> {
        if self.max_iter_em < 1 {
            return Err(invalid(format!(
                "max_iter_em must be >= 1, got {}",
                self.max_iter_em
            )));
        }
        if self.method == Method::Sample && self.n_iter_ou < 1 {
            return Err(invalid(format!(
                "n_iter_ou must be >= 1 for method sample, got {}",
                self.n_iter_ou
            )));
        }
        if self.lag_order.is_none() && self.max_lag_order < 1 {
            return Err(invalid(format!(
                "max_lag_order must be >= 1 for automatic selection, got {}",
                self.max_lag_order
            )));
        }
        if self.stagnation_loglik < 1 {
            return Err(invalid(format!(
                "stagnation_loglik must be >= 1, got {}",
                self.stagnation_loglik
            )));
        }
        if self.loglik_lag < 1 {
            return Err(invalid(format!(
                "loglik_lag must be >= 1, got {}",
                self.loglik_lag
            )));
        }
        if !self.loglik_tolerance.is_finite() || self.loglik_tolerance < 0.0 {
            return Err(invalid(format!(
                "loglik_tolerance must be finite and non-negative, got {}",
                self.loglik_tolerance
            )));
        }
        if !self.param_tolerance.is_finite() || self.param_tolerance < 0.0 {
            return Err(invalid(format!(
                "param_tolerance must be finite and non-negative, got {}",
                self.param_tolerance
            )));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(invalid(format!(
                "dt must be finite and positive, got {}",
                self.dt
            )));
        }
        if !self.ampli.is_finite() || self.ampli < 0.0 {
            return Err(invalid(format!(
                "ampli must be finite and non-negative, got {}",
                self.ampli
            )));
        }
        if !self.min_variance.is_finite() || self.min_variance <= 0.0 {
            return Err(invalid(format!(
                "min_variance must be finite and positive, got {}",
                self.min_variance
            )));
        }
        Ok(())
    }
}

impl Default for EmConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(reason: String) -> EmError {
    EmError::InvalidConfig { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EmConfig::default();
        assert_eq!(cfg.method(), Method::Sample);
        assert_eq!(cfg.max_iter_em(), 200);
        assert_eq!(cfg.n_iter_ou(), 50);
        assert_eq!(cfg.lag_order(), Some(0));
        assert_eq!(cfg.max_lag_order(), 5);
        assert_eq!(cfg.criterion(), Criterion::Bic);
        assert_eq!(cfg.stagnation_loglik(), 2);
        assert_eq!(cfg.loglik_lag(), 5);
        assert!((cfg.dt() - 2e-2).abs() < f64::EPSILON);
        assert!((cfg.ampli() - 1.0).abs() < f64::EPSILON);
        assert!(cfg.random_state().is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_chaining() {
        let cfg = EmConfig::new()
            .with_method(Method::Mle)
            .with_max_iter_em(10)
            .with_n_iter_ou(5)
            .with_lag_order(None)
            .with_max_lag_order(3)
            .with_criterion(Criterion::Aic)
            .with_stagnation_loglik(4)
            .with_loglik_lag(2)
            .with_loglik_tolerance(0.5)
            .with_param_tolerance(0.0)
            .with_dt(0.1)
            .with_ampli(0.5)
            .with_min_variance(1e-6)
            .with_random_state(7);

        assert_eq!(cfg.method(), Method::Mle);
        assert_eq!(cfg.max_iter_em(), 10);
        assert_eq!(cfg.n_iter_ou(), 5);
        assert_eq!(cfg.lag_order(), None);
        assert_eq!(cfg.max_lag_order(), 3);
        assert_eq!(cfg.criterion(), Criterion::Aic);
        assert_eq!(cfg.stagnation_loglik(), 4);
        assert_eq!(cfg.loglik_lag(), 2);
        assert_eq!(cfg.loglik_tolerance(), 0.5);
        assert_eq!(cfg.param_tolerance(), 0.0);
        assert_eq!(cfg.dt(), 0.1);
        assert_eq!(cfg.ampli(), 0.5);
        assert_eq!(cfg.min_variance(), 1e-6);
        assert_eq!(cfg.random_state(), Some(7));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn method_from_str() {
        assert_eq!("sample".parse::<Method>().unwrap(), Method::Sample);
        assert_eq!("MLE".parse::<Method>().unwrap(), Method::Mle);
        let err = "gibbs".parse::<Method>().unwrap_err();
        assert!(matches!(err, EmError::InvalidMethod(ref s) if s == "gibbs"));
    }

    #[test]
    fn criterion_from_str() {
        assert_eq!("aic".parse::<Criterion>().unwrap(), Criterion::Aic);
        assert_eq!("Bic".parse::<Criterion>().unwrap(), Criterion::Bic);
        let err = "hqic".parse::<Criterion>().unwrap_err();
        assert!(matches!(err, EmError::InvalidCriterion(ref s) if s == "hqic"));
    }

    #[test]
    fn display_matches_from_str() {
        for m in [Method::Sample, Method::Mle] {
            assert_eq!(m.to_string().parse::<Method>().unwrap(), m);
        }
        for c in [Criterion::Aic, Criterion::Bic] {
            assert_eq!(c.to_string().parse::<Criterion>().unwrap(), c);
        }
    }

    #[test]
    fn validate_zero_max_iter() {
        let err = EmConfig::new().with_max_iter_em(0).validate().unwrap_err();
        assert!(matches!(err, EmError::InvalidConfig { .. }));
    }

    #[test]
    fn validate_zero_n_iter_ou_only_matters_for_sampling() {
        let sample = EmConfig::new().with_n_iter_ou(0);
        assert!(matches!(
            sample.validate(),
            Err(EmError::InvalidConfig { .. })
        ));
        let mle = EmConfig::new().with_n_iter_ou(0).with_method(Method::Mle);
        assert!(mle.validate().is_ok());
    }

    #[test]
    fn validate_auto_selection_needs_candidates() {
        let cfg = EmConfig::new().with_lag_order(None).with_max_lag_order(0);
        assert!(matches!(cfg.validate(), Err(EmError::InvalidConfig { .. })));
        // A fixed lag order ignores max_lag_order.
        let cfg = EmConfig::new().with_lag_order(Some(1)).with_max_lag_order(0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_step_size() {
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = EmConfig::new().with_dt(dt).validate().unwrap_err();
            assert!(matches!(err, EmError::InvalidConfig { .. }), "dt = {dt}");
        }
    }

    #[test]
    fn validate_tolerances() {
        assert!(EmConfig::new().with_loglik_tolerance(-1.0).validate().is_err());
        assert!(EmConfig::new().with_param_tolerance(f64::NAN).validate().is_err());
        assert!(EmConfig::new().with_ampli(-0.1).validate().is_err());
        assert!(EmConfig::new().with_min_variance(0.0).validate().is_err());
        assert!(EmConfig::new().with_stagnation_loglik(0).validate().is_err());
        assert!(EmConfig::new().with_loglik_lag(0).validate().is_err());
    }

    #[test]
    fn serde_uses_defaults_for_missing_fields() {
        let cfg: EmConfig =
            serde_json::from_str(r#"{"method": "mle", "lag_order": null}"#).unwrap();
        assert_eq!(cfg.method(), Method::Mle);
        assert_eq!(cfg.lag_order(), None);
        assert_eq!(cfg.max_iter_em(), 200);
    }

    #[test]
    fn serde_rejects_unknown_fields() {
        let result: Result<EmConfig, _> = serde_json::from_str(r#"{"n_iter": 3}"#);
        assert!(result.is_err());
    }
}
