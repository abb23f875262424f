//! EM termination rules.

use serde::{Deserialize, Serialize};

use crate::config::EmConfig;

/// State of an EM run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// Iterations remain and no stopping rule has fired.
    Running,
    /// The log-likelihood stagnated or the parameters stopped moving.
    Converged,
    /// `max_iter_em` iterations ran without convergence.
    MaxIterReached,
}

impl ConvergenceStatus {
    /// Returns `true` for both terminal states.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Tracks the log-likelihood trace and decides when to stop.
#[derive(Debug, Clone)]
pub(crate) struct ConvergenceMonitor {
    max_iter: usize,
    stagnation_loglik: usize,
    loglik_lag: usize,
    loglik_tolerance: f64,
    param_tolerance: f64,
    trace: Vec<f64>,
    stagnant: usize,
    status: ConvergenceStatus,
}

impl ConvergenceMonitor {
    pub(crate) fn new(config: &EmConfig) -> Self {
        Self {
            max_iter: config.max_iter_em(),
            stagnation_loglik: config.stagnation_loglik(),
            loglik_lag: config.loglik_lag(),
            loglik_tolerance: config.loglik_tolerance(),
            param_tolerance: config.param_tolerance(),
            trace: Vec::new(),
            stagnant: 0,
            status: ConvergenceStatus::Running,
        }
    }

    /// Records one iteration and returns the updated status.
    ///
    /// `param_change` is the largest absolute parameter change of the
    /// iteration. Convergence takes precedence over the iteration cap.
    pub(crate) fn record(&mut self, loglik: f64, param_change: f64) -> ConvergenceStatus {
        self.trace.push(loglik);
        let k = self.trace.len();

        if k > self.loglik_lag {
            let delta = (self.trace[k - 1] - self.trace[k - 1 - self.loglik_lag]).abs();
            if delta < self.loglik_tolerance {
                self.stagnant += 1;
            } else {
                self.stagnant = 0;
            }
        }

        self.status = if self.stagnant >= self.stagnation_loglik || param_change < self.param_tolerance {
            ConvergenceStatus::Converged
        } else if k >= self.max_iter {
            ConvergenceStatus::MaxIterReached
        } else {
            ConvergenceStatus::Running
        };
        self.status
    }

    pub(crate) fn n_iter(&self) -> usize {
        self.trace.len()
    }

    pub(crate) fn status(&self) -> ConvergenceStatus {
        self.status
    }

    pub(crate) fn into_trace(self) -> Vec<f64> {
        self.trace
    }
}
