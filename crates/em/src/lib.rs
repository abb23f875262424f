//! # mneme-em
//!
//! Expectation-Maximisation imputation of missing values in multivariate
//! series modelled as a multivariate normal (`p = 0`) or a centred VAR(p)
//! process.
//!
//! ## Typestate Workflow
//!
//! ```mermaid
//! graph LR
//!     A["EmImputer::new(config)"] -->|".fit(x.view(), mask)?"| B["EmFit"]
//!     B --> C[".params(): B, A_1..A_p, Σ"]
//!     B --> D[".loglik_trace()"]
//!     B --> E[".status()"]
//!     B --> F[".transform(x.view())?"]
//!     H["select_lag_order(x, max, criterion)?"] -->|"lag order"| A
//! ```
//!
//! ## Two Completion Methods
//!
//! **`sample`** (default): missing entries are relaxed by a preconditioned
//! Langevin chain toward their conditional distribution. Stochastic and an
//! approximation, seeded through `random_state`.
//!
//! **`mle`**: missing entries are replaced by their exact conditional
//! expectation. Deterministic.
//!
//! ```
//! use mneme_em::{EmConfig, EmImputer, Method};
//! use ndarray::array;
//!
//! let x = array![
//!     [0.3, f64::NAN, 0.1, 0.7, 0.2],
//!     [1.0, 1.4, 0.9, f64::NAN, 1.1],
//! ];
//! let completed = EmImputer::new(EmConfig::new().with_method(Method::Mle))
//!     .fit_transform(x.view())
//!     .unwrap();
//! assert_eq!(completed[[0, 0]], 0.3);
//! assert!(completed[[0, 1]].is_finite());
//! ```
//!
//! ## Mathematical Glossary
//!
//! | Symbol | Accessor | Meaning |
//! |--------|----------|---------|
//! | B | [`ProcessParams::mean()`] | Process mean |
//! | A_k | [`ProcessParams::coefs()`] | Lag-k coefficient matrix |
//! | Σ | [`ProcessParams::cov()`] | Innovation covariance |
//! | p | [`EmFit::lag_order()`] | Number of lags (0 = multivariate normal) |
//! | ℓ | [`EmFit::loglik_trace()`] | Completed-data log-likelihood per iteration |

mod config;
mod error;
mod fit;
mod monitor;
mod mstep;
mod params;
mod selection;
mod spec;

pub(crate) mod conditional;
pub(crate) mod data;
pub(crate) mod engine;
pub(crate) mod linalg;
pub(crate) mod model;
pub(crate) mod sampler;

pub use config::{Criterion, EmConfig, Method};
pub use error::EmError;
pub use fit::EmFit;
pub use monitor::ConvergenceStatus;
pub use mstep::estimate_params;
pub use params::ProcessParams;
pub use selection::select_lag_order;
pub use spec::EmImputer;
