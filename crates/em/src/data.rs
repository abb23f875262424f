//! Observation matrix validation and the interpolated starting state.

use ndarray::{Array2, ArrayView2};

use crate::error::EmError;

/// A validated observation matrix, stored time-major.
pub(crate) struct Observations {
    missing: Array2<bool>,
    missing_idx: Vec<(usize, usize)>,
    filled: Array2<f64>,
}

impl Observations {
    /// Validates `x` (shape `(n_vars, n_times)`) against `mask` and fills every
    /// missing entry by linear interpolation along time.
    ///
    /// Without a mask, NaN marks a missing entry and infinity is rejected.
    /// With a mask, entries under `true` are ignored and every other entry
    /// must be finite.
    pub(crate) fn new(x: ArrayView2<f64>, mask: Option<ArrayView2<bool>>) -> Result<Self, EmError> {
        let (n_vars, n_times) = x.dim();
        if n_vars == 0 || n_times == 0 {
            return Err(EmError::EmptyData);
        }

        let missing = match mask {
            Some(m) => {
                if m.dim() != x.dim() {
                    return Err(EmError::ShapeMismatch {
                        expected: x.dim(),
                        got: m.dim(),
                    });
                }
                if x.iter().zip(m.iter()).any(|(v, &miss)| !miss && !v.is_finite()) {
                    return Err(EmError::NonFiniteData);
                }
                Array2::from_shape_fn((n_times, n_vars), |(t, j)| m[[j, t]])
            }
            None => {
                if x.iter().any(|v| v.is_infinite()) {
                    return Err(EmError::NonFiniteData);
                }
                Array2::from_shape_fn((n_times, n_vars), |(t, j)| x[[j, t]].is_nan())
            }
        };

        let mut filled = Array2::<f64>::zeros((n_times, n_vars));
        for j in 0..n_vars {
            let series: Vec<f64> = (0..n_times)
                .map(|t| if missing[[t, j]] { f64::NAN } else { x[[j, t]] })
                .collect();
            let interpolated = mneme_stats::interpolate_linear(&series)
                .ok_or(EmError::FullyMissingVariable { index: j })?;
            for (t, v) in interpolated.into_iter().enumerate() {
                filled[[t, j]] = v;
            }
        }

        let missing_idx = missing
            .indexed_iter()
            .filter(|&(_, &m)| m)
            .map(|(idx, _)| idx)
            .collect();

        Ok(Self {
            missing,
            missing_idx,
            filled,
        })
    }

    pub(crate) fn n_times(&self) -> usize {
        self.filled.nrows()
    }

    pub(crate) fn n_vars(&self) -> usize {
        self.filled.ncols()
    }

    pub(crate) fn n_missing(&self) -> usize {
        self.missing_idx.len()
    }

    /// Time-major missingness, `true` = missing.
    pub(crate) fn missing(&self) -> &Array2<bool> {
        &self.missing
    }

    /// Missing `(t, j)` positions in row-major order.
    pub(crate) fn missing_idx(&self) -> &[(usize, usize)] {
        &self.missing_idx
    }

    /// Time-major matrix with missing entries linearly interpolated.
    pub(crate) fn filled(&self) -> &Array2<f64> {
        &self.filled
    }

    /// Copies `x` and overwrites its missing entries from the time-major `state`.
    ///
    /// Observed entries are never touched, so they stay bit-identical.
    pub(crate) fn completed(&self, x: ArrayView2<f64>, state: &Array2<f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for &(t, j) in &self.missing_idx {
            out[[j, t]] = state[[t, j]];
        }
        out
    }
}
