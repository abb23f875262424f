//! Series helpers for the mneme imputation crates.
//!
//! Non-finite values (NaN, infinity) are treated as gaps throughout.

/// Arithmetic mean of a slice. Returns 0.0 if empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f64 = data.iter().sum();
    sum / data.len() as f64
}

/// Fills gaps by linear interpolation between the nearest finite neighbours.
///
/// Leading gaps take the first finite value and trailing gaps the last one
/// (nearest-neighbour extrapolation). Finite entries are copied unchanged.
///
/// Returns `None` if the series has no finite value at all.
pub fn interpolate_linear(series: &[f64]) -> Option<Vec<f64>> {
    let first = series.iter().position(|x| x.is_finite())?;
    let mut out = series.to_vec();

    let first_val = series[first];
    for v in out.iter_mut().take(first) {
        *v = first_val;
    }

    let mut prev = first;
    for i in (first + 1)..series.len() {
        if !series[i].is_finite() {
            continue;
        }
        if i > prev + 1 {
            let (x0, x1) = (series[prev], series[i]);
            let span = (i - prev) as f64;
            for (k, v) in out.iter_mut().enumerate().take(i).skip(prev + 1) {
                let w = (k - prev) as f64 / span;
                *v = x0 + w * (x1 - x0);
            }
        }
        prev = i;
    }

    let last_val = series[prev];
    for v in out.iter_mut().skip(prev + 1) {
        *v = last_val;
    }

    Some(out)
}
