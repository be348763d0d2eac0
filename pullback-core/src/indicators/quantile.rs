//! Linear-interpolated quantiles, whole-series and causal.
//!
//! Interpolation follows the usual "linear" definition: with the finite
//! values sorted ascending as `x[0..n]`, position `p = q * (n - 1)` and the
//! result is `x[floor(p)] + (x[ceil(p)] - x[floor(p)]) * frac(p)`.
//! NaN values are ignored; an empty input yields NaN.

/// Quantile `q` (0.0..=1.0) over all finite values of `values`.
///
/// Non-causal when applied to a whole series: every bar sees the same
/// threshold, including bars before the data that shaped it.
pub fn quantile_linear(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    interpolate(&sorted, q)
}

fn interpolate(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Incrementally maintained sorted buffer answering expanding-window
/// quantiles: after pushing values `0..=i`, [`CausalQuantile::quantile`]
/// sees exactly those values.
#[derive(Debug, Clone, Default)]
pub struct CausalQuantile {
    sorted: Vec<f64>,
}

impl CausalQuantile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; NaN is ignored.
    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        let at = self.sorted.partition_point(|x| *x < value);
        self.sorted.insert(at, value);
    }

    pub fn quantile(&self, q: f64) -> f64 {
        interpolate(&self.sorted, q)
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Expanding quantile series: element `i` is the quantile of `values[..=i]`.
    pub fn series(values: &[f64], q: f64) -> Vec<f64> {
        let mut acc = Self::new();
        values
            .iter()
            .map(|&v| {
                acc.push(v);
                acc.quantile(q)
            })
            .collect()
    }
}
