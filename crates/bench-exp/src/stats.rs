use serde::{Deserialize, Serialize};

/// Summary of one metric over the successful repeats of a combination.
///
/// Every field is `None` when there were no successful samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricStats {
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 divisor); exactly zero for one sample.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MetricStats {
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: &[f64]) -> Self {
        let Some((mean, std)) = mean_std(samples) else {
            return Self::undefined();
        };
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            mean: Some(mean),
            std: Some(std),
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.mean.is_some()
    }
}

/// Arithmetic mean and sample standard deviation, `None` for no samples.
pub fn mean_std(samples: &[f64]) -> Option<(f64, f64)> {
    let len = samples.len();
    if len == 0 {
        return None;
    }
    let mean = samples.iter().sum::<f64>() / len as f64;
    if len == 1 {
        return Some((mean, 0.0));
    }
    let sum_sq = samples
        .iter()
        .map(|value| {
            let delta = value - mean;
            delta * delta
        })
        .sum::<f64>();
    Some((mean, (sum_sq / (len - 1) as f64).sqrt()))
}

/// `numerator / denominator`, defined only for finite operands, a strictly
/// positive denominator and a finite quotient.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(num), Some(den)) if num.is_finite() && den.is_finite() && den > 0.0 => {
            Some(num / den).filter(|value| value.is_finite())
        }
        _ => None,
    }
}
