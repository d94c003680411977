//! Small numeric helpers shared by the aggregator, the trend analyzer and the
//! history trend summary.

use serde::{Deserialize, Serialize};

/// Standard deviation that maps to full volatility on the 1-10 mood scale.
pub const MAX_MOOD_STDDEV: f64 = 4.5;

/// Average difference (in score points) that counts as a real shift.
pub const SHIFT_THRESHOLD: f64 = 1.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation. Fewer than two points have no spread.
pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let Some(m) = mean(values) else {
        return 0.0;
    };
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Normalized spread of mood scores: 0 is flat, 1 is as scattered as the scale allows.
pub fn volatility(scores: &[f64]) -> f64 {
    let v = (sample_stddev(scores) / MAX_MOOD_STDDEV).min(1.0);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Improving,
    Declining,
    Stable,
}

/// Compares a recent average against a baseline using the shared ±1 threshold.
pub fn classify_shift(recent: f64, baseline: f64) -> Shift {
    if recent > baseline + SHIFT_THRESHOLD {
        Shift::Improving
    } else if recent < baseline - SHIFT_THRESHOLD {
        Shift::Declining
    } else {
        Shift::Stable
    }
}
