//! Hour-by-hour occupancy smoothing and the business-hours floor.

use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::Rng;

/// Centered window width of the smoother.
pub const WINDOW: usize = 5;
/// Standard deviation of the Gaussian window, in hours.
pub const STD_DEV: f64 = 2.0;

/// Normalized Gaussian weights for offsets `-2..=2`.
pub fn gaussian_weights() -> [f64; WINDOW] {
    let half = (WINDOW / 2) as f64;
    let mut weights = [0.0; WINDOW];
    for (i, w) in weights.iter_mut().enumerate() {
        let k = i as f64 - half;
        *w = (-(k * k) / (2.0 * STD_DEV * STD_DEV)).exp();
    }
    let total: f64 = weights.iter().sum();
    weights.map(|w| w / total)
}

/// Gaussian-weighted centered moving average.
///
/// Where the full window does not fit (the first and last two hours) or holds
/// a non-finite value, the plain mean of the available finite neighbours is
/// used instead.
pub fn smooth(raw: &[f64]) -> Vec<f64> {
    let half = WINDOW / 2;
    let weights = gaussian_weights();

    (0..raw.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(raw.len() - 1);
            let window = &raw[lo..=hi];

            if window.len() == WINDOW && window.iter().all(|v| v.is_finite()) {
                return window.iter().zip(weights.iter()).map(|(v, w)| v * w).sum();
            }

            let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                0.0
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            }
        })
        .collect()
}

/// Weekday office hours, `start_hour <= hour < end_hour`, Monday to Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 19,
        }
    }
}

impl BusinessHours {
    pub fn contains(&self, local: &NaiveDateTime) -> bool {
        let weekday = local.weekday().num_days_from_monday() < 5;
        weekday && (self.start_hour..self.end_hour).contains(&local.hour())
    }
}

/// Minimum plausible activity during business hours.
///
/// A smoothed value under `min_fraction` of capacity is replaced by a draw
/// from `[min_fraction, max_fraction]` of capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyFloor {
    pub hours: BusinessHours,
    pub min_fraction: f64,
    pub max_fraction: f64,
}

impl Default for OccupancyFloor {
    fn default() -> Self {
        Self {
            hours: BusinessHours::default(),
            min_fraction: 0.15,
            max_fraction: 0.25,
        }
    }
}

impl OccupancyFloor {
    /// `slots[i]` is the local wall-clock time of `series[i]`.
    pub fn apply<R: Rng>(
        &self,
        series: &mut [f64],
        slots: &[NaiveDateTime],
        capacity: u32,
        rng: &mut R,
    ) -> usize {
        let lo = self.min_fraction * f64::from(capacity);
        let hi = (self.max_fraction * f64::from(capacity)).max(lo);
        let mut raised = 0;

        for (value, slot) in series.iter_mut().zip(slots) {
            if self.hours.contains(slot) && *value < lo {
                *value = rng.random_range(lo..=hi);
                raised += 1;
            }
        }
        raised
    }
}
