//! Simple Moving Average (SMA) indicator.

use super::Indicator;

/// SMA (Simple Moving Average) indicator.
///
/// Row `i` holds the arithmetic mean of `close[i + 1 - period..=i]` and is
/// undefined for the first `period - 1` rows.
pub struct Sma {
    period: usize,
}

impl Default for Sma {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl Indicator for Sma {
    fn id(&self) -> &str {
        match self.period {
            20 => "sma20",
            _ => "sma",
        }
    }

    fn name(&self) -> &str {
        match self.period {
            20 => "SMA (20)",
            _ => "SMA",
        }
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; closes.len()];
        if closes.len() < 2 {
            return out;
        }

        // Summed per window rather than as a running total.
        for (i, slot) in out.iter_mut().enumerate().skip(self.period - 1) {
            let window = &closes[i + 1 - self.period..=i];
            *slot = Some(window.iter().sum::<f64>() / self.period as f64);
        }

        out
    }
}
