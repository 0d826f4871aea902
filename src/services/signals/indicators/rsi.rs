//! Relative Strength Index (RSI) indicator.

use super::Indicator;

/// RSI (Relative Strength Index) indicator.
///
/// Uses a rolling simple mean of gains and losses over the trailing `period`
/// deltas. Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// A window with no losses reads 100.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }

        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn id(&self) -> &str {
        "rsi"
    }

    fn name(&self) -> &str {
        match self.period {
            14 => "RSI (14)",
            _ => "RSI",
        }
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; closes.len()];
        if closes.len() < 2 {
            return out;
        }

        // deltas[k] is the change into row k + 1
        let mut gains = Vec::with_capacity(closes.len() - 1);
        let mut losses = Vec::with_capacity(closes.len() - 1);
        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        for (i, slot) in out.iter_mut().enumerate().skip(self.period) {
            let window = i - self.period..i;
            let avg_gain = gains[window.clone()].iter().sum::<f64>() / self.period as f64;
            let avg_loss = losses[window].iter().sum::<f64>() / self.period as f64;
            *slot = Some(Self::from_averages(avg_gain, avg_loss).clamp(0.0, 100.0));
        }

        out
    }
}
