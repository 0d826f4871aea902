//! Technical indicator implementations.

pub mod rsi;
pub mod sma;

pub use rsi::Rsi;
pub use sma::Sma;

use crate::types::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trait for rolling indicators over a close-price series.
pub trait Indicator: Send + Sync {
    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Minimum number of closes before the first defined value.
    fn min_periods(&self) -> usize;

    /// One value per input row; `None` where history is insufficient.
    /// Inputs shorter than two rows yield no defined values.
    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>>;
}

/// One row of a price series with its derived indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub close: f64,
    pub sma20: Option<f64>,
    pub rsi14: Option<f64>,
}

/// A price series extended with SMA-20 and RSI-14.
///
/// The source series is left untouched; rows are rebuilt here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    /// Compute SMA-20 and RSI-14 for every row of `series`.
    pub fn compute(series: &PriceSeries) -> Self {
        let closes = series.closes();
        let sma = Sma::default().compute(&closes);
        let rsi = Rsi::default().compute(&closes);

        let rows = series
            .bars()
            .iter()
            .zip(sma)
            .zip(rsi)
            .map(|((bar, sma20), rsi14)| IndicatorRow {
                date: bar.date,
                close: bar.close,
                sma20,
                rsi14,
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.rows.last().map(|r| r.close)
    }

    /// SMA-20 on the newest row where it is defined.
    pub fn latest_sma20(&self) -> Option<f64> {
        self.rows.iter().rev().find_map(|r| r.sma20)
    }

    /// RSI-14 on the newest row where it is defined.
    pub fn latest_rsi14(&self) -> Option<f64> {
        self.rows.iter().rev().find_map(|r| r.rsi14)
    }
}
