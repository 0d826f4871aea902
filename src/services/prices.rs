//! Reads the per-symbol daily price files written by the fetch step.

use crate::error::{PipelineError, Result};
use crate::services::storage_key;
use crate::types::{PriceBar, PriceSeries};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `<data_dir>/prices_<SYMBOL>.csv` into a [`PriceSeries`].
#[derive(Debug, Clone)]
pub struct PriceLoader {
    data_dir: PathBuf,
}

impl PriceLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("prices_{}.csv", storage_key(symbol)))
    }

    /// Read the price file for `symbol`.
    ///
    /// Rows with a non-numeric or non-positive close, an unparseable date, or
    /// a date not after the previous kept row are skipped.
    pub fn load(&self, symbol: &str) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(PipelineError::DataUnavailable(format!(
                "no price file at {}",
                path.display()
            )));
        }

        let unreadable = |e: csv::Error| {
            PipelineError::DataUnavailable(format!("{}: {}", path.display(), e))
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(unreadable)?;

        // Byte records, so undecodable text in unused columns is harmless.
        let headers = reader.byte_headers().map_err(unreadable)?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name.as_bytes()))
                .ok_or_else(|| {
                    PipelineError::DataUnavailable(format!(
                        "{} has no {} column",
                        path.display(),
                        name
                    ))
                })
        };
        let date_col = column("Date")?;
        let close_col = column("Close")?;

        let mut bars: Vec<PriceBar> = Vec::new();
        let mut dropped = 0usize;

        for record in reader.byte_records() {
            let record = record.map_err(unreadable)?;
            let field = |col: usize| record.get(col).and_then(|v| std::str::from_utf8(v).ok());
            let date = field(date_col).and_then(parse_date);
            let close = field(close_col)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c > 0.0);

            match (date, close) {
                (Some(date), Some(close))
                    if bars.last().map_or(true, |prev| date > prev.date) =>
                {
                    bars.push(PriceBar::new(date, close));
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!(symbol, dropped, kept = bars.len(), "Dropped invalid price rows");
        }
        if bars.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "{} has no valid price rows",
                path.display()
            )));
        }

        PriceSeries::from_bars(symbol, bars)
    }
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
