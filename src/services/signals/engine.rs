//! End-to-end signal generation for one symbol.

use super::classifier::classify;
use super::history::HistoryRecorder;
use super::indicators::IndicatorFrame;
use crate::config::Config;
use crate::error::Result;
use crate::services::forecaster::{ArtifactStore, FileArtifactStore, SequenceForecaster};
use crate::services::prices::PriceLoader;
use crate::types::{PriceSeries, SignalRecord, SignalReport};
use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{info, info_span, warn};

/// Indicators, forecast, classification and history for a symbol.
pub struct SignalEngine<S: ArtifactStore> {
    prices: PriceLoader,
    forecaster: SequenceForecaster<S>,
    history: HistoryRecorder,
}

impl SignalEngine<FileArtifactStore> {
    /// Engine over the on-disk layout described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::with_store(config, FileArtifactStore::new(&config.model_dir))
    }
}

impl<S: ArtifactStore> SignalEngine<S> {
    pub fn new(
        prices: PriceLoader,
        forecaster: SequenceForecaster<S>,
        history: HistoryRecorder,
    ) -> Self {
        Self {
            prices,
            forecaster,
            history,
        }
    }

    /// Engine using `config` paths but a caller-supplied artifact store.
    pub fn with_store(config: &Config, store: S) -> Self {
        Self::new(
            PriceLoader::new(&config.data_dir),
            SequenceForecaster::new(store, config.forecaster.clone()),
            HistoryRecorder::new(&config.history_path),
        )
    }

    pub fn prices(&self) -> &PriceLoader {
        &self.prices
    }

    pub fn forecaster(&self) -> &SequenceForecaster<S> {
        &self.forecaster
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    /// Load the price file for `symbol` and generate a signal from it.
    pub fn generate(&self, symbol: &str) -> Result<SignalReport> {
        let span = info_span!("signal", symbol);
        let _enter = span.enter();

        let result = self
            .prices
            .load(symbol)
            .and_then(|series| self.run(&series));
        if let Err(e) = &result {
            warn!(error = %e, "Signal generation failed");
        }
        result
    }

    /// Generate a signal from prices the caller already holds.
    pub fn generate_from_series(&self, series: &PriceSeries) -> Result<SignalReport> {
        let span = info_span!("signal", symbol = series.symbol());
        let _enter = span.enter();

        let result = self.run(series);
        if let Err(e) = &result {
            warn!(error = %e, "Signal generation failed");
        }
        result
    }

    fn run(&self, series: &PriceSeries) -> Result<SignalReport> {
        let symbol = series.symbol();
        let frame = IndicatorFrame::compute(series);
        let forecast = self.forecaster.forecast(symbol, series)?;

        let rsi = frame.latest_rsi14();
        let sma20 = frame.latest_sma20();
        let signal = classify(forecast.trend, rsi, forecast.latest_price, sma20);

        let record = SignalRecord {
            time: current_minute(),
            symbol: symbol.to_string(),
            trend: forecast.trend,
            signal,
            latest_price: round2(forecast.latest_price),
            predicted_price: round2(forecast.predicted_price),
            rsi: rsi.map(round2),
            sma20: sma20.map(round2),
        };
        self.history.append(&record)?;

        info!(
            symbol,
            trend = %record.trend,
            signal = %record.signal,
            latest_price = record.latest_price,
            predicted_price = record.predicted_price,
            stale_model = forecast.provenance.stale,
            "Signal generated"
        );

        Ok(SignalReport {
            record,
            provenance: forecast.provenance,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Local wall-clock time at minute resolution, as stored in the history.
fn current_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecasterConfig;
    use crate::error::PipelineError;
    use crate::services::forecaster::MemoryArtifactStore;
    use crate::types::{PriceBar, SignalAction};
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> SignalEngine<MemoryArtifactStore> {
        let mut config = Config::rooted_at(dir.path());
        config.forecaster = ForecasterConfig {
            hidden_size: 4,
            epochs: 1,
            ..ForecasterConfig::default()
        };
        SignalEngine::with_store(&config, MemoryArtifactStore::new())
    }

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(start + Duration::days(i as i64), c))
            .collect();
        PriceSeries::from_bars("TEST", bars).unwrap()
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(101.23456), 101.23);
        assert_eq!(round2(99.999), 100.0);
        assert_eq!(round2(-1.234), -1.23);
    }

    #[test]
    fn test_current_minute_has_no_seconds() {
        let t = current_minute();
        assert_eq!(t.second(), 0);
        assert_eq!(t.nanosecond(), 0);
    }

    #[test]
    fn test_generate_appends_one_row() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.4).sin()).collect();

        let report = engine.generate_from_series(&series(&closes)).unwrap();

        let history = engine.history().read_all().unwrap();
        assert_eq!(history, vec![report.record.clone()]);
        assert_eq!(report.record.symbol, "TEST");
        assert_eq!(report.record.latest_price, round2(closes[79]));
        assert!(report.record.rsi.is_some());
        assert!(report.record.sma20.is_some());
    }

    #[test]
    fn test_failed_forecast_writes_no_history() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let closes: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();

        let err = engine.generate_from_series(&series(&closes)).unwrap_err();

        assert!(matches!(err, PipelineError::InsufficientHistory { .. }));
        assert!(!engine.history().path().exists());
    }

    #[test]
    fn test_missing_price_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let err = engine.generate("NOPE.NS").unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
        assert!(engine.history().read_all().unwrap().is_empty());
    }

    #[test]
    fn test_falling_prices_hold_whatever_the_trend() {
        // RSI is 0 and the close sits below SMA-20, so neither BUY nor SELL applies.
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let closes: Vec<f64> = (0..70).map(|i| 200.0 - i as f64 * 0.5).collect();

        let report = engine.generate_from_series(&series(&closes)).unwrap();
        assert_eq!(report.record.rsi, Some(0.0));
        assert_eq!(report.record.signal, SignalAction::Hold);
    }
}
