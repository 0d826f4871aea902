//! Next-close forecasting with a per-symbol LSTM.
//!
//! The first forecast for a symbol trains a model on its full close history
//! and saves it. Later forecasts load that model and reuse it as-is, even
//! when newer closes have arrived; the returned provenance reports that.

pub mod lstm;
pub mod scaler;
pub mod store;

pub use lstm::{LstmRegressor, TrainingOptions};
pub use scaler::MinMaxScaler;
pub use store::{ArtifactStore, FileArtifactStore, MemoryArtifactStore, ModelArtifact};

use crate::config::{ForecasterConfig, LOOKBACK};
use crate::error::{PipelineError, Result};
use crate::types::{ModelProvenance, ModelSource, PriceSeries, Trend};
use chrono::Utc;
use ndarray::{Array1, Array2};
use tracing::{debug, info};

/// One next-close prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub trend: Trend,
    pub predicted_price: f64,
    pub latest_price: f64,
    pub provenance: ModelProvenance,
}

/// Trains or loads a model per symbol and predicts the next close.
pub struct SequenceForecaster<S: ArtifactStore> {
    store: S,
    config: ForecasterConfig,
}

impl<S: ArtifactStore> SequenceForecaster<S> {
    pub fn new(store: S, config: ForecasterConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ForecasterConfig {
        &self.config
    }

    /// Predict the close following the last bar of `series`.
    ///
    /// Trains and saves a model when the store has none for `symbol`,
    /// otherwise loads the saved one without retraining.
    pub fn forecast(&self, symbol: &str, series: &PriceSeries) -> Result<Forecast> {
        let (artifact, source) = if self.store.has_artifact(symbol)? {
            (self.store.load(symbol)?, ModelSource::Loaded)
        } else {
            (self.train(symbol, series)?, ModelSource::Trained)
        };

        if series.len() < LOOKBACK {
            return Err(PipelineError::InsufficientHistory {
                required: LOOKBACK,
                available: series.len(),
            });
        }
        let last = series.last().ok_or(PipelineError::InsufficientHistory {
            required: LOOKBACK,
            available: 0,
        })?;

        let closes = series.closes();
        let window = artifact
            .scaler
            .transform_all(&closes[closes.len() - LOOKBACK..]);
        let predicted_price = artifact.scaler.inverse_transform(artifact.model.predict(&window));
        let latest_price = last.close;

        let provenance = ModelProvenance {
            source,
            trained_at: artifact.trained_at,
            trained_through: artifact.trained_through,
            observations: artifact.observations,
            stale: last.date > artifact.trained_through,
        };
        if provenance.stale {
            debug!(
                symbol,
                trained_through = %artifact.trained_through,
                latest = %last.date,
                "Model predates latest close"
            );
        }

        Ok(Forecast {
            trend: Trend::from_prices(predicted_price, latest_price),
            predicted_price,
            latest_price,
            provenance,
        })
    }

    fn train(&self, symbol: &str, series: &PriceSeries) -> Result<ModelArtifact> {
        let insufficient = || PipelineError::InsufficientHistory {
            required: LOOKBACK + 1,
            available: series.len(),
        };
        if series.len() <= LOOKBACK {
            return Err(insufficient());
        }
        let last = series.last().ok_or_else(insufficient)?;

        let closes = series.closes();
        let scaler = MinMaxScaler::fit(&closes).ok_or_else(insufficient)?;
        let (windows, targets) = training_pairs(&scaler.transform_all(&closes));

        info!(
            symbol,
            observations = closes.len(),
            samples = targets.len(),
            epochs = self.config.epochs,
            "Training LSTM model"
        );

        let mut model = LstmRegressor::new(self.config.hidden_size, self.config.seed);
        let losses = model.fit(&windows, &targets, &TrainingOptions::from(&self.config))?;

        let artifact = ModelArtifact {
            symbol: symbol.to_string(),
            lookback: LOOKBACK,
            scaler,
            model,
            trained_at: Utc::now(),
            trained_through: last.date,
            observations: closes.len(),
        };
        self.store.save(symbol, &artifact)?;

        info!(
            symbol,
            final_loss = losses.last().copied().unwrap_or_default(),
            "Model trained and saved"
        );
        Ok(artifact)
    }
}

/// Sliding windows of `LOOKBACK` scaled closes, each paired with the close
/// that follows it. Yields `len - LOOKBACK` pairs.
fn training_pairs(scaled: &[f64]) -> (Array2<f64>, Array1<f64>) {
    let samples = scaled.len().saturating_sub(LOOKBACK);
    let windows = Array2::from_shape_fn((samples, LOOKBACK), |(r, c)| scaled[r + c]);
    let targets = Array1::from_shape_fn(samples, |r| scaled[r + LOOKBACK]);
    (windows, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceBar;
    use chrono::{Duration, NaiveDate};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(start + Duration::days(i as i64), c))
            .collect();
        PriceSeries::from_bars("TEST", bars).unwrap()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect()
    }

    fn small_config() -> ForecasterConfig {
        ForecasterConfig {
            hidden_size: 4,
            epochs: 1,
            batch_size: 16,
            ..ForecasterConfig::default()
        }
    }

    #[test]
    fn test_training_pairs_shape() {
        let scaled: Vec<f64> = (0..65).map(|i| i as f64).collect();
        let (windows, targets) = training_pairs(&scaled);

        assert_eq!(windows.dim(), (5, LOOKBACK));
        assert_eq!(targets.len(), 5);
        assert_eq!(windows[[0, 0]], 0.0);
        assert_eq!(windows[[4, LOOKBACK - 1]], 63.0);
        assert_eq!(targets[0], 60.0);
        assert_eq!(targets[4], 64.0);
    }

    #[test]
    fn test_first_forecast_trains_then_loads() {
        let forecaster = SequenceForecaster::new(MemoryArtifactStore::new(), small_config());
        let s = series(&wave(90));

        let first = forecaster.forecast("TEST", &s).unwrap();
        assert_eq!(first.provenance.source, ModelSource::Trained);
        assert!(!first.provenance.stale);
        assert_eq!(first.provenance.observations, 90);
        assert_eq!(first.latest_price, s.last().unwrap().close);
        assert!(first.predicted_price.is_finite());

        let second = forecaster.forecast("TEST", &s).unwrap();
        assert_eq!(second.provenance.source, ModelSource::Loaded);
        assert_eq!(second.predicted_price.to_bits(), first.predicted_price.to_bits());
        assert_eq!(forecaster.store().save_count(), 1);
        assert_eq!(forecaster.store().load_count(), 1);
    }

    #[test]
    fn test_training_requires_more_than_lookback() {
        let forecaster = SequenceForecaster::new(MemoryArtifactStore::new(), small_config());

        let err = forecaster.forecast("TEST", &series(&wave(60))).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory {
                required: 61,
                available: 60
            }
        ));
        assert_eq!(forecaster.store().save_count(), 0);
    }

    #[test]
    fn test_loaded_model_accepts_exactly_lookback() {
        let forecaster = SequenceForecaster::new(MemoryArtifactStore::new(), small_config());
        forecaster.forecast("TEST", &series(&wave(80))).unwrap();

        let short = series(&wave(LOOKBACK));
        assert!(forecaster.forecast("TEST", &short).is_ok());

        let too_short = series(&wave(LOOKBACK - 1));
        assert!(matches!(
            forecaster.forecast("TEST", &too_short),
            Err(PipelineError::InsufficientHistory { required: 60, .. })
        ));
    }

    #[test]
    fn test_loaded_model_reports_staleness() {
        let forecaster = SequenceForecaster::new(MemoryArtifactStore::new(), small_config());
        let closes = wave(100);
        forecaster.forecast("TEST", &series(&closes[..80])).unwrap();

        let later = forecaster.forecast("TEST", &series(&closes)).unwrap();
        assert_eq!(later.provenance.source, ModelSource::Loaded);
        assert!(later.provenance.stale);
        assert_eq!(later.provenance.observations, 80);
        assert_eq!(forecaster.store().save_count(), 1);
    }

    #[test]
    fn test_training_timeout_saves_nothing() {
        let config = ForecasterConfig {
            training_timeout: Some(std::time::Duration::ZERO),
            ..small_config()
        };
        let forecaster = SequenceForecaster::new(MemoryArtifactStore::new(), config);

        let err = forecaster.forecast("TEST", &series(&wave(90))).unwrap_err();
        assert!(matches!(err, PipelineError::TrainingTimeout(_)));
        assert!(!forecaster.store().has_artifact("TEST").unwrap());
    }
}
