//! Augur - daily trading signals from price history
//!
//! Loads daily closes for a symbol, computes SMA-20 and RSI-14, forecasts the
//! next close with a per-symbol LSTM, classifies BUY/SELL/HOLD and appends the
//! result to a CSV history.

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ForecasterConfig, LOOKBACK};
pub use error::{PipelineError, Result};
pub use services::{
    ArtifactStore, FileArtifactStore, Forecast, HistoryRecorder, MemoryArtifactStore,
    ModelArtifact, PriceLoader, SequenceForecaster, SignalEngine,
};
pub use types::*;
