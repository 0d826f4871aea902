pub mod forecaster;
pub mod prices;
pub mod signals;

pub use forecaster::{
    ArtifactStore, FileArtifactStore, Forecast, MemoryArtifactStore, ModelArtifact,
    SequenceForecaster,
};
pub use prices::PriceLoader;
pub use signals::{HistoryRecorder, SignalEngine};

/// File-name-safe key for a symbol. Used for both price files and model artifacts.
pub fn storage_key(symbol: &str) -> String {
    symbol.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}
