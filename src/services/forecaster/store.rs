//! Persistence for trained per-symbol models.

use super::lstm::LstmRegressor;
use super::scaler::MinMaxScaler;
use crate::config::LOOKBACK;
use crate::error::{PipelineError, Result};
use crate::services::storage_key;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use tracing::debug;

/// A trained model plus the scaler bounds it was fit with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    pub symbol: String,
    pub lookback: usize,
    pub scaler: MinMaxScaler,
    pub model: LstmRegressor,
    pub trained_at: DateTime<Utc>,
    /// Date of the last close in the training series.
    pub trained_through: NaiveDate,
    /// Number of closes in the training series.
    pub observations: usize,
}

impl ModelArtifact {
    /// Reject artifacts that belong to another symbol or do not fit this model shape.
    fn check_compatible(&self, symbol: &str, location: &str) -> Result<()> {
        if self.symbol != symbol {
            return Err(PipelineError::storage(
                location,
                format!("artifact belongs to {:?}, not {:?}", self.symbol, symbol),
            ));
        }
        if self.lookback != LOOKBACK {
            return Err(PipelineError::storage(
                location,
                format!("artifact lookback {} != {}", self.lookback, LOOKBACK),
            ));
        }
        if !self.model.is_well_formed() {
            return Err(PipelineError::storage(location, "artifact weights are malformed"));
        }
        Ok(())
    }
}

/// Where trained models live between runs.
pub trait ArtifactStore: Send + Sync {
    /// Whether a model has been saved for `symbol`.
    fn has_artifact(&self, symbol: &str) -> Result<bool>;

    /// Load the saved model for `symbol`.
    fn load(&self, symbol: &str) -> Result<ModelArtifact>;

    /// Save (or replace) the model for `symbol`. Readers see either the old
    /// artifact or the new one, never a partial write.
    fn save(&self, symbol: &str, artifact: &ModelArtifact) -> Result<()>;
}

/// JSON artifacts at `<dir>/lstm_<SYMBOL>.json`.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact file for a symbol.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("lstm_{}.json", storage_key(symbol)))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn has_artifact(&self, symbol: &str) -> Result<bool> {
        let path = self.path_for(symbol);
        path.try_exists()
            .map_err(|e| PipelineError::storage(path.display(), e))
    }

    fn load(&self, symbol: &str) -> Result<ModelArtifact> {
        let path = self.path_for(symbol);
        let location = path.display().to_string();

        let bytes = fs::read(&path).map_err(|e| PipelineError::storage(&location, e))?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::storage(&location, format!("corrupt artifact: {}", e)))?;
        artifact.check_compatible(symbol, &location)?;

        debug!(symbol, path = %location, "Loaded model artifact");
        Ok(artifact)
    }

    fn save(&self, symbol: &str, artifact: &ModelArtifact) -> Result<()> {
        let path = self.path_for(symbol);
        let location = path.display().to_string();

        fs::create_dir_all(&self.dir)
            .map_err(|e| PipelineError::storage(self.dir.display(), e))?;

        let bytes =
            serde_json::to_vec(artifact).map_err(|e| PipelineError::storage(&location, e))?;
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| PipelineError::storage(&location, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| PipelineError::storage(&location, e))?;
        tmp.persist(&path)
            .map_err(|e| PipelineError::storage(&location, e.error))?;

        debug!(symbol, path = %location, bytes = bytes.len(), "Saved model artifact");
        Ok(())
    }
}

/// In-process store; counts saves and loads so callers can observe reuse.
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: DashMap<String, ModelArtifact>,
    saves: AtomicUsize,
    loads: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Drop the model for `symbol`, forcing the next forecast to retrain.
    pub fn remove(&self, symbol: &str) -> Option<ModelArtifact> {
        self.artifacts.remove(&storage_key(symbol)).map(|(_, a)| a)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn has_artifact(&self, symbol: &str) -> Result<bool> {
        Ok(self.artifacts.contains_key(&storage_key(symbol)))
    }

    fn load(&self, symbol: &str) -> Result<ModelArtifact> {
        let artifact = self
            .artifacts
            .get(&storage_key(symbol))
            .map(|a| a.value().clone())
            .ok_or_else(|| PipelineError::storage(symbol, "no artifact in memory store"))?;
        artifact.check_compatible(symbol, "memory store")?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(artifact)
    }

    fn save(&self, symbol: &str, artifact: &ModelArtifact) -> Result<()> {
        self.artifacts.insert(storage_key(symbol), artifact.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for std::sync::Arc<S> {
    fn has_artifact(&self, symbol: &str) -> Result<bool> {
        (**self).has_artifact(symbol)
    }

    fn load(&self, symbol: &str) -> Result<ModelArtifact> {
        (**self).load(symbol)
    }

    fn save(&self, symbol: &str, artifact: &ModelArtifact) -> Result<()> {
        (**self).save(symbol, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(symbol: &str) -> ModelArtifact {
        ModelArtifact {
            symbol: symbol.to_string(),
            lookback: LOOKBACK,
            scaler: MinMaxScaler::fit(&[10.0, 20.0]).unwrap(),
            model: LstmRegressor::new(4, 1),
            trained_at: Utc::now(),
            trained_through: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            observations: 120,
        }
    }

    #[test]
    fn test_file_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path().join("models"));

        assert!(!store.has_artifact("TCS.NS").unwrap());
        store.save("TCS.NS", &artifact("TCS.NS")).unwrap();
        assert!(store.has_artifact("TCS.NS").unwrap());

        let saved = artifact("TCS.NS");
        store.save("TCS.NS", &saved).unwrap();
        assert_eq!(store.load("TCS.NS").unwrap(), saved);
        assert!(store.path_for("TCS.NS").ends_with("lstm_TCS.NS.json"));
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());

        store.save("INFY.NS", &artifact("INFY.NS")).unwrap();
        store.save("INFY.NS", &artifact("INFY.NS")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["lstm_INFY.NS.json".to_string()]);
    }

    #[test]
    fn test_file_store_sanitizes_symbol() {
        let store = FileArtifactStore::new("models");
        assert_eq!(
            store.path_for("BRK/B:US"),
            PathBuf::from("models/lstm_BRK_B_US.json")
        );
    }

    #[test]
    fn test_corrupt_artifact_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        fs::write(store.path_for("TCS.NS"), b"{not json").unwrap();

        let err = store.load("TCS.NS").unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(err.to_string().contains("corrupt artifact"));
    }

    #[test]
    fn test_missing_artifact_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());

        assert!(matches!(store.load("NOPE"), Err(PipelineError::Storage(_))));
    }

    #[test]
    fn test_wrong_lookback_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let mut bad = artifact("TCS.NS");
        bad.lookback = 30;
        store.save("TCS.NS", &bad).unwrap();

        let err = store.load("TCS.NS").unwrap_err();
        assert!(err.to_string().contains("lookback"));
    }

    #[test]
    fn test_save_failure_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("models");
        fs::write(&blocker, b"").unwrap();
        let store = FileArtifactStore::new(&blocker);

        let err = store.save("TCS.NS", &artifact("TCS.NS")).unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("models"));
    }

    #[test]
    fn test_colliding_symbols_do_not_share_a_model() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        assert_eq!(store.path_for("BRK/B"), store.path_for("BRK_B"));

        store.save("BRK/B", &artifact("BRK/B")).unwrap();

        assert!(store.load("BRK/B").is_ok());
        let err = store.load("BRK_B").unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(err.to_string().contains("BRK/B"));
    }

    #[test]
    fn test_memory_store_rejects_colliding_symbol() {
        let store = MemoryArtifactStore::new();
        store.save("BRK/B", &artifact("BRK/B")).unwrap();

        assert!(matches!(store.load("BRK_B"), Err(PipelineError::Storage(_))));
        assert_eq!(store.load_count(), 0);
    }

    #[test]
    fn test_memory_store_counts() {
        let store = MemoryArtifactStore::new();
        assert!(!store.has_artifact("X").unwrap());

        store.save("X", &artifact("X")).unwrap();
        store.load("X").unwrap();
        store.load("X").unwrap();

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_count(), 2);
        assert!(store.remove("X").is_some());
        assert!(!store.has_artifact("X").unwrap());
    }
}
