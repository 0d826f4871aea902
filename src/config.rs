use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Number of trailing closes the forecaster looks at.
pub const LOOKBACK: usize = 60;

/// Sequence model hyperparameters.
#[derive(Debug, Clone)]
pub struct ForecasterConfig {
    /// Width of the single recurrent layer.
    pub hidden_size: usize,
    /// Passes over the training windows.
    pub epochs: usize,
    /// Windows per optimizer step.
    pub batch_size: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Seed for weight initialisation and batch shuffling.
    pub seed: u64,
    /// Abort training (and persist nothing) once this much time has passed.
    pub training_timeout: Option<Duration>,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            hidden_size: 50,
            epochs: 5,
            batch_size: 32,
            learning_rate: 0.001,
            seed: 42,
            training_timeout: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `prices_<SYMBOL>.csv` files.
    pub data_dir: PathBuf,
    /// Directory holding per-symbol model artifacts.
    pub model_dir: PathBuf,
    /// Append-only signal history.
    pub history_path: PathBuf,
    /// Sequence model settings.
    pub forecaster: ForecasterConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = ForecasterConfig::default();

        let data_dir =
            PathBuf::from(env::var("AUGUR_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let model_dir =
            PathBuf::from(env::var("AUGUR_MODEL_DIR").unwrap_or_else(|_| "models".to_string()));
        let history_path = env::var("AUGUR_HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("signals.csv"));

        Self {
            data_dir,
            model_dir,
            history_path,
            forecaster: ForecasterConfig {
                hidden_size: env::var("AUGUR_HIDDEN_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|&v| v > 0)
                    .unwrap_or(defaults.hidden_size),
                epochs: env::var("AUGUR_EPOCHS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.epochs),
                batch_size: env::var("AUGUR_BATCH_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|&v| v > 0)
                    .unwrap_or(defaults.batch_size),
                learning_rate: env::var("AUGUR_LEARNING_RATE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.learning_rate),
                seed: env::var("AUGUR_SEED")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.seed),
                training_timeout: env::var("AUGUR_TRAINING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs),
            },
        }
    }

    /// Same layout rooted at `root`, ignoring the environment.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data_dir = root.join("data");
        Self {
            history_path: data_dir.join("signals.csv"),
            model_dir: root.join("models"),
            data_dir,
            forecaster: ForecasterConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
