use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forecast direction for the next close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// UP only when the forecast strictly exceeds the latest close; ties are DOWN.
    pub fn from_prices(predicted: f64, latest: f64) -> Self {
        if predicted > latest {
            Trend::Up
        } else {
            Trend::Down
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "UP"),
            Trend::Down => write!(f, "DOWN"),
        }
    }
}

/// Trading recommendation emitted per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// One row of the signal history.
///
/// Column names match the history file read by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    #[serde(with = "minute_format")]
    pub time: NaiveDateTime,
    pub symbol: String,
    pub trend: Trend,
    pub signal: SignalAction,
    pub latest_price: f64,
    pub predicted_price: f64,
    /// Empty when the series was too short for RSI-14.
    #[serde(rename = "RSI")]
    pub rsi: Option<f64>,
    /// Empty when the series was too short for SMA-20.
    #[serde(rename = "SMA_20")]
    pub sma20: Option<f64>,
}

/// Whether the forecast came from a fresh fit or a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Trained,
    Loaded,
}

/// Where the model behind a forecast came from and how current it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProvenance {
    pub source: ModelSource,
    pub trained_at: DateTime<Utc>,
    /// Date of the last close the model was fit on.
    pub trained_through: NaiveDate,
    /// Closes used to fit the model.
    pub observations: usize,
    /// The price series extends past `trained_through`. The model is still used.
    pub stale: bool,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub record: SignalRecord,
    pub provenance: ModelProvenance,
}

mod minute_format {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(de::Error::custom)
    }
}
