//! Signal generation: indicators, classification, history and the engine
//! that runs them in order.

pub mod classifier;
pub mod engine;
pub mod history;
pub mod indicators;

pub use classifier::{classify, RSI_OVERBOUGHT, RSI_OVERSOLD};
pub use engine::SignalEngine;
pub use history::{HistoryRecorder, HISTORY_HEADER};
pub use indicators::{Indicator, IndicatorFrame, IndicatorRow, Rsi, Sma};
