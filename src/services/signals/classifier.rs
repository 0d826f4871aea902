//! Decision table fusing the forecast trend with indicator state.

use crate::types::{SignalAction, Trend};

/// RSI at or above this blocks a BUY.
pub const RSI_OVERBOUGHT: f64 = 70.0;
/// RSI at or below this blocks a SELL.
pub const RSI_OVERSOLD: f64 = 30.0;

/// Classify one run.
///
/// - BUY: trend UP, RSI < 70 and close above SMA-20
/// - SELL: trend DOWN and RSI > 30
/// - HOLD: everything else, including any undefined indicator
pub fn classify(trend: Trend, rsi: Option<f64>, close: f64, sma20: Option<f64>) -> SignalAction {
    let (Some(rsi), Some(sma20)) = (rsi, sma20) else {
        return SignalAction::Hold;
    };

    match trend {
        Trend::Up if rsi < RSI_OVERBOUGHT && close > sma20 => SignalAction::Buy,
        Trend::Down if rsi > RSI_OVERSOLD => SignalAction::Sell,
        _ => SignalAction::Hold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_needs_all_three_conditions() {
        assert_eq!(classify(Trend::Up, Some(55.0), 105.0, Some(100.0)), SignalAction::Buy);
        assert_eq!(classify(Trend::Up, Some(75.0), 105.0, Some(100.0)), SignalAction::Hold);
        assert_eq!(classify(Trend::Up, Some(55.0), 95.0, Some(100.0)), SignalAction::Hold);
    }

    #[test]
    fn test_sell_unless_oversold() {
        assert_eq!(classify(Trend::Down, Some(50.0), 95.0, Some(100.0)), SignalAction::Sell);
        assert_eq!(classify(Trend::Down, Some(25.0), 95.0, Some(100.0)), SignalAction::Hold);
        // Price vs SMA does not matter for SELL.
        assert_eq!(classify(Trend::Down, Some(50.0), 105.0, Some(100.0)), SignalAction::Sell);
    }

    #[test]
    fn test_boundaries_are_strict() {
        assert_eq!(classify(Trend::Up, Some(70.0), 105.0, Some(100.0)), SignalAction::Hold);
        assert_eq!(classify(Trend::Up, Some(50.0), 100.0, Some(100.0)), SignalAction::Hold);
        assert_eq!(classify(Trend::Down, Some(30.0), 95.0, Some(100.0)), SignalAction::Hold);
    }

    #[test]
    fn test_undefined_indicators_force_hold() {
        assert_eq!(classify(Trend::Up, None, 105.0, Some(100.0)), SignalAction::Hold);
        assert_eq!(classify(Trend::Up, Some(50.0), 105.0, None), SignalAction::Hold);
        assert_eq!(classify(Trend::Down, None, 95.0, None), SignalAction::Hold);
        assert_eq!(classify(Trend::Down, Some(50.0), 95.0, None), SignalAction::Hold);
    }
}
