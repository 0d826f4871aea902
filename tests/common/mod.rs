//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use augur::{Config, ForecasterConfig, PriceBar, PriceSeries};
use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::Path;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// One bar per calendar day starting 2024-01-01.
pub fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::new(start_date() + Duration::days(i as i64), c))
        .collect();
    PriceSeries::from_bars(symbol, bars).unwrap()
}

pub fn rising(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

pub fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 250.0 + (i as f64 * 0.25).sin() * 10.0 + i as f64 * 0.1)
        .collect()
}

/// Small model so tests that train stay quick.
pub fn quick_forecaster() -> ForecasterConfig {
    ForecasterConfig {
        hidden_size: 6,
        epochs: 2,
        batch_size: 16,
        ..ForecasterConfig::default()
    }
}

pub fn quick_config(root: &Path) -> Config {
    let mut config = Config::rooted_at(root);
    config.forecaster = quick_forecaster();
    config
}

/// Write a price file in the layout the fetch step produces.
pub fn write_price_file(config: &Config, symbol: &str, closes: &[String]) {
    fs::create_dir_all(&config.data_dir).unwrap();
    let mut body = String::from("Date,Open,High,Low,Close,Volume\n");
    for (i, close) in closes.iter().enumerate() {
        let date = start_date() + Duration::days(i as i64);
        body.push_str(&format!("{},0,0,0,{},1000\n", date, close));
    }
    fs::write(config.data_dir.join(format!("prices_{}.csv", symbol)), body).unwrap();
}
