//! Strategy configuration.
//!
//! Every strategy variant is the same engine with different parameters, so a
//! variant is nothing more than a `StrategyConfig` value.

use serde::Serialize;

use crate::domain::config_validation::{
    parse_f64, parse_fractions, parse_usize, validate_strategy_config,
};
use crate::domain::error::PapertraderError;
use crate::ports::config_port::ConfigPort;

pub const SECTION: &str = "strategy";

/// Keys accepted in the `[strategy]` section.
pub const STRATEGY_KEYS: &[&str] = &[
    "name",
    "rsi_window",
    "rsi_oversold",
    "rsi_overbought",
    "sma_fast_window",
    "sma_slow_window",
    "adx_window",
    "adx_threshold",
    "volume_window",
    "volume_surge_factor",
    "atr_window",
    "atr_stop_multiplier",
    "atr_tp1_multiplier",
    "atr_tp2_multiplier",
    "tp_size_fractions",
    "trailing_activation_pct",
    "trailing_percentage",
    "macd_fast",
    "macd_slow",
    "macd_signal",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyConfig {
    pub name: String,
    pub rsi_window: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub sma_fast_window: usize,
    pub sma_slow_window: usize,
    pub adx_window: usize,
    pub adx_threshold: f64,
    pub volume_window: usize,
    pub volume_surge_factor: f64,
    pub atr_window: usize,
    pub atr_stop_multiplier: f64,
    pub atr_tp1_multiplier: f64,
    pub atr_tp2_multiplier: f64,
    /// Share of the original position sold at each take-profit tier.
    pub tp_size_fractions: Vec<f64>,
    /// Unrealized gain, in percent, that arms the trailing stop.
    pub trailing_activation_pct: f64,
    /// Trailing distance below the peak, as a fraction.
    pub trailing_percentage: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            rsi_window: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            sma_fast_window: 10,
            sma_slow_window: 20,
            adx_window: 14,
            adx_threshold: 20.0,
            volume_window: 20,
            volume_surge_factor: 1.1,
            atr_window: 14,
            atr_stop_multiplier: 2.0,
            atr_tp1_multiplier: 2.5,
            atr_tp2_multiplier: 4.0,
            tp_size_fractions: vec![0.5, 0.5],
            trailing_activation_pct: 5.0,
            trailing_percentage: 0.03,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl StrategyConfig {
    /// Build a validated config from a flat key/value mapping.
    ///
    /// Missing keys keep their defaults; unknown keys are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, PapertraderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = StrategyConfig::default();

        for (key, value) in pairs {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            match key {
                "name" => config.name = value.to_string(),
                "rsi_window" => config.rsi_window = parse_usize(SECTION, key, value)?,
                "rsi_oversold" => config.rsi_oversold = parse_f64(SECTION, key, value)?,
                "rsi_overbought" => config.rsi_overbought = parse_f64(SECTION, key, value)?,
                "sma_fast_window" => config.sma_fast_window = parse_usize(SECTION, key, value)?,
                "sma_slow_window" => config.sma_slow_window = parse_usize(SECTION, key, value)?,
                "adx_window" => config.adx_window = parse_usize(SECTION, key, value)?,
                "adx_threshold" => config.adx_threshold = parse_f64(SECTION, key, value)?,
                "volume_window" => config.volume_window = parse_usize(SECTION, key, value)?,
                "volume_surge_factor" => {
                    config.volume_surge_factor = parse_f64(SECTION, key, value)?
                }
                "atr_window" => config.atr_window = parse_usize(SECTION, key, value)?,
                "atr_stop_multiplier" => {
                    config.atr_stop_multiplier = parse_f64(SECTION, key, value)?
                }
                "atr_tp1_multiplier" => config.atr_tp1_multiplier = parse_f64(SECTION, key, value)?,
                "atr_tp2_multiplier" => config.atr_tp2_multiplier = parse_f64(SECTION, key, value)?,
                "tp_size_fractions" => {
                    config.tp_size_fractions = parse_fractions(SECTION, key, value)?
                }
                "trailing_activation_pct" => {
                    config.trailing_activation_pct = parse_f64(SECTION, key, value)?
                }
                "trailing_percentage" => {
                    config.trailing_percentage = parse_f64(SECTION, key, value)?
                }
                "macd_fast" => config.macd_fast = parse_usize(SECTION, key, value)?,
                "macd_slow" => config.macd_slow = parse_usize(SECTION, key, value)?,
                "macd_signal" => config.macd_signal = parse_usize(SECTION, key, value)?,
                other => {
                    return Err(PapertraderError::ConfigUnknownKey {
                        section: SECTION.to_string(),
                        key: other.to_string(),
                    });
                }
            }
        }

        validate_strategy_config(&config)?;
        Ok(config)
    }

    /// Read the `[strategy]` section of a config source.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let pairs: Vec<(String, String)> = config
            .keys(SECTION)
            .into_iter()
            .map(|key| {
                let value = config.get_string(SECTION, &key).unwrap_or_default();
                (key, value)
            })
            .collect();
        Self::from_pairs(pairs)
    }

    /// Take-profit tiers as (ATR multiplier, size fraction), nearest first.
    pub fn take_profit_levels(&self) -> Vec<(f64, f64)> {
        [self.atr_tp1_multiplier, self.atr_tp2_multiplier]
            .into_iter()
            .zip(self.tp_size_fractions.iter().copied())
            .collect()
    }

    /// Bars needed before every indicator the entry rule reads is available.
    pub fn warmup_bars(&self) -> usize {
        [
            self.rsi_window + 1,
            self.sma_fast_window,
            self.sma_slow_window,
            2 * self.adx_window,
            self.volume_window,
            self.atr_window,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}
