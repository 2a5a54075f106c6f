//! Configuration parsing and validation.
//!
//! Every check runs at load time, before any bar is processed.

use crate::domain::backtest::{BACKTEST_KEYS, BacktestConfig};
use crate::domain::error::PapertraderError;
use crate::domain::strategy::{STRATEGY_KEYS, StrategyConfig};
use crate::ports::config_port::ConfigPort;

pub const LOGGING_KEYS: &[&str] = &["level", "format"];

const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("strategy", STRATEGY_KEYS),
    ("backtest", BACKTEST_KEYS),
    ("logging", LOGGING_KEYS),
];

/// Reject sections and keys the config layout does not define.
pub fn reject_unknown_keys(config: &dyn ConfigPort) -> Result<(), PapertraderError> {
    for section in config.sections() {
        let Some((_, known)) = KNOWN_SECTIONS.iter().find(|(name, _)| *name == section) else {
            return Err(PapertraderError::ConfigUnknownSection { section });
        };
        for key in config.keys(&section) {
            if !known.contains(&key.as_str()) {
                return Err(PapertraderError::ConfigUnknownKey {
                    section: section.clone(),
                    key,
                });
            }
        }
    }
    Ok(())
}

pub fn validate_strategy_config(config: &StrategyConfig) -> Result<(), PapertraderError> {
    validate_windows(config)?;
    validate_rsi_thresholds(config)?;
    validate_adx_threshold(config)?;
    validate_volume_surge(config)?;
    validate_atr_multipliers(config)?;
    validate_tp_fractions(config)?;
    validate_trailing(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), PapertraderError> {
    if !(config.initial_capital > 0.0 && config.initial_capital.is_finite()) {
        return Err(PapertraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if !(config.position_size > 0.0 && config.position_size <= 1.0) {
        return Err(PapertraderError::invalid(
            "backtest",
            "position_size",
            "position_size must be between 0 and 1",
        ));
    }
    if !(config.commission_pct >= 0.0 && config.commission_pct < 100.0) {
        return Err(PapertraderError::invalid(
            "backtest",
            "commission_pct",
            "commission_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

fn validate_windows(config: &StrategyConfig) -> Result<(), PapertraderError> {
    let windows = [
        ("rsi_window", config.rsi_window),
        ("sma_fast_window", config.sma_fast_window),
        ("sma_slow_window", config.sma_slow_window),
        ("adx_window", config.adx_window),
        ("volume_window", config.volume_window),
        ("atr_window", config.atr_window),
        ("macd_fast", config.macd_fast),
        ("macd_slow", config.macd_slow),
        ("macd_signal", config.macd_signal),
    ];
    for (key, window) in windows {
        if window < 1 {
            return Err(PapertraderError::invalid(
                "strategy",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }

    if config.sma_fast_window >= config.sma_slow_window {
        return Err(PapertraderError::invalid(
            "strategy",
            "sma_fast_window",
            "sma_fast_window must be less than sma_slow_window",
        ));
    }
    if config.macd_fast >= config.macd_slow {
        return Err(PapertraderError::invalid(
            "strategy",
            "macd_fast",
            "macd_fast must be less than macd_slow",
        ));
    }
    Ok(())
}

fn validate_rsi_thresholds(config: &StrategyConfig) -> Result<(), PapertraderError> {
    for (key, value) in [
        ("rsi_oversold", config.rsi_oversold),
        ("rsi_overbought", config.rsi_overbought),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(PapertraderError::invalid(
                "strategy",
                key,
                format!("{key} must be in [0, 100]"),
            ));
        }
    }
    if config.rsi_oversold > config.rsi_overbought {
        return Err(PapertraderError::invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must not exceed rsi_overbought",
        ));
    }
    Ok(())
}

fn validate_adx_threshold(config: &StrategyConfig) -> Result<(), PapertraderError> {
    if !(0.0..=100.0).contains(&config.adx_threshold) {
        return Err(PapertraderError::invalid(
            "strategy",
            "adx_threshold",
            "adx_threshold must be in [0, 100]",
        ));
    }
    Ok(())
}

fn validate_volume_surge(config: &StrategyConfig) -> Result<(), PapertraderError> {
    if !(config.volume_surge_factor >= 0.0 && config.volume_surge_factor.is_finite()) {
        return Err(PapertraderError::invalid(
            "strategy",
            "volume_surge_factor",
            "volume_surge_factor must be non-negative",
        ));
    }
    Ok(())
}

fn validate_atr_multipliers(config: &StrategyConfig) -> Result<(), PapertraderError> {
    for (key, value) in [
        ("atr_stop_multiplier", config.atr_stop_multiplier),
        ("atr_tp1_multiplier", config.atr_tp1_multiplier),
        ("atr_tp2_multiplier", config.atr_tp2_multiplier),
    ] {
        if !(value > 0.0 && value.is_finite()) {
            return Err(PapertraderError::invalid(
                "strategy",
                key,
                format!("{key} must be positive"),
            ));
        }
    }
    if config.atr_tp1_multiplier >= config.atr_tp2_multiplier {
        return Err(PapertraderError::invalid(
            "strategy",
            "atr_tp1_multiplier",
            "atr_tp1_multiplier must be less than atr_tp2_multiplier",
        ));
    }
    Ok(())
}

fn validate_tp_fractions(config: &StrategyConfig) -> Result<(), PapertraderError> {
    let fractions = &config.tp_size_fractions;
    if fractions.len() != 2 {
        return Err(PapertraderError::invalid(
            "strategy",
            "tp_size_fractions",
            "tp_size_fractions needs one fraction per take-profit tier (2)",
        ));
    }
    if fractions.iter().any(|f| !(*f > 0.0 && *f <= 1.0)) {
        return Err(PapertraderError::invalid(
            "strategy",
            "tp_size_fractions",
            "each tp fraction must be in (0, 1]",
        ));
    }
    // Small tolerance so "0.3,0.7" is not rejected for rounding.
    if fractions.iter().sum::<f64>() > 1.0 + 1e-9 {
        return Err(PapertraderError::invalid(
            "strategy",
            "tp_size_fractions",
            "tp fractions must sum to at most 1",
        ));
    }
    Ok(())
}

fn validate_trailing(config: &StrategyConfig) -> Result<(), PapertraderError> {
    if !(config.trailing_activation_pct >= 0.0 && config.trailing_activation_pct.is_finite()) {
        return Err(PapertraderError::invalid(
            "strategy",
            "trailing_activation_pct",
            "trailing_activation_pct must be non-negative",
        ));
    }
    if !(config.trailing_percentage > 0.0 && config.trailing_percentage < 1.0) {
        return Err(PapertraderError::invalid(
            "strategy",
            "trailing_percentage",
            "trailing_percentage must be between 0 and 1 (exclusive)",
        ));
    }
    Ok(())
}

pub(crate) fn parse_f64(section: &str, key: &str, value: &str) -> Result<f64, PapertraderError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PapertraderError::invalid(
            section,
            key,
            format!("expected a number, got {value:?}"),
        )),
    }
}

pub(crate) fn parse_usize(
    section: &str,
    key: &str,
    value: &str,
) -> Result<usize, PapertraderError> {
    value.parse::<usize>().map_err(|_| {
        PapertraderError::invalid(
            section,
            key,
            format!("expected a non-negative integer, got {value:?}"),
        )
    })
}

pub(crate) fn parse_fractions(
    section: &str,
    key: &str,
    value: &str,
) -> Result<Vec<f64>, PapertraderError> {
    value
        .split(',')
        .map(|part| parse_f64(section, key, part.trim()))
        .collect()
}
