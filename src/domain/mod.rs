//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_helpers;
pub mod snapshot;
pub mod signal;
pub mod trade;
pub mod position;
pub mod portfolio;
pub mod engine;
pub mod backtest;
pub mod session;
pub mod metrics;
pub mod strategy;
pub mod config_validation;
pub mod error;
