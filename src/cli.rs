//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_trade_adapter::CsvTradeAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::paper_execution_adapter::PaperExecutionAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::reject_unknown_keys;
use crate::domain::error::PapertraderError;
use crate::domain::session::PaperSession;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::TradeEvent;
use crate::logging::{self, LogConfig, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Indicator-driven crypto paper trader")]
pub struct Cli {
    /// Log filter, e.g. `info` or `papertrader=debug`. `RUST_LOG` takes precedence.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// pretty or compact
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over one or more symbols
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the trade log as CSV
        #[arg(long)]
        trades: Option<PathBuf>,
    },
    /// Feed bars one at a time through a paper-trading session
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Validate a configuration file and print the effective parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with a CSV file in the data directory
    ListSymbols {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Command::Backtest { config, .. }
            | Command::Replay { config, .. }
            | Command::Validate { config } => Some(config),
            Command::ListSymbols { .. } => None,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    if let Err(e) = logging::init_logging(log_config_for(&cli)) {
        eprintln!("warning: logging not initialised: {e}");
    }

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Dispatch a parsed command without touching global logging state.
pub fn execute(cli: Cli) -> Result<(), PapertraderError> {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            data_dir,
            output,
            trades,
        } => run_backtest(
            &config,
            symbol.as_deref(),
            data_dir.as_deref(),
            output.as_deref(),
            trades.as_deref(),
        ),
        Command::Replay {
            config,
            symbol,
            data_dir,
        } => run_replay(&config, symbol.as_deref(), data_dir.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir } => run_list_symbols(&data_dir),
    }
}

/// `[logging]` from the config file if it loads, then CLI flags on top.
fn log_config_for(cli: &Cli) -> LogConfig {
    let mut config = cli
        .command
        .config_path()
        .and_then(|path| FileConfigAdapter::from_file(path).ok())
        .and_then(|adapter| LogConfig::from_config(&adapter).ok())
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        config = config.with_level(level.clone());
    }
    if let Some(format) = cli.log_format {
        config = config.with_format(format);
    }
    config
}

/// Load an INI file and reject anything outside the known layout.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PapertraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    reject_unknown_keys(&adapter)?;
    Ok(adapter)
}

/// `--symbol`, then `[backtest] symbols` (comma separated), then `[backtest] symbol`.
pub fn resolve_symbols(symbol_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    if let Some(s) = symbol_override {
        return vec![s.trim().to_uppercase()];
    }

    if let Some(symbols) = config.get_string("backtest", "symbols") {
        return symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(symbol) = config.get_string("backtest", "symbol") {
        let symbol = symbol.trim().to_uppercase();
        if !symbol.is_empty() {
            return vec![symbol];
        }
    }

    vec![]
}

pub fn resolve_data_dir(dir_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    if let Some(dir) = dir_override {
        return dir.to_path_buf();
    }
    config
        .get_string("backtest", "data_dir")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Fetch every symbol's bars, then run them in parallel.
pub fn run_backtest_pipeline(
    data: &dyn DataPort,
    symbols: &[String],
    strategy: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<Vec<BacktestResult>, PapertraderError> {
    if symbols.is_empty() {
        return Err(PapertraderError::invalid(
            "backtest",
            "symbols",
            "no symbols configured",
        ));
    }

    let mut inputs = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = data.fetch_bars(symbol)?;
        info!(symbol = %symbol, bars = bars.len(), "fetched bars");
        inputs.push((symbol.clone(), bars));
    }

    backtest_engine::run_many(&inputs, strategy, config)
}

/// Drive one symbol's bars through a paper session, calling `on_fill` for
/// every fill as it happens.
pub fn replay_symbol<E: ExecutionPort>(
    data: &dyn DataPort,
    symbol: &str,
    strategy: StrategyConfig,
    config: &BacktestConfig,
    executor: E,
    mut on_fill: impl FnMut(&TradeEvent),
) -> Result<PaperSession<E>, PapertraderError> {
    let bars = data.fetch_bars(symbol)?;
    if bars.is_empty() {
        return Err(PapertraderError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let mut session = PaperSession::new(symbol, strategy, config, executor)?;
    for bar in bars {
        for event in session.on_bar(bar)? {
            on_fill(&event);
        }
    }
    for event in session.close()? {
        on_fill(&event);
    }
    Ok(session)
}

pub fn summary_line(result: &BacktestResult) -> String {
    let report = &result.report;
    format!(
        "{:<12} trades={:<4} exits={:<4} win_rate={:>6.2}% return={:>8.2}% max_dd={:>6.2}% final_equity={:.2}",
        result.symbol,
        result.trades.len(),
        report.total_exits,
        report.win_rate * 100.0,
        report.total_return_pct,
        report.max_drawdown_pct,
        result.final_equity,
    )
}

fn fill_line(event: &TradeEvent) -> String {
    let profit = event
        .profit_pct
        .map(|p| format!(" profit={p:+.2}%"))
        .unwrap_or_default();
    format!(
        "{} {} {:<12} {:.6} size={:.4} {}{}",
        event.timestamp.to_rfc3339(),
        event.symbol,
        event.side,
        event.price,
        event.size_fraction,
        event.reason,
        profit,
    )
}

fn run_backtest(
    config_path: &Path,
    symbol_override: Option<&str>,
    data_dir_override: Option<&Path>,
    output_path: Option<&Path>,
    trades_path: Option<&Path>,
) -> Result<(), PapertraderError> {
    info!(config = %config_path.display(), "loading config");
    let adapter = load_config(config_path)?;
    let strategy = StrategyConfig::from_config(&adapter)?;
    let bt_config = BacktestConfig::from_config(&adapter)?;
    let symbols = resolve_symbols(symbol_override, &adapter);
    let data = CsvAdapter::new(resolve_data_dir(data_dir_override, &adapter));

    let results = run_backtest_pipeline(&data, &symbols, &strategy, &bt_config)?;
    for result in &results {
        println!("{}", summary_line(result));
    }

    if let Some(path) = output_path {
        JsonReportAdapter::new().write_many(&results, &path.to_string_lossy())?;
    }
    if let Some(path) = trades_path {
        CsvTradeAdapter::new().write_many(&results, &path.to_string_lossy())?;
    }
    Ok(())
}

fn run_replay(
    config_path: &Path,
    symbol_override: Option<&str>,
    data_dir_override: Option<&Path>,
) -> Result<(), PapertraderError> {
    let adapter = load_config(config_path)?;
    let strategy = StrategyConfig::from_config(&adapter)?;
    let bt_config = BacktestConfig::from_config(&adapter)?;
    let symbols = resolve_symbols(symbol_override, &adapter);
    let Some(symbol) = symbols.first() else {
        return Err(PapertraderError::invalid(
            "backtest",
            "symbol",
            "no symbol configured",
        ));
    };
    if symbols.len() > 1 {
        warn!(symbol = %symbol, skipped = symbols.len() - 1, "replay runs a single symbol");
    }
    let data = CsvAdapter::new(resolve_data_dir(data_dir_override, &adapter));

    let session = replay_symbol(
        &data,
        symbol,
        strategy,
        &bt_config,
        PaperExecutionAdapter::new(),
        |event| println!("{}", fill_line(event)),
    )?;
    info!(
        symbol = %symbol,
        bars = session.bar_count(),
        fills = session.executor().fills().len(),
        "replay finished"
    );
    println!("{}", summary_line(&session.into_result()));
    Ok(())
}

/// Every parameter a run would use, defaults filled in.
pub fn effective_config(config: &dyn ConfigPort) -> Result<serde_json::Value, PapertraderError> {
    let strategy = StrategyConfig::from_config(config)?;
    let bt_config = BacktestConfig::from_config(config)?;
    let log_config = LogConfig::from_config(config)?;

    Ok(json!({
        "strategy": strategy,
        "backtest": bt_config,
        "symbols": resolve_symbols(None, config),
        "data_dir": resolve_data_dir(None, config).display().to_string(),
        "logging": {
            "level": log_config.level,
            "format": log_config.format.as_str(),
        },
    }))
}

fn run_validate(config_path: &Path) -> Result<(), PapertraderError> {
    let adapter = load_config(config_path)?;
    let effective = effective_config(&adapter)?;
    let rendered = serde_json::to_string_pretty(&effective).map_err(|e| PapertraderError::Report {
        reason: e.to_string(),
    })?;
    println!("{rendered}");
    eprintln!("Configuration is valid.");
    Ok(())
}

fn run_list_symbols(data_dir: &Path) -> Result<(), PapertraderError> {
    let symbols = CsvAdapter::new(data_dir).list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", data_dir.display());
    }
    for symbol in &symbols {
        println!("{symbol}");
    }
    Ok(())
}
