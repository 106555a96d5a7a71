//! CLI definition and dispatch.
//!
//! Progress and summaries go to stderr; stdout carries only
//! machine-readable output (candidates, symbol lists, data ranges).

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{Backtest, BacktestConfig};
use crate::domain::config_validation::{
    KNOWN_KEYS, load_backtest_config, load_data_dir, load_position_size, load_quadrant,
    load_rule_set_config, load_scan_config, load_symbols, unknown_keys, validate_config,
};
use crate::domain::error::SignalbtError;
use crate::domain::metrics::{BacktestResult, Summary};
use crate::domain::series::SymbolSeries;
use crate::domain::strategy::{Candidate, QuadrantRunner, RuleSetRunner, ScanConfig, scan};
use crate::domain::universe::{parse_codes, validate_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SIGNALBT_LOG";

/// Every rule reads the prior bar, so a symbol needs at least two.
const MIN_BARS: usize = 2;

#[derive(Parser, Debug)]
#[command(name = "signalbt", about = "Daily-bar signal backtester and scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the rule set over the configured symbols
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for trades.csv and equity.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma list of codes overriding [backtest] symbols
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the weighted quadrant basket
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List today's pullback candidates
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Also write the candidates to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

/// Install the stderr subscriber, filtered by `SIGNALBT_LOG` (default `warn`).
pub fn init_tracing() -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string());
    let env_filter =
        EnvFilter::try_new(filter).map_err(|err| format!("invalid log filter: {err}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| format!("failed to install subscriber: {err}"))
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, symbol.as_deref())
            } else {
                run_backtest(&config, output.as_deref(), symbol.as_deref())
            }
        }
        Command::Portfolio { config, output } => run_portfolio(&config, output.as_deref()),
        Command::Scan { config, output } => run_scan(&config, output.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, SignalbtError> {
    Ok(CsvAdapter::new(PathBuf::from(load_data_dir(config)?)))
}

/// `--symbol` when given, otherwise `[backtest] symbols`.
pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, SignalbtError> {
    match symbol_override {
        Some(list) => parse_codes(list).map_err(|e| SignalbtError::InvalidParameter {
            name: "symbol".into(),
            reason: e.to_string(),
        }),
        None => load_symbols(config),
    }
}

fn run_backtest(
    config_path: &Path,
    output: Option<&Path>,
    symbol_override: Option<&str>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Backtest settings and rule set
    let bt_config = match load_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let mut runner = match load_rule_set_config(&adapter)
        .and_then(|rules| RuleSetRunner::new(rules, load_position_size(&adapter)?))
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Symbols and data source
    let symbols = match resolve_symbols(symbol_override, &adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = match data_adapter(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Validating {} symbols...", symbols.len());

    // Stages 4-6: Load, run, report
    let result = match run_rule_set_pipeline(&data_port, &bt_config, &symbols, &mut runner) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    print_summary(&result);
    write_report(&result, output)
}

/// Load `symbols` (dropping those without data) and run the rule set.
///
/// History before `start_date` is loaded for indicator warm-up but not
/// simulated.
pub fn run_rule_set_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    symbols: &[String],
    runner: &mut RuleSetRunner,
) -> Result<BacktestResult, SignalbtError> {
    let mut backtest = load_backtest(data_port, bt_config, symbols)?;
    backtest.ensure_indicators(&runner.required_indicators());

    eprintln!(
        "Running backtest: {} symbols, rule set",
        backtest.symbols().count()
    );
    backtest.run(|portfolio, day| runner.on_day(portfolio, day))
}

fn load_backtest(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    symbols: &[String],
) -> Result<Backtest, SignalbtError> {
    let validation = validate_universe(
        data_port,
        symbols.to_vec(),
        None,
        bt_config.end_date,
        MIN_BARS,
    )?;
    for skipped in &validation.skipped {
        eprintln!("warning: skipping {} ({:?})", skipped.symbol, skipped.reason);
    }

    let mut backtest = Backtest::new(bt_config.clone());
    for symbol in &validation.universe.symbols {
        let bars = match data_port.fetch_ohlcv(symbol, None, bt_config.end_date) {
            Ok(bars) => bars,
            Err(e) => {
                eprintln!("warning: skipping {} ({})", symbol, e);
                continue;
            }
        };
        backtest.load_data(symbol, bars)?;
    }
    Ok(backtest)
}

fn run_portfolio(config_path: &Path, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match load_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let runner = match load_quadrant(&adapter)
        .and_then(|(allocator, rules)| QuadrantRunner::new(allocator, rules))
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = match data_adapter(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Basket: {}", runner.allocator.members().join(", "));
    let result = match run_quadrant_pipeline(&data_port, &bt_config, &runner) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    print_summary(&result);
    write_report(&result, output)
}

/// Load every basket member and run the quadrant runner, each member with
/// the indicators of its own rule family.
pub fn run_quadrant_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    runner: &QuadrantRunner,
) -> Result<BacktestResult, SignalbtError> {
    let members: Vec<String> = runner
        .allocator
        .members()
        .into_iter()
        .map(String::from)
        .collect();
    let mut backtest = load_backtest(data_port, bt_config, &members)?;
    for (symbol, types) in runner.required_indicators() {
        backtest.ensure_symbol_indicators(&symbol, &types);
    }

    eprintln!(
        "Running backtest: {} of {} basket members",
        backtest.symbols().count(),
        members.len()
    );
    backtest.run(|portfolio, day| runner.on_day(portfolio, day))
}

fn run_scan(config_path: &Path, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let cfg = match load_scan_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = match data_adapter(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Configured symbols, or everything in the data directory.
    let symbols = match load_symbols(&adapter) {
        Ok(s) => s,
        Err(SignalbtError::ConfigMissing { .. }) => match data_port.list_symbols() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let names = match adapter.get_string("scan", "names_file") {
        Some(path) if !path.trim().is_empty() => {
            match CsvAdapter::read_symbol_names(Path::new(path.trim())) {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            }
        }
        _ => BTreeMap::new(),
    };

    eprintln!("Scanning {} symbols...", symbols.len());
    let candidates = run_scan_pipeline(&data_port, &symbols, &names, &cfg);

    for c in &candidates {
        println!(
            "{}\t{}\t{:.0}\tEMA{}\t{:+.2}%",
            c.code, c.name, c.close, c.nearest_period, c.distance_pct
        );
    }
    eprintln!("{} candidates", candidates.len());

    if let Some(path) = output {
        if let Err(e) = CsvReportAdapter::new().write_candidates(&candidates, path) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Candidates written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

/// Load each symbol's full history and scan its latest bar. A symbol
/// without a name in `names` is matched against the exclusion keywords by
/// its code.
pub fn run_scan_pipeline(
    data_port: &dyn DataPort,
    symbols: &[String],
    names: &BTreeMap<String, String>,
    cfg: &ScanConfig,
) -> Vec<Candidate> {
    let mut loaded = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let series = data_port
            .fetch_ohlcv(symbol, None, None)
            .and_then(|bars| SymbolSeries::load(symbol, bars));
        match series {
            Ok(series) => loaded.push(series),
            Err(e) => warn!(%symbol, error = %e, "scan: skipping symbol"),
        }
    }

    scan(
        loaded.iter().map(|series| {
            let name = names
                .get(&series.symbol)
                .map(String::as_str)
                .unwrap_or(series.symbol.as_str());
            (series, name)
        }),
        cfg,
    )
}

fn print_summary(result: &BacktestResult) {
    let summary = Summary::compute(result);

    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Initial Equity:   {:.0}", result.initial_equity);
    eprintln!("Final Equity:     {:.0}", result.final_equity);
    eprintln!("Total Return:     {:.2}%", result.total_return_pct);
    eprintln!("Max Drawdown:     -{:.2}%", result.max_drawdown_pct);
    eprintln!("Sharpe Ratio:     {:.2}", summary.sharpe_ratio);
    eprintln!("Total Trades:     {}", result.total_trades);
    eprintln!("Round Trips:      {}", summary.round_trips.len());
    eprintln!("Win Rate:         {:.1}%", summary.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", summary.profit_factor);

    let mut per_symbol: BTreeMap<&str, (usize, usize, f64)> = BTreeMap::new();
    for trip in &summary.round_trips {
        let entry = per_symbol.entry(trip.symbol.as_str()).or_default();
        entry.0 += 1;
        if trip.pnl > 0.0 {
            entry.1 += 1;
        }
        entry.2 += trip.pnl;
    }
    if !per_symbol.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for (symbol, (trips, wins, pnl)) in per_symbol {
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {:+.0}",
                symbol,
                trips,
                wins as f64 / trips as f64 * 100.0,
                pnl,
            );
        }
    }
}

fn write_report(result: &BacktestResult, output: Option<&Path>) -> ExitCode {
    let Some(dir) = output else {
        return ExitCode::SUCCESS;
    };
    match CsvReportAdapter::new().write_result(result, dir) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write report: {e}");
            (&e).into()
        }
    }
}

pub fn run_dry_run(config_path: &Path, symbol_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let symbols = match resolve_symbols(symbol_override, &adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Err(e) = load_data_dir(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("  Symbols: {}", symbols.join(", "));
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data_port = match data_adapter(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = match data_port.list_symbols() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    for section in adapter.sections() {
        if !KNOWN_KEYS.iter().any(|(name, _)| *name == section) {
            eprintln!("warning: unknown section [{section}]");
            continue;
        }
        let keys = adapter.keys(&section);
        for key in unknown_keys(&section, &keys) {
            eprintln!("warning: unknown key [{section}] {key}");
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, symbol_override: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data_port = match data_adapter(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = match resolve_symbols(symbol_override, &config) {
        Ok(s) => s,
        Err(SignalbtError::ConfigMissing { .. }) => match data_port.list_symbols() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for symbol in &symbols {
        match data_port.get_data_range(symbol) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} bars, {} to {}", symbol, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", symbol),
            Err(e) => eprintln!("error querying {}: {}", symbol, e),
        }
    }
    ExitCode::SUCCESS
}
