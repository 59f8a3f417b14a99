//! ForecastLab CLI — validation, sizing, and reporting commands.
//!
//! Commands:
//! - `validate` — walk-forward validation of one symbol from a CSV or synthetic history
//! - `universe` — validate every CSV in a directory and print a comparison table
//! - `size` — standalone Kelly sizing from explicit win statistics
//! - `report` — render a saved run directory as Markdown

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use forecastlab_core::domain::HistoricalSeries;
use forecastlab_runner::config::ValidationConfig;
use forecastlab_runner::data_loader::{generate_synthetic_series, load_csv, symbol_from_path};
use forecastlab_runner::drift::{DriftState, DriftStatus};
use forecastlab_runner::pipeline::{validate_symbol, validate_universe};
use forecastlab_runner::report::{
    export_json, generate_report, load_artifacts, print_summary, save_artifacts,
};
use forecastlab_runner::sizing::size;

#[derive(Parser)]
#[command(
    name = "forecastlab",
    about = "ForecastLab CLI — forecast validation and risk-sizing engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run walk-forward validation for one symbol and save the artifacts.
    Validate {
        /// Path to an OHLCV CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Symbol label. Defaults to the CSV file stem, or SYNTH.
        #[arg(long)]
        symbol: Option<String>,

        /// Path to a TOML config file. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Generate a synthetic history instead of reading a CSV.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Synthetic start date (YYYY-MM-DD). Defaults to 2 years ago.
        #[arg(long)]
        start: Option<String>,

        /// Synthetic end date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "runs")]
        output_dir: PathBuf,

        /// Print the full validation as JSON instead of a text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Validate every CSV in a directory and print a comparison table.
    Universe {
        /// Directory containing one CSV per symbol.
        dir: PathBuf,

        /// Path to a TOML config file. Built-in defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "runs")]
        output_dir: PathBuf,
    },
    /// Compute a position size from explicit win statistics.
    Size {
        /// Account capital in dollars.
        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,

        /// Entry price per share.
        #[arg(long)]
        price: f64,

        /// Historical win rate in [0, 1].
        #[arg(long)]
        win_rate: f64,

        /// Average win divided by average loss.
        #[arg(long)]
        win_loss_ratio: f64,

        /// Drift verdict: stable, warning, critical, insufficient.
        #[arg(long, default_value = "stable")]
        drift_status: String,

        /// Path to a TOML config file (only the [sizing] section is used).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render a saved run directory as a Markdown report.
    Report {
        /// Run directory produced by `validate` (contains manifest.json).
        run_dir: PathBuf,

        /// Write the report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            csv,
            symbol,
            config,
            synthetic,
            start,
            end,
            output_dir,
            json,
        } => run_validate(csv, symbol, config, synthetic, start, end, output_dir, json),
        Commands::Universe {
            dir,
            config,
            output_dir,
        } => run_universe(&dir, config, &output_dir),
        Commands::Size {
            capital,
            price,
            win_rate,
            win_loss_ratio,
            drift_status,
            config,
        } => run_size(capital, price, win_rate, win_loss_ratio, &drift_status, config),
        Commands::Report { run_dir, output } => run_report(&run_dir, output),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[allow(clippy::too_many_arguments)]
fn run_validate(
    csv: Option<PathBuf>,
    symbol: Option<String>,
    config_path: Option<PathBuf>,
    synthetic: bool,
    start: Option<String>,
    end: Option<String>,
    output_dir: PathBuf,
    json: bool,
) -> Result<()> {
    // Validate mutually exclusive options
    if csv.is_some() && synthetic {
        bail!("--csv and --synthetic are mutually exclusive");
    }
    if csv.is_none() && !synthetic {
        bail!("one of --csv or --synthetic is required");
    }

    let config = load_config(config_path.as_deref())?;

    let series = if let Some(path) = csv {
        let symbol = symbol.unwrap_or_else(|| symbol_from_path(&path));
        load_csv(&path, &symbol)?
    } else {
        let start_date = start
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()?
            .unwrap_or_else(|| chrono::Local::now().date_naive() - chrono::Duration::days(365 * 2));

        let end_date = end
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .transpose()?
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let symbol = symbol.unwrap_or_else(|| "SYNTH".to_string());
        generate_synthetic_series(&symbol, start_date, end_date)?
    };

    let validation = validate_symbol(&series, &config)?;

    if json {
        println!("{}", export_json(&validation)?);
    } else {
        print_summary(&validation);
    }

    let run_dir = save_artifacts(&validation, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_universe(dir: &Path, config_path: Option<PathBuf>, output_dir: &Path) -> Result<()> {
    let config = load_config(config_path.as_deref())?;

    let universe = load_universe(dir)?;
    if universe.is_empty() {
        bail!("no CSV files found in {}", dir.display());
    }

    let outcome = validate_universe(&universe, &config);

    println!();
    println!(
        "{:<8} {:>7} {:>9} {:>8} {:>8} {:<13} {:>7}",
        "Symbol", "Steps", "Accuracy", "Sharpe", "MaxDD", "Drift", "Risk"
    );
    println!("{}", "-".repeat(68));
    for validation in &outcome.results {
        let risk = match &validation.sizing {
            Some(decision) => format!("{:.1}%", decision.risk_fraction * 100.0),
            None => "-".to_string(),
        };
        println!(
            "{:<8} {:>7} {:>8.1}% {:>8.2} {:>7.1}% {:<13} {:>7}",
            validation.symbol,
            validation.record.evaluated_steps,
            validation.record.directional_accuracy * 100.0,
            validation.record.sharpe_ratio,
            validation.record.max_drawdown_pct,
            validation.drift.status.to_string(),
            risk,
        );
    }

    for failure in &outcome.failures {
        eprintln!("Error for {}: {}", failure.symbol, failure.error);
    }

    for validation in &outcome.results {
        save_artifacts(validation, output_dir)?;
    }
    println!();
    println!(
        "Validated {} symbol(s), {} failed. Artifacts in: {}",
        outcome.results.len(),
        outcome.failures.len(),
        output_dir.display()
    );

    if !outcome.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_size(
    capital: f64,
    price: f64,
    win_rate: f64,
    win_loss_ratio: f64,
    drift_status: &str,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let status = match drift_status.to_lowercase().as_str() {
        "stable" => DriftStatus::Stable,
        "warning" => DriftStatus::Warning,
        "critical" => DriftStatus::Critical,
        "insufficient" => DriftStatus::Insufficient,
        other => bail!(
            "unknown drift status '{other}'. Valid: stable, warning, critical, insufficient"
        ),
    };

    let config = load_config(config_path.as_deref())?;
    let state = standalone_drift_state(status);
    let decision = size(capital, price, win_rate, win_loss_ratio, &state, &config.sizing)?;

    println!();
    println!("=== Position Sizing ===");
    println!("Capital:        ${capital:.2}");
    println!("Entry Price:    ${price:.2}");
    println!("Kelly Fraction: {:.2}%", decision.kelly_fraction * 100.0);
    let capped = if decision.capped { " (capped)" } else { "" };
    println!(
        "Risk Fraction:  {:.2}%{capped}",
        decision.risk_fraction * 100.0
    );
    println!(
        "Drift Haircut:  {}",
        if decision.drift_haircut_applied {
            "applied"
        } else {
            "none"
        }
    );
    println!("Position Value: ${:.2}", decision.position_value);
    println!("Shares:         {:.2}", decision.shares);
    println!("Stop Loss:      ${:.2}", decision.stop_loss_price);
    println!("Take Profit:    ${:.2}", decision.take_profit_price);
    println!();

    Ok(())
}

fn run_report(run_dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let validation = load_artifacts(run_dir)?;
    let markdown = generate_report(&validation);

    match output {
        Some(path) => {
            std::fs::write(&path, &markdown)?;
            println!("Report written to: {}", path.display());
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ValidationConfig> {
    match path {
        Some(p) => Ok(ValidationConfig::from_file(p)?),
        None => Ok(ValidationConfig::default()),
    }
}

fn load_universe(dir: &Path) -> Result<Vec<HistoricalSeries>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut universe = Vec::new();
    for path in &paths {
        let symbol = symbol_from_path(path);
        universe.push(load_csv(path, &symbol)?);
    }
    Ok(universe)
}

/// Drift state for standalone sizing, where only the verdict is known.
fn standalone_drift_state(status: DriftStatus) -> DriftState {
    DriftState {
        status,
        ks: None,
        rolling_accuracy: None,
        accuracy_breach_streak: 0,
        stability_score: 0.0,
        retrain_recommended: false,
        baseline_samples: 0,
        recent_samples: 0,
        last_evaluated_at: Utc::now(),
    }
}
