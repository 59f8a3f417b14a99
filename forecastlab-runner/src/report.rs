//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Three export formats for validation results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: forecast tape and equity curve for external analysis tools
//! - **Markdown**: human-readable per-symbol reports
//!
//! Persisted manifests carry the record's `schema_version`. Unknown
//! versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::backtest::SCHEMA_VERSION;
use crate::pipeline::SymbolValidation;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `SymbolValidation` to pretty JSON.
pub fn export_json(validation: &SymbolValidation) -> Result<String> {
    serde_json::to_string_pretty(validation).context("failed to serialize validation to JSON")
}

/// Deserialize a `SymbolValidation` from JSON, rejecting unknown schema
/// versions.
pub fn import_json(json: &str) -> Result<SymbolValidation> {
    let validation: SymbolValidation =
        serde_json::from_str(json).context("failed to deserialize validation from JSON")?;
    if validation.record.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            validation.record.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(validation)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Forecast tape: one row per evaluated walk-forward step.
///
/// Columns: date, predicted, actual, prior_close, residual, regime,
/// model_count
pub fn export_steps_csv(validation: &SymbolValidation) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "predicted",
        "actual",
        "prior_close",
        "residual",
        "regime",
        "model_count",
    ])?;
    for step in &validation.record.steps {
        wtr.write_record([
            &step.date.to_string(),
            &format!("{:.6}", step.predicted),
            &format!("{:.6}", step.actual),
            &format!("{:.6}", step.prior_close),
            &format!("{:.6}", step.residual()),
            &step.regime.to_string(),
            &step.model_count.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with step_index and equity columns.
pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["step_index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([&i.to_string(), &format!("{:.2}", eq)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one validated symbol.
///
/// Creates a directory named `{symbol}_{timestamp}/` under `output_dir`
/// containing:
/// - `manifest.json` — the full `SymbolValidation`
/// - `steps.csv` — forecast tape
/// - `equity.csv` — step-by-step paper equity curve
///
/// Returns the path to the created directory.
pub fn save_artifacts(validation: &SymbolValidation, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        validation.symbol,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(validation)?)?;
    std::fs::write(run_dir.join("steps.csv"), export_steps_csv(validation)?)?;
    std::fs::write(
        run_dir.join("equity.csv"),
        export_equity_csv(&validation.record.equity_curve)?,
    )?;

    Ok(run_dir)
}

/// Load a `SymbolValidation` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<SymbolValidation> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for one validated symbol.
pub fn generate_report(validation: &SymbolValidation) -> String {
    let record = &validation.record;
    let drift = &validation.drift;
    let mut md = String::with_capacity(2048);

    md.push_str("# Validation Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", validation.symbol));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        record.start_date, record.end_date
    ));
    md.push_str(&format!("| Bars | {} |\n", record.bar_count));
    md.push_str(&format!(
        "| Steps | {} evaluated, {} skipped |\n",
        record.evaluated_steps, record.skipped_steps
    ));
    md.push_str(&format!("| Record ID | {} |\n", record.record_id));
    md.push_str(&format!("| Config ID | {} |\n", validation.config_id));
    md.push('\n');

    md.push_str("## Forecast Quality\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!(
        "| Directional Accuracy | {:.1}% |\n",
        record.directional_accuracy * 100.0
    ));
    md.push_str(&format!("| MAE | {:.4} |\n", record.mean_absolute_error));
    md.push_str(&format!("| RMSE | {:.4} |\n", record.rmse));
    md.push('\n');

    md.push_str("## Paper Performance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Sharpe | {:.3} |\n", record.sharpe_ratio));
    md.push_str(&format!("| Sortino | {:.3} |\n", record.sortino_ratio));
    md.push_str(&format!(
        "| Max Drawdown | {:.2}% |\n",
        record.max_drawdown_pct
    ));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", record.win_rate * 100.0));
    md.push_str(&format!(
        "| Avg Win / Avg Loss | {:.2} / {:.2} |\n",
        record.avg_win, record.avg_loss
    ));
    md.push_str(&format!("| Trades | {} |\n", record.total_trades));
    md.push_str(&format!("| Final Equity | {:.2} |\n", record.final_equity));
    md.push('\n');

    md.push_str("## Drift Surveillance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Status | {} |\n", drift.status));
    match drift.ks {
        Some(ks) => md.push_str(&format!(
            "| KS | {:.4} (p = {:.4}, n = {} vs {}) |\n",
            ks.statistic, ks.p_value, ks.n1, ks.n2
        )),
        None => md.push_str("| KS | n/a (below sample floor) |\n"),
    }
    match drift.rolling_accuracy {
        Some(acc) => md.push_str(&format!("| Rolling Accuracy | {:.1}% |\n", acc * 100.0)),
        None => md.push_str("| Rolling Accuracy | pending |\n"),
    }
    md.push_str(&format!(
        "| Breach Streak | {} |\n",
        drift.accuracy_breach_streak
    ));
    md.push_str(&format!(
        "| Stability Score | {:.1} |\n",
        drift.stability_score
    ));
    md.push_str(&format!(
        "| Retrain Recommended | {} |\n",
        if drift.retrain_recommended { "yes" } else { "no" }
    ));
    md.push_str(&format!(
        "| Next Review | in {} day(s) |\n",
        drift.review_after_days()
    ));
    md.push('\n');

    md.push_str("## Position Sizing\n\n");
    match &validation.sizing {
        Some(decision) => {
            md.push_str("| Field | Value |\n");
            md.push_str("| --- | --- |\n");
            md.push_str(&format!(
                "| Capital Base | {:.2} |\n",
                decision.capital_base
            ));
            md.push_str(&format!(
                "| Kelly Fraction | {:.4} |\n",
                decision.kelly_fraction
            ));
            md.push_str(&format!(
                "| Risk Fraction | {:.4}{} |\n",
                decision.risk_fraction,
                if decision.capped { " (capped)" } else { "" }
            ));
            md.push_str(&format!(
                "| Position Value | {:.2} |\n",
                decision.position_value
            ));
            md.push_str(&format!("| Shares | {:.2} |\n", decision.shares));
            md.push_str(&format!(
                "| Stop Loss | {:.2} |\n",
                decision.stop_loss_price
            ));
            md.push_str(&format!(
                "| Take Profit | {:.2} |\n",
                decision.take_profit_price
            ));
            md.push_str(&format!(
                "| Drift Haircut | {} |\n",
                if decision.drift_haircut_applied {
                    "applied"
                } else {
                    "none"
                }
            ));
        }
        None => {
            md.push_str("No position recommended: the backtest produced no usable win statistics.\n");
        }
    }
    md.push('\n');

    md
}

// ─── Console summary ────────────────────────────────────────────────

/// Print a compact console summary for one validated symbol.
pub fn print_summary(validation: &SymbolValidation) {
    let record = &validation.record;
    let drift = &validation.drift;

    println!("=== Validation Summary: {} ===", validation.symbol);
    println!(
        "Period: {} to {} ({} bars)",
        record.start_date, record.end_date, record.bar_count
    );
    println!();
    println!("Forecast:");
    println!(
        "  Accuracy:  {:.1}%",
        record.directional_accuracy * 100.0
    );
    println!("  MAE:       {:.4}", record.mean_absolute_error);
    println!("  RMSE:      {:.4}", record.rmse);
    println!();
    println!("Paper ledger:");
    println!("  Sharpe:    {:.3}", record.sharpe_ratio);
    println!("  Drawdown:  {:.2}%", record.max_drawdown_pct);
    println!(
        "  Win rate:  {:.1}% over {} trades",
        record.win_rate * 100.0,
        record.total_trades
    );
    println!("  Equity:    {:.2}", record.final_equity);
    println!();
    println!("Drift: {}", drift.status);
    if let Some(ks) = drift.ks {
        println!("  KS:        {:.4} (p = {:.4})", ks.statistic, ks.p_value);
    }
    if let Some(acc) = drift.rolling_accuracy {
        println!("  Rolling:   {:.1}%", acc * 100.0);
    }
    println!("  Score:     {:.1}", drift.stability_score);
    println!("  Review in: {} day(s)", drift.review_after_days());
    println!();
    match &validation.sizing {
        Some(decision) => {
            println!("Position:");
            println!(
                "  Risk:      {:.2}% of capital{}",
                decision.risk_fraction * 100.0,
                if decision.capped { " (capped)" } else { "" }
            );
            println!("  Value:     {:.2}", decision.position_value);
            println!("  Shares:    {:.2}", decision.shares);
            println!("  Stop:      {:.2}", decision.stop_loss_price);
            println!("  Target:    {:.2}", decision.take_profit_price);
            if decision.drift_haircut_applied {
                println!("  Haircut:   applied for critical drift");
            }
        }
        None => println!("Position: none recommended"),
    }
}
