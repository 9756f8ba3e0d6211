//! Report rendering shared by `run` and `sweep`

use std::path::Path;

use anyhow::{Context, Result};
use mfb_sim::RunReport;

/// One summary line per report, fidelities as `f0/f1/...` mean plays
pub fn print_reports(reports: &[RunReport]) {
    println!(
        "{:<28} {:>10} {:>6} {:>14} {:>9} {:>12}  {}",
        "LABEL", "BUDGET", "REPS", "REGRET", "OPTIMAL", "SPEND", "PLAYS/FIDELITY"
    );
    println!("{}", "-".repeat(100));
    for report in reports {
        println!("{}", format_row(report));
    }
}

fn format_row(report: &RunReport) -> String {
    let plays = report
        .plays_per_fidelity()
        .iter()
        .map(|p| format!("{p:.1}"))
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "{:<28} {:>10.1} {:>6} {:>14.3} {:>8.1}% {:>12.1}  {}",
        report.label,
        report.budget,
        report.experiments,
        report.regret,
        report.optimal_fraction * 100.0,
        report.spend,
        plays
    )
}

/// Write all reports as one pretty-printed JSON array
pub fn write_reports(path: &Path, reports: &[RunReport]) -> Result<()> {
    mfb_sim::write_reports(path, reports)
        .with_context(|| format!("Failed to write reports to {}", path.display()))?;
    tracing::info!(path = %path.display(), count = reports.len(), "Reports written");
    Ok(())
}
