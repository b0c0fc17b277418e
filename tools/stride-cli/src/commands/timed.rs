//! Score a timed test from a stopwatch reading.

use std::path::PathBuf;

use stride_assessment_core::timed::timed_report;
use stride_common::config::AppConfig;

pub fn run(
    config: &AppConfig,
    item: String,
    seconds: f64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let item = super::parse_item(&item)?;
    let report = timed_report(item, seconds)?;
    super::print_report(&report);

    let path = super::save_report(config, &report, output)?;
    println!("\nReport saved to: {}", path.display());
    Ok(())
}
