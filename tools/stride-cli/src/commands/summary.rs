//! Total a set of BBS reports.

use std::path::PathBuf;

use stride_pose_model::report::{AssessmentReport, BbsSummary, FallRisk};

pub fn run(paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut reports = Vec::with_capacity(paths.len());
    for path in &paths {
        let report = AssessmentReport::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", path.display()))?;
        reports.push(report);
    }

    for report in &reports {
        let estimated = if report.is_estimated() { " (estimated)" } else { "" };
        println!("  {:<24} {}{estimated}", report.item.slug(), report.score);
    }

    let summary = BbsSummary::from_reports(&reports);
    println!();
    println!("BBS total: {}/56 ({} items scored)", summary.total, summary.items_scored);
    if summary.is_complete() {
        let risk = match summary.fall_risk {
            FallRisk::High => "high fall risk",
            FallRisk::Medium => "medium fall risk",
            FallRisk::Low => "low fall risk",
        };
        println!("Fall risk: {risk}");
    } else {
        let missing: Vec<String> = summary.missing_items.iter().map(u8::to_string).collect();
        println!("Missing items: {}", missing.join(", "));
    }
    Ok(())
}
