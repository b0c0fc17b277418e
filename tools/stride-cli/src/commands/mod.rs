pub mod config;
pub mod items;
pub mod replay;
pub mod score;
pub mod summary;
pub mod synth;
pub mod timed;

use std::path::{Path, PathBuf};

use stride_assessment_core::config::AnalyzerTuning;
use stride_common::config::AppConfig;
use stride_common::error::{StrideError, StrideResult};
use stride_pose_model::item::TestItem;
use stride_pose_model::report::AssessmentReport;

/// Parse an item argument (slug, snake_case name, BBS number, or a timed-test alias).
pub fn parse_item(raw: &str) -> anyhow::Result<TestItem> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "tug" => Ok(TestItem::TimedUpAndGo),
        "10mwt" => Ok(TestItem::TenMeterWalk),
        other => other.parse().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Write `report` to `output`, or to a timestamped file in the reports directory.
pub fn save_report(
    config: &AppConfig,
    report: &AssessmentReport,
    output: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let path = match output {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config.reports_dir)?;
            let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
            config
                .reports_dir
                .join(format!("{}-{stamp}.json", report.item.slug()))
        }
    };
    report
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write report: {e}"))?;
    Ok(path)
}

pub fn print_report(report: &AssessmentReport) {
    println!("{} ({})", report.item.label(), report.item);
    println!("  Score: {}/4", report.score);
    println!("  Reason: {}", report.reason);
    println!(
        "  Basis: {:?}{}",
        report.metadata.measurement_basis,
        if report.is_estimated() {
            " (distances estimated from torso length)"
        } else {
            ""
        }
    );
    println!(
        "  Frames: {} over {:.1}s",
        report.metadata.frames_processed, report.metadata.duration_secs
    );
    if let Some(completion) = report.metadata.completion {
        println!("  Completion: {completion:?}");
    }
}

/// Analyzer tuning for a run: the configured visibility cutoff, then an
/// optional tuning file over it.
pub fn build_tuning(config: &AppConfig, path: Option<&Path>) -> StrideResult<AnalyzerTuning> {
    let tuning = AnalyzerTuning::default().with_min_visibility(config.assessment.min_visibility);
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StrideError::FileNotFound {
                    path: path.to_path_buf(),
                },
                _ => StrideError::Io(e),
            })?;
            tuning.overlay_json(&json)
        }
        None => Ok(tuning),
    }
}
