//! Score results and assessment reports.
//!
//! A report is the read-only projection handed to whoever displays or
//! stores results: the clinical score, the reason behind it, a snapshot
//! of the measurements that produced it, and audit metadata.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::item::TestItem;

/// Highest score on the 0–4 item rubric.
pub const MAX_ITEM_SCORE: u8 = 4;

/// A clinical item score with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Score on the 0–4 rubric.
    pub score: u8,
    /// Why this score was assigned.
    pub reason: String,
}

impl ScoreResult {
    /// Create a score, clamping to the 0–4 rubric.
    pub fn new(score: u8, reason: impl Into<String>) -> Self {
        Self {
            score: score.min(MAX_ITEM_SCORE),
            reason: reason.into(),
        }
    }
}

/// How distances in the measurement snapshot were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementBasis {
    /// Centimeters from a calibration profile (patient height known).
    Calibrated,
    /// Centimeters from the fixed torso-length heuristic.
    Estimated,
    /// No distances involved; normalized units or durations only.
    Normalized,
}

/// How the item session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    /// The analyzer decided the movement was complete.
    Autonomous,
    /// The clinician ended the item.
    Manual,
    /// The clinician reported a loss of balance.
    LostBalance,
}

/// Audit and display metadata attached to every report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// When the report was generated (RFC 3339).
    pub assessed_at: String,

    /// How distances were measured.
    pub measurement_basis: MeasurementBasis,

    /// Vertical scale of the calibration profile, cm per normalized unit.
    pub scale_cm_per_unit: Option<f64>,

    /// Patient height used for calibration.
    pub patient_height_cm: Option<f64>,

    /// Frames the analyzer accepted.
    pub frames_processed: u64,

    /// Time between the first accepted frame and completion (seconds).
    pub duration_secs: f64,

    /// How the session ended, `None` if the report was taken early.
    pub completion: Option<CompletionKind>,
}

/// The final, read-only result of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentReport {
    /// Which item was assessed.
    pub item: TestItem,

    /// Score on the 0–4 rubric.
    pub score: u8,

    /// Why this score was assigned.
    pub reason: String,

    /// Snapshot of the analyzer's final measurement.
    pub measurement: serde_json::Value,

    /// Audit metadata.
    pub metadata: ReportMetadata,
}

impl AssessmentReport {
    /// Whether distances in this report come from the fallback heuristic.
    pub fn is_estimated(&self) -> bool {
        self.metadata.measurement_basis == MeasurementBasis::Estimated
    }

    /// Load a report from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| ModelError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ModelError::ParseError { path, source: e })
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(|e| ModelError::IoError { path, source: e })
    }
}

/// Fall-risk band derived from the BBS total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallRisk {
    /// 0–20: wheelchair-bound range.
    High,
    /// 21–40: walking with assistance.
    Medium,
    /// 41–56: independent.
    Low,
}

impl FallRisk {
    pub fn from_total(total: u32) -> Self {
        match total {
            0..=20 => FallRisk::High,
            21..=40 => FallRisk::Medium,
            _ => FallRisk::Low,
        }
    }
}

/// Berg Balance Scale total over a set of item reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BbsSummary {
    /// Sum of item scores (0–56 when all items are present).
    pub total: u32,

    /// Number of distinct BBS items scored.
    pub items_scored: usize,

    /// BBS item numbers with no report.
    pub missing_items: Vec<u8>,

    /// Risk band for the total. Only meaningful when no items are missing.
    pub fall_risk: FallRisk,
}

impl BbsSummary {
    /// Summarize reports; a later report for the same item replaces an
    /// earlier one, and timed tests are ignored.
    pub fn from_reports(reports: &[AssessmentReport]) -> Self {
        let mut latest: [Option<u8>; 14] = [None; 14];
        for report in reports {
            if let Some(number) = report.item.bbs_number() {
                latest[(number - 1) as usize] = Some(report.score.min(MAX_ITEM_SCORE));
            }
        }

        let total: u32 = latest.iter().flatten().map(|s| *s as u32).sum();
        let items_scored = latest.iter().flatten().count();
        let missing_items = latest
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i as u8 + 1)
            .collect();

        Self {
            total,
            items_scored,
            missing_items,
            fall_risk: FallRisk::from_total(total),
        }
    }

    /// Whether all 14 items were scored.
    pub fn is_complete(&self) -> bool {
        self.missing_items.is_empty()
    }
}

/// Errors that can occur when reading or writing model files.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(item: TestItem, score: u8) -> AssessmentReport {
        AssessmentReport {
            item,
            score,
            reason: "test".to_string(),
            measurement: serde_json::json!({}),
            metadata: ReportMetadata {
                assessed_at: chrono::Utc::now().to_rfc3339(),
                measurement_basis: MeasurementBasis::Normalized,
                scale_cm_per_unit: None,
                patient_height_cm: None,
                frames_processed: 0,
                duration_secs: 0.0,
                completion: Some(CompletionKind::Manual),
            },
        }
    }

    #[test]
    fn test_score_clamps() {
        assert_eq!(ScoreResult::new(9, "over").score, 4);
        assert_eq!(ScoreResult::new(2, "ok").score, 2);
    }

    #[test]
    fn test_fall_risk_bands() {
        assert_eq!(FallRisk::from_total(0), FallRisk::High);
        assert_eq!(FallRisk::from_total(20), FallRisk::High);
        assert_eq!(FallRisk::from_total(21), FallRisk::Medium);
        assert_eq!(FallRisk::from_total(40), FallRisk::Medium);
        assert_eq!(FallRisk::from_total(41), FallRisk::Low);
        assert_eq!(FallRisk::from_total(56), FallRisk::Low);
    }

    #[test]
    fn test_summary_uses_latest_report_per_item() {
        let reports = vec![
            report(TestItem::SitToStand, 2),
            report(TestItem::ArmReach, 3),
            report(TestItem::SitToStand, 4),
            report(TestItem::TimedUpAndGo, 4),
        ];
        let summary = BbsSummary::from_reports(&reports);
        assert_eq!(summary.total, 7);
        assert_eq!(summary.items_scored, 2);
        assert_eq!(summary.missing_items.len(), 12);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_full_summary() {
        let reports: Vec<_> = TestItem::ALL
            .iter()
            .filter(|item| item.bbs_number().is_some())
            .map(|item| report(*item, 4))
            .collect();
        let summary = BbsSummary::from_reports(&reports);
        assert_eq!(summary.total, 56);
        assert!(summary.is_complete());
        assert_eq!(summary.fall_risk, FallRisk::Low);
    }

    #[test]
    fn test_report_save_and_load() {
        let dir = std::env::temp_dir().join("stride_test_report");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("report.json");

        let original = report(TestItem::TandemStance, 3);
        original.save(&path).unwrap();
        let loaded = AssessmentReport::load(&path).unwrap();
        assert_eq!(loaded, original);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_report_errors() {
        let err = AssessmentReport::load("/nonexistent/stride/report.json").unwrap_err();
        assert!(matches!(err, ModelError::IoError { .. }));
    }
}
