//! Duration-only fallback for items without a dedicated analyzer.
//!
//! Accumulates time spent in the item's target posture, as judged by the
//! smoothed ratio test, and scores the share of the prescribed duration.
//! Hand use and lateral drift are not tracked.

use serde::{Deserialize, Serialize};
use stride_common::clock::ms_to_secs;
use stride_pose_model::item::{TargetPosture, TestItem};
use stride_pose_model::landmark::{LandmarkFrame, TimestampMs};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::posture::{ratio_posture, Posture, PostureSmoother, PostureSmootherConfig};
use crate::scoring::{score_generic, GenericInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericConfig {
    pub min_visibility: f64,
    pub standing_ratio: f64,
    /// Frame gaps longer than this are not added to the held time.
    pub max_gap_ms: u64,
    pub smoother: PostureSmootherConfig,
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            standing_ratio: 0.45,
            max_gap_ms: 500,
            smoother: PostureSmootherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericPhase {
    Waiting,
    Timing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericMeasurement {
    pub phase: GenericPhase,
    pub target: TargetPosture,
    pub raw_posture: Posture,
    pub smoothed_posture: Posture,
    pub accumulated_secs: f64,
    pub target_secs: f64,
    pub lost_balance: bool,
}

fn is_target(posture: Posture, target: TargetPosture) -> bool {
    matches!(
        (posture, target),
        (Posture::Sitting, TargetPosture::Sitting) | (Posture::Standing, TargetPosture::Standing)
    )
}

#[derive(Debug, Clone)]
pub struct GenericAnalyzer {
    item: TestItem,
    target: TargetPosture,
    target_ms: u64,
    config: GenericConfig,
    phase: GenericPhase,
    ledger: FrameLedger,
    smoother: PostureSmoother,
    raw_posture: Posture,
    last_ms: Option<TimestampMs>,
    accumulated_ms: u64,
    lost_balance: bool,
}

impl GenericAnalyzer {
    /// `None` for items with no target posture or prescribed duration.
    pub fn for_item(item: TestItem, config: GenericConfig) -> Option<Self> {
        let target = item.target_posture()?;
        let secs = item.prescribed_duration_secs()?;
        Some(Self::with_target(item, target, secs, config))
    }

    pub fn with_target(
        item: TestItem,
        target: TargetPosture,
        target_secs: f64,
        config: GenericConfig,
    ) -> Self {
        Self {
            item,
            target,
            target_ms: (target_secs.max(0.0) * 1000.0).round() as u64,
            phase: GenericPhase::Waiting,
            ledger: FrameLedger::default(),
            smoother: PostureSmoother::new(config.smoother.clone()),
            raw_posture: Posture::Unknown,
            last_ms: None,
            accumulated_ms: 0,
            lost_balance: false,
            config,
        }
    }

    pub fn phase(&self) -> GenericPhase {
        self.phase
    }

    fn transition(&mut self, to: GenericPhase, t: TimestampMs) {
        if self.phase != to {
            log_transition(self.item, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: TimestampMs) {
        self.ledger.complete(kind);
        self.transition(GenericPhase::Complete, t);
    }
}

impl ItemAnalyzer for GenericAnalyzer {
    type Measurement = GenericMeasurement;

    fn item(&self) -> TestItem {
        self.item
    }

    fn reset(&mut self) {
        *self = Self::with_target(
            self.item,
            self.target,
            ms_to_secs(self.target_ms),
            self.config.clone(),
        );
    }

    /// Duration items have no baseline; this only checks the frame.
    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        self.phase != GenericPhase::Complete
            && body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        _calibrator: &Calibrator,
    ) -> Option<GenericMeasurement> {
        if !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility) {
            return None;
        }
        if self.phase == GenericPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        self.raw_posture =
            ratio_posture(frame, self.config.standing_ratio).unwrap_or(Posture::Unknown);
        let smoothed = self.smoother.push(self.raw_posture);

        if is_target(smoothed, self.target) {
            if self.phase == GenericPhase::Waiting {
                self.transition(GenericPhase::Timing, t);
            }
            if let Some(last) = self.last_ms {
                let gap = t.saturating_sub(last);
                if gap <= self.config.max_gap_ms {
                    self.accumulated_ms += gap;
                }
            }
        }
        self.last_ms = Some(t);
        tracing::trace!(t, posture = ?smoothed, held_ms = self.accumulated_ms, item = %self.item, "Generic hold");

        if self.phase == GenericPhase::Timing && self.accumulated_ms >= self.target_ms {
            tracing::info!(t, secs = ms_to_secs(self.accumulated_ms), item = %self.item, "Prescribed duration reached");
            self.finish(CompletionKind::Autonomous, t);
        }
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != GenericPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == GenericPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == GenericPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> GenericMeasurement {
        GenericMeasurement {
            phase: self.phase,
            target: self.target,
            raw_posture: self.raw_posture,
            smoothed_posture: self.smoother.current(),
            accumulated_secs: ms_to_secs(self.accumulated_ms),
            target_secs: ms_to_secs(self.target_ms),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_generic(&GenericInput {
            accumulated_secs: ms_to_secs(self.accumulated_ms),
            target_secs: ms_to_secs(self.target_ms),
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            GenericPhase::Waiting => "waiting",
            GenericPhase::Timing => "timing",
            GenericPhase::Complete => "complete",
        }
    }

    fn ledger(&self) -> &FrameLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pose_model::synthetic::PoseBuilder;

    fn feed(analyzer: &mut GenericAnalyzer, pose: &PoseBuilder, start: u64, count: usize) -> u64 {
        let calibrator = Calibrator::default();
        let mut t = start;
        for _ in 0..count {
            analyzer.analyze(&pose.build(t), &calibrator);
            t += 100;
        }
        t
    }

    fn analyzer(item: TestItem) -> GenericAnalyzer {
        GenericAnalyzer::for_item(item, GenericConfig::default()).unwrap()
    }

    #[test]
    fn test_only_duration_items_qualify() {
        assert!(GenericAnalyzer::for_item(TestItem::ArmReach, GenericConfig::default()).is_none());
        for item in [
            TestItem::SittingUnsupported,
            TestItem::StandToSit,
            TestItem::Transfers,
            TestItem::StandingEyesClosed,
            TestItem::StandingFeetTogether,
        ] {
            assert!(GenericAnalyzer::for_item(item, GenericConfig::default()).is_some());
        }
    }

    #[test]
    fn test_eyes_closed_full_hold() {
        let mut analyzer = analyzer(TestItem::StandingEyesClosed);
        feed(&mut analyzer, &PoseBuilder::standing_front(), 0, 110);
        assert!(analyzer.is_complete());
        assert!(analyzer.measurement().accumulated_secs >= 10.0);
        assert_eq!(analyzer.calculate_score().score, 4);
    }

    #[test]
    fn test_gap_is_not_counted() {
        let mut analyzer = analyzer(TestItem::StandingEyesClosed);
        let t = feed(&mut analyzer, &PoseBuilder::standing_front(), 0, 50);
        feed(&mut analyzer, &PoseBuilder::standing_front(), t + 2000, 50);
        let m = analyzer.measurement();
        assert!((m.accumulated_secs - 9.8).abs() < 1e-9);
        assert!(!analyzer.is_complete());
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 2);
    }

    #[test]
    fn test_stand_to_sit_counts_after_smoothed_flip() {
        let mut analyzer = analyzer(TestItem::StandToSit);
        let t = feed(&mut analyzer, &PoseBuilder::standing_front(), 0, 30);
        assert_eq!(analyzer.phase(), GenericPhase::Waiting);
        feed(&mut analyzer, &PoseBuilder::sitting_side(), t, 20);
        let m = analyzer.measurement();
        assert_eq!(m.smoothed_posture, Posture::Sitting);
        assert!(m.accumulated_secs > 0.0 && m.accumulated_secs < 2.0);
        assert!(!analyzer.is_complete());
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 1);
    }

    #[test]
    fn test_wrong_posture_scores_zero() {
        let mut analyzer = analyzer(TestItem::SittingUnsupported);
        feed(&mut analyzer, &PoseBuilder::standing_front(), 0, 50);
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 0);
    }

    #[test]
    fn test_reset_keeps_item_and_target() {
        let mut analyzer = analyzer(TestItem::StandingFeetTogether);
        feed(&mut analyzer, &PoseBuilder::standing_front(), 0, 20);
        analyzer.reset();
        let m = analyzer.measurement();
        assert_eq!(analyzer.item(), TestItem::StandingFeetTogether);
        assert_eq!(m.target_secs, 60.0);
        assert_eq!(m.accumulated_secs, 0.0);
    }
}
