//! BBS 8: reaching forward with outstretched arm.
//!
//! In a side view the reach is the forward travel of the leading wrist.
//! Facing the camera, forward travel is invisible, so the reach is
//! approximated by trunk lean plus lateral wrist travel.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{LandmarkFrame, Side};
use stride_pose_model::report::{CompletionKind, MeasurementBasis, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_arm_reach, ArmReachInput};

/// Camera viewpoint for reach measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachView {
    Side,
    Front,
    /// Decide from shoulder width when the baseline is captured.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmReachConfig {
    pub min_visibility: f64,
    pub view: ReachView,
    /// Auto view picks `Side` when shoulder width is below this share of torso length.
    pub side_view_ratio: f64,
    pub standing_ratio: f64,
    /// Standing must hold this long before the baseline is taken.
    pub baseline_confirm_ms: u64,
    /// Frames averaged to decide the arm has come back.
    pub return_window: usize,
    /// Returned when the recent average falls below this share of the maximum.
    pub return_fraction: f64,
    /// Autonomous completion needs at least this much reach.
    pub min_reach_cm: f64,
    pub feet_threshold: f64,
}

impl Default for ArmReachConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            view: ReachView::Auto,
            side_view_ratio: 0.35,
            standing_ratio: 0.45,
            baseline_confirm_ms: 500,
            return_window: 10,
            return_fraction: 0.30,
            min_reach_cm: 5.0,
            feet_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmReachPhase {
    Waiting,
    Reaching,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ReachBaseline {
    view: ReachView,
    /// +1 when the patient faces image right, −1 when facing left.
    facing: f64,
    wrist_x: [f64; 2],
    shoulder_x: f64,
    torso: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmReachMeasurement {
    pub phase: ArmReachPhase,
    pub view: Option<ReachView>,
    pub current_reach_cm: f64,
    pub max_reach_cm: f64,
    /// Distances came from the torso-length fallback.
    pub estimated: bool,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
pub struct ArmReachAnalyzer {
    config: ArmReachConfig,
    phase: ArmReachPhase,
    ledger: FrameLedger,
    standing_gate: DebouncedGate,
    feet: FeetTracker,
    baseline: Option<ReachBaseline>,
    recent: VecDeque<f64>,
    current_reach_cm: f64,
    max_reach_cm: f64,
    estimated: bool,
    lost_balance: bool,
}

impl ArmReachAnalyzer {
    pub fn new(config: ArmReachConfig) -> Self {
        Self {
            phase: ArmReachPhase::Waiting,
            ledger: FrameLedger::default(),
            standing_gate: DebouncedGate::new(config.baseline_confirm_ms, 0),
            feet: FeetTracker::new(config.feet_threshold),
            baseline: None,
            recent: VecDeque::new(),
            current_reach_cm: 0.0,
            max_reach_cm: 0.0,
            estimated: false,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ArmReachConfig::default())
    }

    pub fn phase(&self) -> ArmReachPhase {
        self.phase
    }

    fn transition(&mut self, to: ArmReachPhase, t: u64) {
        if self.phase != to {
            log_transition(TestItem::ArmReach, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: u64) {
        self.ledger.complete(kind);
        self.transition(ArmReachPhase::Complete, t);
    }

    fn is_usable(&self, frame: &LandmarkFrame) -> bool {
        body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
            && body::is_usable(frame, &body::ARM_POINTS, self.config.min_visibility)
    }

    fn capture_baseline(&mut self, frame: &LandmarkFrame) {
        let torso = body::torso_length(frame);
        let view = match self.config.view {
            ReachView::Auto => {
                if body::shoulder_width(frame) < torso * self.config.side_view_ratio {
                    ReachView::Side
                } else {
                    ReachView::Front
                }
            }
            fixed => fixed,
        };
        let toe_lead: f64 = Side::BOTH
            .iter()
            .map(|s| frame.point(s.foot_index()).x - frame.point(s.ankle()).x)
            .sum();
        let facing = if toe_lead < 0.0 { -1.0 } else { 1.0 };

        self.baseline = Some(ReachBaseline {
            view,
            facing,
            wrist_x: [
                frame.point(Side::Left.wrist()).x,
                frame.point(Side::Right.wrist()).x,
            ],
            shoulder_x: body::shoulder_mid(frame).x,
            torso,
        });
        self.feet.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, view = ?view, facing, "Reach baseline captured");
    }

    /// Reach in normalized horizontal units relative to the baseline.
    fn reach_norm(baseline: &ReachBaseline, frame: &LandmarkFrame) -> f64 {
        let wrist_dx = |i: usize, side: Side| frame.point(side.wrist()).x - baseline.wrist_x[i];
        match baseline.view {
            ReachView::Front => {
                let lean = (body::shoulder_mid(frame).x - baseline.shoulder_x).abs();
                let wrist = wrist_dx(0, Side::Left).abs().max(wrist_dx(1, Side::Right).abs());
                lean + wrist
            }
            _ => {
                let forward = (wrist_dx(0, Side::Left) * baseline.facing)
                    .max(wrist_dx(1, Side::Right) * baseline.facing);
                forward.max(0.0)
            }
        }
    }

    fn has_returned(&self) -> bool {
        let window = self.config.return_window.max(1);
        if self.recent.len() < window || self.max_reach_cm < self.config.min_reach_cm {
            return false;
        }
        let avg = self.recent.iter().sum::<f64>() / self.recent.len() as f64;
        avg < self.max_reach_cm * self.config.return_fraction
    }
}

impl ItemAnalyzer for ArmReachAnalyzer {
    type Measurement = ArmReachMeasurement;

    fn item(&self) -> TestItem {
        TestItem::ArmReach
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == ArmReachPhase::Complete || !self.is_usable(frame) {
            return false;
        }
        self.ledger.accept(frame);
        self.capture_baseline(frame);
        self.transition(ArmReachPhase::Reaching, frame.timestamp_ms);
        true
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        calibrator: &Calibrator,
    ) -> Option<ArmReachMeasurement> {
        if !self.is_usable(frame) {
            return None;
        }
        if self.phase == ArmReachPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        if self.phase == ArmReachPhase::Waiting {
            let standing =
                ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);
            if let GateEvent::Entered { .. } = self.standing_gate.update(standing, t) {
                self.capture_baseline(frame);
                self.transition(ArmReachPhase::Reaching, t);
            }
            return Some(self.measurement());
        }

        let Some(baseline) = self.baseline else {
            return Some(self.measurement());
        };
        self.feet.update(frame);

        let distance =
            calibrator.horizontal_or_estimate(Self::reach_norm(&baseline, frame), baseline.torso);
        self.estimated |= distance.estimated;
        self.current_reach_cm = distance.cm;
        self.max_reach_cm = self.max_reach_cm.max(distance.cm);

        self.recent.push_back(distance.cm);
        while self.recent.len() > self.config.return_window.max(1) {
            self.recent.pop_front();
        }
        tracing::trace!(t, reach_cm = distance.cm, max_cm = self.max_reach_cm, "Arm reach");

        if self.has_returned() {
            tracing::info!(t, max_reach_cm = self.max_reach_cm, "Arm returned, reach complete");
            self.finish(CompletionKind::Autonomous, t);
        }
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != ArmReachPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == ArmReachPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == ArmReachPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> ArmReachMeasurement {
        ArmReachMeasurement {
            phase: self.phase,
            view: self.baseline.map(|b| b.view),
            current_reach_cm: self.current_reach_cm,
            max_reach_cm: self.max_reach_cm,
            estimated: self.estimated,
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_arm_reach(&ArmReachInput {
            max_reach_cm: self.max_reach_cm,
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            ArmReachPhase::Waiting => "waiting",
            ArmReachPhase::Reaching => "reaching",
            ArmReachPhase::Complete => "complete",
        }
    }

    fn ledger(&self) -> &FrameLedger {
        &self.ledger
    }

    fn measurement_basis(&self) -> MeasurementBasis {
        if self.estimated {
            MeasurementBasis::Estimated
        } else if self.ledger.frames() > 0 && self.baseline.is_some() {
            MeasurementBasis::Calibrated
        } else {
            MeasurementBasis::Normalized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pose_model::synthetic::PoseBuilder;

    fn reaching(dx: f64) -> PoseBuilder {
        let mut pose = PoseBuilder::standing_side();
        pose.set_wrist(Side::Left, 0.51 + dx, 0.30)
            .set_wrist(Side::Right, 0.49 + dx, 0.30);
        pose
    }

    fn calibrated() -> Calibrator {
        let mut calibrator = Calibrator::new(Some(170.0), 1.0);
        calibrator.observe(&PoseBuilder::standing_side().build(0));
        calibrator
    }

    fn run(analyzer: &mut ArmReachAnalyzer, calibrator: &Calibrator, start: u64, poses: &[PoseBuilder]) -> u64 {
        let mut t = start;
        for pose in poses {
            analyzer.analyze(&pose.build(t), calibrator);
            t += 33;
        }
        t
    }

    #[test]
    fn test_side_reach_completes_on_return() {
        let calibrator = calibrated();
        let mut analyzer = ArmReachAnalyzer::with_defaults();

        let t = run(&mut analyzer, &calibrator, 0, &vec![reaching(0.0); 20]);
        assert_eq!(analyzer.phase(), ArmReachPhase::Reaching);
        assert_eq!(analyzer.measurement().view, Some(ReachView::Side));

        let out: Vec<_> = (1..=15).map(|i| reaching(0.01 * i as f64)).collect();
        let t = run(&mut analyzer, &calibrator, t, &out);
        let peak = analyzer.measurement().max_reach_cm;
        // 0.15 normalized at ~239 cm/unit
        assert!(peak > 30.0 && peak < 40.0, "{peak}");
        assert!(!analyzer.is_complete());

        run(&mut analyzer, &calibrator, t, &vec![reaching(0.0); 12]);
        assert!(analyzer.is_complete());
        assert_eq!(analyzer.measurement().max_reach_cm, peak);
        assert_eq!(analyzer.calculate_score().score, 4);
        assert_eq!(analyzer.measurement_basis(), MeasurementBasis::Calibrated);
    }

    #[test]
    fn test_uncalibrated_reach_is_estimated() {
        let calibrator = Calibrator::new(None, 1.0);
        let mut analyzer = ArmReachAnalyzer::with_defaults();
        let t = run(&mut analyzer, &calibrator, 0, &vec![reaching(0.0); 20]);
        run(&mut analyzer, &calibrator, t, &[reaching(0.125)]);
        let m = analyzer.measurement();
        assert!(m.estimated);
        // 0.125 / 0.25 torso * 50 cm
        assert!((m.max_reach_cm - 25.0).abs() < 1e-6);
        assert_eq!(analyzer.measurement_basis(), MeasurementBasis::Estimated);
    }

    #[test]
    fn test_max_reach_never_decreases() {
        let calibrator = calibrated();
        let mut analyzer = ArmReachAnalyzer::with_defaults();
        let mut t = run(&mut analyzer, &calibrator, 0, &vec![reaching(0.0); 20]);
        let mut last_max = 0.0;
        for dx in [0.02, 0.05, 0.01, 0.08, 0.03, 0.0, 0.04] {
            t = run(&mut analyzer, &calibrator, t, &[reaching(dx)]);
            let m = analyzer.measurement();
            assert!(m.max_reach_cm >= last_max);
            last_max = m.max_reach_cm;
        }
    }

    #[test]
    fn test_feet_moving_caps_score() {
        let calibrator = calibrated();
        let mut analyzer = ArmReachAnalyzer::with_defaults();
        let t = run(&mut analyzer, &calibrator, 0, &vec![reaching(0.0); 20]);
        let mut stepped = reaching(0.15);
        stepped.move_foot(Side::Left, 0.08, 0.0);
        run(&mut analyzer, &calibrator, t, &[stepped]);
        assert!(analyzer.measurement().feet_moved);
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 3);
    }
}
