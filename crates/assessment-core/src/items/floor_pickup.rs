//! BBS 9: picking up an object from the floor.

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
use crate::scoring::{score_floor_pickup, FloorPickupInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorPickupConfig {
    pub min_visibility: f64,
    /// Mean shoulder–hip–knee angle below which the trunk counts as bent.
    pub bend_hip_angle: f64,
    pub bend_confirm_ms: u64,
    pub bend_grace_ms: u64,
    pub standing_ratio: f64,
    pub standing_confirm_ms: u64,
    /// Floor reached when the wrist is within this share of body height above the ankle.
    pub reach_body_fraction: f64,
    /// Floor reached when the wrist-to-floor gap is at most this many cm.
    pub reach_tolerance_cm: f64,
    pub feet_threshold: f64,
}

impl Default for FloorPickupConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            bend_hip_angle: 140.0,
            bend_confirm_ms: 300,
            bend_grace_ms: 200,
            standing_ratio: 0.45,
            standing_confirm_ms: 300,
            reach_body_fraction: 0.15,
            reach_tolerance_cm: 8.0,
            feet_threshold: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorPickupPhase {
    Waiting,
    Bending,
    Complete,
}

/// Confirmed body stage, logged in order of occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyStage {
    Standing,
    Bending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPickupMeasurement {
    pub phase: FloorPickupPhase,
    pub hip_angle: f64,
    pub bending: bool,
    pub reached_floor: bool,
    /// Smallest wrist-to-floor gap beyond the reach tolerance.
    pub closest_gap_cm: Option<f64>,
    pub estimated: bool,
    pub attempted: bool,
    pub stages: Vec<BodyStage>,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
pub struct FloorPickupAnalyzer {
    config: FloorPickupConfig,
    phase: FloorPickupPhase,
    ledger: FrameLedger,
    bend_gate: DebouncedGate,
    standing_gate: DebouncedGate,
    feet: FeetTracker,
    /// Body height and torso length captured while upright.
    reference: Option<(f64, f64)>,
    stages: Vec<BodyStage>,
    hip_angle: f64,
    reached_floor: bool,
    closest_gap_cm: Option<f64>,
    estimated: bool,
    attempted: bool,
    lost_balance: bool,
}

impl FloorPickupAnalyzer {
    pub fn new(config: FloorPickupConfig) -> Self {
        Self {
            phase: FloorPickupPhase::Waiting,
            ledger: FrameLedger::default(),
            bend_gate: DebouncedGate::new(config.bend_confirm_ms, config.bend_grace_ms),
            standing_gate: DebouncedGate::new(config.standing_confirm_ms, 0),
            feet: FeetTracker::new(config.feet_threshold),
            reference: None,
            stages: Vec::new(),
            hip_angle: 180.0,
            reached_floor: false,
            closest_gap_cm: None,
            estimated: false,
            attempted: false,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FloorPickupConfig::default())
    }

    pub fn phase(&self) -> FloorPickupPhase {
        self.phase
    }

    fn transition(&mut self, to: FloorPickupPhase, t: u64) {
        if self.phase != to {
            log_transition(TestItem::FloorPickUp, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: u64) {
        self.ledger.complete(kind);
        self.transition(FloorPickupPhase::Complete, t);
    }

    fn is_usable(&self, frame: &LandmarkFrame) -> bool {
        body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
            && body::is_usable(frame, &body::ARM_POINTS, self.config.min_visibility)
    }

    fn capture_reference(&mut self, frame: &LandmarkFrame) {
        let height = body::body_height(frame, self.config.min_visibility);
        let torso = body::torso_length(frame);
        self.reference = Some((height, torso));
        self.feet.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, body_height = height, "Upright reference captured");
    }

    fn log_stage(&mut self, stage: BodyStage, t: u64) {
        if self.stages.last() != Some(&stage) {
            tracing::debug!(t, stage = ?stage, "Body stage");
            self.stages.push(stage);
        }
    }

    /// Standing, then bending, then standing again, in that order.
    fn cycle_observed(&self) -> bool {
        let mut want = [BodyStage::Standing, BodyStage::Bending, BodyStage::Standing].into_iter();
        let mut next = want.next();
        for stage in &self.stages {
            if Some(*stage) == next {
                next = want.next();
            }
        }
        next.is_none()
    }

    fn measure_reach(&mut self, frame: &LandmarkFrame, calibrator: &Calibrator, bending: bool) {
        let (height, torso) = self.reference.unwrap_or_else(|| {
            (
                body::body_height(frame, self.config.min_visibility),
                body::torso_length(frame),
            )
        });
        let wrist_y = frame
            .point(Side::Left.wrist())
            .y
            .max(frame.point(Side::Right.wrist()).y);
        let ankle_y = body::ankle_mid(frame).y;
        let floor_y = body::foot_y(frame, self.config.min_visibility);
        let knee_y = body::knee_mid(frame).y;

        let near_ankle = ankle_y - wrist_y <= height * self.config.reach_body_fraction;
        let below_knee = bending && wrist_y > knee_y;

        let gap = calibrator.vertical_or_estimate((floor_y - wrist_y).max(0.0), torso);
        self.estimated |= gap.estimated;
        let beyond = (gap.cm - self.config.reach_tolerance_cm).max(0.0);
        self.closest_gap_cm = Some(self.closest_gap_cm.map_or(beyond, |c| c.min(beyond)));

        let within_tolerance = gap.cm <= self.config.reach_tolerance_cm;
        if (near_ankle || below_knee || within_tolerance) && !self.reached_floor {
            self.reached_floor = true;
            tracing::info!(t = frame.timestamp_ms, gap_cm = gap.cm, "Floor reached");
        }
    }
}

impl ItemAnalyzer for FloorPickupAnalyzer {
    type Measurement = FloorPickupMeasurement;

    fn item(&self) -> TestItem {
        TestItem::FloorPickUp
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == FloorPickupPhase::Complete || !self.is_usable(frame) {
            return false;
        }
        self.ledger.accept(frame);
        self.capture_reference(frame);
        self.log_stage(BodyStage::Standing, frame.timestamp_ms);
        true
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        calibrator: &Calibrator,
    ) -> Option<FloorPickupMeasurement> {
        if !self.is_usable(frame) {
            return None;
        }
        if self.phase == FloorPickupPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        self.hip_angle = body::mean_hip_angle(frame);
        let bending_now = self.hip_angle < self.config.bend_hip_angle;
        let upright = !bending_now
            && ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);

        if let GateEvent::Entered { .. } = self.standing_gate.update(upright, t) {
            if self.reference.is_none() {
                self.capture_reference(frame);
            }
            self.log_stage(BodyStage::Standing, t);
        }
        if let GateEvent::Entered { .. } = self.bend_gate.update(bending_now, t) {
            self.attempted = true;
            self.log_stage(BodyStage::Bending, t);
            self.transition(FloorPickupPhase::Bending, t);
        }
        let bending = self.bend_gate.is_active();

        self.feet.update(frame);
        if self.phase == FloorPickupPhase::Bending {
            self.measure_reach(frame, calibrator, bending);
        }
        tracing::trace!(t, hip_angle = self.hip_angle, bending, "Floor pickup");

        if self.cycle_observed() {
            tracing::info!(t, reached = self.reached_floor, "Returned upright, pick-up complete");
            self.finish(CompletionKind::Autonomous, t);
        }
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != FloorPickupPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == FloorPickupPhase::Complete
    }

    fn set_attempted(&mut self, attempted: bool) {
        if self.phase != FloorPickupPhase::Complete {
            self.attempted = attempted;
        }
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == FloorPickupPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> FloorPickupMeasurement {
        FloorPickupMeasurement {
            phase: self.phase,
            hip_angle: self.hip_angle,
            bending: self.bend_gate.is_active(),
            reached_floor: self.reached_floor,
            closest_gap_cm: self.closest_gap_cm,
            estimated: self.estimated,
            attempted: self.attempted,
            stages: self.stages.clone(),
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_floor_pickup(&FloorPickupInput {
            reached_floor: self.reached_floor,
            feet_moved: self.feet.ever_moved(),
            closest_gap_cm: self.closest_gap_cm,
            attempted: self.attempted,
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            FloorPickupPhase::Waiting => "waiting",
            FloorPickupPhase::Bending => "bending",
            FloorPickupPhase::Complete => "complete",
        }
    }

    fn ledger(&self) -> &FrameLedger {
        &self.ledger
    }

    fn measurement_basis(&self) -> MeasurementBasis {
        match (self.closest_gap_cm, self.estimated) {
            (None, _) => MeasurementBasis::Normalized,
            (Some(_), true) => MeasurementBasis::Estimated,
            (Some(_), false) => MeasurementBasis::Calibrated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pose_model::landmark::BodyPoint;
    use stride_pose_model::synthetic::PoseBuilder;

    fn feed(
        analyzer: &mut FloorPickupAnalyzer,
        calibrator: &Calibrator,
        pose: &PoseBuilder,
        start: u64,
        count: usize,
    ) -> u64 {
        let mut t = start;
        for _ in 0..count {
            analyzer.analyze(&pose.build(t), calibrator);
            t += 33;
        }
        t
    }

    /// Bent at the hips but hands still near the thighs.
    fn shallow_bend() -> PoseBuilder {
        let mut pose = PoseBuilder::bending_side();
        pose.set_wrist(Side::Left, 0.60, 0.62)
            .set_wrist(Side::Right, 0.58, 0.62);
        pose
    }

    #[test]
    fn test_full_pickup_cycle_scores_four() {
        let calibrator = Calibrator::default();
        let mut analyzer = FloorPickupAnalyzer::with_defaults();
        let t = feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), 0, 15);
        assert_eq!(analyzer.phase(), FloorPickupPhase::Waiting);

        let t = feed(&mut analyzer, &calibrator, &PoseBuilder::bending_side(), t, 15);
        assert_eq!(analyzer.phase(), FloorPickupPhase::Bending);
        assert!(analyzer.measurement().reached_floor);

        feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), t, 15);
        assert!(analyzer.is_complete());
        let m = analyzer.measurement();
        assert_eq!(
            m.stages,
            vec![BodyStage::Standing, BodyStage::Bending, BodyStage::Standing]
        );
        assert_eq!(analyzer.calculate_score().score, 4);
        assert_eq!(analyzer.measurement_basis(), MeasurementBasis::Estimated);
    }

    #[test]
    fn test_shallow_bend_is_an_attempt() {
        let calibrator = Calibrator::default();
        let mut analyzer = FloorPickupAnalyzer::with_defaults();
        let t = feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), 0, 15);
        let t = feed(&mut analyzer, &calibrator, &shallow_bend(), t, 15);
        feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), t, 15);

        let m = analyzer.measurement();
        assert!(analyzer.is_complete());
        assert!(!m.reached_floor);
        assert!(m.attempted);
        assert!(m.closest_gap_cm.is_some_and(|gap| gap > 5.0));
        assert_eq!(analyzer.calculate_score().score, 1);
    }

    #[test]
    fn test_stepping_while_bending_scores_three() {
        let calibrator = Calibrator::default();
        let mut analyzer = FloorPickupAnalyzer::with_defaults();
        let t = feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), 0, 15);
        let mut stepped = PoseBuilder::bending_side();
        stepped.move_foot(Side::Right, 0.10, 0.0);
        let t = feed(&mut analyzer, &calibrator, &stepped, t, 15);
        feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), t, 15);
        assert_eq!(analyzer.calculate_score().score, 3);
    }

    #[test]
    fn test_hidden_wrist_frame_is_ignored() {
        let calibrator = Calibrator::default();
        let mut analyzer = FloorPickupAnalyzer::with_defaults();
        let mut hidden = PoseBuilder::bending_side();
        hidden.set_visibility(BodyPoint::LeftWrist, 0.1);
        assert!(analyzer.analyze(&hidden.build(0), &calibrator).is_none());
        assert_eq!(analyzer.ledger().frames(), 0);
    }

    #[test]
    fn test_no_bend_scores_zero() {
        let calibrator = Calibrator::default();
        let mut analyzer = FloorPickupAnalyzer::with_defaults();
        feed(&mut analyzer, &calibrator, &PoseBuilder::standing_side(), 0, 30);
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 0);
    }
}
