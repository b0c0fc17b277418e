//! BBS 1: sitting to standing.
//!
//! Tracks a seated start, the rise, and a held stand using the weighted
//! posture scorer. While the body is still rising, each wrist is checked
//! against knee, thigh and armrest bands to tell whether the hands pushed
//! off.

use serde::{Deserialize, Serialize};
use stride_pose_model::geometry::Point2D;
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{LandmarkFrame, Side};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{
    Posture, PostureSmoother, PostureSmootherConfig, WeightedPostureConfig,
    WeightedPostureScorer,
};
use crate::scoring::{score_sit_to_stand, HandSupport, SitToStandInput};

/// Tuning for [`SitToStandAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitToStandConfig {
    pub min_visibility: f64,
    /// Sitting confidence that counts as seated.
    pub sitting_confidence: f64,
    pub sitting_confirm_ms: u64,
    /// How long the seat must be left before the rise counts as started.
    pub rise_confirm_ms: u64,
    /// Standing confidence that counts as stood up.
    pub standing_confidence: f64,
    pub standing_confirm_ms: u64,
    pub standing_grace_ms: u64,
    /// How long the stand must hold before the item completes.
    pub complete_hold_ms: u64,
    /// Wrist-to-knee distance (torso lengths) that counts as a hand on the knee.
    pub knee_contact: f64,
    /// Wrist-to-mid-thigh distance (torso lengths) that counts as a hand on the thigh.
    pub thigh_contact: f64,
    /// Vertical band around hip height (torso lengths) treated as armrest level.
    pub armrest_band: f64,
    /// Armrest contact only counts while the knees are bent below this angle.
    pub armrest_max_knee_angle: f64,
    /// Share of rise frames with contact at or above which support is "full".
    pub full_support_fraction: f64,
    /// Ankle displacement from the seated position that counts as moving the feet.
    pub feet_threshold: f64,
    pub weighted: WeightedPostureConfig,
    pub smoother: PostureSmootherConfig,
}

impl Default for SitToStandConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            sitting_confidence: 50.0,
            sitting_confirm_ms: 300,
            rise_confirm_ms: 100,
            standing_confidence: 55.0,
            standing_confirm_ms: 200,
            standing_grace_ms: 300,
            complete_hold_ms: 1000,
            knee_contact: 0.35,
            thigh_contact: 0.30,
            armrest_band: 0.15,
            armrest_max_knee_angle: 150.0,
            full_support_fraction: 0.5,
            feet_threshold: 0.08,
            weighted: WeightedPostureConfig::default(),
            smoother: PostureSmootherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SitToStandPhase {
    Waiting,
    SittingConfirmed,
    StandingUp,
    Complete,
}

/// Where the hands are relative to the legs and chair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandPosition {
    Free,
    OnKnees,
    OnThighs,
    OnArmrest,
}

impl HandPosition {
    pub fn is_contact(self) -> bool {
        self != HandPosition::Free
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitToStandMeasurement {
    pub phase: SitToStandPhase,
    pub standing_confidence: f64,
    pub smoothed_posture: Posture,
    pub hand_position: HandPosition,
    pub rise_frames: u32,
    pub contact_frames: u32,
    pub hand_support: HandSupport,
    pub stood: bool,
    pub failed_attempts: u32,
    /// Seated-to-confirmed-standing time.
    pub rise_secs: Option<f64>,
    pub feet_moved: bool,
    pub assisted: bool,
    pub lost_balance: bool,
}

/// Classify one wrist against the knee, thigh and armrest bands.
fn classify_hand(frame: &LandmarkFrame, side: Side, config: &SitToStandConfig) -> HandPosition {
    let torso = body::torso_length(frame);
    let wrist = frame.point(side.wrist());
    let near = |target: Point2D, limit: f64| {
        body::relative(wrist.distance_to(&target), torso).is_some_and(|d| d < limit)
    };

    let knee_hit = Side::BOTH
        .iter()
        .any(|s| near(frame.point(s.knee()), config.knee_contact));
    if knee_hit {
        return HandPosition::OnKnees;
    }
    let thigh_hit = Side::BOTH.iter().any(|s| {
        let mid = Point2D::midpoint(&frame.point(s.hip()), &frame.point(s.knee()));
        near(mid, config.thigh_contact)
    });
    if thigh_hit {
        return HandPosition::OnThighs;
    }
    let hip_y = body::hip_mid(frame).y;
    let knees_bent = body::mean_knee_angle(frame) < config.armrest_max_knee_angle;
    if knees_bent
        && body::relative((wrist.y - hip_y).abs(), torso).is_some_and(|d| d <= config.armrest_band)
    {
        return HandPosition::OnArmrest;
    }
    HandPosition::Free
}

/// Strongest contact across both hands.
fn hand_position(frame: &LandmarkFrame, config: &SitToStandConfig) -> HandPosition {
    let left = classify_hand(frame, Side::Left, config);
    let right = classify_hand(frame, Side::Right, config);
    if left.is_contact() {
        left
    } else {
        right
    }
}

/// Sit-to-stand state machine.
#[derive(Debug, Clone)]
pub struct SitToStandAnalyzer {
    config: SitToStandConfig,
    scorer: WeightedPostureScorer,
    smoother: PostureSmoother,
    sitting_gate: DebouncedGate,
    rising_gate: DebouncedGate,
    standing_gate: DebouncedGate,
    feet: FeetTracker,
    phase: SitToStandPhase,
    ledger: FrameLedger,
    standing_confidence: f64,
    hand_position: HandPosition,
    rise_started_ms: Option<u64>,
    rise_frames: u32,
    contact_frames: u32,
    /// Rise and contact frames seen while the rise is still unconfirmed.
    provisional: (u32, u32),
    stood_at_ms: Option<u64>,
    failed_attempts: u32,
    assisted: bool,
    lost_balance: bool,
}

impl SitToStandAnalyzer {
    pub fn new(config: SitToStandConfig) -> Self {
        Self {
            scorer: WeightedPostureScorer::new(config.weighted.clone()),
            smoother: PostureSmoother::new(config.smoother.clone()),
            sitting_gate: DebouncedGate::new(config.sitting_confirm_ms, 0),
            rising_gate: DebouncedGate::new(config.rise_confirm_ms, 0),
            standing_gate: DebouncedGate::new(config.standing_confirm_ms, config.standing_grace_ms),
            feet: FeetTracker::new(config.feet_threshold),
            phase: SitToStandPhase::Waiting,
            ledger: FrameLedger::default(),
            standing_confidence: 0.0,
            hand_position: HandPosition::Free,
            rise_started_ms: None,
            rise_frames: 0,
            contact_frames: 0,
            provisional: (0, 0),
            stood_at_ms: None,
            failed_attempts: 0,
            assisted: false,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SitToStandConfig::default())
    }

    pub fn phase(&self) -> SitToStandPhase {
        self.phase
    }

    fn transition(&mut self, to: SitToStandPhase, t: u64) {
        if self.phase != to {
            log_transition(TestItem::SitToStand, self.phase, to, t);
            self.phase = to;
        }
    }

    fn hand_support(&self) -> HandSupport {
        if self.contact_frames == 0 {
            HandSupport::None
        } else if self.rise_frames > 0
            && self.contact_frames as f64 / self.rise_frames as f64
                >= self.config.full_support_fraction
        {
            HandSupport::Full
        } else {
            HandSupport::Partial
        }
    }

    fn is_usable(&self, frame: &LandmarkFrame) -> bool {
        body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
            && body::is_usable(frame, &body::ARM_POINTS, self.config.min_visibility)
    }
}

impl ItemAnalyzer for SitToStandAnalyzer {
    type Measurement = SitToStandMeasurement;

    fn item(&self) -> TestItem {
        TestItem::SitToStand
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == SitToStandPhase::Complete || !self.is_usable(frame) {
            return false;
        }
        let Some(score) = self.scorer.score(frame) else {
            return false;
        };
        if score.sitting() <= self.config.sitting_confidence {
            return false;
        }
        self.ledger.accept(frame);
        self.feet.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, "Seated baseline recorded");
        self.transition(SitToStandPhase::SittingConfirmed, frame.timestamp_ms);
        true
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        _calibrator: &Calibrator,
    ) -> Option<SitToStandMeasurement> {
        if !self.is_usable(frame) {
            return None;
        }
        if self.phase == SitToStandPhase::Complete {
            return Some(self.measurement());
        }
        let score = self.scorer.score(frame)?;
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);
        self.standing_confidence = score.standing;
        self.smoother.push(score.reading().posture);
        self.hand_position = hand_position(frame, &self.config);

        let sitting_now = score.sitting() > self.config.sitting_confidence;
        let standing_now = score.standing > self.config.standing_confidence;
        let sitting_event = self.sitting_gate.update(sitting_now, t);
        self.standing_gate.update(standing_now, t);
        self.feet.update(frame);

        match self.phase {
            SitToStandPhase::Waiting => {
                if self.sitting_gate.is_active() {
                    tracing::info!(t, "Seated position confirmed");
                    self.feet.set_baseline(frame);
                    self.transition(SitToStandPhase::SittingConfirmed, t);
                }
            }
            SitToStandPhase::SittingConfirmed => match self.rising_gate.update(!sitting_now, t) {
                GateEvent::Entered { since } => {
                    let (rise, contact) = std::mem::take(&mut self.provisional);
                    self.rise_frames += rise;
                    self.contact_frames += contact;
                    self.rise_started_ms = Some(since);
                    self.transition(SitToStandPhase::StandingUp, t);
                }
                _ if sitting_now => self.provisional = (0, 0),
                _ => {
                    self.provisional.0 += 1;
                    if self.hand_position.is_contact() {
                        self.provisional.1 += 1;
                    }
                }
            },
            SitToStandPhase::StandingUp | SitToStandPhase::Complete => {}
        }

        if self.phase == SitToStandPhase::StandingUp {
            if self.stood_at_ms.is_none() {
                self.rise_frames += 1;
                if self.hand_position.is_contact() {
                    self.contact_frames += 1;
                }
                if let Some(since) = self.standing_gate.active_since() {
                    self.stood_at_ms = Some(since);
                    tracing::debug!(t, since, "Standing confirmed");
                }
            }

            if matches!(sitting_event, GateEvent::Entered { .. }) {
                if self.stood_at_ms.is_none() {
                    self.failed_attempts += 1;
                    tracing::debug!(t, attempts = self.failed_attempts, "Rise attempt failed");
                }
                self.stood_at_ms = None;
                self.rise_started_ms = None;
                self.standing_gate.reset();
                self.rising_gate.reset();
                self.transition(SitToStandPhase::SittingConfirmed, t);
            } else if self.stood_at_ms.is_some()
                && self.standing_gate.held_ms(t) >= self.config.complete_hold_ms
            {
                self.ledger.complete(CompletionKind::Autonomous);
                tracing::info!(t, "Sit-to-stand complete");
                self.transition(SitToStandPhase::Complete, t);
            }
        }

        tracing::trace!(t, standing = score.standing, phase = ?self.phase, "Sit-to-stand frame");
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != SitToStandPhase::Complete {
            self.ledger.complete(CompletionKind::Manual);
            let t = self.ledger.last_ms().unwrap_or(0);
            self.transition(SitToStandPhase::Complete, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == SitToStandPhase::Complete
    }

    fn set_assisted(&mut self, assisted: bool) {
        if self.phase != SitToStandPhase::Complete {
            self.assisted = assisted;
        }
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == SitToStandPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            self.ledger.complete(CompletionKind::LostBalance);
            let t = self.ledger.last_ms().unwrap_or(0);
            self.transition(SitToStandPhase::Complete, t);
        }
    }

    fn measurement(&self) -> SitToStandMeasurement {
        let rise_secs = match (self.rise_started_ms, self.stood_at_ms) {
            (Some(start), Some(stood)) => Some(stride_common::clock::elapsed_secs(start, stood)),
            _ => None,
        };
        SitToStandMeasurement {
            phase: self.phase,
            standing_confidence: self.standing_confidence,
            smoothed_posture: self.smoother.current(),
            hand_position: self.hand_position,
            rise_frames: self.rise_frames,
            contact_frames: self.contact_frames,
            hand_support: self.hand_support(),
            stood: self.stood_at_ms.is_some(),
            failed_attempts: self.failed_attempts,
            rise_secs,
            feet_moved: self.feet.ever_moved(),
            assisted: self.assisted,
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        let m = self.measurement();
        score_sit_to_stand(&SitToStandInput {
            stood: m.stood,
            hand_support: m.hand_support,
            failed_attempts: m.failed_attempts,
            assisted: m.assisted,
            lost_balance: m.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            SitToStandPhase::Waiting => "waiting",
            SitToStandPhase::SittingConfirmed => "sitting_confirmed",
            SitToStandPhase::StandingUp => "standing_up",
            SitToStandPhase::Complete => "complete",
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

    fn sitting(t: u64) -> LandmarkFrame {
        PoseBuilder::sitting_side().build(t)
    }

    fn standing(t: u64) -> LandmarkFrame {
        let mut pose = PoseBuilder::standing_front();
        pose.set_wrist(Side::Left, 0.52, 0.32)
            .set_wrist(Side::Right, 0.48, 0.32);
        pose.build(t)
    }

    fn run(analyzer: &mut SitToStandAnalyzer, frames: impl IntoIterator<Item = LandmarkFrame>) {
        let calibrator = Calibrator::default();
        for frame in frames {
            analyzer.analyze(&frame, &calibrator);
        }
    }

    #[test]
    fn test_seated_hands_folded_are_free() {
        let config = SitToStandConfig::default();
        assert_eq!(hand_position(&sitting(0), &config), HandPosition::Free);
    }

    #[test]
    fn test_hand_on_knee_detected() {
        let mut pose = PoseBuilder::sitting_side();
        pose.set_wrist(Side::Left, 0.62, 0.71);
        assert_eq!(
            hand_position(&pose.build(0), &SitToStandConfig::default()),
            HandPosition::OnKnees
        );
    }

    #[test]
    fn test_sitting_confirmed_after_dwell() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..5).map(|i| sitting(i * 33)));
        assert_eq!(analyzer.phase(), SitToStandPhase::Waiting);
        run(&mut analyzer, (5..12).map(|i| sitting(i * 33)));
        assert_eq!(analyzer.phase(), SitToStandPhase::SittingConfirmed);
    }

    #[test]
    fn test_completes_after_one_second_standing() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..20).map(|i| sitting(i * 33)));
        run(&mut analyzer, (20..70).map(|i| standing(i * 33)));
        assert!(analyzer.is_complete());
        let m = analyzer.measurement();
        assert!(m.stood);
        assert_eq!(m.hand_support, HandSupport::None);
        assert!(m.rise_secs.unwrap() < 0.5);
        assert_eq!(analyzer.calculate_score().score, 4);
        assert_eq!(analyzer.ledger().completion(), Some(CompletionKind::Autonomous));
    }

    #[test]
    fn test_pushing_off_knees_is_full_support() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..20).map(|i| sitting(i * 33)));

        // Half-risen: hips lifted, hands still on the knees.
        let mut rising = PoseBuilder::sitting_side();
        rising
            .set(stride_pose_model::BodyPoint::LeftHip, 0.50, 0.62)
            .set(stride_pose_model::BodyPoint::RightHip, 0.48, 0.62)
            .set(stride_pose_model::BodyPoint::LeftShoulder, 0.52, 0.36)
            .set(stride_pose_model::BodyPoint::RightShoulder, 0.50, 0.36)
            .set(stride_pose_model::BodyPoint::Nose, 0.55, 0.28)
            .set_wrist(Side::Left, 0.62, 0.71)
            .set_wrist(Side::Right, 0.60, 0.71);
        run(&mut analyzer, (20..30).map(|i| rising.build(i * 33)));
        run(&mut analyzer, (30..45).map(|i| standing(i * 33)));

        let m = analyzer.measurement();
        assert!(m.stood, "{m:?}");
        assert!(m.contact_frames > 0);
        assert_ne!(m.hand_support, HandSupport::None);
        assert!(analyzer.calculate_score().score < 4);
    }

    #[test]
    fn test_single_jitter_frame_is_not_a_rise() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..20).map(|i| sitting(i * 33)));
        run(&mut analyzer, [standing(20 * 33)]);
        run(&mut analyzer, (21..40).map(|i| sitting(i * 33)));

        assert_eq!(analyzer.phase(), SitToStandPhase::SittingConfirmed);
        let m = analyzer.measurement();
        assert_eq!(m.failed_attempts, 0);
        assert_eq!(m.rise_frames, 0);
    }

    #[test]
    fn test_sitting_back_down_is_a_failed_attempt() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..20).map(|i| sitting(i * 33)));
        // 132 ms up: past the rise debounce, short of a confirmed stand.
        run(&mut analyzer, (20..25).map(|i| standing(i * 33)));
        assert_eq!(analyzer.phase(), SitToStandPhase::StandingUp);
        run(&mut analyzer, (25..40).map(|i| sitting(i * 33)));

        assert_eq!(analyzer.phase(), SitToStandPhase::SittingConfirmed);
        let m = analyzer.measurement();
        assert_eq!(m.failed_attempts, 1);
        assert!(!m.stood);
    }

    #[test]
    fn test_shuffling_feet_while_seated_sets_flag() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..20).map(|i| sitting(i * 33)));
        assert!(!analyzer.measurement().feet_moved);

        let mut shuffled = PoseBuilder::sitting_side();
        shuffled.move_foot(Side::Left, -0.12, 0.0);
        run(&mut analyzer, (20..25).map(|i| shuffled.build(i * 33)));
        assert!(analyzer.measurement().feet_moved);
    }

    #[test]
    fn test_never_standing_scores_zero() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..40).map(|i| sitting(i * 33)));
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 0);
    }

    #[test]
    fn test_assisted_scores_one() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        analyzer.set_assisted(true);
        assert_eq!(analyzer.calculate_score().score, 1);
    }

    #[test]
    fn test_incomplete_frame_changes_nothing() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        run(&mut analyzer, (0..20).map(|i| sitting(i * 33)));
        let before = analyzer.measurement();
        let frames = analyzer.ledger().frames();
        assert!(analyzer
            .analyze(&LandmarkFrame::new(700, vec![]), &Calibrator::default())
            .is_none());
        assert_eq!(analyzer.measurement(), before);
        assert_eq!(analyzer.ledger().frames(), frames);
    }

    #[test]
    fn test_record_initial_confirms_seat() {
        let mut analyzer = SitToStandAnalyzer::with_defaults();
        assert!(!analyzer.record_initial(&standing(0)));
        assert!(analyzer.record_initial(&sitting(0)));
        assert_eq!(analyzer.phase(), SitToStandPhase::SittingConfirmed);
        analyzer.reset();
        assert_eq!(analyzer.phase(), SitToStandPhase::Waiting);
    }
}
