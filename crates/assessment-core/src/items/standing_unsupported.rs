//! BBS 2: standing unsupported for two minutes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use stride_common::clock::ms_to_secs;
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{LandmarkFrame, Side};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_standing_unsupported, StandingInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandingConfig {
    pub min_visibility: f64,
    pub standing_ratio: f64,
    /// Knee and hip must both be straighter than this (degrees).
    pub min_joint_angle: f64,
    pub target_secs: f64,
    /// Holds shorter than this count as a retry and re-arm the timer.
    pub min_hold_secs: f64,
    pub stance_confirm_ms: u64,
    pub stance_grace_ms: u64,
    pub support_confirm_ms: u64,
    /// A wrist this many shoulder widths from the body centre is reaching for support.
    pub support_width_factor: f64,
    /// Floor on the shoulder-width reference, in torso lengths (side views).
    pub min_width_reference: f64,
    /// Wrists this close to the frame edge are treated as holding something.
    pub edge_margin: f64,
    /// Vertical wrist gap (torso lengths) that marks one hand reaching down.
    pub low_hand_gap: f64,
    /// Samples in the sway window.
    pub sway_window: usize,
    /// Sway (std-dev ÷ shoulder width) upper bounds for Excellent, Good, Fair, Poor.
    pub sway_bands: [f64; 4],
    pub unstable_hold_ms: u64,
    pub feet_threshold: f64,
}

impl Default for StandingConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            standing_ratio: 0.45,
            min_joint_angle: 150.0,
            target_secs: 120.0,
            min_hold_secs: 30.0,
            stance_confirm_ms: 500,
            stance_grace_ms: 1000,
            support_confirm_ms: 300,
            support_width_factor: 1.8,
            min_width_reference: 0.35,
            edge_margin: 0.02,
            low_hand_gap: 0.3,
            sway_window: 30,
            sway_bands: [0.02, 0.04, 0.07, 0.10],
            unstable_hold_ms: 1000,
            feet_threshold: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandingPhase {
    Waiting,
    Timing,
    Complete,
}

/// Five-level postural stability from trunk sway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Excellent,
    Good,
    Fair,
    Poor,
    Unstable,
}

impl Stability {
    pub fn from_sway(sway: f64, bands: &[f64; 4]) -> Self {
        if sway < bands[0] {
            Stability::Excellent
        } else if sway < bands[1] {
            Stability::Good
        } else if sway < bands[2] {
            Stability::Fair
        } else if sway < bands[3] {
            Stability::Poor
        } else {
            Stability::Unstable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingMeasurement {
    pub phase: StandingPhase,
    /// Longest unbroken hold so far.
    pub max_duration_secs: f64,
    pub current_hold_secs: f64,
    pub support_used: bool,
    pub retries: u32,
    pub sway: f64,
    pub stability: Stability,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
pub struct StandingUnsupportedAnalyzer {
    config: StandingConfig,
    phase: StandingPhase,
    ledger: FrameLedger,
    stance_gate: DebouncedGate,
    support_gate: DebouncedGate,
    unstable_gate: DebouncedGate,
    feet: FeetTracker,
    trunk_x: VecDeque<f64>,
    sway: f64,
    max_hold_ms: u64,
    current_hold_ms: u64,
    support_used: bool,
    retries: u32,
    lost_balance: bool,
}

impl StandingUnsupportedAnalyzer {
    pub fn new(config: StandingConfig) -> Self {
        Self {
            phase: StandingPhase::Waiting,
            ledger: FrameLedger::default(),
            stance_gate: DebouncedGate::new(config.stance_confirm_ms, config.stance_grace_ms),
            support_gate: DebouncedGate::new(config.support_confirm_ms, 0),
            unstable_gate: DebouncedGate::new(config.unstable_hold_ms, 0),
            feet: FeetTracker::new(config.feet_threshold),
            trunk_x: VecDeque::new(),
            sway: 0.0,
            max_hold_ms: 0,
            current_hold_ms: 0,
            support_used: false,
            retries: 0,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(StandingConfig::default())
    }

    pub fn phase(&self) -> StandingPhase {
        self.phase
    }

    fn transition(&mut self, to: StandingPhase, t: u64) {
        if self.phase != to {
            log_transition(TestItem::StandingUnsupported, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: u64) {
        self.ledger.complete(kind);
        self.transition(StandingPhase::Complete, t);
    }

    fn is_usable(&self, frame: &LandmarkFrame) -> bool {
        body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
            && body::is_usable(frame, &body::ARM_POINTS, self.config.min_visibility)
    }

    fn is_standing(&self, frame: &LandmarkFrame) -> bool {
        ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing)
            && body::mean_knee_angle(frame) >= self.config.min_joint_angle
            && body::mean_hip_angle(frame) >= self.config.min_joint_angle
    }

    fn width_reference(&self, frame: &LandmarkFrame) -> f64 {
        body::shoulder_width(frame).max(body::torso_length(frame) * self.config.min_width_reference)
    }

    /// Whether either hand looks like it is holding onto something.
    fn reaching_for_support(&self, frame: &LandmarkFrame) -> bool {
        let c = &self.config;
        let center_x = body::shoulder_mid(frame).x;
        let reach_limit = self.width_reference(frame) * c.support_width_factor;
        let wide_or_edge = Side::BOTH.iter().any(|side| {
            let wrist = frame.point(side.wrist());
            (wrist.x - center_x).abs() > reach_limit
                || wrist.x < c.edge_margin
                || wrist.x > 1.0 - c.edge_margin
        });
        let gap = (frame.point(Side::Left.wrist()).y - frame.point(Side::Right.wrist()).y).abs();
        let one_low = body::relative(gap, body::torso_length(frame)).is_some_and(|g| g > c.low_hand_gap);
        wide_or_edge || one_low
    }

    fn update_sway(&mut self, frame: &LandmarkFrame) {
        self.trunk_x.push_back(body::trunk_center(frame).x);
        while self.trunk_x.len() > self.config.sway_window.max(2) {
            self.trunk_x.pop_front();
        }
        let n = self.trunk_x.len() as f64;
        let mean = self.trunk_x.iter().sum::<f64>() / n;
        let variance = self.trunk_x.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        self.sway = body::relative(variance.sqrt(), self.width_reference(frame)).unwrap_or(0.0);
    }

    fn stability(&self) -> Stability {
        Stability::from_sway(self.sway, &self.config.sway_bands)
    }
}

impl ItemAnalyzer for StandingUnsupportedAnalyzer {
    type Measurement = StandingMeasurement;

    fn item(&self) -> TestItem {
        TestItem::StandingUnsupported
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == StandingPhase::Complete
            || !self.is_usable(frame)
            || !self.is_standing(frame)
        {
            return false;
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);
        self.feet.set_baseline(frame);
        self.update_sway(frame);
        self.stance_gate.open(t);
        tracing::info!(t, "Standing stance recorded, timing");
        self.transition(StandingPhase::Timing, t);
        true
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        _calibrator: &Calibrator,
    ) -> Option<StandingMeasurement> {
        if !self.is_usable(frame) {
            return None;
        }
        if self.phase == StandingPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);
        self.feet.update(frame);

        let standing = self.is_standing(frame);
        if standing {
            self.update_sway(frame);
        } else {
            self.trunk_x.clear();
            self.sway = 0.0;
        }
        let stance_event = self.stance_gate.update(standing, t);
        let support_now = self.reaching_for_support(frame);
        let support_event = self.support_gate.update(support_now, t);
        let unstable_now = self.trunk_x.len() >= self.config.sway_window / 2
            && self.stability() == Stability::Unstable;
        let unstable_event = self.unstable_gate.update(unstable_now, t);

        match self.phase {
            StandingPhase::Waiting => {
                if let GateEvent::Entered { since } = stance_event {
                    if !self.feet.has_baseline() {
                        self.feet.set_baseline(frame);
                    }
                    tracing::info!(t, since, "Standing stance confirmed, timing");
                    self.transition(StandingPhase::Timing, t);
                }
            }
            StandingPhase::Timing => {
                if matches!(support_event, GateEvent::Entered { .. }) && !self.support_used {
                    self.support_used = true;
                    tracing::debug!(t, "Support use detected");
                }
                if matches!(unstable_event, GateEvent::Entered { .. }) {
                    tracing::info!(t, sway = self.sway, "Balance lost (sustained instability)");
                    self.lost_balance = true;
                    self.finish(CompletionKind::LostBalance, t);
                }
            }
            StandingPhase::Complete => {}
        }

        if self.phase == StandingPhase::Timing {
            match stance_event {
                GateEvent::Exited { since, until } => {
                    let hold = until.saturating_sub(since);
                    self.max_hold_ms = self.max_hold_ms.max(hold);
                    self.current_hold_ms = 0;
                    if ms_to_secs(hold) < self.config.min_hold_secs {
                        self.retries += 1;
                        tracing::debug!(t, retries = self.retries, "Stance broken early, re-arming");
                        self.transition(StandingPhase::Waiting, t);
                    } else {
                        self.finish(CompletionKind::Autonomous, t);
                    }
                }
                _ => {
                    self.current_hold_ms = self.stance_gate.held_ms(t);
                    self.max_hold_ms = self.max_hold_ms.max(self.current_hold_ms);
                    if ms_to_secs(self.current_hold_ms) >= self.config.target_secs {
                        tracing::info!(t, "Standing target reached");
                        self.finish(CompletionKind::Autonomous, t);
                    }
                }
            }
        }

        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != StandingPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == StandingPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == StandingPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> StandingMeasurement {
        StandingMeasurement {
            phase: self.phase,
            max_duration_secs: ms_to_secs(self.max_hold_ms),
            current_hold_secs: ms_to_secs(self.current_hold_ms),
            support_used: self.support_used,
            retries: self.retries,
            sway: self.sway,
            stability: self.stability(),
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        let m = self.measurement();
        score_standing_unsupported(&StandingInput {
            duration_secs: m.max_duration_secs,
            support_used: m.support_used,
            retries: m.retries,
            lost_balance: m.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            StandingPhase::Waiting => "waiting",
            StandingPhase::Timing => "timing",
            StandingPhase::Complete => "complete",
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

    const STEP_MS: u64 = 100;

    fn feed(analyzer: &mut StandingUnsupportedAnalyzer, from: u64, to: u64, pose: &PoseBuilder) {
        let calibrator = Calibrator::default();
        let mut t = from;
        while t < to {
            analyzer.analyze(&pose.build(t), &calibrator);
            t += STEP_MS;
        }
    }

    #[test]
    fn test_two_minutes_steady_scores_four() {
        let mut analyzer = StandingUnsupportedAnalyzer::with_defaults();
        feed(&mut analyzer, 0, 121_000, &PoseBuilder::standing_front());
        assert!(analyzer.is_complete());
        let m = analyzer.measurement();
        assert!(m.max_duration_secs >= 120.0);
        assert_eq!(m.stability, Stability::Excellent);
        assert!(!m.support_used);
        assert_eq!(analyzer.calculate_score().score, 4);
    }

    #[test]
    fn test_reaching_wide_marks_support() {
        let mut analyzer = StandingUnsupportedAnalyzer::with_defaults();
        feed(&mut analyzer, 0, 5_000, &PoseBuilder::standing_front());
        let mut holding = PoseBuilder::standing_front();
        holding.set_wrist(Side::Left, 0.85, 0.45);
        feed(&mut analyzer, 5_000, 6_000, &holding);
        feed(&mut analyzer, 6_000, 121_000, &PoseBuilder::standing_front());
        assert!(analyzer.measurement().support_used);
        assert_eq!(analyzer.calculate_score().score, 3);
    }

    #[test]
    fn test_early_break_counts_retry() {
        let mut analyzer = StandingUnsupportedAnalyzer::with_defaults();
        feed(&mut analyzer, 0, 10_000, &PoseBuilder::standing_front());
        feed(&mut analyzer, 10_000, 13_000, &PoseBuilder::sitting_side());
        assert_eq!(analyzer.phase(), StandingPhase::Waiting);
        assert_eq!(analyzer.measurement().retries, 1);
        let best = analyzer.measurement().max_duration_secs;
        assert!(best > 9.0 && best < 10.5);

        feed(&mut analyzer, 13_000, 50_000, &PoseBuilder::standing_front());
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 1);
    }

    #[test]
    fn test_heavy_sway_loses_balance() {
        let mut analyzer = StandingUnsupportedAnalyzer::with_defaults();
        feed(&mut analyzer, 0, 3_000, &PoseBuilder::standing_front());
        let calibrator = Calibrator::default();
        for i in 0..40u64 {
            let mut pose = PoseBuilder::standing_front();
            pose.shift_x(if i % 2 == 0 { 0.04 } else { -0.04 });
            analyzer.analyze(&pose.build(3_000 + i * STEP_MS), &calibrator);
        }
        assert!(analyzer.is_complete());
        assert!(analyzer.measurement().lost_balance);
        assert_eq!(analyzer.calculate_score().score, 0);
    }

    #[test]
    fn test_record_initial_starts_the_hold() {
        let mut analyzer = StandingUnsupportedAnalyzer::with_defaults();
        assert!(!analyzer.record_initial(&PoseBuilder::sitting_side().build(0)));
        assert!(analyzer.record_initial(&PoseBuilder::standing_front().build(0)));
        assert_eq!(analyzer.phase(), StandingPhase::Timing);
        assert_eq!(analyzer.ledger().frames(), 1);

        // Shorter than the stance debounce, yet already timing.
        feed(&mut analyzer, 100, 400, &PoseBuilder::standing_front());
        let m = analyzer.measurement();
        assert!((m.current_hold_secs - 0.3).abs() < 1e-9);
        assert_eq!(analyzer.ledger().frames(), 4);
    }

    #[test]
    fn test_frozen_after_completion() {
        let mut analyzer = StandingUnsupportedAnalyzer::with_defaults();
        feed(&mut analyzer, 0, 2_000, &PoseBuilder::standing_front());
        analyzer.mark_complete();
        let frozen = analyzer.measurement();
        let calibrator = Calibrator::default();
        for t in [2_100, 2_200, 9_000] {
            let again = analyzer.analyze(&PoseBuilder::sitting_side().build(t), &calibrator);
            assert_eq!(again.as_ref(), Some(&frozen));
        }
    }
}
