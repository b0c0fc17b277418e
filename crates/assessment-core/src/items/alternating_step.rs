//! BBS 12: placing alternate feet on a step stool.
//!
//! Each foot runs its own hysteresis gate: a foot is up once its ankle has
//! risen past the upper threshold for the debounce time, and counts as a
//! touch when it comes back below the lower one.

use serde::{Deserialize, Serialize};
use stride_common::clock::elapsed_secs;
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{LandmarkFrame, Side, TimestampMs};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_alternating_step, AlternatingStepInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternatingStepConfig {
    pub min_visibility: f64,
    pub standing_ratio: f64,
    pub baseline_confirm_ms: u64,
    /// Ankle rise, as a share of body height, that lifts a foot.
    pub step_up_fraction: f64,
    /// A lifted foot is down again once its rise falls below this share.
    pub step_down_fraction: f64,
    pub debounce_ms: u64,
    pub target_touches: u32,
    pub time_limit_secs: f64,
    /// Travel of the planted foot that counts as the stance drifting.
    pub feet_threshold: f64,
}

impl Default for AlternatingStepConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            standing_ratio: 0.45,
            baseline_confirm_ms: 500,
            step_up_fraction: 0.06,
            step_down_fraction: 0.03,
            debounce_ms: 100,
            target_touches: 8,
            time_limit_secs: 20.0,
            feet_threshold: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Waiting,
    Measuring,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternatingStepMeasurement {
    pub phase: StepPhase,
    pub touches: u32,
    pub left_touches: u32,
    pub right_touches: u32,
    /// Touches made with the other foot than the previous one.
    pub alternations: u32,
    pub left_up: bool,
    pub right_up: bool,
    pub elapsed_secs: f64,
    pub secs_to_target: Option<f64>,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
struct FootState {
    gate: DebouncedGate,
    baseline_y: f64,
    touches: u32,
}

#[derive(Debug, Clone)]
pub struct AlternatingStepAnalyzer {
    config: AlternatingStepConfig,
    phase: StepPhase,
    ledger: FrameLedger,
    standing_gate: DebouncedGate,
    body_height: f64,
    feet: Option<[FootState; 2]>,
    drift: FeetTracker,
    last_side: Option<Side>,
    alternations: u32,
    first_step_ms: Option<TimestampMs>,
    elapsed_secs: f64,
    secs_to_target: Option<f64>,
    lost_balance: bool,
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

impl AlternatingStepAnalyzer {
    pub fn new(config: AlternatingStepConfig) -> Self {
        Self {
            phase: StepPhase::Waiting,
            ledger: FrameLedger::default(),
            standing_gate: DebouncedGate::new(config.baseline_confirm_ms, 0),
            body_height: 0.0,
            feet: None,
            drift: FeetTracker::stance_foot(config.feet_threshold),
            last_side: None,
            alternations: 0,
            first_step_ms: None,
            elapsed_secs: 0.0,
            secs_to_target: None,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AlternatingStepConfig::default())
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    pub fn touches(&self) -> u32 {
        self.feet
            .as_ref()
            .map_or(0, |feet| feet.iter().map(|f| f.touches).sum())
    }

    fn transition(&mut self, to: StepPhase, t: TimestampMs) {
        if self.phase != to {
            log_transition(TestItem::AlternatingStep, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: TimestampMs) {
        self.ledger.complete(kind);
        self.transition(StepPhase::Complete, t);
    }

    fn capture_baseline(&mut self, frame: &LandmarkFrame) {
        self.body_height = body::body_height(frame, self.config.min_visibility);
        let foot = |side: Side| FootState {
            gate: DebouncedGate::new(self.config.debounce_ms, self.config.debounce_ms),
            baseline_y: frame.point(side.ankle()).y,
            touches: 0,
        };
        self.feet = Some([foot(Side::Left), foot(Side::Right)]);
        self.drift.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, body_height = self.body_height, "Step baseline captured");
        self.transition(StepPhase::Measuring, frame.timestamp_ms);
    }

    fn record_touch(&mut self, side: Side, t: TimestampMs) {
        if self.last_side.is_some_and(|last| last != side) {
            self.alternations += 1;
        }
        self.last_side = Some(side);
        let touches = self.touches();
        tracing::debug!(t, side = ?side, touches, "Step touch");

        if touches >= self.config.target_touches && self.secs_to_target.is_none() {
            let secs = self.first_step_ms.map_or(0.0, |first| elapsed_secs(first, t));
            self.secs_to_target = Some(secs);
            tracing::info!(t, touches, secs, "Target touches reached");
            self.finish(CompletionKind::Autonomous, t);
        }
    }
}

impl ItemAnalyzer for AlternatingStepAnalyzer {
    type Measurement = AlternatingStepMeasurement;

    fn item(&self) -> TestItem {
        TestItem::AlternatingStep
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == StepPhase::Complete
            || !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
        {
            return false;
        }
        self.ledger.accept(frame);
        self.capture_baseline(frame);
        true
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        _calibrator: &Calibrator,
    ) -> Option<AlternatingStepMeasurement> {
        if !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility) {
            return None;
        }
        if self.phase == StepPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        if self.feet.is_none() {
            let standing =
                ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);
            if let GateEvent::Entered { .. } = self.standing_gate.update(standing, t) {
                self.capture_baseline(frame);
            }
            return Some(self.measurement());
        }

        self.drift.update(frame);
        let up_at = self.body_height * self.config.step_up_fraction;
        let down_at = self.body_height * self.config.step_down_fraction;
        let mut events = Vec::with_capacity(2);
        if let Some(feet) = self.feet.as_mut() {
            for side in Side::BOTH {
                let foot = &mut feet[side_index(side)];
                let rise = foot.baseline_y - frame.point(side.ankle()).y;
                let lifted = if foot.gate.is_active() {
                    rise >= down_at
                } else {
                    rise > up_at
                };
                match foot.gate.update(lifted, t) {
                    GateEvent::Exited { .. } => {
                        foot.touches += 1;
                        events.push((side, None));
                    }
                    GateEvent::Entered { since } => events.push((side, Some(since))),
                    GateEvent::None => {}
                }
            }
        }
        for (side, lifted_since) in events {
            match lifted_since {
                Some(since) => {
                    self.first_step_ms.get_or_insert(since);
                }
                None => self.record_touch(side, t),
            }
        }
        if self.phase == StepPhase::Complete {
            return Some(self.measurement());
        }

        if let Some(first) = self.first_step_ms {
            self.elapsed_secs = elapsed_secs(first, t);
            if self.elapsed_secs >= self.config.time_limit_secs {
                tracing::info!(t, touches = self.touches(), "Step time limit reached");
                self.finish(CompletionKind::Autonomous, t);
            }
        }
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != StepPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == StepPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == StepPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> AlternatingStepMeasurement {
        let (left, right) = match &self.feet {
            Some([l, r]) => ((l.touches, l.gate.is_active()), (r.touches, r.gate.is_active())),
            None => ((0, false), (0, false)),
        };
        AlternatingStepMeasurement {
            phase: self.phase,
            touches: left.0 + right.0,
            left_touches: left.0,
            right_touches: right.0,
            alternations: self.alternations,
            left_up: left.1,
            right_up: right.1,
            elapsed_secs: self.elapsed_secs,
            secs_to_target: self.secs_to_target,
            feet_moved: self.drift.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_alternating_step(&AlternatingStepInput {
            touches: self.touches(),
            secs_to_target: self.secs_to_target,
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            StepPhase::Waiting => "waiting",
            StepPhase::Measuring => "measuring",
            StepPhase::Complete => "complete",
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

    fn lifted(side: Side) -> PoseBuilder {
        let mut pose = PoseBuilder::standing_front();
        pose.lift_foot(side, 0.08);
        pose
    }

    fn touch(side: Side, down_frames: usize) -> Vec<PoseBuilder> {
        let mut poses = vec![lifted(side); 3];
        poses.extend(vec![PoseBuilder::standing_front(); down_frames]);
        poses
    }

    fn feed(analyzer: &mut AlternatingStepAnalyzer, poses: &[PoseBuilder], start: u64) -> u64 {
        let calibrator = Calibrator::default();
        let mut t = start;
        for pose in poses {
            analyzer.analyze(&pose.build(t), &calibrator);
            t += 100;
        }
        t
    }

    fn ready() -> (AlternatingStepAnalyzer, u64) {
        let mut analyzer = AlternatingStepAnalyzer::with_defaults();
        let t = feed(&mut analyzer, &vec![PoseBuilder::standing_front(); 10], 0);
        assert_eq!(analyzer.phase(), StepPhase::Measuring);
        (analyzer, t)
    }

    #[test]
    fn test_eight_quick_alternating_touches() {
        let (mut analyzer, mut t) = ready();
        for i in 0..8 {
            let side = if i % 2 == 0 { Side::Left } else { Side::Right };
            t = feed(&mut analyzer, &touch(side, 3), t);
        }
        assert!(analyzer.is_complete());
        let m = analyzer.measurement();
        assert_eq!(m.touches, 8);
        assert_eq!((m.left_touches, m.right_touches), (4, 4));
        assert_eq!(m.alternations, 7);
        assert!(!m.feet_moved);
        assert!(m.secs_to_target.is_some_and(|s| s < 5.0));
        assert_eq!(analyzer.calculate_score().score, 4);
    }

    #[test]
    fn test_stance_drift_sets_feet_moved() {
        let (mut analyzer, t) = ready();
        let mut drifted = PoseBuilder::standing_front();
        drifted.shift_x(0.12);
        feed(&mut analyzer, &[drifted], t);
        assert!(analyzer.measurement().feet_moved);
    }

    #[test]
    fn test_short_dip_is_debounced() {
        let (mut analyzer, t) = ready();
        let mut poses = vec![lifted(Side::Left)];
        poses.extend(vec![PoseBuilder::standing_front(); 3]);
        feed(&mut analyzer, &poses, t);
        assert_eq!(analyzer.touches(), 0);
    }

    #[test]
    fn test_time_limit_ends_slow_stepping() {
        let (mut analyzer, mut t) = ready();
        for i in 0..5 {
            let side = if i % 2 == 0 { Side::Left } else { Side::Right };
            t = feed(&mut analyzer, &touch(side, 37), t);
        }
        assert!(!analyzer.is_complete());
        feed(&mut analyzer, &vec![PoseBuilder::standing_front(); 10], t);
        assert!(analyzer.is_complete());
        let m = analyzer.measurement();
        assert_eq!(m.touches, 5);
        assert!(m.secs_to_target.is_none());
        assert_eq!(analyzer.calculate_score().score, 2);
    }

    #[test]
    fn test_touch_count_never_decreases() {
        let (mut analyzer, mut t) = ready();
        let mut last = 0;
        for i in 0..6 {
            let side = if i % 3 == 0 { Side::Right } else { Side::Left };
            t = feed(&mut analyzer, &touch(side, 2), t);
            let now = analyzer.measurement().touches;
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 6);
    }
}
