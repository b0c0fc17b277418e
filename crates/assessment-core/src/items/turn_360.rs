//! BBS 11: turning 360 degrees, once in each direction.
//!
//! A full turn shows up as a shoulder-width cycle relative to the facing
//! baseline: narrowing into profile, the face disappearing while the back
//! is to the camera, the second profile, and the shoulders widening again
//! as the patient comes back to face front. Every transition must hold for
//! a few consecutive frames before it counts.

use serde::{Deserialize, Serialize};
use stride_common::clock::elapsed_secs;
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame, TimestampMs};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_turn_360, TurnInput, TurnOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    pub min_visibility: f64,
    /// Nose visibility below this means the patient's back is to the camera.
    pub nose_visibility: f64,
    pub standing_ratio: f64,
    pub baseline_confirm_ms: u64,
    /// Width ratio below which the turn has started.
    pub turning_ratio: f64,
    /// Width ratio below which a turning patient is facing away, and above
    /// which a patient coming round is past the back-facing stretch.
    pub back_ratio: f64,
    /// Width ratio of a true profile; a returning patient who narrows past it
    /// has swung back round.
    pub profile_ratio: f64,
    /// Width ratio at which the patient faces front again.
    pub return_ratio: f64,
    /// Consecutive frames needed to confirm a transition.
    pub stable_frames: u32,
    /// Rest between the two turns.
    pub pause_ms: u64,
    /// Ankle travel that counts as walking off the spot. Pivoting in place
    /// stays under it.
    pub feet_threshold: f64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            nose_visibility: 0.5,
            standing_ratio: 0.45,
            baseline_confirm_ms: 500,
            turning_ratio: 0.75,
            back_ratio: 0.50,
            profile_ratio: 0.35,
            return_ratio: 0.70,
            stable_frames: 4,
            pause_ms: 3000,
            feet_threshold: 0.12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Waiting,
    FacingFront,
    TurningAway,
    PoseLost,
    Returning,
    Pausing,
    Complete,
}

/// Which of the two turns is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    First,
    Pause,
    Second,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMeasurement {
    pub phase: TurnPhase,
    pub stage: TurnStage,
    pub width_ratio: f64,
    pub pose_lost: bool,
    /// Seconds since the current turn started, 0 between turns.
    pub current_turn_secs: f64,
    pub first: TurnOutcome,
    pub second: TurnOutcome,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

/// A candidate transition waiting for enough consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    target: TurnPhase,
    since: TimestampMs,
    frames: u32,
}

#[derive(Debug, Clone)]
pub struct Turn360Analyzer {
    config: TurnConfig,
    phase: TurnPhase,
    stage: TurnStage,
    ledger: FrameLedger,
    standing_gate: DebouncedGate,
    baseline_width: Option<f64>,
    feet: FeetTracker,
    pending: Option<Pending>,
    turn_started: Option<TimestampMs>,
    pause_from: TimestampMs,
    width_ratio: f64,
    pose_lost: bool,
    current_turn_secs: f64,
    first: TurnOutcome,
    second: TurnOutcome,
    lost_balance: bool,
}

impl Turn360Analyzer {
    pub fn new(config: TurnConfig) -> Self {
        Self {
            phase: TurnPhase::Waiting,
            stage: TurnStage::First,
            ledger: FrameLedger::default(),
            standing_gate: DebouncedGate::new(config.baseline_confirm_ms, 0),
            baseline_width: None,
            feet: FeetTracker::new(config.feet_threshold),
            pending: None,
            turn_started: None,
            pause_from: 0,
            width_ratio: 1.0,
            pose_lost: false,
            current_turn_secs: 0.0,
            first: TurnOutcome::default(),
            second: TurnOutcome::default(),
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(TurnConfig::default())
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn stage(&self) -> TurnStage {
        self.stage
    }

    fn transition(&mut self, to: TurnPhase, t: TimestampMs) {
        if self.phase != to {
            log_transition(TestItem::Turn360, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: TimestampMs) {
        self.stage = TurnStage::Done;
        self.current_turn_secs = 0.0;
        self.ledger.complete(kind);
        self.transition(TurnPhase::Complete, t);
    }

    fn capture_baseline(&mut self, frame: &LandmarkFrame) {
        let width = body::shoulder_width(frame);
        self.baseline_width = Some(width);
        self.feet.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, shoulder_width = width, "Facing baseline captured");
        self.transition(TurnPhase::FacingFront, frame.timestamp_ms);
    }

    /// Where the current frame points, if it differs from the current phase.
    fn target(&self, ratio: f64, hidden: bool) -> Option<TurnPhase> {
        let c = &self.config;
        match self.phase {
            TurnPhase::FacingFront => {
                (hidden || ratio < c.turning_ratio).then_some(TurnPhase::TurningAway)
            }
            TurnPhase::TurningAway if hidden || ratio < c.back_ratio => {
                Some(TurnPhase::PoseLost)
            }
            TurnPhase::Returning if hidden || ratio < c.profile_ratio => {
                Some(TurnPhase::PoseLost)
            }
            TurnPhase::TurningAway | TurnPhase::Returning => {
                (ratio >= c.return_ratio).then_some(TurnPhase::FacingFront)
            }
            TurnPhase::PoseLost if hidden => None,
            TurnPhase::PoseLost if ratio >= c.return_ratio => Some(TurnPhase::FacingFront),
            TurnPhase::PoseLost if ratio >= c.back_ratio => Some(TurnPhase::Returning),
            _ => None,
        }
    }

    fn confirm(&mut self, target: Option<TurnPhase>, t: TimestampMs) -> Option<Pending> {
        let Some(target) = target else {
            self.pending = None;
            return None;
        };
        let pending = match self.pending {
            Some(p) if p.target == target => Pending {
                frames: p.frames + 1,
                ..p
            },
            _ => Pending {
                target,
                since: t,
                frames: 1,
            },
        };
        if pending.frames >= self.config.stable_frames.max(1) {
            self.pending = None;
            Some(pending)
        } else {
            self.pending = Some(pending);
            None
        }
    }

    fn apply(&mut self, step: Pending, t: TimestampMs) {
        let from = self.phase;
        match (from, step.target) {
            (TurnPhase::FacingFront, TurnPhase::TurningAway) => {
                self.turn_started = Some(step.since);
                self.transition(TurnPhase::TurningAway, t);
            }
            (TurnPhase::TurningAway, TurnPhase::FacingFront) => {
                tracing::debug!(t, "Turn abandoned before facing away");
                self.turn_started = None;
                self.transition(TurnPhase::FacingFront, t);
            }
            (TurnPhase::PoseLost | TurnPhase::Returning, TurnPhase::FacingFront) => {
                self.complete_turn(step.since, t);
            }
            (_, to) => self.transition(to, t),
        }
    }

    fn complete_turn(&mut self, ended: TimestampMs, t: TimestampMs) {
        let started = self.turn_started.take().unwrap_or(ended);
        let outcome = TurnOutcome {
            completed: true,
            elapsed_secs: elapsed_secs(started, ended),
        };
        self.current_turn_secs = 0.0;
        match self.stage {
            TurnStage::First => {
                tracing::info!(t, secs = outcome.elapsed_secs, "First turn complete");
                self.first = outcome;
                self.stage = TurnStage::Pause;
                self.pause_from = ended;
                self.transition(TurnPhase::Pausing, t);
            }
            _ => {
                tracing::info!(t, secs = outcome.elapsed_secs, "Second turn complete");
                self.second = outcome;
                self.finish(CompletionKind::Autonomous, t);
            }
        }
    }
}

impl ItemAnalyzer for Turn360Analyzer {
    type Measurement = TurnMeasurement;

    fn item(&self) -> TestItem {
        TestItem::Turn360
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == TurnPhase::Complete
            || !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
        {
            return false;
        }
        self.ledger.accept(frame);
        self.capture_baseline(frame);
        true
    }

    fn analyze(&mut self, frame: &LandmarkFrame, _calibrator: &Calibrator) -> Option<TurnMeasurement> {
        // The nose is deliberately not required: losing it is part of a turn.
        if !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility) {
            return None;
        }
        if self.phase == TurnPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);
        let hidden = !frame.is_visible(&[BodyPoint::Nose], self.config.nose_visibility);
        self.pose_lost = hidden;

        let Some(baseline) = self.baseline_width else {
            let ready = !hidden
                && ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);
            if let GateEvent::Entered { .. } = self.standing_gate.update(ready, t) {
                self.capture_baseline(frame);
            }
            return Some(self.measurement());
        };

        self.feet.update(frame);
        self.width_ratio = body::relative(body::shoulder_width(frame), baseline).unwrap_or(1.0);

        if self.phase == TurnPhase::Pausing {
            if t.saturating_sub(self.pause_from) >= self.config.pause_ms {
                self.stage = TurnStage::Second;
                self.transition(TurnPhase::FacingFront, t);
            }
            return Some(self.measurement());
        }

        let target = self.target(self.width_ratio, hidden);
        if let Some(step) = self.confirm(target, t) {
            self.apply(step, t);
        }
        if let Some(started) = self.turn_started {
            self.current_turn_secs = elapsed_secs(started, t);
        }
        tracing::trace!(t, ratio = self.width_ratio, hidden, phase = ?self.phase, "Turn");
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != TurnPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == TurnPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == TurnPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> TurnMeasurement {
        TurnMeasurement {
            phase: self.phase,
            stage: self.stage,
            width_ratio: self.width_ratio,
            pose_lost: self.pose_lost,
            current_turn_secs: self.current_turn_secs,
            first: self.first,
            second: self.second,
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_turn_360(&TurnInput {
            first: self.first,
            second: self.second,
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            TurnPhase::Waiting => "waiting",
            TurnPhase::FacingFront => "facing_front",
            TurnPhase::TurningAway => "turning_away",
            TurnPhase::PoseLost => "pose_lost",
            TurnPhase::Returning => "returning",
            TurnPhase::Pausing => "pausing",
            TurnPhase::Complete => "complete",
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

    fn front() -> PoseBuilder {
        PoseBuilder::standing_front()
    }

    fn narrowed(width: f64) -> PoseBuilder {
        let mut pose = PoseBuilder::standing_front();
        pose.set_shoulder_width(width);
        pose
    }

    fn back() -> PoseBuilder {
        let mut pose = PoseBuilder::standing_front();
        pose.set_visibility(BodyPoint::Nose, 0.1);
        pose
    }

    /// One full rotation; the back-facing stretch lasts `back_frames`.
    fn one_turn(back_frames: usize) -> Vec<PoseBuilder> {
        let mut poses = vec![narrowed(0.08); 5];
        poses.extend(vec![narrowed(0.03); 5]);
        poses.extend(vec![back(); back_frames]);
        poses.extend(vec![narrowed(0.03); 5]);
        poses.extend(vec![narrowed(0.08); 5]);
        poses.extend(vec![front(); 5]);
        poses
    }

    fn feed(analyzer: &mut Turn360Analyzer, poses: &[PoseBuilder], start: u64) -> u64 {
        let calibrator = Calibrator::default();
        let mut t = start;
        for pose in poses {
            analyzer.analyze(&pose.build(t), &calibrator);
            t += STEP_MS;
        }
        t
    }

    fn settled() -> (Turn360Analyzer, u64) {
        let mut analyzer = Turn360Analyzer::with_defaults();
        let t = feed(&mut analyzer, &vec![front(); 10], 0);
        assert_eq!(analyzer.phase(), TurnPhase::FacingFront);
        (analyzer, t)
    }

    #[test]
    fn test_two_quick_turns_score_four() {
        let (mut analyzer, t) = settled();
        let t = feed(&mut analyzer, &one_turn(10), t);
        assert_eq!(analyzer.stage(), TurnStage::Pause);
        let first = analyzer.measurement().first;
        assert!(first.completed);
        // From the first narrowed frame to the first front frame.
        assert!((first.elapsed_secs - 3.0).abs() < 1e-9);

        let t = feed(&mut analyzer, &vec![front(); 32], t);
        assert_eq!(analyzer.stage(), TurnStage::Second);
        feed(&mut analyzer, &one_turn(10), t);

        assert!(analyzer.is_complete());
        let m = analyzer.measurement();
        assert!(m.second.completed);
        assert!(!m.feet_moved);
        assert_eq!(analyzer.calculate_score().score, 4);
    }

    #[test]
    fn test_slow_second_turn_scores_three() {
        let (mut analyzer, t) = settled();
        let t = feed(&mut analyzer, &one_turn(10), t);
        let t = feed(&mut analyzer, &vec![front(); 32], t);
        feed(&mut analyzer, &one_turn(40), t);
        let m = analyzer.measurement();
        assert!((m.second.elapsed_secs - 6.0).abs() < 1e-9);
        assert_eq!(analyzer.calculate_score().score, 3);
    }

    #[test]
    fn test_only_one_turn_scores_one() {
        let (mut analyzer, t) = settled();
        let t = feed(&mut analyzer, &one_turn(10), t);
        feed(&mut analyzer, &vec![front(); 40], t);
        analyzer.mark_complete();
        assert_eq!(analyzer.calculate_score().score, 1);
    }

    #[test]
    fn test_brief_glance_is_not_a_turn() {
        let (mut analyzer, t) = settled();
        let mut poses = vec![narrowed(0.08); 5];
        poses.extend(vec![front(); 5]);
        feed(&mut analyzer, &poses, t);
        assert_eq!(analyzer.phase(), TurnPhase::FacingFront);
        assert!(!analyzer.measurement().first.completed);
    }

    #[test]
    fn test_flicker_shorter_than_stable_window_is_ignored() {
        let (mut analyzer, t) = settled();
        let poses = [narrowed(0.08), narrowed(0.08), front(), narrowed(0.08), front()];
        feed(&mut analyzer, &poses, t);
        assert_eq!(analyzer.phase(), TurnPhase::FacingFront);
    }

    #[test]
    fn test_shallow_dip_with_visible_nose_counts_as_turn() {
        let (mut analyzer, t) = settled();
        // Baseline width 0.12: 0.08 is ratio 0.67, 0.054 is ratio 0.45.
        let mut poses = vec![narrowed(0.08); 5];
        poses.extend(vec![narrowed(0.054); 8]);
        poses.extend(vec![narrowed(0.08); 5]);
        poses.extend(vec![front(); 6]);
        feed(&mut analyzer, &poses, t);

        assert_eq!(analyzer.stage(), TurnStage::Pause);
        let first = analyzer.measurement().first;
        assert!(first.completed);
        assert!((first.elapsed_secs - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_walking_off_the_spot_sets_feet_moved() {
        let (mut analyzer, t) = settled();
        let mut walked = front();
        walked.shift_x(0.15);
        feed(&mut analyzer, &[walked], t);
        assert!(analyzer.measurement().feet_moved);
    }

    #[test]
    fn test_back_facing_frame_is_still_processed() {
        let (mut analyzer, t) = settled();
        let calibrator = Calibrator::default();
        let m = analyzer.analyze(&back().build(t), &calibrator);
        assert!(m.is_some_and(|m| m.pose_lost));
    }
}
