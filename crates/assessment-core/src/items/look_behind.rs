//! BBS 10: turning to look behind over each shoulder.
//!
//! Trunk rotation is inferred from apparent shoulder width: a shoulder line
//! of length `w0` facing the camera projects to `w0·cos θ` when rotated by
//! `θ`. Width alone cannot tell left from right, so the direction comes
//! from shoulder depth, or failing that, from where the nose has moved.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_look_behind, LookBehindInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookBehindConfig {
    pub min_visibility: f64,
    pub standing_ratio: f64,
    pub baseline_confirm_ms: u64,
    /// Shoulder depth difference change that decides direction.
    pub depth_threshold: f64,
    /// Nose offset change used when depth is inconclusive.
    pub nose_threshold: f64,
    /// Hip-centre horizontal travel that counts as a weight shift.
    pub weight_shift_threshold: f64,
    /// Both sides must reach this rotation before autonomous completion.
    pub completion_min_deg: f64,
    pub min_history: usize,
    pub recent_window: usize,
    /// The recent average must settle below this to finish.
    pub settle_deg: f64,
    pub feet_threshold: f64,
}

impl Default for LookBehindConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            standing_ratio: 0.45,
            baseline_confirm_ms: 500,
            depth_threshold: 0.05,
            nose_threshold: 0.02,
            weight_shift_threshold: 0.02,
            completion_min_deg: 20.0,
            min_history: 30,
            recent_window: 10,
            settle_deg: 15.0,
            feet_threshold: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookBehindPhase {
    Waiting,
    Measuring,
    Complete,
}

/// Which shoulder the patient is looking over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookDirection {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FacingBaseline {
    shoulder_width: f64,
    depth_delta: f64,
    nose_offset: f64,
    hip_x: f64,
}

impl FacingBaseline {
    fn capture(frame: &LandmarkFrame) -> Self {
        Self {
            shoulder_width: body::shoulder_width(frame),
            depth_delta: depth_delta(frame),
            nose_offset: nose_offset(frame),
            hip_x: body::hip_mid(frame).x,
        }
    }
}

/// Left shoulder depth minus right; grows as the left shoulder turns away.
fn depth_delta(frame: &LandmarkFrame) -> f64 {
    let z = |point: BodyPoint| frame.landmark(point).map_or(0.0, |l| l.z);
    z(BodyPoint::LeftShoulder) - z(BodyPoint::RightShoulder)
}

/// Nose x relative to the shoulder midpoint.
fn nose_offset(frame: &LandmarkFrame) -> f64 {
    frame.point(BodyPoint::Nose).x - body::shoulder_mid(frame).x
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookBehindMeasurement {
    pub phase: LookBehindPhase,
    pub rotation_deg: f64,
    pub direction: LookDirection,
    pub left_max_deg: f64,
    pub right_max_deg: f64,
    pub weight_shift: bool,
    pub frames_measured: usize,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
pub struct LookBehindAnalyzer {
    config: LookBehindConfig,
    phase: LookBehindPhase,
    ledger: FrameLedger,
    standing_gate: DebouncedGate,
    feet: FeetTracker,
    baseline: Option<FacingBaseline>,
    recent: VecDeque<f64>,
    frames_measured: usize,
    rotation_deg: f64,
    direction: LookDirection,
    left_max_deg: f64,
    right_max_deg: f64,
    weight_shift: bool,
    lost_balance: bool,
}

impl LookBehindAnalyzer {
    pub fn new(config: LookBehindConfig) -> Self {
        Self {
            phase: LookBehindPhase::Waiting,
            ledger: FrameLedger::default(),
            standing_gate: DebouncedGate::new(config.baseline_confirm_ms, 0),
            feet: FeetTracker::new(config.feet_threshold),
            baseline: None,
            recent: VecDeque::new(),
            frames_measured: 0,
            rotation_deg: 0.0,
            direction: LookDirection::Center,
            left_max_deg: 0.0,
            right_max_deg: 0.0,
            weight_shift: false,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LookBehindConfig::default())
    }

    pub fn phase(&self) -> LookBehindPhase {
        self.phase
    }

    fn transition(&mut self, to: LookBehindPhase, t: u64) {
        if self.phase != to {
            log_transition(TestItem::LookBehind, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: u64) {
        self.ledger.complete(kind);
        self.transition(LookBehindPhase::Complete, t);
    }

    fn is_usable(&self, frame: &LandmarkFrame) -> bool {
        body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility)
            && frame.is_visible(&[BodyPoint::Nose], self.config.min_visibility)
    }

    fn start_measuring(&mut self, frame: &LandmarkFrame) {
        let baseline = FacingBaseline::capture(frame);
        tracing::info!(
            t = frame.timestamp_ms,
            shoulder_width = baseline.shoulder_width,
            "Facing baseline captured"
        );
        self.baseline = Some(baseline);
        self.feet.set_baseline(frame);
        self.transition(LookBehindPhase::Measuring, frame.timestamp_ms);
    }

    fn classify_direction(&self, baseline: &FacingBaseline, frame: &LandmarkFrame) -> LookDirection {
        let dz = depth_delta(frame) - baseline.depth_delta;
        if dz.abs() > self.config.depth_threshold {
            return if dz > 0.0 {
                LookDirection::Left
            } else {
                LookDirection::Right
            };
        }
        // The patient's left is on the image right when facing the camera.
        let dn = nose_offset(frame) - baseline.nose_offset;
        if dn > self.config.nose_threshold {
            LookDirection::Left
        } else if dn < -self.config.nose_threshold {
            LookDirection::Right
        } else {
            LookDirection::Center
        }
    }

    fn settled(&self) -> bool {
        let c = &self.config;
        if self.left_max_deg < c.completion_min_deg
            || self.right_max_deg < c.completion_min_deg
            || self.frames_measured < c.min_history
            || self.recent.len() < c.recent_window.max(1)
        {
            return false;
        }
        let avg = self.recent.iter().sum::<f64>() / self.recent.len() as f64;
        avg < c.settle_deg
    }
}

/// Rotation in degrees from the ratio of current to baseline shoulder width.
pub fn rotation_from_width(current: f64, baseline: f64) -> f64 {
    match body::relative(current, baseline) {
        Some(ratio) => ratio.clamp(0.0, 1.0).acos().to_degrees(),
        None => 0.0,
    }
}

impl ItemAnalyzer for LookBehindAnalyzer {
    type Measurement = LookBehindMeasurement;

    fn item(&self) -> TestItem {
        TestItem::LookBehind
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == LookBehindPhase::Complete || !self.is_usable(frame) {
            return false;
        }
        self.ledger.accept(frame);
        self.start_measuring(frame);
        true
    }

    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        _calibrator: &Calibrator,
    ) -> Option<LookBehindMeasurement> {
        if !self.is_usable(frame) {
            return None;
        }
        if self.phase == LookBehindPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        let Some(baseline) = self.baseline else {
            let standing =
                ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);
            if let GateEvent::Entered { .. } = self.standing_gate.update(standing, t) {
                self.start_measuring(frame);
            }
            return Some(self.measurement());
        };

        self.rotation_deg = rotation_from_width(body::shoulder_width(frame), baseline.shoulder_width);
        self.direction = self.classify_direction(&baseline, frame);
        match self.direction {
            LookDirection::Left => self.left_max_deg = self.left_max_deg.max(self.rotation_deg),
            LookDirection::Right => self.right_max_deg = self.right_max_deg.max(self.rotation_deg),
            LookDirection::Center => {}
        }

        let shift = (body::hip_mid(frame).x - baseline.hip_x).abs();
        if shift >= self.config.weight_shift_threshold && !self.weight_shift {
            self.weight_shift = true;
            tracing::debug!(t, shift, "Weight shift detected");
        }
        self.feet.update(frame);

        self.frames_measured += 1;
        self.recent.push_back(self.rotation_deg);
        while self.recent.len() > self.config.recent_window.max(1) {
            self.recent.pop_front();
        }
        tracing::trace!(t, rotation = self.rotation_deg, direction = ?self.direction, "Look behind");

        if self.settled() {
            tracing::info!(
                t,
                left = self.left_max_deg,
                right = self.right_max_deg,
                "Both sides done, look-behind complete"
            );
            self.finish(CompletionKind::Autonomous, t);
        }
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != LookBehindPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == LookBehindPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == LookBehindPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> LookBehindMeasurement {
        LookBehindMeasurement {
            phase: self.phase,
            rotation_deg: self.rotation_deg,
            direction: self.direction,
            left_max_deg: self.left_max_deg,
            right_max_deg: self.right_max_deg,
            weight_shift: self.weight_shift,
            frames_measured: self.frames_measured,
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_look_behind(&LookBehindInput {
            left_max_deg: self.left_max_deg,
            right_max_deg: self.right_max_deg,
            weight_shift: self.weight_shift,
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            LookBehindPhase::Waiting => "waiting",
            LookBehindPhase::Measuring => "measuring",
            LookBehindPhase::Complete => "complete",
        }
    }

    fn ledger(&self) -> &FrameLedger {
        &self.ledger
    }
}
