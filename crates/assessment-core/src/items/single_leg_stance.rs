//! BBS 14: standing on one leg.

use serde::{Deserialize, Serialize};
use stride_common::clock::ms_to_secs;
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{LandmarkFrame, Side, TimestampMs};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_single_leg_stance, SingleLegInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleLegConfig {
    pub min_visibility: f64,
    pub standing_ratio: f64,
    pub baseline_confirm_ms: u64,
    /// Ankle height difference, as a share of body height, that means a lifted foot.
    pub lift_fraction: f64,
    pub lift_confirm_ms: u64,
    /// Touch-downs shorter than this do not end the hold.
    pub drop_grace_ms: u64,
    /// Travel of the standing foot that counts as shuffling.
    pub feet_threshold: f64,
}

impl Default for SingleLegConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            standing_ratio: 0.45,
            baseline_confirm_ms: 500,
            lift_fraction: 0.025,
            lift_confirm_ms: 150,
            drop_grace_ms: 600,
            feet_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleLegPhase {
    Waiting,
    Measuring,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleLegMeasurement {
    pub phase: SingleLegPhase,
    pub lifted_side: Option<Side>,
    pub current_hold_secs: f64,
    pub max_duration_secs: f64,
    pub lifts: u32,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
pub struct SingleLegAnalyzer {
    config: SingleLegConfig,
    phase: SingleLegPhase,
    ledger: FrameLedger,
    standing_gate: DebouncedGate,
    lift_gate: DebouncedGate,
    /// Ankle y per side and body height while both feet were down.
    baseline: Option<([f64; 2], f64)>,
    feet: FeetTracker,
    lifted_side: Option<Side>,
    current_hold_ms: u64,
    max_hold_ms: u64,
    lifts: u32,
    lost_balance: bool,
}

impl SingleLegAnalyzer {
    pub fn new(config: SingleLegConfig) -> Self {
        Self {
            phase: SingleLegPhase::Waiting,
            ledger: FrameLedger::default(),
            standing_gate: DebouncedGate::new(config.baseline_confirm_ms, 0),
            lift_gate: DebouncedGate::new(config.lift_confirm_ms, config.drop_grace_ms),
            baseline: None,
            feet: FeetTracker::stance_foot(config.feet_threshold),
            lifted_side: None,
            current_hold_ms: 0,
            max_hold_ms: 0,
            lifts: 0,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SingleLegConfig::default())
    }

    pub fn phase(&self) -> SingleLegPhase {
        self.phase
    }

    fn transition(&mut self, to: SingleLegPhase, t: TimestampMs) {
        if self.phase != to {
            log_transition(TestItem::SingleLegStance, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: TimestampMs) {
        self.ledger.complete(kind);
        self.transition(SingleLegPhase::Complete, t);
    }

    fn capture_baseline(&mut self, frame: &LandmarkFrame) {
        let ankles = [
            frame.point(Side::Left.ankle()).y,
            frame.point(Side::Right.ankle()).y,
        ];
        let height = body::body_height(frame, self.config.min_visibility);
        self.baseline = Some((ankles, height));
        self.feet.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, body_height = height, "Single-leg baseline captured");
        self.transition(SingleLegPhase::Measuring, frame.timestamp_ms);
    }
}

impl ItemAnalyzer for SingleLegAnalyzer {
    type Measurement = SingleLegMeasurement;

    fn item(&self) -> TestItem {
        TestItem::SingleLegStance
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == SingleLegPhase::Complete
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
    ) -> Option<SingleLegMeasurement> {
        if !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility) {
            return None;
        }
        if self.phase == SingleLegPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        let Some((ankles, height)) = self.baseline else {
            let standing =
                ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);
            if let GateEvent::Entered { .. } = self.standing_gate.update(standing, t) {
                self.capture_baseline(frame);
            }
            return Some(self.measurement());
        };

        self.feet.update(frame);
        let left_y = frame.point(Side::Left.ankle()).y;
        let right_y = frame.point(Side::Right.ankle()).y;
        let lifted = (left_y - right_y).abs() > height * self.config.lift_fraction;

        match self.lift_gate.update(lifted, t) {
            GateEvent::Entered { since } => {
                // The foot that rose further from its baseline is the lifted one.
                let side = if ankles[0] - left_y >= ankles[1] - right_y {
                    Side::Left
                } else {
                    Side::Right
                };
                self.lifted_side = Some(side);
                self.lifts += 1;
                tracing::debug!(t, since, side = ?side, "Leg lifted");
            }
            GateEvent::Exited { since, until } => {
                let held = until.saturating_sub(since);
                self.max_hold_ms = self.max_hold_ms.max(held);
                tracing::info!(t, held_ms = held, "Leg down");
                self.lifted_side = None;
            }
            GateEvent::None => {}
        }
        self.current_hold_ms = self.lift_gate.held_ms(t);
        self.max_hold_ms = self.max_hold_ms.max(self.current_hold_ms);
        tracing::trace!(t, lifted, hold_ms = self.current_hold_ms, "Single leg");
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != SingleLegPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == SingleLegPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == SingleLegPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> SingleLegMeasurement {
        SingleLegMeasurement {
            phase: self.phase,
            lifted_side: self.lifted_side,
            current_hold_secs: ms_to_secs(self.current_hold_ms),
            max_duration_secs: ms_to_secs(self.max_hold_ms),
            lifts: self.lifts,
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        score_single_leg_stance(&SingleLegInput {
            max_duration_secs: ms_to_secs(self.max_hold_ms),
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            SingleLegPhase::Waiting => "waiting",
            SingleLegPhase::Measuring => "measuring",
            SingleLegPhase::Complete => "complete",
        }
    }

    fn ledger(&self) -> &FrameLedger {
        &self.ledger
    }
}
