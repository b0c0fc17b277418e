//! BBS 13: standing unsupported with one foot in front.
//!
//! Stance levels nest: a tandem placement also satisfies the looser
//! foot-ahead and small-step bounds, so each level's gate runs on its own
//! and a tandem hold keeps the looser gates open too.

use serde::{Deserialize, Serialize};
use stride_common::clock::ms_to_secs;
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame, TimestampMs};
use stride_pose_model::report::{CompletionKind, ScoreResult};

use crate::analyzer::{log_transition, FrameLedger, ItemAnalyzer};
use crate::body;
use crate::calibration::Calibrator;
use crate::feet::FeetTracker;
use crate::gate::{DebouncedGate, GateEvent};
use crate::posture::{ratio_posture, Posture};
use crate::scoring::{score_tandem_stance, StanceType, TandemInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub min_visibility: f64,
    pub standing_ratio: f64,
    pub baseline_confirm_ms: u64,
    /// Ankle x-gap ÷ shoulder width bounds for tandem, foot-ahead and small step.
    pub tandem_ratio: f64,
    pub forward_ratio: f64,
    pub small_step_ratio: f64,
    /// Ankle y-gap, as a share of body height, needed for any stance.
    pub min_y_gap_fraction: f64,
    pub confirm_ms: u64,
    pub grace_ms: u64,
    pub target_secs: f64,
    /// Travel of the back foot that counts as the stance shifting.
    pub feet_threshold: f64,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            min_visibility: 0.5,
            standing_ratio: 0.45,
            baseline_confirm_ms: 500,
            tandem_ratio: 0.25,
            forward_ratio: 0.40,
            small_step_ratio: 0.60,
            min_y_gap_fraction: 0.03,
            confirm_ms: 300,
            grace_ms: 500,
            target_secs: 30.0,
            feet_threshold: 0.08,
        }
    }
}

impl TandemConfig {
    /// Strictest stance level satisfied by the given gaps.
    pub fn classify(&self, gap_ratio: f64, y_gap: f64, body_height: f64) -> Option<StanceType> {
        if y_gap < body_height * self.min_y_gap_fraction {
            return None;
        }
        if gap_ratio < self.tandem_ratio {
            Some(StanceType::Tandem)
        } else if gap_ratio < self.forward_ratio {
            Some(StanceType::Forward)
        } else if gap_ratio < self.small_step_ratio {
            Some(StanceType::SmallStep)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TandemPhase {
    Waiting,
    Measuring,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StanceHold {
    pub stance: StanceType,
    pub current_secs: f64,
    pub longest_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TandemMeasurement {
    pub phase: TandemPhase,
    pub current_stance: Option<StanceType>,
    pub gap_ratio: f64,
    pub holds: Vec<StanceHold>,
    pub best_stance_type: Option<StanceType>,
    pub max_duration_secs: f64,
    pub feet_moved: bool,
    pub lost_balance: bool,
}

#[derive(Debug, Clone)]
struct LevelGate {
    stance: StanceType,
    gate: DebouncedGate,
    current_ms: u64,
    longest_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TandemStanceAnalyzer {
    config: TandemConfig,
    phase: TandemPhase,
    ledger: FrameLedger,
    standing_gate: DebouncedGate,
    body_height: Option<f64>,
    feet: FeetTracker,
    levels: Vec<LevelGate>,
    current_stance: Option<StanceType>,
    gap_ratio: f64,
    lost_balance: bool,
}

impl TandemStanceAnalyzer {
    pub fn new(config: TandemConfig) -> Self {
        let levels = StanceType::ALL
            .iter()
            .map(|&stance| LevelGate {
                stance,
                gate: DebouncedGate::new(config.confirm_ms, config.grace_ms),
                current_ms: 0,
                longest_ms: 0,
            })
            .collect();
        Self {
            phase: TandemPhase::Waiting,
            ledger: FrameLedger::default(),
            standing_gate: DebouncedGate::new(config.baseline_confirm_ms, 0),
            body_height: None,
            feet: FeetTracker::stance_foot(config.feet_threshold),
            levels,
            current_stance: None,
            gap_ratio: 0.0,
            lost_balance: false,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(TandemConfig::default())
    }

    pub fn phase(&self) -> TandemPhase {
        self.phase
    }

    /// The strictest level held for the target, else the level held longest.
    pub fn best_stance(&self) -> Option<(StanceType, f64)> {
        let target_ms = self.config.target_secs * 1000.0;
        let reached = self
            .levels
            .iter()
            .find(|level| level.longest_ms as f64 >= target_ms);
        let best = match reached {
            Some(level) => Some(level),
            // `levels` is strictest first, so ties go to the stricter level.
            None => self
                .levels
                .iter()
                .filter(|level| level.longest_ms > 0)
                .fold(None::<&LevelGate>, |best, level| match best {
                    Some(b) if b.longest_ms >= level.longest_ms => Some(b),
                    _ => Some(level),
                }),
        };
        best.map(|level| (level.stance, ms_to_secs(level.longest_ms)))
    }

    fn transition(&mut self, to: TandemPhase, t: TimestampMs) {
        if self.phase != to {
            log_transition(TestItem::TandemStance, self.phase, to, t);
            self.phase = to;
        }
    }

    fn finish(&mut self, kind: CompletionKind, t: TimestampMs) {
        self.ledger.complete(kind);
        self.transition(TandemPhase::Complete, t);
    }

    fn capture_baseline(&mut self, frame: &LandmarkFrame) {
        let height = body::body_height(frame, self.config.min_visibility);
        self.body_height = Some(height);
        self.feet.set_baseline(frame);
        tracing::info!(t = frame.timestamp_ms, body_height = height, "Stance baseline captured");
        self.transition(TandemPhase::Measuring, frame.timestamp_ms);
    }
}

impl ItemAnalyzer for TandemStanceAnalyzer {
    type Measurement = TandemMeasurement;

    fn item(&self) -> TestItem {
        TestItem::TandemStance
    }

    fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        if self.phase == TandemPhase::Complete
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
    ) -> Option<TandemMeasurement> {
        if !body::is_usable(frame, &body::CORE_POINTS, self.config.min_visibility) {
            return None;
        }
        if self.phase == TandemPhase::Complete {
            return Some(self.measurement());
        }
        let t = frame.timestamp_ms;
        self.ledger.accept(frame);

        let Some(height) = self.body_height else {
            let standing =
                ratio_posture(frame, self.config.standing_ratio) == Some(Posture::Standing);
            if let GateEvent::Entered { .. } = self.standing_gate.update(standing, t) {
                self.capture_baseline(frame);
            }
            return Some(self.measurement());
        };

        self.feet.update(frame);
        let left = frame.point(BodyPoint::LeftAnkle);
        let right = frame.point(BodyPoint::RightAnkle);
        self.gap_ratio =
            body::relative((left.x - right.x).abs(), body::shoulder_width(frame)).unwrap_or(f64::MAX);
        self.current_stance = self
            .config
            .classify(self.gap_ratio, (left.y - right.y).abs(), height);

        let current = self.current_stance;
        for level in &mut self.levels {
            // Ord on StanceType runs strictest first.
            let held = current.is_some_and(|stance| stance <= level.stance);
            match level.gate.update(held, t) {
                GateEvent::Entered { since } => {
                    tracing::debug!(t, stance = ?level.stance, since, "Stance confirmed");
                }
                GateEvent::Exited { since, until } => {
                    tracing::debug!(t, stance = ?level.stance, held_ms = until - since, "Stance broken");
                }
                GateEvent::None => {}
            }
            level.current_ms = level.gate.held_ms(t);
            level.longest_ms = level.longest_ms.max(level.current_ms);
        }
        tracing::trace!(t, gap_ratio = self.gap_ratio, stance = ?current, "Tandem");
        Some(self.measurement())
    }

    fn mark_complete(&mut self) {
        if self.phase != TandemPhase::Complete {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::Manual, t);
        }
    }

    fn is_complete(&self) -> bool {
        self.phase == TandemPhase::Complete
    }

    fn set_lost_balance(&mut self, lost: bool) {
        if self.phase == TandemPhase::Complete {
            return;
        }
        self.lost_balance = lost;
        if lost {
            let t = self.ledger.last_ms().unwrap_or(0);
            self.finish(CompletionKind::LostBalance, t);
        }
    }

    fn measurement(&self) -> TandemMeasurement {
        let best = self.best_stance();
        TandemMeasurement {
            phase: self.phase,
            current_stance: self.current_stance,
            gap_ratio: self.gap_ratio,
            holds: self
                .levels
                .iter()
                .map(|level| StanceHold {
                    stance: level.stance,
                    current_secs: ms_to_secs(level.current_ms),
                    longest_secs: ms_to_secs(level.longest_ms),
                })
                .collect(),
            best_stance_type: best.map(|(stance, _)| stance),
            max_duration_secs: best.map_or(0.0, |(_, secs)| secs),
            feet_moved: self.feet.ever_moved(),
            lost_balance: self.lost_balance,
        }
    }

    fn calculate_score(&self) -> ScoreResult {
        let best = self.best_stance();
        score_tandem_stance(&TandemInput {
            best_stance_type: best.map(|(stance, _)| stance),
            max_duration_secs: best.map_or(0.0, |(_, secs)| secs),
            lost_balance: self.lost_balance,
        })
    }

    fn phase_label(&self) -> &'static str {
        match self.phase {
            TandemPhase::Waiting => "waiting",
            TandemPhase::Measuring => "measuring",
            TandemPhase::Complete => "complete",
        }
    }

    fn ledger(&self) -> &FrameLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pose_model::landmark::Side;
    use stride_pose_model::synthetic::PoseBuilder;

    /// Right foot brought in line `x_gap` from the left, set back up the image.
    fn stance(x_gap: f64) -> PoseBuilder {
        let mut pose = PoseBuilder::standing_front();
        pose.move_foot(Side::Right, 0.08 - x_gap, -0.04);
        pose
    }

    fn feed(analyzer: &mut TandemStanceAnalyzer, pose: &PoseBuilder, start: u64, count: usize) -> u64 {
        let calibrator = Calibrator::default();
        let mut t = start;
        for _ in 0..count {
            analyzer.analyze(&pose.build(t), &calibrator);
            t += 100;
        }
        t
    }

    fn ready() -> (TandemStanceAnalyzer, u64) {
        let mut analyzer = TandemStanceAnalyzer::with_defaults();
        let t = feed(&mut analyzer, &PoseBuilder::standing_front(), 0, 10);
        assert_eq!(analyzer.phase(), TandemPhase::Measuring);
        (analyzer, t)
    }

    #[test]
    fn test_classify_levels() {
        let config = TandemConfig::default();
        assert_eq!(config.classify(0.1, 0.05, 0.8), Some(StanceType::Tandem));
        assert_eq!(config.classify(0.3, 0.05, 0.8), Some(StanceType::Forward));
        assert_eq!(config.classify(0.5, 0.05, 0.8), Some(StanceType::SmallStep));
        assert_eq!(config.classify(0.7, 0.05, 0.8), None);
        // Side by side, no foot ahead.
        assert_eq!(config.classify(0.1, 0.01, 0.8), None);
    }

    #[test]
    fn test_tandem_held_thirty_seconds_scores_four() {
        let (mut analyzer, t) = ready();
        feed(&mut analyzer, &stance(0.005), t, 310);
        analyzer.mark_complete();
        let m = analyzer.measurement();
        assert_eq!(m.best_stance_type, Some(StanceType::Tandem));
        assert!(m.max_duration_secs >= 30.0);
        // Placing the working foot is not the stance shifting.
        assert!(!m.feet_moved);
        assert_eq!(analyzer.calculate_score().score, 4);
    }

    #[test]
    fn test_foot_ahead_scores_three() {
        let (mut analyzer, t) = ready();
        feed(&mut analyzer, &stance(0.04), t, 310);
        analyzer.mark_complete();
        assert_eq!(analyzer.measurement().best_stance_type, Some(StanceType::Forward));
        assert_eq!(analyzer.calculate_score().score, 3);
    }

    #[test]
    fn test_back_foot_shift_sets_feet_moved() {
        let (mut analyzer, t) = ready();
        let t = feed(&mut analyzer, &stance(0.005), t, 5);
        assert!(!analyzer.measurement().feet_moved);
        let mut shifted = stance(0.005);
        shifted.shift_x(0.1);
        feed(&mut analyzer, &shifted, t, 2);
        assert!(analyzer.measurement().feet_moved);
    }

    #[test]
    fn test_short_hold_scores_one() {
        let (mut analyzer, t) = ready();
        feed(&mut analyzer, &stance(0.005), t, 200);
        analyzer.mark_complete();
        let m = analyzer.measurement();
        assert!(m.max_duration_secs >= 15.0 && m.max_duration_secs < 30.0);
        assert_eq!(analyzer.calculate_score().score, 1);
    }

    #[test]
    fn test_wobble_within_grace_keeps_the_hold() {
        let (mut analyzer, t) = ready();
        let t = feed(&mut analyzer, &stance(0.005), t, 100);
        let t = feed(&mut analyzer, &PoseBuilder::standing_front(), t, 3);
        feed(&mut analyzer, &stance(0.005), t, 210);
        analyzer.mark_complete();
        assert!(analyzer.measurement().max_duration_secs >= 30.0);
        assert_eq!(analyzer.calculate_score().score, 4);
    }

    #[test]
    fn test_fall_scores_zero() {
        let (mut analyzer, t) = ready();
        feed(&mut analyzer, &stance(0.005), t, 310);
        analyzer.set_lost_balance(true);
        assert!(analyzer.is_complete());
        assert_eq!(analyzer.calculate_score().score, 0);
    }
}
