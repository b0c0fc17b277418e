//! The shared shape of every item analyzer.
//!
//! An analyzer is an owned session value: the caller creates it, feeds it
//! frames in arrival order, and drops or resets it between patients.
//! Nothing here is global.
//!
//! Two traits describe the same thing at different levels:
//!
//! - [`ItemAnalyzer`] is what each analyzer implements. Its measurement
//!   type is concrete, so tests and callers that know the item get typed
//!   results.
//! - [`ItemSession`] is the object-safe projection used by the
//!   [`Assessment`](crate::session::Assessment) owner to hold whichever
//!   item is active. [`boxed`] turns any `ItemAnalyzer` into one.

use serde::Serialize;
use stride_common::clock::{elapsed_secs, now_wall};
use stride_pose_model::item::TestItem;
use stride_pose_model::landmark::{LandmarkFrame, TimestampMs};
use stride_pose_model::report::{
    AssessmentReport, CompletionKind, MeasurementBasis, ReportMetadata, ScoreResult,
};

use crate::calibration::Calibrator;

/// Per-session bookkeeping shared by all analyzers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameLedger {
    first_ms: Option<TimestampMs>,
    last_ms: Option<TimestampMs>,
    frames: u64,
    completion: Option<(CompletionKind, TimestampMs)>,
}

impl FrameLedger {
    /// Count an accepted frame.
    pub fn accept(&mut self, frame: &LandmarkFrame) {
        self.first_ms.get_or_insert(frame.timestamp_ms);
        self.last_ms = Some(frame.timestamp_ms);
        self.frames += 1;
    }

    /// Latch completion. The first call wins.
    pub fn complete(&mut self, kind: CompletionKind) {
        if self.completion.is_none() {
            self.completion = Some((kind, self.last_ms.unwrap_or(0)));
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }

    pub fn completion(&self) -> Option<CompletionKind> {
        self.completion.map(|(kind, _)| kind)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn first_ms(&self) -> Option<TimestampMs> {
        self.first_ms
    }

    pub fn last_ms(&self) -> Option<TimestampMs> {
        self.last_ms
    }

    /// Seconds from the first accepted frame to completion (or the last frame).
    pub fn duration_secs(&self) -> f64 {
        let end = self.completion.map(|(_, at)| at).or(self.last_ms);
        match (self.first_ms, end) {
            (Some(first), Some(end)) => elapsed_secs(first, end),
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A per-item state machine over a landmark stream.
///
/// Contract shared by every implementation:
///
/// - `analyze` on an incomplete or insufficiently visible frame returns
///   `None` and changes nothing.
/// - Once complete, `analyze` returns the frozen final measurement.
/// - `calculate_score` is a pure function of the current measurement.
pub trait ItemAnalyzer {
    /// Snapshot of what the analyzer has measured so far.
    type Measurement: Clone + Serialize;

    fn item(&self) -> TestItem;

    /// Return to the initial state.
    fn reset(&mut self);

    /// Capture the starting-position baseline from `frame` now.
    ///
    /// Returns `false` if the frame is not usable.
    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool;

    /// Process one frame.
    fn analyze(
        &mut self,
        frame: &LandmarkFrame,
        calibrator: &Calibrator,
    ) -> Option<Self::Measurement>;

    /// Force completion (clinician override).
    fn mark_complete(&mut self);

    fn is_complete(&self) -> bool;

    /// Record a loss of balance judged outside the geometric model.
    ///
    /// `true` ends the session.
    fn set_lost_balance(&mut self, lost: bool);

    /// Record that the patient needed physical help. Ignored by items
    /// whose rubric has no assistance level.
    fn set_assisted(&mut self, _assisted: bool) {}

    /// Record an attempt the geometry missed. Ignored by items whose
    /// rubric does not score attempts.
    fn set_attempted(&mut self, _attempted: bool) {}

    fn measurement(&self) -> Self::Measurement;

    fn calculate_score(&self) -> ScoreResult;

    /// Short name of the current phase, for live display.
    fn phase_label(&self) -> &'static str;

    fn ledger(&self) -> &FrameLedger;

    /// How distances in the measurement were obtained.
    fn measurement_basis(&self) -> MeasurementBasis {
        MeasurementBasis::Normalized
    }

    /// Wrap the score with a measurement snapshot and audit metadata.
    fn generate_report(&self, calibrator: &Calibrator) -> AssessmentReport {
        let result = self.calculate_score();
        let ledger = self.ledger();
        let basis = self.measurement_basis();
        let scale_cm_per_unit = match basis {
            MeasurementBasis::Calibrated => calibrator.profile().map(|p| p.scale_y),
            _ => None,
        };
        AssessmentReport {
            item: self.item(),
            score: result.score,
            reason: result.reason,
            measurement: serde_json::to_value(self.measurement())
                .unwrap_or(serde_json::Value::Null),
            metadata: ReportMetadata {
                assessed_at: now_wall(),
                measurement_basis: basis,
                scale_cm_per_unit,
                patient_height_cm: calibrator.height_cm(),
                frames_processed: ledger.frames(),
                duration_secs: ledger.duration_secs(),
                completion: ledger.completion(),
            },
        }
    }
}

/// Result of feeding one frame to an [`ItemSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub phase: &'static str,
    pub complete: bool,
    pub measurement: serde_json::Value,
}

/// Object-safe view of an [`ItemAnalyzer`].
pub trait ItemSession {
    fn item(&self) -> TestItem;
    fn reset(&mut self);
    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool;
    fn process(&mut self, frame: &LandmarkFrame, calibrator: &Calibrator) -> Option<FrameUpdate>;
    fn mark_complete(&mut self);
    fn is_complete(&self) -> bool;
    fn set_lost_balance(&mut self, lost: bool);
    fn set_assisted(&mut self, assisted: bool);
    fn set_attempted(&mut self, attempted: bool);
    fn phase_label(&self) -> &'static str;
    fn score(&self) -> ScoreResult;
    fn report(&self, calibrator: &Calibrator) -> AssessmentReport;
}

/// Type-erased holder for an analyzer.
struct Erased<A>(A);

/// Box an analyzer behind the object-safe [`ItemSession`] interface.
pub fn boxed<A: ItemAnalyzer + 'static>(analyzer: A) -> Box<dyn ItemSession> {
    Box::new(Erased(analyzer))
}

impl<A: ItemAnalyzer> ItemSession for Erased<A> {
    fn item(&self) -> TestItem {
        self.0.item()
    }

    fn reset(&mut self) {
        self.0.reset()
    }

    fn record_initial(&mut self, frame: &LandmarkFrame) -> bool {
        self.0.record_initial(frame)
    }

    fn process(&mut self, frame: &LandmarkFrame, calibrator: &Calibrator) -> Option<FrameUpdate> {
        let measurement = self.0.analyze(frame, calibrator)?;
        Some(FrameUpdate {
            phase: self.0.phase_label(),
            complete: self.0.is_complete(),
            measurement: serde_json::to_value(measurement).unwrap_or(serde_json::Value::Null),
        })
    }

    fn mark_complete(&mut self) {
        self.0.mark_complete()
    }

    fn is_complete(&self) -> bool {
        self.0.is_complete()
    }

    fn set_lost_balance(&mut self, lost: bool) {
        self.0.set_lost_balance(lost)
    }

    fn set_assisted(&mut self, assisted: bool) {
        self.0.set_assisted(assisted)
    }

    fn set_attempted(&mut self, attempted: bool) {
        self.0.set_attempted(attempted)
    }

    fn phase_label(&self) -> &'static str {
        self.0.phase_label()
    }

    fn score(&self) -> ScoreResult {
        self.0.calculate_score()
    }

    fn report(&self, calibrator: &Calibrator) -> AssessmentReport {
        self.0.generate_report(calibrator)
    }
}

/// Log a phase change at debug level.
pub(crate) fn log_transition<P: std::fmt::Debug>(item: TestItem, from: P, to: P, t: TimestampMs) {
    tracing::debug!(item = %item, from = ?from, to = ?to, t, "Phase transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pose_model::synthetic::PoseBuilder;

    #[test]
    fn test_ledger_counts_and_duration() {
        let mut ledger = FrameLedger::default();
        assert_eq!(ledger.duration_secs(), 0.0);
        ledger.accept(&PoseBuilder::standing_front().build(1000));
        ledger.accept(&PoseBuilder::standing_front().build(3500));
        assert_eq!(ledger.frames(), 2);
        assert!((ledger.duration_secs() - 2.5).abs() < 1e-9);

        ledger.complete(CompletionKind::Autonomous);
        ledger.complete(CompletionKind::Manual);
        ledger.accept(&PoseBuilder::standing_front().build(9000));
        assert_eq!(ledger.completion(), Some(CompletionKind::Autonomous));
        assert!((ledger.duration_secs() - 2.5).abs() < 1e-9);

        ledger.reset();
        assert!(!ledger.is_complete());
        assert_eq!(ledger.frames(), 0);
    }
}
