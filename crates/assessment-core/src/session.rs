//! The single-active-item assessment owner.
//!
//! An [`Assessment`] holds one patient's calibration, the analyzer tuning,
//! at most one running item and the reports finished so far. Starting a
//! new item drops whatever was running; nothing is shared between
//! `Assessment` values.

use stride_common::error::StrideError;
use stride_pose_model::item::{AnalyzerKind, TestItem};
use stride_pose_model::landmark::LandmarkFrame;
use stride_pose_model::report::{AssessmentReport, BbsSummary, ScoreResult};

use crate::analyzer::{boxed, FrameUpdate, ItemSession};
use crate::calibration::Calibrator;
use crate::config::AnalyzerTuning;
use crate::items::{
    AlternatingStepAnalyzer, ArmReachAnalyzer, FloorPickupAnalyzer, GenericAnalyzer,
    LookBehindAnalyzer, SingleLegAnalyzer, SitToStandAnalyzer, StandingUnsupportedAnalyzer,
    TandemStanceAnalyzer, Turn360Analyzer,
};
use crate::timed::timed_report;

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("no item is active")]
    NoActiveItem,

    #[error("{0} is a timed test; record its duration instead")]
    TimedItem(TestItem),

    #[error("{0} has no analyzer")]
    NoAnalyzer(TestItem),

    #[error(transparent)]
    Stride(#[from] StrideError),
}

pub type AssessmentResult<T> = Result<T, AssessmentError>;

/// Build the analyzer for `item` with the given tuning.
pub fn analyzer_for(
    item: TestItem,
    tuning: &AnalyzerTuning,
) -> AssessmentResult<Box<dyn ItemSession>> {
    let session = match item {
        TestItem::SitToStand => boxed(SitToStandAnalyzer::new(tuning.sit_to_stand.clone())),
        TestItem::StandingUnsupported => {
            boxed(StandingUnsupportedAnalyzer::new(tuning.standing.clone()))
        }
        TestItem::ArmReach => boxed(ArmReachAnalyzer::new(tuning.arm_reach.clone())),
        TestItem::FloorPickUp => boxed(FloorPickupAnalyzer::new(tuning.floor_pickup.clone())),
        TestItem::LookBehind => boxed(LookBehindAnalyzer::new(tuning.look_behind.clone())),
        TestItem::Turn360 => boxed(Turn360Analyzer::new(tuning.turn.clone())),
        TestItem::AlternatingStep => {
            boxed(AlternatingStepAnalyzer::new(tuning.alternating_step.clone()))
        }
        TestItem::TandemStance => boxed(TandemStanceAnalyzer::new(tuning.tandem.clone())),
        TestItem::SingleLegStance => boxed(SingleLegAnalyzer::new(tuning.single_leg.clone())),
        other => match other.analyzer_kind() {
            AnalyzerKind::Timed => return Err(AssessmentError::TimedItem(other)),
            _ => boxed(
                GenericAnalyzer::for_item(other, tuning.generic.clone())
                    .ok_or(AssessmentError::NoAnalyzer(other))?,
            ),
        },
    };
    Ok(session)
}

pub struct Assessment {
    calibrator: Calibrator,
    tuning: AnalyzerTuning,
    active: Option<Box<dyn ItemSession>>,
    reports: Vec<AssessmentReport>,
}

impl Assessment {
    pub fn new(calibrator: Calibrator, tuning: AnalyzerTuning) -> Self {
        Self {
            calibrator,
            tuning,
            active: None,
            reports: Vec::new(),
        }
    }

    /// Start `item`, discarding any item still running.
    pub fn start(&mut self, item: TestItem) -> AssessmentResult<()> {
        let session = analyzer_for(item, &self.tuning)?;
        if let Some(previous) = self.active.take() {
            if !previous.is_complete() {
                tracing::warn!(item = %previous.item(), "Discarding unfinished item");
            }
        }
        tracing::info!(item = %item, "Item started");
        self.active = Some(session);
        Ok(())
    }

    pub fn active_item(&self) -> Option<TestItem> {
        self.active.as_ref().map(|s| s.item())
    }

    fn active_mut(&mut self) -> AssessmentResult<&mut Box<dyn ItemSession>> {
        self.active.as_mut().ok_or(AssessmentError::NoActiveItem)
    }

    /// Capture the active item's baseline from `frame` now.
    pub fn record_initial(&mut self, frame: &LandmarkFrame) -> AssessmentResult<bool> {
        self.calibrator.observe(frame);
        Ok(self.active_mut()?.record_initial(frame))
    }

    /// Feed one frame to calibration, then to the active item.
    ///
    /// `Ok(None)` means the frame was not usable and was skipped.
    pub fn process(&mut self, frame: &LandmarkFrame) -> AssessmentResult<Option<FrameUpdate>> {
        self.calibrator.observe(frame);
        let session = self.active.as_mut().ok_or(AssessmentError::NoActiveItem)?;
        Ok(session.process(frame, &self.calibrator))
    }

    pub fn is_active_complete(&self) -> bool {
        self.active.as_ref().is_some_and(|s| s.is_complete())
    }

    pub fn mark_complete(&mut self) -> AssessmentResult<()> {
        self.active_mut()?.mark_complete();
        Ok(())
    }

    pub fn set_lost_balance(&mut self, lost: bool) -> AssessmentResult<()> {
        self.active_mut()?.set_lost_balance(lost);
        Ok(())
    }

    pub fn set_assisted(&mut self, assisted: bool) -> AssessmentResult<()> {
        self.active_mut()?.set_assisted(assisted);
        Ok(())
    }

    pub fn set_attempted(&mut self, attempted: bool) -> AssessmentResult<()> {
        self.active_mut()?.set_attempted(attempted);
        Ok(())
    }

    /// Provisional score of the active item.
    pub fn score(&self) -> AssessmentResult<ScoreResult> {
        self.active
            .as_ref()
            .map(|s| s.score())
            .ok_or(AssessmentError::NoActiveItem)
    }

    /// Complete the active item, keep its report and clear the slot.
    pub fn finish(&mut self) -> AssessmentResult<AssessmentReport> {
        let mut session = self.active.take().ok_or(AssessmentError::NoActiveItem)?;
        session.mark_complete();
        let report = session.report(&self.calibrator);
        tracing::info!(
            item = %report.item,
            score = report.score,
            basis = ?report.metadata.measurement_basis,
            "Item finished"
        );
        self.reports.push(report.clone());
        Ok(report)
    }

    /// Score a timed test from its measured duration.
    pub fn record_timed(
        &mut self,
        item: TestItem,
        elapsed_secs: f64,
    ) -> AssessmentResult<AssessmentReport> {
        let report = timed_report(item, elapsed_secs)?;
        tracing::info!(item = %item, elapsed_secs, score = report.score, "Timed test recorded");
        self.reports.push(report.clone());
        Ok(report)
    }

    pub fn reports(&self) -> &[AssessmentReport] {
        &self.reports
    }

    pub fn summary(&self) -> BbsSummary {
        BbsSummary::from_reports(&self.reports)
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn tuning(&self) -> &AnalyzerTuning {
        &self.tuning
    }

    /// Start over for a new patient: forget calibration, reports and the active item.
    pub fn reset_patient(&mut self, height_cm: Option<f64>) {
        self.calibrator.reset(height_cm);
        self.reports.clear();
        self.active = None;
        tracing::info!(?height_cm, "Patient reset");
    }
}

impl Default for Assessment {
    fn default() -> Self {
        Self::new(Calibrator::default(), AnalyzerTuning::default())
    }
}
