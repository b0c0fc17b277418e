//! Timed mobility tests (TUG, 10-meter walk).
//!
//! These are scored from externally timed durations; there is no
//! landmark analyzer behind them.

use serde::{Deserialize, Serialize};
use stride_common::error::{StrideError, StrideResult};
use stride_pose_model::item::TestItem;
use stride_pose_model::report::{
    AssessmentReport, CompletionKind, MeasurementBasis, ReportMetadata,
};
use stride_common::clock::now_wall;

/// TUG times below this are normal for community-dwelling adults.
pub const TUG_NORMAL_SECS: f64 = 10.0;
/// TUG times at or above this indicate elevated fall risk.
pub const TUG_FALL_RISK_SECS: f64 = 13.5;

/// Standard walkway length for the 10-meter walk.
pub const TEN_METER_DISTANCE_M: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TugRisk {
    Normal,
    MildRisk,
    FallRisk,
}

impl TugRisk {
    pub fn from_secs(secs: f64) -> Self {
        if secs < TUG_NORMAL_SECS {
            TugRisk::Normal
        } else if secs < TUG_FALL_RISK_SECS {
            TugRisk::MildRisk
        } else {
            TugRisk::FallRisk
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TugRisk::Normal => "normal mobility",
            TugRisk::MildRisk => "mild mobility impairment",
            TugRisk::FallRisk => "increased fall risk",
        }
    }
}

/// Community ambulation category from gait speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbulationBand {
    /// Below 0.4 m/s.
    Household,
    /// 0.4 to 0.8 m/s.
    LimitedCommunity,
    /// 0.8 m/s and above.
    Community,
}

impl AmbulationBand {
    pub fn from_speed(speed_mps: f64) -> Self {
        if speed_mps < 0.4 {
            AmbulationBand::Household
        } else if speed_mps < 0.8 {
            AmbulationBand::LimitedCommunity
        } else {
            AmbulationBand::Community
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AmbulationBand::Household => "household ambulator",
            AmbulationBand::LimitedCommunity => "limited community ambulator",
            AmbulationBand::Community => "community ambulator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TugResult {
    pub elapsed_secs: f64,
    pub risk: TugRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkResult {
    pub elapsed_secs: f64,
    pub distance_m: f64,
    pub speed_mps: f64,
    pub band: AmbulationBand,
}

/// Classify a Timed Up and Go time.
pub fn evaluate_tug(elapsed_secs: f64) -> StrideResult<TugResult> {
    if !(elapsed_secs.is_finite() && elapsed_secs > 0.0) {
        return Err(StrideError::input(format!(
            "TUG time must be positive, got {elapsed_secs}"
        )));
    }
    Ok(TugResult {
        elapsed_secs,
        risk: TugRisk::from_secs(elapsed_secs),
    })
}

/// Gait speed and ambulation band for a timed walk over `distance_m`.
pub fn evaluate_walk(elapsed_secs: f64, distance_m: f64) -> StrideResult<WalkResult> {
    if !(elapsed_secs.is_finite() && elapsed_secs > 0.0) {
        return Err(StrideError::input(format!(
            "walk time must be positive, got {elapsed_secs}"
        )));
    }
    if !(distance_m.is_finite() && distance_m > 0.0) {
        return Err(StrideError::input(format!(
            "walk distance must be positive, got {distance_m}"
        )));
    }
    let speed_mps = distance_m / elapsed_secs;
    Ok(WalkResult {
        elapsed_secs,
        distance_m,
        speed_mps,
        band: AmbulationBand::from_speed(speed_mps),
    })
}

/// Build a report for a timed test.
///
/// Timed tests are not on the 0–4 rubric; the score field carries a
/// coarse 0–4 mapping of the risk band so reports stay uniform.
pub fn timed_report(item: TestItem, elapsed_secs: f64) -> StrideResult<AssessmentReport> {
    let (score, reason, measurement) = match item {
        TestItem::TimedUpAndGo => {
            let result = evaluate_tug(elapsed_secs)?;
            let score = match result.risk {
                TugRisk::Normal => 4,
                TugRisk::MildRisk => 2,
                TugRisk::FallRisk => 0,
            };
            (
                score,
                format!("TUG {elapsed_secs:.1}s: {}", result.risk.label()),
                serde_json::to_value(result)?,
            )
        }
        TestItem::TenMeterWalk => {
            let result = evaluate_walk(elapsed_secs, TEN_METER_DISTANCE_M)?;
            let score = match result.band {
                AmbulationBand::Community => 4,
                AmbulationBand::LimitedCommunity => 2,
                AmbulationBand::Household => 0,
            };
            (
                score,
                format!("{:.2} m/s: {}", result.speed_mps, result.band.label()),
                serde_json::to_value(result)?,
            )
        }
        other => {
            return Err(StrideError::input(format!("{other} is not a timed test")));
        }
    };

    Ok(AssessmentReport {
        item,
        score,
        reason,
        measurement,
        metadata: ReportMetadata {
            assessed_at: now_wall(),
            measurement_basis: MeasurementBasis::Normalized,
            scale_cm_per_unit: None,
            patient_height_cm: None,
            frames_processed: 0,
            duration_secs: elapsed_secs,
            completion: Some(CompletionKind::Manual),
        },
    })
}
