//! Anthropometric calibration: normalized coordinates to centimeters.
//!
//! A [`CalibrationProfile`] is derived once per patient from the stated
//! height and the first frame that shows the whole body. Until one exists,
//! distances fall back to a fixed torso-length estimate and are flagged
//! as estimated.

use serde::{Deserialize, Serialize};
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame, Side};
use stride_pose_model::report::MeasurementBasis;

use crate::body;

/// Normalized full-body heights at or below this are rejected.
pub const MIN_FULL_HEIGHT_NORM: f64 = 0.05;

/// Assumed adult shoulder-to-hip length used without a profile.
pub const FALLBACK_TORSO_CM: f64 = 50.0;

/// Visibility needed on the points that define full-body height.
const CALIBRATION_MIN_VISIBILITY: f64 = 0.5;

const CALIBRATION_POINTS: [BodyPoint; 5] = [
    BodyPoint::Nose,
    BodyPoint::LeftShoulder,
    BodyPoint::RightShoulder,
    BodyPoint::LeftAnkle,
    BodyPoint::RightAnkle,
];

/// Segment lengths measured on the calibration frame, in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentLengths {
    pub shoulder_width_cm: f64,
    pub torso_cm: f64,
    pub upper_arm_cm: f64,
    pub forearm_cm: f64,
    pub thigh_cm: f64,
    pub shin_cm: f64,
    /// Shoulder to wrist along the arm.
    pub arm_length_cm: f64,
}

/// Per-patient mapping from normalized units to centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Stated patient height.
    pub height_cm: f64,
    /// Centimeters per normalized vertical unit.
    pub scale_y: f64,
    /// Centimeters per normalized horizontal unit.
    pub scale_x: f64,
    /// Frame width divided by frame height.
    pub aspect_ratio: f64,
    /// Head-top to foot distance on the calibration frame.
    pub full_height_norm: f64,
    pub segments: SegmentLengths,
}

impl CalibrationProfile {
    /// Convert a horizontal normalized delta to centimeters.
    pub fn horizontal_cm(&self, dx: f64) -> f64 {
        dx.abs() * self.scale_x
    }

    /// Convert a vertical normalized delta to centimeters.
    pub fn vertical_cm(&self, dy: f64) -> f64 {
        dy.abs() * self.scale_y
    }

    /// Straight-line distance between two normalized points, in centimeters.
    pub fn distance_cm(&self, dx: f64, dy: f64) -> f64 {
        self.horizontal_cm(dx).hypot(self.vertical_cm(dy))
    }
}

/// Derive a calibration profile from a single frame.
///
/// Returns `None` when the frame is incomplete, the defining points are
/// not visible, the inputs are non-positive, or the body spans no more
/// than [`MIN_FULL_HEIGHT_NORM`] of the frame.
pub fn calibrate(
    height_cm: f64,
    frame: &LandmarkFrame,
    aspect_ratio: f64,
) -> Option<CalibrationProfile> {
    if height_cm <= 0.0 || aspect_ratio <= 0.0 {
        return None;
    }
    if !body::is_usable(frame, &CALIBRATION_POINTS, CALIBRATION_MIN_VISIBILITY) {
        return None;
    }

    let full_height_norm = body::body_height(frame, CALIBRATION_MIN_VISIBILITY);
    if full_height_norm <= MIN_FULL_HEIGHT_NORM {
        return None;
    }

    let scale_y = height_cm / full_height_norm;
    let segment = |a: BodyPoint, b: BodyPoint| {
        frame
            .point(a)
            .aspect_distance_to(&frame.point(b), aspect_ratio)
            * scale_y
    };
    let both_sides = |a: fn(Side) -> BodyPoint, b: fn(Side) -> BodyPoint| {
        (segment(a(Side::Left), b(Side::Left)) + segment(a(Side::Right), b(Side::Right))) / 2.0
    };

    let upper_arm_cm = both_sides(Side::shoulder, Side::elbow);
    let forearm_cm = both_sides(Side::elbow, Side::wrist);
    let segments = SegmentLengths {
        shoulder_width_cm: segment(BodyPoint::LeftShoulder, BodyPoint::RightShoulder),
        torso_cm: body::shoulder_mid(frame).aspect_distance_to(&body::hip_mid(frame), aspect_ratio)
            * scale_y,
        upper_arm_cm,
        forearm_cm,
        thigh_cm: both_sides(Side::hip, Side::knee),
        shin_cm: both_sides(Side::knee, Side::ankle),
        arm_length_cm: upper_arm_cm + forearm_cm,
    };

    Some(CalibrationProfile {
        height_cm,
        scale_y,
        scale_x: scale_y * aspect_ratio,
        aspect_ratio,
        full_height_norm,
        segments,
    })
}

/// A distance in centimeters and whether it came from the fallback estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub cm: f64,
    pub estimated: bool,
}

/// Lazily-calibrating owner of a patient's profile.
#[derive(Debug, Clone)]
pub struct Calibrator {
    height_cm: Option<f64>,
    aspect_ratio: f64,
    profile: Option<CalibrationProfile>,
}

impl Calibrator {
    /// `height_cm = None` disables calibration; everything is estimated.
    pub fn new(height_cm: Option<f64>, aspect_ratio: f64) -> Self {
        Self {
            height_cm,
            aspect_ratio,
            profile: None,
        }
    }

    /// Try to calibrate on `frame` if no profile exists yet.
    ///
    /// Returns the current profile, if any.
    pub fn observe(&mut self, frame: &LandmarkFrame) -> Option<&CalibrationProfile> {
        if self.profile.is_none() {
            if let Some(height_cm) = self.height_cm {
                self.profile = calibrate(height_cm, frame, self.aspect_ratio);
                match &self.profile {
                    Some(profile) => tracing::info!(
                        height_cm,
                        scale_y = profile.scale_y,
                        full_height_norm = profile.full_height_norm,
                        t = frame.timestamp_ms,
                        "Calibration accepted"
                    ),
                    None => tracing::trace!(t = frame.timestamp_ms, "Frame not usable for calibration"),
                }
            }
        }
        self.profile.as_ref()
    }

    /// Forget the profile (and optionally change patient height).
    pub fn reset(&mut self, height_cm: Option<f64>) {
        self.height_cm = height_cm;
        self.profile = None;
    }

    pub fn profile(&self) -> Option<&CalibrationProfile> {
        self.profile.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.profile.is_some()
    }

    pub fn height_cm(&self) -> Option<f64> {
        self.height_cm
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Horizontal centimeters, 0 while uncalibrated.
    pub fn horizontal_cm(&self, dx: f64) -> f64 {
        self.profile.map_or(0.0, |p| p.horizontal_cm(dx))
    }

    /// Vertical centimeters, 0 while uncalibrated.
    pub fn vertical_cm(&self, dy: f64) -> f64 {
        self.profile.map_or(0.0, |p| p.vertical_cm(dy))
    }

    /// Horizontal distance, estimated from torso length when uncalibrated.
    pub fn horizontal_or_estimate(&self, dx: f64, torso_norm: f64) -> Distance {
        match &self.profile {
            Some(profile) => Distance {
                cm: profile.horizontal_cm(dx),
                estimated: false,
            },
            None => Distance {
                cm: estimate_cm(dx.abs() * self.aspect_ratio, torso_norm),
                estimated: true,
            },
        }
    }

    /// Vertical distance, estimated from torso length when uncalibrated.
    pub fn vertical_or_estimate(&self, dy: f64, torso_norm: f64) -> Distance {
        match &self.profile {
            Some(profile) => Distance {
                cm: profile.vertical_cm(dy),
                estimated: false,
            },
            None => Distance {
                cm: estimate_cm(dy.abs(), torso_norm),
                estimated: true,
            },
        }
    }

    /// Measurement basis for reports about distances.
    pub fn basis(&self) -> MeasurementBasis {
        if self.is_calibrated() {
            MeasurementBasis::Calibrated
        } else {
            MeasurementBasis::Estimated
        }
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(None, 16.0 / 9.0)
    }
}

fn estimate_cm(delta_norm: f64, torso_norm: f64) -> f64 {
    body::relative(delta_norm, torso_norm).map_or(0.0, |r| r * FALLBACK_TORSO_CM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stride_pose_model::synthetic::PoseBuilder;

    fn standing() -> LandmarkFrame {
        PoseBuilder::standing_front().build(0)
    }

    #[test]
    fn test_calibrate_standing_front() {
        let profile = calibrate(170.0, &standing(), 1.0).unwrap();
        // nose 0.15, shoulders 0.25: head line 0.21, toes 0.92
        assert!((profile.full_height_norm - 0.71).abs() < 1e-9);
        assert!((profile.scale_y - 170.0 / 0.71).abs() < 1e-6);
        assert!((profile.segments.torso_cm - 0.25 * profile.scale_y).abs() < 1e-6);
        assert!(profile.segments.arm_length_cm > profile.segments.forearm_cm);
    }

    #[test]
    fn test_horizontal_scale_uses_aspect_ratio() {
        let profile = calibrate(170.0, &standing(), 16.0 / 9.0).unwrap();
        assert!((profile.scale_x - profile.scale_y * 16.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_tiny_body() {
        let mut pose = PoseBuilder::standing_front();
        for point in [
            BodyPoint::LeftShoulder,
            BodyPoint::RightShoulder,
            BodyPoint::LeftAnkle,
            BodyPoint::RightAnkle,
            BodyPoint::LeftFootIndex,
            BodyPoint::RightFootIndex,
        ] {
            pose.set(point, 0.5, 0.17);
        }
        pose.set(BodyPoint::Nose, 0.5, 0.15);
        assert!(calibrate(170.0, &pose.build(0), 1.0).is_none());
    }

    #[test]
    fn test_rejects_incomplete_or_invisible() {
        assert!(calibrate(170.0, &LandmarkFrame::new(0, vec![]), 1.0).is_none());
        let mut pose = PoseBuilder::standing_front();
        pose.set_visibility(BodyPoint::Nose, 0.1);
        assert!(calibrate(170.0, &pose.build(0), 1.0).is_none());
        assert!(calibrate(0.0, &standing(), 1.0).is_none());
    }

    #[test]
    fn test_calibrator_lazy_lifecycle() {
        let mut calibrator = Calibrator::new(Some(170.0), 1.0);
        assert_eq!(calibrator.horizontal_cm(0.1), 0.0);
        assert!(calibrator.observe(&LandmarkFrame::new(0, vec![])).is_none());
        assert!(calibrator.observe(&standing()).is_some());
        assert!(calibrator.horizontal_cm(0.1) > 0.0);

        calibrator.reset(Some(160.0));
        assert!(!calibrator.is_calibrated());
        assert_eq!(calibrator.vertical_cm(0.1), 0.0);
    }

    #[test]
    fn test_uncalibrated_estimate_uses_torso() {
        let calibrator = Calibrator::new(None, 1.0);
        let distance = calibrator.horizontal_or_estimate(0.125, 0.25);
        assert!(distance.estimated);
        assert!((distance.cm - 25.0).abs() < 1e-9);
        assert_eq!(calibrator.horizontal_or_estimate(0.1, 0.0).cm, 0.0);
        assert_eq!(calibrator.basis(), MeasurementBasis::Estimated);
    }

    proptest! {
        #[test]
        fn prop_conversions_are_linear(a in -1.0f64..1.0, b in -1.0f64..1.0, k in 0.0f64..10.0) {
            let profile = calibrate(170.0, &standing(), 16.0 / 9.0).unwrap();
            let scaled = profile.horizontal_cm(a * k);
            prop_assert!((scaled - k * profile.horizontal_cm(a)).abs() < 1e-6);
            let vy = profile.vertical_cm(b * k);
            prop_assert!((vy - k * profile.vertical_cm(b)).abs() < 1e-6);
        }

        #[test]
        fn prop_uncalibrated_returns_zero(d in -1.0f64..1.0) {
            let calibrator = Calibrator::new(Some(170.0), 1.0);
            prop_assert_eq!(calibrator.horizontal_cm(d), 0.0);
            prop_assert_eq!(calibrator.vertical_cm(d), 0.0);
        }
    }
}
