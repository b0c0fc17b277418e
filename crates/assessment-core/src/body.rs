//! Anatomical measurements derived from a single landmark frame.
//!
//! Everything here is in normalized image units. Callers must check
//! [`is_usable`] before measuring; on incomplete frames the helpers
//! return meaningless values rather than panicking.

use stride_pose_model::geometry::{angle_at, tilt_from_vertical, Point2D};
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame, Side};

/// Points every analyzer needs to see before trusting a frame.
pub const CORE_POINTS: [BodyPoint; 8] = [
    BodyPoint::LeftShoulder,
    BodyPoint::RightShoulder,
    BodyPoint::LeftHip,
    BodyPoint::RightHip,
    BodyPoint::LeftKnee,
    BodyPoint::RightKnee,
    BodyPoint::LeftAnkle,
    BodyPoint::RightAnkle,
];

/// Points needed for arm measurements, on top of [`CORE_POINTS`].
pub const ARM_POINTS: [BodyPoint; 4] = [
    BodyPoint::LeftElbow,
    BodyPoint::RightElbow,
    BodyPoint::LeftWrist,
    BodyPoint::RightWrist,
];

/// Weight of the nose-to-shoulder offset in the head-top estimate.
const HEAD_TOP_FACTOR: f64 = 0.6;

/// Smallest denominator treated as non-degenerate.
const EPSILON: f64 = 1e-6;

/// Whether the frame is complete and all `points` are visible enough.
pub fn is_usable(frame: &LandmarkFrame, points: &[BodyPoint], min_visibility: f64) -> bool {
    frame.is_complete() && frame.is_visible(points, min_visibility)
}

pub fn shoulder_mid(frame: &LandmarkFrame) -> Point2D {
    frame.midpoint(BodyPoint::LeftShoulder, BodyPoint::RightShoulder)
}

pub fn hip_mid(frame: &LandmarkFrame) -> Point2D {
    frame.midpoint(BodyPoint::LeftHip, BodyPoint::RightHip)
}

pub fn knee_mid(frame: &LandmarkFrame) -> Point2D {
    frame.midpoint(BodyPoint::LeftKnee, BodyPoint::RightKnee)
}

pub fn ankle_mid(frame: &LandmarkFrame) -> Point2D {
    frame.midpoint(BodyPoint::LeftAnkle, BodyPoint::RightAnkle)
}

/// Centre of the trunk (average of shoulders and hips).
pub fn trunk_center(frame: &LandmarkFrame) -> Point2D {
    Point2D::midpoint(&shoulder_mid(frame), &hip_mid(frame))
}

/// Horizontal distance between the shoulders.
pub fn shoulder_width(frame: &LandmarkFrame) -> f64 {
    (frame.point(BodyPoint::LeftShoulder).x - frame.point(BodyPoint::RightShoulder).x).abs()
}

/// Shoulder-midpoint to hip-midpoint distance.
pub fn torso_length(frame: &LandmarkFrame) -> f64 {
    shoulder_mid(frame).distance_to(&hip_mid(frame))
}

/// Reference head line used for full-body height: `nose.y − 0.6 × (nose.y − shoulderMid.y)`.
///
/// With image y growing downwards this lands between the nose and the
/// shoulders.
pub fn head_top_y(frame: &LandmarkFrame) -> f64 {
    let nose_y = frame.point(BodyPoint::Nose).y;
    let shoulder_y = shoulder_mid(frame).y;
    nose_y - HEAD_TOP_FACTOR * (nose_y - shoulder_y)
}

/// Lowest foot point: toe tips when visible, ankles otherwise.
pub fn foot_y(frame: &LandmarkFrame, min_visibility: f64) -> f64 {
    if frame.is_visible(
        &[BodyPoint::LeftFootIndex, BodyPoint::RightFootIndex],
        min_visibility,
    ) {
        frame
            .point(BodyPoint::LeftFootIndex)
            .y
            .max(frame.point(BodyPoint::RightFootIndex).y)
    } else {
        frame
            .point(BodyPoint::LeftAnkle)
            .y
            .max(frame.point(BodyPoint::RightAnkle).y)
    }
}

/// Head-top to foot distance in normalized vertical units.
pub fn body_height(frame: &LandmarkFrame, min_visibility: f64) -> f64 {
    foot_y(frame, min_visibility) - head_top_y(frame)
}

/// Hip–knee–ankle angle in degrees (180 = straight leg).
pub fn knee_angle(frame: &LandmarkFrame, side: Side) -> f64 {
    angle_at(
        &frame.point(side.hip()),
        &frame.point(side.knee()),
        &frame.point(side.ankle()),
    )
}

/// Shoulder–hip–knee angle in degrees (180 = upright trunk).
pub fn hip_angle(frame: &LandmarkFrame, side: Side) -> f64 {
    angle_at(
        &frame.point(side.shoulder()),
        &frame.point(side.hip()),
        &frame.point(side.knee()),
    )
}

pub fn mean_knee_angle(frame: &LandmarkFrame) -> f64 {
    (knee_angle(frame, Side::Left) + knee_angle(frame, Side::Right)) / 2.0
}

pub fn mean_hip_angle(frame: &LandmarkFrame) -> f64 {
    (hip_angle(frame, Side::Left) + hip_angle(frame, Side::Right)) / 2.0
}

/// Trunk lean away from vertical, in degrees.
pub fn torso_tilt(frame: &LandmarkFrame) -> f64 {
    tilt_from_vertical(&shoulder_mid(frame), &hip_mid(frame))
}

/// Lower-body share of the shoulder-to-ankle height:
/// `(ankleY − hipY) / (ankleY − shoulderY)`.
///
/// Near 0.6 when standing, well under 0.45 when seated. `None` when the
/// shoulders are not above the ankles.
pub fn standing_ratio(frame: &LandmarkFrame) -> Option<f64> {
    let ankle_y = ankle_mid(frame).y;
    let span = ankle_y - shoulder_mid(frame).y;
    if span <= EPSILON {
        return None;
    }
    Some((ankle_y - hip_mid(frame).y) / span)
}

/// `value / reference`, or `None` when the reference is degenerate.
pub fn relative(value: f64, reference: f64) -> Option<f64> {
    (reference.abs() > EPSILON).then(|| value / reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pose_model::synthetic::PoseBuilder;
    use stride_pose_model::LandmarkFrame;

    #[test]
    fn test_standing_front_metrics() {
        let frame = PoseBuilder::standing_front().build(0);
        assert!(is_usable(&frame, &CORE_POINTS, 0.5));
        assert!((shoulder_width(&frame) - 0.12).abs() < 1e-9);
        assert!((torso_length(&frame) - 0.25).abs() < 1e-9);
        assert!((head_top_y(&frame) - 0.21).abs() < 1e-9);
        assert!((body_height(&frame, 0.5) - 0.71).abs() < 1e-9);
        assert!((mean_knee_angle(&frame) - 180.0).abs() < 1e-6);
        assert!(torso_tilt(&frame) < 1e-6);
        assert!(standing_ratio(&frame).unwrap() > 0.45);
    }

    #[test]
    fn test_sitting_ratio_and_knee() {
        let frame = PoseBuilder::sitting_side().build(0);
        assert!(standing_ratio(&frame).unwrap() < 0.45);
        assert!(mean_knee_angle(&frame) < 100.0);
    }

    #[test]
    fn test_foot_falls_back_to_ankles() {
        let mut pose = PoseBuilder::standing_front();
        pose.set_visibility(BodyPoint::LeftFootIndex, 0.1);
        let frame = pose.build(0);
        assert!((foot_y(&frame, 0.5) - 0.88).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_frame_is_not_usable() {
        let frame = LandmarkFrame::new(0, vec![]);
        assert!(!is_usable(&frame, &CORE_POINTS, 0.0));
    }

    #[test]
    fn test_relative_guards_zero() {
        assert_eq!(relative(1.0, 0.0), None);
        assert_eq!(relative(1.0, 2.0), Some(0.5));
    }
}
