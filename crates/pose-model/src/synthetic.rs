//! Synthetic pose generation.
//!
//! Builds complete 33-point frames for a handful of canonical postures so
//! analyzers can be exercised without a detector. Coordinates describe an
//! adult filling most of a landscape frame: head near `y = 0.15`, feet
//! near `y = 0.9`.

use crate::landmark::{BodyPoint, Landmark, LandmarkFrame, Side, TimestampMs, LANDMARK_COUNT};

/// Mutable pose that produces [`LandmarkFrame`]s.
#[derive(Debug, Clone)]
pub struct PoseBuilder {
    landmarks: Vec<Landmark>,
}

impl PoseBuilder {
    fn from_points(points: &[(BodyPoint, f64, f64)]) -> Self {
        let mut landmarks = vec![Landmark::at(0.5, 0.5); LANDMARK_COUNT];
        for (point, x, y) in points {
            landmarks[point.index()] = Landmark::at(*x, *y);
        }
        Self { landmarks }
    }

    /// Standing, facing the camera, arms hanging at the sides.
    ///
    /// The patient's left side appears on the image right.
    pub fn standing_front() -> Self {
        use BodyPoint::*;
        Self::from_points(&[
            (Nose, 0.50, 0.15),
            (LeftEyeInner, 0.51, 0.14),
            (LeftEye, 0.515, 0.14),
            (LeftEyeOuter, 0.52, 0.14),
            (RightEyeInner, 0.49, 0.14),
            (RightEye, 0.485, 0.14),
            (RightEyeOuter, 0.48, 0.14),
            (LeftEar, 0.53, 0.15),
            (RightEar, 0.47, 0.15),
            (MouthLeft, 0.51, 0.17),
            (MouthRight, 0.49, 0.17),
            (LeftShoulder, 0.56, 0.25),
            (RightShoulder, 0.44, 0.25),
            (LeftElbow, 0.58, 0.37),
            (RightElbow, 0.42, 0.37),
            (LeftWrist, 0.58, 0.48),
            (RightWrist, 0.42, 0.48),
            (LeftPinky, 0.585, 0.50),
            (RightPinky, 0.415, 0.50),
            (LeftIndex, 0.58, 0.51),
            (RightIndex, 0.42, 0.51),
            (LeftThumb, 0.575, 0.50),
            (RightThumb, 0.425, 0.50),
            (LeftHip, 0.54, 0.50),
            (RightHip, 0.46, 0.50),
            (LeftKnee, 0.54, 0.70),
            (RightKnee, 0.46, 0.70),
            (LeftAnkle, 0.54, 0.88),
            (RightAnkle, 0.46, 0.88),
            (LeftHeel, 0.54, 0.90),
            (RightHeel, 0.46, 0.90),
            (LeftFootIndex, 0.55, 0.92),
            (RightFootIndex, 0.45, 0.92),
        ])
    }

    /// Standing in profile, facing image right, arms hanging.
    pub fn standing_side() -> Self {
        use BodyPoint::*;
        Self::from_points(&[
            (Nose, 0.53, 0.15),
            (LeftEyeInner, 0.525, 0.14),
            (LeftEye, 0.52, 0.14),
            (LeftEyeOuter, 0.515, 0.14),
            (RightEyeInner, 0.525, 0.14),
            (RightEye, 0.52, 0.14),
            (RightEyeOuter, 0.515, 0.14),
            (LeftEar, 0.49, 0.15),
            (RightEar, 0.49, 0.15),
            (MouthLeft, 0.52, 0.17),
            (MouthRight, 0.52, 0.17),
            (LeftShoulder, 0.51, 0.25),
            (RightShoulder, 0.49, 0.25),
            (LeftElbow, 0.51, 0.37),
            (RightElbow, 0.49, 0.37),
            (LeftWrist, 0.51, 0.48),
            (RightWrist, 0.49, 0.48),
            (LeftPinky, 0.51, 0.50),
            (RightPinky, 0.49, 0.50),
            (LeftIndex, 0.515, 0.51),
            (RightIndex, 0.495, 0.51),
            (LeftThumb, 0.515, 0.50),
            (RightThumb, 0.495, 0.50),
            (LeftHip, 0.51, 0.50),
            (RightHip, 0.49, 0.50),
            (LeftKnee, 0.51, 0.70),
            (RightKnee, 0.49, 0.70),
            (LeftAnkle, 0.51, 0.88),
            (RightAnkle, 0.49, 0.88),
            (LeftHeel, 0.49, 0.90),
            (RightHeel, 0.47, 0.90),
            (LeftFootIndex, 0.55, 0.92),
            (RightFootIndex, 0.53, 0.92),
        ])
    }

    /// Seated in profile, facing image right, arms folded across the chest.
    pub fn sitting_side() -> Self {
        use BodyPoint::*;
        Self::from_points(&[
            (Nose, 0.50, 0.38),
            (LeftEyeInner, 0.495, 0.37),
            (LeftEye, 0.49, 0.37),
            (LeftEyeOuter, 0.485, 0.37),
            (RightEyeInner, 0.495, 0.37),
            (RightEye, 0.49, 0.37),
            (RightEyeOuter, 0.485, 0.37),
            (LeftEar, 0.47, 0.38),
            (RightEar, 0.47, 0.38),
            (MouthLeft, 0.495, 0.40),
            (MouthRight, 0.495, 0.40),
            (LeftShoulder, 0.46, 0.47),
            (RightShoulder, 0.44, 0.47),
            (LeftElbow, 0.47, 0.58),
            (RightElbow, 0.45, 0.58),
            (LeftWrist, 0.48, 0.52),
            (RightWrist, 0.47, 0.52),
            (LeftPinky, 0.485, 0.52),
            (RightPinky, 0.475, 0.52),
            (LeftIndex, 0.49, 0.52),
            (RightIndex, 0.48, 0.52),
            (LeftThumb, 0.485, 0.51),
            (RightThumb, 0.475, 0.51),
            (LeftHip, 0.46, 0.72),
            (RightHip, 0.44, 0.72),
            (LeftKnee, 0.63, 0.73),
            (RightKnee, 0.61, 0.73),
            (LeftAnkle, 0.63, 0.90),
            (RightAnkle, 0.61, 0.90),
            (LeftHeel, 0.61, 0.92),
            (RightHeel, 0.59, 0.92),
            (LeftFootIndex, 0.67, 0.92),
            (RightFootIndex, 0.65, 0.92),
        ])
    }

    /// Bent forward at the hips in profile, facing image right, one hand
    /// reaching toward the floor in front of the feet.
    pub fn bending_side() -> Self {
        use BodyPoint::*;
        let mut pose = Self::standing_side();
        pose.set(Nose, 0.70, 0.50)
            .set(LeftEar, 0.66, 0.48)
            .set(RightEar, 0.66, 0.48)
            .set(LeftShoulder, 0.64, 0.50)
            .set(RightShoulder, 0.62, 0.50)
            .set(LeftElbow, 0.66, 0.66)
            .set(RightElbow, 0.64, 0.66)
            .set(LeftWrist, 0.62, 0.84)
            .set(RightWrist, 0.60, 0.84)
            .set(LeftHip, 0.45, 0.50)
            .set(RightHip, 0.43, 0.50);
        pose
    }

    /// Move a body point.
    pub fn set(&mut self, point: BodyPoint, x: f64, y: f64) -> &mut Self {
        let landmark = &mut self.landmarks[point.index()];
        landmark.x = x;
        landmark.y = y;
        self
    }

    /// Set the relative depth of a body point.
    pub fn set_depth(&mut self, point: BodyPoint, z: f64) -> &mut Self {
        self.landmarks[point.index()].z = z;
        self
    }

    /// Set detector confidence for a body point.
    pub fn set_visibility(&mut self, point: BodyPoint, visibility: f64) -> &mut Self {
        self.landmarks[point.index()].visibility = visibility;
        self
    }

    /// Set detector confidence for every body point.
    pub fn set_all_visibility(&mut self, visibility: f64) -> &mut Self {
        for landmark in &mut self.landmarks {
            landmark.visibility = visibility;
        }
        self
    }

    /// Place a wrist (and its hand points) at `(x, y)`.
    pub fn set_wrist(&mut self, side: Side, x: f64, y: f64) -> &mut Self {
        let hand = match side {
            Side::Left => [
                BodyPoint::LeftPinky,
                BodyPoint::LeftIndex,
                BodyPoint::LeftThumb,
            ],
            Side::Right => [
                BodyPoint::RightPinky,
                BodyPoint::RightIndex,
                BodyPoint::RightThumb,
            ],
        };
        self.set(side.wrist(), x, y);
        for point in hand {
            self.set(point, x, y + 0.02);
        }
        self
    }

    /// Translate a whole foot (ankle, heel, toes) by `(dx, dy)`.
    pub fn move_foot(&mut self, side: Side, dx: f64, dy: f64) -> &mut Self {
        let heel = match side {
            Side::Left => BodyPoint::LeftHeel,
            Side::Right => BodyPoint::RightHeel,
        };
        for point in [side.ankle(), heel, side.foot_index()] {
            let landmark = &mut self.landmarks[point.index()];
            landmark.x += dx;
            landmark.y += dy;
        }
        self
    }

    /// Raise a foot off the floor by `dy` (normalized units).
    pub fn lift_foot(&mut self, side: Side, dy: f64) -> &mut Self {
        self.move_foot(side, 0.0, -dy)
    }

    /// Translate every body point horizontally.
    pub fn shift_x(&mut self, dx: f64) -> &mut Self {
        for landmark in &mut self.landmarks {
            landmark.x += dx;
        }
        self
    }

    /// Spread the shoulders to `width` around their current midpoint,
    /// keeping the patient's left on the image right.
    pub fn set_shoulder_width(&mut self, width: f64) -> &mut Self {
        let left = self.landmarks[BodyPoint::LeftShoulder.index()];
        let right = self.landmarks[BodyPoint::RightShoulder.index()];
        let mid = (left.x + right.x) / 2.0;
        self.landmarks[BodyPoint::LeftShoulder.index()].x = mid + width / 2.0;
        self.landmarks[BodyPoint::RightShoulder.index()].x = mid - width / 2.0;
        self
    }

    /// Produce a frame at time `t`.
    pub fn build(&self, timestamp_ms: TimestampMs) -> LandmarkFrame {
        LandmarkFrame::new(timestamp_ms, self.landmarks.clone())
    }
}

/// Build `count` frames spaced `interval_ms` apart starting at `start_ms`,
/// posing frame `i` with `pose(i)`.
pub fn sequence(
    start_ms: TimestampMs,
    interval_ms: u64,
    count: usize,
    pose: impl Fn(usize) -> PoseBuilder,
) -> Vec<LandmarkFrame> {
    (0..count)
        .map(|i| pose(i).build(start_ms + i as u64 * interval_ms))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_poses_are_complete() {
        for pose in [
            PoseBuilder::standing_front(),
            PoseBuilder::standing_side(),
            PoseBuilder::sitting_side(),
            PoseBuilder::bending_side(),
        ] {
            let frame = pose.build(0);
            assert!(frame.is_complete());
            assert!(frame.is_visible(&[BodyPoint::Nose, BodyPoint::RightFootIndex], 0.9));
        }
    }

    #[test]
    fn test_lift_foot_moves_whole_foot() {
        let mut pose = PoseBuilder::standing_front();
        pose.lift_foot(Side::Left, 0.05);
        let frame = pose.build(0);
        assert!((frame.point(BodyPoint::LeftAnkle).y - 0.83).abs() < 1e-9);
        assert!((frame.point(BodyPoint::LeftFootIndex).y - 0.87).abs() < 1e-9);
        assert!((frame.point(BodyPoint::RightAnkle).y - 0.88).abs() < 1e-9);
    }

    #[test]
    fn test_shoulder_width() {
        let mut pose = PoseBuilder::standing_front();
        pose.set_shoulder_width(0.06);
        let frame = pose.build(0);
        let width = frame.point(BodyPoint::LeftShoulder).x - frame.point(BodyPoint::RightShoulder).x;
        assert!((width - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_timestamps() {
        let frames = sequence(1000, 33, 3, |_| PoseBuilder::standing_front());
        let times: Vec<_> = frames.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(times, vec![1000, 1033, 1066]);
    }
}
