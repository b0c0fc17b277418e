//! Foot displacement tracking with a sticky "feet moved" flag.

use stride_pose_model::geometry::Point2D;
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame};

/// Tracks ankle displacement from a baseline.
///
/// Once either ankle moves beyond the threshold, `ever_moved` stays true
/// until [`FeetTracker::reset`].
#[derive(Debug, Clone)]
pub struct FeetTracker {
    threshold: f64,
    /// Measure only the ankle that moved least, i.e. the planted foot.
    stance_only: bool,
    baseline: Option<[Point2D; 2]>,
    ever_moved: bool,
    max_displacement: f64,
}

impl FeetTracker {
    /// `threshold` is in normalized image units.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            stance_only: false,
            baseline: None,
            ever_moved: false,
            max_displacement: 0.0,
        }
    }

    /// A tracker for items where lifting or placing one foot is the task:
    /// the feet count as moved only when the planted foot shifts too.
    pub fn stance_foot(threshold: f64) -> Self {
        Self {
            stance_only: true,
            ..Self::new(threshold)
        }
    }

    /// Record the ankle positions to measure against.
    pub fn set_baseline(&mut self, frame: &LandmarkFrame) {
        self.baseline = Some(ankles(frame));
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Measure the current displacement; returns whether feet have ever moved.
    pub fn update(&mut self, frame: &LandmarkFrame) -> bool {
        let Some(baseline) = self.baseline else {
            return self.ever_moved;
        };
        let current = ankles(frame);
        let left = baseline[0].distance_to(&current[0]);
        let right = baseline[1].distance_to(&current[1]);
        let displacement = if self.stance_only {
            left.min(right)
        } else {
            left.max(right)
        };
        self.max_displacement = self.max_displacement.max(displacement);
        if displacement > self.threshold && !self.ever_moved {
            self.ever_moved = true;
            tracing::debug!(
                displacement,
                threshold = self.threshold,
                t = frame.timestamp_ms,
                "Feet moved from baseline"
            );
        }
        self.ever_moved
    }

    pub fn ever_moved(&self) -> bool {
        self.ever_moved
    }

    /// Largest ankle displacement seen so far.
    pub fn max_displacement(&self) -> f64 {
        self.max_displacement
    }

    pub fn reset(&mut self) {
        self.baseline = None;
        self.ever_moved = false;
        self.max_displacement = 0.0;
    }
}

fn ankles(frame: &LandmarkFrame) -> [Point2D; 2] {
    [
        frame.point(BodyPoint::LeftAnkle),
        frame.point(BodyPoint::RightAnkle),
    ]
}
