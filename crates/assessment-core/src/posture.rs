//! Sitting/standing classification.
//!
//! Two classifiers share this module:
//!
//! - [`ratio_posture`]: a single-ratio binary gate used by most analyzers.
//! - [`WeightedPostureScorer`]: a five-signal 0–100 standing confidence,
//!   used where the transition itself is being measured.
//!
//! Either can be fed through a [`PostureSmoother`] for a label with
//! hysteresis.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use stride_pose_model::geometry::clamp01;
use stride_pose_model::landmark::{BodyPoint, LandmarkFrame};

use crate::body;

/// Lower-body ratio above which [`ratio_posture`] reports standing.
pub const DEFAULT_STANDING_RATIO: f64 = 0.45;

/// A posture label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Sitting,
    Standing,
    Unknown,
}

/// A label with its confidence (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureReading {
    pub posture: Posture,
    pub confidence: f64,
}

impl PostureReading {
    pub fn unknown() -> Self {
        Self {
            posture: Posture::Unknown,
            confidence: 0.0,
        }
    }
}

/// Ratio test: standing when `(ankleY − hipY) / (ankleY − shoulderY)`
/// exceeds `threshold`.
///
/// `None` for incomplete frames or when the shoulders are not above the
/// ankles.
pub fn ratio_posture(frame: &LandmarkFrame, threshold: f64) -> Option<Posture> {
    if !frame.is_complete() {
        return None;
    }
    body::standing_ratio(frame).map(|ratio| {
        if ratio > threshold {
            Posture::Standing
        } else {
            Posture::Sitting
        }
    })
}

/// Tuning for [`WeightedPostureScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedPostureConfig {
    pub ratio_weight: f64,
    pub hip_knee_weight: f64,
    pub head_weight: f64,
    pub knee_angle_weight: f64,
    pub torso_weight: f64,

    /// Lower-body ratio mapped to 0 and the span above it mapped to 1.
    pub ratio_floor: f64,
    pub ratio_span: f64,

    /// Knee-below-hip offset (in torso lengths) mapped to 0, and span.
    pub hip_knee_floor: f64,
    pub hip_knee_span: f64,

    /// Head drop (in torso lengths) at which the head signal reaches 0.
    pub head_drop_span: f64,

    /// Knee angle (degrees) mapped to 0, and span to full extension.
    pub knee_angle_floor: f64,
    pub knee_angle_span: f64,

    /// Torso tilt (degrees) at which alignment reaches 0.
    pub max_torso_tilt: f64,

    /// Frames in the head-height moving average.
    pub head_window: usize,

    /// Standing confidence (without the head term) needed to learn the
    /// standing head height.
    pub head_learn_confidence: f64,

    pub min_visibility: f64,
}

impl Default for WeightedPostureConfig {
    fn default() -> Self {
        Self {
            ratio_weight: 0.30,
            hip_knee_weight: 0.25,
            head_weight: 0.15,
            knee_angle_weight: 0.20,
            torso_weight: 0.10,
            ratio_floor: 0.35,
            ratio_span: 0.20,
            hip_knee_floor: 0.25,
            hip_knee_span: 0.45,
            head_drop_span: 0.6,
            knee_angle_floor: 100.0,
            knee_angle_span: 60.0,
            max_torso_tilt: 45.0,
            head_window: 5,
            head_learn_confidence: 75.0,
            min_visibility: 0.5,
        }
    }
}

/// Per-signal standing evidence, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureSignals {
    pub ratio: f64,
    pub hip_knee: f64,
    /// `None` until a standing head height has been learned.
    pub head: Option<f64>,
    pub knee_angle: f64,
    pub torso: f64,
}

/// Output of the weighted scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureScore {
    /// Confidence (0–100) that the patient is standing.
    pub standing: f64,
    pub signals: PostureSignals,
}

impl PostureScore {
    /// Confidence (0–100) that the patient is sitting.
    pub fn sitting(&self) -> f64 {
        100.0 - self.standing
    }

    pub fn reading(&self) -> PostureReading {
        if self.standing >= 50.0 {
            PostureReading {
                posture: Posture::Standing,
                confidence: self.standing,
            }
        } else {
            PostureReading {
                posture: Posture::Sitting,
                confidence: self.sitting(),
            }
        }
    }
}

/// Multi-signal standing confidence with an auto-learned head baseline.
#[derive(Debug, Clone)]
pub struct WeightedPostureScorer {
    config: WeightedPostureConfig,
    head_history: VecDeque<f64>,
    standing_head_y: Option<f64>,
}

const SCORER_POINTS: [BodyPoint; 9] = [
    BodyPoint::Nose,
    BodyPoint::LeftShoulder,
    BodyPoint::RightShoulder,
    BodyPoint::LeftHip,
    BodyPoint::RightHip,
    BodyPoint::LeftKnee,
    BodyPoint::RightKnee,
    BodyPoint::LeftAnkle,
    BodyPoint::RightAnkle,
];

impl WeightedPostureScorer {
    pub fn new(config: WeightedPostureConfig) -> Self {
        Self {
            config,
            head_history: VecDeque::new(),
            standing_head_y: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(WeightedPostureConfig::default())
    }

    /// Score one frame, updating the head-height history.
    ///
    /// `None` when the frame lacks the required points.
    pub fn score(&mut self, frame: &LandmarkFrame) -> Option<PostureScore> {
        let c = &self.config;
        if !body::is_usable(frame, &SCORER_POINTS, c.min_visibility) {
            return None;
        }
        let torso = body::torso_length(frame);
        let ratio = body::standing_ratio(frame)?;
        let knee_offset = body::relative(body::knee_mid(frame).y - body::hip_mid(frame).y, torso)?;

        let ratio_signal = clamp01((ratio - c.ratio_floor) / c.ratio_span);
        let hip_knee_signal = clamp01((knee_offset - c.hip_knee_floor) / c.hip_knee_span);
        let knee_signal =
            clamp01((body::mean_knee_angle(frame) - c.knee_angle_floor) / c.knee_angle_span);
        let torso_signal = clamp01(1.0 - body::torso_tilt(frame) / c.max_torso_tilt);

        self.head_history.push_back(frame.point(BodyPoint::Nose).y);
        while self.head_history.len() > c.head_window.max(1) {
            self.head_history.pop_front();
        }
        let head_avg = self.head_history.iter().sum::<f64>() / self.head_history.len() as f64;

        let body_weight = c.ratio_weight + c.hip_knee_weight + c.knee_angle_weight + c.torso_weight;
        let body_sum = c.ratio_weight * ratio_signal
            + c.hip_knee_weight * hip_knee_signal
            + c.knee_angle_weight * knee_signal
            + c.torso_weight * torso_signal;
        let body_only = if body_weight > 0.0 {
            100.0 * body_sum / body_weight
        } else {
            0.0
        };

        let head_signal = self.standing_head_y.map(|baseline| {
            let drop = (head_avg - baseline).max(0.0) / torso;
            1.0 - clamp01(drop / c.head_drop_span)
        });

        let standing = match head_signal {
            Some(head) => {
                100.0 * (body_sum + c.head_weight * head) / (body_weight + c.head_weight)
            }
            None => body_only,
        };

        if body_only >= c.head_learn_confidence && self.head_history.len() >= c.head_window {
            if self.standing_head_y.is_none() {
                tracing::debug!(head_y = head_avg, t = frame.timestamp_ms, "Learned standing head height");
            }
            self.standing_head_y = Some(head_avg);
        }

        tracing::trace!(standing, ratio, t = frame.timestamp_ms, "Weighted posture");
        Some(PostureScore {
            standing,
            signals: PostureSignals {
                ratio: ratio_signal,
                hip_knee: hip_knee_signal,
                head: head_signal,
                knee_angle: knee_signal,
                torso: torso_signal,
            },
        })
    }

    /// The learned standing head height, if any.
    pub fn standing_head_y(&self) -> Option<f64> {
        self.standing_head_y
    }

    pub fn reset(&mut self) {
        self.head_history.clear();
        self.standing_head_y = None;
    }
}

/// Tuning for [`PostureSmoother`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureSmootherConfig {
    /// Rolling window for the initial majority.
    pub window: usize,
    /// Majority share needed to accept the first label.
    pub accept_fraction: f64,
    /// Recent window checked while a flip is pending.
    pub recent_window: usize,
    /// Share of the recent window the new label must hold.
    pub flip_fraction: f64,
    /// Consecutive qualifying frames before a flip commits.
    pub flip_frames: usize,
}

impl Default for PostureSmootherConfig {
    fn default() -> Self {
        Self {
            window: 100,
            accept_fraction: 0.5,
            recent_window: 10,
            flip_fraction: 0.8,
            flip_frames: 10,
        }
    }
}

/// Rolling-majority label smoothing with flip hysteresis.
#[derive(Debug, Clone)]
pub struct PostureSmoother {
    config: PostureSmootherConfig,
    history: VecDeque<Posture>,
    confirmed: Posture,
    flip_streak: usize,
}

impl PostureSmoother {
    pub fn new(config: PostureSmootherConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            confirmed: Posture::Unknown,
            flip_streak: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PostureSmootherConfig::default())
    }

    /// Add a raw label and return the smoothed one.
    pub fn push(&mut self, label: Posture) -> Posture {
        self.history.push_back(label);
        while self.history.len() > self.config.window.max(1) {
            self.history.pop_front();
        }

        if self.confirmed == Posture::Unknown {
            if label != Posture::Unknown
                && self.share(label, self.history.len()) > self.config.accept_fraction
            {
                self.confirmed = label;
            }
            return self.confirmed;
        }

        if label == self.confirmed || label == Posture::Unknown {
            self.flip_streak = 0;
            return self.confirmed;
        }

        if self.share(label, self.config.recent_window) >= self.config.flip_fraction {
            self.flip_streak += 1;
        } else {
            self.flip_streak = 0;
        }
        if self.flip_streak >= self.config.flip_frames {
            tracing::debug!(from = ?self.confirmed, to = ?label, "Smoothed posture flipped");
            self.confirmed = label;
            self.flip_streak = 0;
        }
        self.confirmed
    }

    pub fn current(&self) -> Posture {
        self.confirmed
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.confirmed = Posture::Unknown;
        self.flip_streak = 0;
    }

    /// Share of `label` among the last `n` labels (over `n`, not the
    /// history length, so a short history cannot fake a majority).
    fn share(&self, label: Posture, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let count = self
            .history
            .iter()
            .rev()
            .take(n)
            .filter(|p| **p == label)
            .count();
        count as f64 / n as f64
    }
}
