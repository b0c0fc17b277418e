//! Landmark frame types for the pose stream.
//!
//! Frames are recorded as JSONL (one frame per line), optionally preceded
//! by a `#`-prefixed header line. All coordinates are normalized to
//! `[0.0, 1.0]` relative to the video frame; `z` is relative depth
//! (smaller = closer to the camera) and `visibility` is the detector's
//! confidence in `[0.0, 1.0]`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;
use crate::report::ModelError;

/// Milliseconds since the detector started producing frames.
pub type TimestampMs = u64;

/// Number of landmarks in a complete pose frame.
pub const LANDMARK_COUNT: usize = 33;

/// One body-point observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized X coordinate [0.0, 1.0].
    pub x: f64,
    /// Normalized Y coordinate [0.0, 1.0], growing downward.
    pub y: f64,
    /// Relative depth; smaller is closer to the camera.
    #[serde(default)]
    pub z: f64,
    /// Detector confidence [0.0, 1.0].
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

fn full_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    /// Landmark at `(x, y)` with zero depth and full visibility.
    pub fn at(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0, 1.0)
    }

    /// Project onto the image plane.
    pub fn point(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// The 33 standard body points, in detector index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum BodyPoint {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyPoint {
    /// Index into a detector frame.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Which side of the body a measurement refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn shoulder(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftShoulder,
            Side::Right => BodyPoint::RightShoulder,
        }
    }

    pub fn elbow(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftElbow,
            Side::Right => BodyPoint::RightElbow,
        }
    }

    pub fn wrist(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftWrist,
            Side::Right => BodyPoint::RightWrist,
        }
    }

    pub fn hip(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftHip,
            Side::Right => BodyPoint::RightHip,
        }
    }

    pub fn knee(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftKnee,
            Side::Right => BodyPoint::RightKnee,
        }
    }

    pub fn ankle(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftAnkle,
            Side::Right => BodyPoint::RightAnkle,
        }
    }

    pub fn foot_index(self) -> BodyPoint {
        match self {
            Side::Left => BodyPoint::LeftFootIndex,
            Side::Right => BodyPoint::RightFootIndex,
        }
    }
}

/// A single detector output: 33 landmarks and the capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Milliseconds since the detector started.
    #[serde(rename = "t")]
    pub timestamp_ms: TimestampMs,

    /// Landmarks in [`BodyPoint`] index order.
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(timestamp_ms: TimestampMs, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp_ms,
            landmarks,
        }
    }

    /// Whether the frame carries the full landmark set.
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }

    /// The landmark for a body point, if present.
    pub fn landmark(&self, point: BodyPoint) -> Option<&Landmark> {
        self.landmarks.get(point.index())
    }

    /// Image-plane position of a body point, origin if absent.
    ///
    /// Callers check [`LandmarkFrame::is_complete`] first.
    pub fn point(&self, point: BodyPoint) -> Point2D {
        self.landmark(point)
            .map(Landmark::point)
            .unwrap_or_default()
    }

    /// Detector confidence for a body point, zero if absent.
    pub fn visibility(&self, point: BodyPoint) -> f64 {
        self.landmark(point).map(|l| l.visibility).unwrap_or(0.0)
    }

    /// Whether every listed point is present with at least `min_visibility`.
    pub fn is_visible(&self, points: &[BodyPoint], min_visibility: f64) -> bool {
        points
            .iter()
            .all(|p| self.landmark(*p).is_some_and(|l| l.visibility >= min_visibility))
    }

    /// Midpoint between two body points.
    pub fn midpoint(&self, a: BodyPoint, b: BodyPoint) -> Point2D {
        Point2D::midpoint(&self.point(a), &self.point(b))
    }

    /// Timestamp as fractional seconds.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }
}

/// Detector settings recorded alongside a landmark stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Model complexity level (0 = lite, 1 = full, 2 = heavy).
    pub model_complexity: u8,
    /// Minimum confidence for a new person detection.
    pub min_detection_confidence: f64,
    /// Minimum confidence to keep tracking between frames.
    pub min_tracking_confidence: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_complexity: 1,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Recording metadata written as the first (`#`-prefixed) line of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameStreamHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Frame width divided by frame height.
    pub aspect_ratio: f64,

    /// Nominal frame rate of the detector output.
    pub fps: u32,

    /// Detector configuration used for this recording.
    #[serde(default)]
    pub detector: DetectorSettings,
}

impl FrameStreamHeader {
    pub fn new(aspect_ratio: f64, fps: u32) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            aspect_ratio,
            fps,
            detector: DetectorSettings::default(),
        }
    }

    /// The header as a JSONL comment line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("# {}", serde_json::to_string(self)?))
    }
}

/// Parse frames from JSONL content (one JSON object per line).
pub fn parse_frames(jsonl: &str) -> Result<Vec<LandmarkFrame>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Extract the stream header, if the content starts with one.
///
/// Returns `None` for headerless streams and for comment lines that are
/// not a header.
pub fn parse_header(jsonl: &str) -> Option<FrameStreamHeader> {
    jsonl
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix('#'))
        .and_then(|rest| serde_json::from_str(rest.trim()).ok())
}

/// Serialize frames to JSONL, with an optional header line.
pub fn write_frames(
    header: Option<&FrameStreamHeader>,
    frames: &[LandmarkFrame],
) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    if let Some(header) = header {
        out.push_str(&header.to_line()?);
        out.push('\n');
    }
    for frame in frames {
        out.push_str(&serde_json::to_string(frame)?);
        out.push('\n');
    }
    Ok(out)
}

/// A landmark recording loaded from disk.
#[derive(Debug, Clone)]
pub struct FrameRecording {
    /// Stream header, if the file has one.
    pub header: Option<FrameStreamHeader>,

    /// Frames in arrival order.
    pub frames: Vec<LandmarkFrame>,
}

impl FrameRecording {
    /// Load a JSONL recording.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| ModelError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let frames =
            parse_frames(&content).map_err(|e| ModelError::ParseError { path, source: e })?;
        Ok(Self {
            header: parse_header(&content),
            frames,
        })
    }

    /// Write the recording as JSONL.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref().to_path_buf();
        let content = write_frames(self.header.as_ref(), &self.frames).map_err(|e| {
            ModelError::ParseError {
                path: path.clone(),
                source: e,
            }
        })?;
        std::fs::write(&path, content).map_err(|e| ModelError::IoError { path, source: e })
    }

    /// Span between the first and last frame, in seconds.
    pub fn duration_secs(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => {
                last.timestamp_ms.saturating_sub(first.timestamp_ms) as f64 / 1000.0
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_frame(t: TimestampMs) -> LandmarkFrame {
        LandmarkFrame::new(t, vec![Landmark::at(0.5, 0.5); LANDMARK_COUNT])
    }

    #[test]
    fn test_body_point_indices() {
        assert_eq!(BodyPoint::Nose.index(), 0);
        assert_eq!(BodyPoint::LeftShoulder.index(), 11);
        assert_eq!(BodyPoint::RightHip.index(), 24);
        assert_eq!(BodyPoint::RightFootIndex.index(), 32);
        assert_eq!(Side::Left.ankle(), BodyPoint::LeftAnkle);
        assert_eq!(Side::Right.opposite(), Side::Left);
    }

    #[test]
    fn test_completeness() {
        assert!(full_frame(0).is_complete());
        let short = LandmarkFrame::new(0, vec![Landmark::at(0.5, 0.5); 20]);
        assert!(!short.is_complete());
        assert!(short.landmark(BodyPoint::LeftAnkle).is_none());
        assert_eq!(short.visibility(BodyPoint::LeftAnkle), 0.0);
    }

    #[test]
    fn test_visibility_check() {
        let mut frame = full_frame(0);
        frame.landmarks[BodyPoint::Nose.index()].visibility = 0.2;
        assert!(!frame.is_visible(&[BodyPoint::Nose, BodyPoint::LeftHip], 0.5));
        assert!(frame.is_visible(&[BodyPoint::LeftHip], 0.5));
    }

    #[test]
    fn test_parse_frames_skips_header_and_blanks() {
        let header = FrameStreamHeader::new(16.0 / 9.0, 30);
        let content = write_frames(Some(&header), &[full_frame(0), full_frame(33)]).unwrap();
        let with_blank = format!("{content}\n\n");

        let frames = parse_frames(&with_blank).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp_ms, 33);

        let parsed = parse_header(&with_blank).unwrap();
        assert_eq!(parsed.fps, 30);
        assert_eq!(parsed.detector.model_complexity, 1);
    }

    #[test]
    fn test_landmark_defaults() {
        let frame: LandmarkFrame =
            serde_json::from_str(r#"{"t": 5, "landmarks": [{"x": 0.1, "y": 0.2}]}"#).unwrap();
        assert_eq!(frame.landmarks[0].z, 0.0);
        assert_eq!(frame.landmarks[0].visibility, 1.0);
    }

    #[test]
    fn test_recording_save_and_load() {
        let path = std::env::temp_dir().join("stride_test_recording.jsonl");
        let recording = FrameRecording {
            header: Some(FrameStreamHeader::new(0.5625, 30)),
            frames: vec![full_frame(0), full_frame(1500)],
        };
        recording.save(&path).unwrap();

        let loaded = FrameRecording::load(&path).unwrap();
        assert_eq!(loaded.frames.len(), 2);
        assert!((loaded.header.as_ref().unwrap().aspect_ratio - 0.5625).abs() < 1e-9);
        assert!((loaded.duration_secs() - 1.5).abs() < 1e-9);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_headerless_stream() {
        let content = write_frames(None, &[full_frame(0)]).unwrap();
        assert!(parse_header(&content).is_none());
    }
}
