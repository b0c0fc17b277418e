//! Image-plane geometry for body landmarks.
//!
//! All coordinates are normalized to `[0.0, 1.0]` with `y` growing
//! downward, so "higher on the body" means a smaller `y`.

use serde::{Deserialize, Serialize};

/// A 2D normalized point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Distance with the horizontal term stretched by the frame aspect
    /// ratio (width / height), i.e. measured in units of frame height.
    pub fn aspect_distance_to(&self, other: &Point2D, aspect_ratio: f64) -> f64 {
        (((self.x - other.x) * aspect_ratio).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Point halfway between two points.
    pub fn midpoint(a: &Point2D, b: &Point2D) -> Point2D {
        Point2D {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        }
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &Point2D, b: &Point2D, t: f64) -> Point2D {
        let t = t.clamp(0.0, 1.0);
        Point2D {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }

    /// Centroid of a set of points, `None` when empty.
    pub fn centroid(points: &[Point2D]) -> Option<Point2D> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let sum_x: f64 = points.iter().map(|p| p.x).sum();
        let sum_y: f64 = points.iter().map(|p| p.y).sum();
        Some(Point2D::new(sum_x / n, sum_y / n))
    }
}

/// Interior angle at `vertex` formed by `a` and `c`, in degrees `[0, 180]`.
///
/// Degenerate (zero-length) limbs report 180° (straight).
pub fn angle_at(a: &Point2D, vertex: &Point2D, c: &Point2D) -> f64 {
    let v1 = (a.x - vertex.x, a.y - vertex.y);
    let v2 = (c.x - vertex.x, c.y - vertex.y);
    let len1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let len2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if len1 < 1e-9 || len2 < 1e-9 {
        return 180.0;
    }
    let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (len1 * len2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Tilt of the segment `top → bottom` away from vertical, in degrees `[0, 90]`.
pub fn tilt_from_vertical(top: &Point2D, bottom: &Point2D) -> f64 {
    let dx = (bottom.x - top.x).abs();
    let dy = (bottom.y - top.y).abs();
    if dx < 1e-12 && dy < 1e-12 {
        return 0.0;
    }
    dx.atan2(dy).to_degrees()
}

/// Clamp to `[0.0, 1.0]`.
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point2d_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(1.0, 0.0);
        assert!((a.distance_to(&b) - 1.0).abs() < 1e-9);
        assert!((a.aspect_distance_to(&b, 2.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint_and_centroid() {
        let a = Point2D::new(0.2, 0.4);
        let b = Point2D::new(0.4, 0.8);
        let mid = Point2D::midpoint(&a, &b);
        assert!((mid.x - 0.3).abs() < 1e-9);
        assert!((mid.y - 0.6).abs() < 1e-9);

        let c = Point2D::centroid(&[a, b]).unwrap();
        assert_eq!(c, mid);
        assert!(Point2D::centroid(&[]).is_none());
    }

    #[test]
    fn test_right_angle() {
        let hip = Point2D::new(0.4, 0.5);
        let knee = Point2D::new(0.6, 0.5);
        let ankle = Point2D::new(0.6, 0.7);
        assert!((angle_at(&hip, &knee, &ankle) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_straight_and_degenerate_angle() {
        let a = Point2D::new(0.5, 0.2);
        let b = Point2D::new(0.5, 0.5);
        let c = Point2D::new(0.5, 0.8);
        assert!((angle_at(&a, &b, &c) - 180.0).abs() < 1e-6);
        assert_eq!(angle_at(&b, &b, &c), 180.0);
    }

    #[test]
    fn test_tilt() {
        let top = Point2D::new(0.5, 0.2);
        assert!(tilt_from_vertical(&top, &Point2D::new(0.5, 0.6)).abs() < 1e-9);
        assert!((tilt_from_vertical(&top, &Point2D::new(0.9, 0.6)) - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_lerp() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(1.0, 1.0);
        let mid = Point2D::lerp(&a, &b, 0.5);
        assert!((mid.x - 0.5).abs() < 1e-9);
        assert_eq!(Point2D::lerp(&a, &b, 2.0), b);
    }
}
