//! Plane geometry over landmark coordinates.
//!
//! All functions are space-agnostic: they work the same on normalized [0,1]
//! coordinates and on pixel coordinates, as long as both arguments share a space.

use serde::{Deserialize, Serialize};

/// Rays shorter than this are treated as degenerate.
const MIN_RAY_LENGTH: f32 = 1e-9;

/// A 2D point, normalized or in pixels depending on where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale a normalized point into pixel space.
    pub fn to_pixels(self, width: u32, height: u32) -> Self {
        Self::new(self.x * width as f32, self.y * height as f32)
    }

    pub fn dot(self, other: Point2D) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Sub for Point2D {
    type Output = Point2D;

    fn sub(self, other: Point2D) -> Point2D {
        Point2D::new(self.x - other.x, self.y - other.y)
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point2D, b: Point2D) -> f32 {
    (b - a).norm()
}

/// Arithmetic midpoint of a left/right landmark pair.
pub fn midpoint(a: Point2D, b: Point2D) -> Point2D {
    Point2D::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Angle in degrees between two free vectors, or `None` if either is zero-length.
pub fn try_vector_angle(v1: Point2D, v2: Point2D) -> Option<f32> {
    let n1 = v1.norm();
    let n2 = v2.norm();
    if !(n1 > MIN_RAY_LENGTH && n2 > MIN_RAY_LENGTH) {
        return None;
    }
    // Rounding can push the cosine a hair past ±1, which arccos turns into NaN.
    let cosine = (v1.dot(v2) / (n1 * n2)).clamp(-1.0, 1.0);
    Some(cosine.acos().to_degrees())
}

/// Angle in degrees between two free vectors, in [0, 180].
///
/// Returns 0.0 for a zero-length vector; use [`try_vector_angle`] to detect that case.
pub fn vector_angle(v1: Point2D, v2: Point2D) -> f32 {
    try_vector_angle(v1, v2).unwrap_or(0.0)
}

/// Angle at vertex `b` between rays b→a and b→c, or `None` when a ray is degenerate.
pub fn try_vertex_angle(a: Point2D, b: Point2D, c: Point2D) -> Option<f32> {
    try_vector_angle(a - b, c - b)
}

/// Angle at vertex `b` between rays b→a and b→c, in [0, 180].
///
/// Returns 0.0 when `a == b` or `c == b`.
pub fn vertex_angle(a: Point2D, b: Point2D, c: Point2D) -> f32 {
    try_vertex_angle(a, b, c).unwrap_or(0.0)
}
