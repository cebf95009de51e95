use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::geometry::{midpoint, Point2D};

/// Body keypoints of a single person, in normalized [0,1] image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyLandmarks {
    pub nose: Point2D,
    pub left_shoulder: Point2D,
    pub right_shoulder: Point2D,
    pub left_elbow: Point2D,
    pub right_elbow: Point2D,
    pub left_wrist: Point2D,
    pub right_wrist: Point2D,
    pub left_hip: Point2D,
    pub right_hip: Point2D,
    pub left_knee: Point2D,
    pub right_knee: Point2D,
    pub left_ankle: Point2D,
    pub right_ankle: Point2D,
}

impl BodyLandmarks {
    pub fn shoulder_center(&self) -> Point2D {
        midpoint(self.left_shoulder, self.right_shoulder)
    }

    pub fn hip_center(&self) -> Point2D {
        midpoint(self.left_hip, self.right_hip)
    }

    pub fn knee_center(&self) -> Point2D {
        midpoint(self.left_knee, self.right_knee)
    }

    fn points(&self) -> [Point2D; 13] {
        [
            self.nose,
            self.left_shoulder,
            self.right_shoulder,
            self.left_elbow,
            self.right_elbow,
            self.left_wrist,
            self.right_wrist,
            self.left_hip,
            self.right_hip,
            self.left_knee,
            self.right_knee,
            self.left_ankle,
            self.right_ankle,
        ]
    }

    /// True when every keypoint holds finite coordinates.
    pub fn is_finite(&self) -> bool {
        self.points().iter().all(|p| p.is_finite())
    }
}

/// A face keypoint in pixel space with the detector's relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FacePoint {
    pub position: Point2D,
    pub z: f32,
}

impl FacePoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Point2D::new(x, y),
            z,
        }
    }
}

/// Face keypoints used for height estimation and calibration, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: FacePoint,
    pub right_eye: FacePoint,
    pub nose_tip: FacePoint,
    pub chin: FacePoint,
}

/// Source of landmarks for a decoded frame.
///
/// Implementations return `Ok(None)` when nobody is visible. Errors are reserved for
/// inference failures; the pipeline logs them and treats the landmarks as absent.
pub trait LandmarkProvider {
    fn detect_body(&mut self, img: &DynamicImage) -> Result<Option<BodyLandmarks>>;

    fn detect_face(&mut self, img: &DynamicImage) -> Result<Option<FaceLandmarks>>;
}
