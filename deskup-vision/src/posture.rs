//! Posture metrics derived from body landmarks.
//!
//! [`compute_metrics`] works on normalized coordinates and feeds the ergonomic desk
//! strategy. [`assess_posture`] works in pixels and produces the issue list used by
//! the elbow-ratio strategy.
//!
//! The sitting/standing split compares knee and hip heights in the frame. It assumes
//! a roughly front-facing, upright camera; a tilted or top-down camera will
//! misclassify.

use serde::{Deserialize, Serialize};

use crate::geometry::{try_vector_angle, try_vertex_angle, Point2D};
use crate::landmarks::BodyLandmarks;

pub const ELBOW_ANGLE_IDEAL: f32 = 90.0;

/// knee_center.y / hip_center.y above this reads as sitting.
pub const SITTING_RATIO_THRESHOLD: f32 = 0.85;
/// Ratio at which the classification is most confident.
pub const CONFIDENCE_PEAK_RATIO: f32 = 0.9;

const BODY_HEIGHT_SCALE: f32 = 2.5;
const MIN_HIP_HEIGHT: f32 = 1e-6;

const SHOULDER_RAISE_MARGIN_PX: f32 = 50.0;
const UNEVEN_SHOULDER_PX: f32 = 30.0;
const SHOULDER_RAISED_PENALTY: u8 = 20;
const UNEVEN_SHOULDER_PENALTY: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureType {
    Sitting,
    Standing,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElbowAngles {
    pub left: f32,
    pub right: f32,
    pub average: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureMetrics {
    pub vertical_alignment: f32,
    pub shoulder_symmetry: f32,
    pub hip_symmetry: f32,
    pub elbow_angles: ElbowAngles,
    pub torso_inclination: f32,
    pub posture_type: PostureType,
    /// Clamped to [0, 1].
    pub posture_confidence: f32,
    /// Normalized-coordinate units, not physical.
    pub relative_body_height: f32,
}

/// Compute posture metrics from normalized body landmarks.
pub fn compute_metrics(body: &BodyLandmarks) -> PostureMetrics {
    let shoulder_center = body.shoulder_center();
    let hip_center = body.hip_center();
    let knee_center = body.knee_center();

    let vertical_alignment = (shoulder_center.y - hip_center.y).abs();
    let shoulder_symmetry = (body.left_shoulder.y - body.right_shoulder.y).abs();
    let hip_symmetry = (body.left_hip.y - body.right_hip.y).abs();

    let left = elbow_angle(body.left_shoulder, body.left_elbow, body.left_wrist);
    let right = elbow_angle(body.right_shoulder, body.right_elbow, body.right_wrist);
    let elbow_angles = ElbowAngles {
        left,
        right,
        average: (left + right) / 2.0,
    };

    let torso_inclination =
        try_vector_angle(hip_center - body.nose, Point2D::new(0.0, 1.0)).unwrap_or(0.0);

    let (posture_type, posture_confidence) = classify(knee_center.y, hip_center.y);

    let relative_body_height = (body.nose.y - hip_center.y).abs() * BODY_HEIGHT_SCALE;

    PostureMetrics {
        vertical_alignment,
        shoulder_symmetry,
        hip_symmetry,
        elbow_angles,
        torso_inclination,
        posture_type,
        posture_confidence,
        relative_body_height,
    }
}

// A collapsed arm contributes no adjustment rather than a bogus 0°.
fn elbow_angle(shoulder: Point2D, elbow: Point2D, wrist: Point2D) -> f32 {
    try_vertex_angle(shoulder, elbow, wrist).unwrap_or_else(|| {
        log::debug!("degenerate arm landmarks, using ideal elbow angle");
        ELBOW_ANGLE_IDEAL
    })
}

fn classify(knee_y: f32, hip_y: f32) -> (PostureType, f32) {
    if hip_y.abs() < MIN_HIP_HEIGHT {
        log::debug!("hip center on the top edge, posture ratio undefined");
        return (PostureType::Standing, 0.0);
    }
    let ratio = knee_y / hip_y;
    if !ratio.is_finite() {
        return (PostureType::Standing, 0.0);
    }

    let posture_type = if ratio > SITTING_RATIO_THRESHOLD {
        PostureType::Sitting
    } else {
        PostureType::Standing
    };

    let raw = 1.0 - (ratio - CONFIDENCE_PEAK_RATIO).abs();
    if !(0.0..=1.0).contains(&raw) {
        log::debug!("posture confidence {raw:.3} outside [0, 1], clamping");
    }
    (posture_type, raw.clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureIssue {
    ShouldersRaised,
    UnevenShoulders,
    NoPoseDetected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureAssessment {
    /// 0 (relaxed) to 100.
    pub shoulder_tension: f32,
    /// 100 for no issues, floored at 0.
    pub posture_score: u8,
    pub issues: Vec<PostureIssue>,
}

impl PostureAssessment {
    /// Assessment reported when no body was detected.
    pub fn no_pose() -> Self {
        Self {
            shoulder_tension: 0.0,
            posture_score: 0,
            issues: vec![PostureIssue::NoPoseDetected],
        }
    }

    pub fn has(&self, issue: PostureIssue) -> bool {
        self.issues.contains(&issue)
    }
}

/// Flag shoulder problems using pixel distances in a `width` x `height` frame.
pub fn assess_posture(body: &BodyLandmarks, width: u32, height: u32) -> PostureAssessment {
    let nose = body.nose.to_pixels(width, height);
    let left = body.left_shoulder.to_pixels(width, height);
    let right = body.right_shoulder.to_pixels(width, height);

    let slope = (left.y - right.y).abs();
    let mut assessment = PostureAssessment {
        shoulder_tension: (slope * 10.0).min(100.0),
        posture_score: 100,
        issues: Vec::new(),
    };

    // Image y grows downwards: shoulders less than a margin below the nose are hunched.
    let shoulder_y = (left.y + right.y) / 2.0;
    if shoulder_y < nose.y + SHOULDER_RAISE_MARGIN_PX {
        assessment.issues.push(PostureIssue::ShouldersRaised);
        assessment.posture_score = assessment.posture_score.saturating_sub(SHOULDER_RAISED_PENALTY);
    }

    if slope > UNEVEN_SHOULDER_PX {
        assessment.issues.push(PostureIssue::UnevenShoulders);
        assessment.posture_score = assessment.posture_score.saturating_sub(UNEVEN_SHOULDER_PENALTY);
    }

    assessment
}
