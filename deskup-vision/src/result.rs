use std::fmt;

use serde::{Deserialize, Serialize};

use crate::desk::{round1, Breakdown};
use crate::posture::{PostureAssessment, PostureType};

pub const FALLBACK_DEFAULT_CM: f32 = 75.0;
pub const FALLBACK_MIN_CM: f32 = 70.0;
pub const FALLBACK_MAX_CM: f32 = 85.0;
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureClass {
    Sitting,
    Standing,
    Unknown,
}

impl From<PostureType> for PostureClass {
    fn from(value: PostureType) -> Self {
        match value {
            PostureType::Sitting => PostureClass::Sitting,
            PostureType::Standing => PostureClass::Standing,
        }
    }
}

/// Where the user height fed into the desk calculation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightSource {
    Provided,
    Face,
    Body,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionQuality {
    /// Face landmarks were found.
    Good,
    /// Body only.
    Limited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    FaceOnly,
    BodyOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    InvalidImage,
    NoPersonDetected,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::FaceOnly => write!(f, "face only, no body pose detected"),
            DegradedReason::BodyOnly => write!(f, "body only, no face detected"),
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::InvalidImage => write!(f, "invalid image"),
            FallbackReason::NoPersonDetected => write!(f, "no person detected"),
        }
    }
}

/// How far the pipeline got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Complete,
    Degraded(DegradedReason),
    Fallback(FallbackReason),
}

/// Result of one analysis. All heights in centimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub ideal_height: f32,
    pub current_height: f32,
    pub posture: PostureClass,
    /// In [0, 1].
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_height_estimated: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_source: Option<HeightSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_breakdown: Option<Breakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_analysis: Option<PostureAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_quality: Option<DetectionQuality>,
    pub outcome: Outcome,
    pub message: String,
}

impl AnalysisResult {
    /// Safe suggestion when no analysis was possible: the current desk height held
    /// to [70, 85] cm, or 75 cm when none is set.
    pub fn fallback(current_height: f32, reason: FallbackReason) -> Self {
        let ideal_height = if current_height > 0.0 {
            round1(current_height.clamp(FALLBACK_MIN_CM, FALLBACK_MAX_CM))
        } else {
            FALLBACK_DEFAULT_CM
        };
        log::warn!("falling back to basic calculation: {reason}");
        Self {
            success: true,
            ideal_height,
            current_height,
            posture: PostureClass::Unknown,
            confidence: FALLBACK_CONFIDENCE,
            user_height_estimated: None,
            height_source: None,
            analysis_breakdown: None,
            posture_analysis: None,
            detection_quality: None,
            outcome: Outcome::Fallback(reason),
            message: format!(
                "Basic calculation: {ideal_height}cm (full analysis unavailable: {reason})"
            ),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_heights() {
        assert_eq!(
            AnalysisResult::fallback(0.0, FallbackReason::InvalidImage).ideal_height,
            75.0
        );
        assert_eq!(
            AnalysisResult::fallback(95.0, FallbackReason::NoPersonDetected).ideal_height,
            85.0
        );
        assert_eq!(
            AnalysisResult::fallback(62.0, FallbackReason::NoPersonDetected).ideal_height,
            70.0
        );
        assert_eq!(
            AnalysisResult::fallback(78.4, FallbackReason::NoPersonDetected).ideal_height,
            78.4
        );
    }

    #[test]
    fn test_fallback_is_successful() {
        let result = AnalysisResult::fallback(0.0, FallbackReason::NoPersonDetected);
        assert!(result.success);
        assert!(result.is_fallback());
        assert_eq!(result.posture, PostureClass::Unknown);
        assert!(result.message.contains("no person detected"));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::Fallback(FallbackReason::InvalidImage)).unwrap();
        assert_eq!(json["status"], "fallback");
        assert_eq!(json["reason"], "invalid_image");
        let json = serde_json::to_value(Outcome::Complete).unwrap();
        assert_eq!(json["status"], "complete");
    }
}
