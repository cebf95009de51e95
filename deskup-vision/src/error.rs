//! Errors visible to callers of the analysis pipeline.
//!
//! Detection failures and numerical corner cases never show up here; they resolve
//! to fallback values inside the pipeline.

use thiserror::Error;

/// Rejected analysis request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("current desk height must be between 0 and 200 cm, got {0}")]
    CurrentHeightOutOfRange(f32),

    #[error("user height must be between {min} and {max} cm, got {value}")]
    UserHeightOutOfRange { value: f32, min: f32, max: f32 },
}

/// Calibration input that cannot produce a usable pixels-per-cm scale.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("actual height must be a positive number of centimeters, got {0}")]
    InvalidHeight(f32),

    #[error("measured pixels must be positive, got {0}")]
    InvalidMeasurement(f32),

    #[error("no face detected in calibration image")]
    NoFaceDetected,

    #[error("eye landmarks coincide, cannot derive a scale")]
    DegenerateLandmarks,

    #[error("pixels per cm must be positive and finite, got {0}")]
    InvalidScale(f32),
}
