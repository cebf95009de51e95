use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::desk::{round1, DeskInput, DeskStrategy};
use crate::error::{AnalysisError, CalibrationError};
use crate::height::{
    estimate_height_from_body, estimate_height_from_face, Calibration, FaceRatioParams,
};
use crate::landmarks::LandmarkProvider;
use crate::posture::{assess_posture, compute_metrics, PostureAssessment};
use crate::result::{
    AnalysisResult, DegradedReason, DetectionQuality, FallbackReason, HeightSource, Outcome,
    PostureClass,
};

pub const MAX_CURRENT_DESK_HEIGHT_CM: f32 = 200.0;
pub const MIN_USER_HEIGHT_CM: f32 = 50.0;
pub const MAX_USER_HEIGHT_CM: f32 = 272.0;

/// Analysis tuning, usually read from the `[analysis]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub strategy: DeskStrategy,
    /// Used when neither the caller nor the landmarks give a height.
    pub default_user_height_cm: f32,
    pub face_ratio: FaceRatioParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            strategy: DeskStrategy::default(),
            default_user_height_cm: 170.0,
            face_ratio: FaceRatioParams::default(),
        }
    }
}

/// Per-call inputs. The calibration travels with the request so concurrent
/// analyses never share mutable state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisRequest {
    /// 0 when the desk height was never set.
    pub current_desk_height_cm: f32,
    /// Takes precedence over any estimate.
    pub user_height_cm: Option<f32>,
    pub calibration: Option<Calibration>,
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let current = self.current_desk_height_cm;
        if !(current.is_finite() && (0.0..=MAX_CURRENT_DESK_HEIGHT_CM).contains(&current)) {
            return Err(AnalysisError::CurrentHeightOutOfRange(current));
        }
        if let Some(value) = self.user_height_cm {
            if !(value.is_finite() && (MIN_USER_HEIGHT_CM..=MAX_USER_HEIGHT_CM).contains(&value)) {
                return Err(AnalysisError::UserHeightOutOfRange {
                    value,
                    min: MIN_USER_HEIGHT_CM,
                    max: MAX_USER_HEIGHT_CM,
                });
            }
        }
        Ok(())
    }
}

/// Full pipeline: landmarks → posture metrics → user height → desk height
pub struct Pipeline<P> {
    provider: P,
    config: AnalysisConfig,
}

impl<P: LandmarkProvider> Pipeline<P> {
    pub fn new(provider: P, config: AnalysisConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Decode an encoded image (PNG, JPEG, ...) and analyze it.
    ///
    /// Undecodable input yields a fallback result, not an error.
    pub fn analyze_bytes(
        &mut self,
        bytes: &[u8],
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        request.validate()?;
        match image::load_from_memory(bytes) {
            Ok(img) => Ok(self.run(&img, request)),
            Err(e) => {
                log::warn!("failed to decode image ({} bytes): {}", bytes.len(), e);
                Ok(AnalysisResult::fallback(
                    request.current_desk_height_cm,
                    FallbackReason::InvalidImage,
                ))
            }
        }
    }

    /// Analyze a decoded frame. Only a malformed request is an error; detection
    /// failures degrade or fall back.
    pub fn analyze(
        &mut self,
        img: &DynamicImage,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        request.validate()?;
        Ok(self.run(img, request))
    }

    /// Calibrate from the eye distance of the face in `img`.
    pub fn calibrate(
        &mut self,
        img: &DynamicImage,
        actual_height_cm: f32,
    ) -> Result<Calibration, CalibrationError> {
        let face = detect_or_absent("face", self.provider.detect_face(img))
            .ok_or(CalibrationError::NoFaceDetected)?;
        Calibration::from_face(actual_height_cm, &face)
    }

    fn run(&mut self, img: &DynamicImage, request: &AnalysisRequest) -> AnalysisResult {
        let (width, height) = img.dimensions();
        let current = request.current_desk_height_cm;
        log::info!("analyzing {width}x{height} frame, current desk height {current}cm");

        let body = detect_or_absent("body", self.provider.detect_body(img)).filter(|b| {
            let usable = b.is_finite();
            if !usable {
                log::warn!("body landmarks contain non-finite coordinates, ignoring pose");
            }
            usable
        });
        let face = detect_or_absent("face", self.provider.detect_face(img));

        let outcome = match (&body, &face) {
            (None, None) => {
                return AnalysisResult::fallback(current, FallbackReason::NoPersonDetected)
            }
            (Some(_), Some(_)) => Outcome::Complete,
            (Some(_), None) => Outcome::Degraded(DegradedReason::BodyOnly),
            (None, Some(_)) => Outcome::Degraded(DegradedReason::FaceOnly),
        };
        log::debug!("landmarks extracted: body={} face={}", body.is_some(), face.is_some());

        let metrics = body.as_ref().map(compute_metrics);
        let assessment = body.as_ref().map_or_else(PostureAssessment::no_pose, |b| {
            assess_posture(b, width, height)
        });
        if let Some(m) = &metrics {
            log::info!(
                "posture: {:?} (confidence {:.2})",
                m.posture_type,
                m.posture_confidence
            );
        }

        let (user_height_cm, height_source) = if let Some(provided) = request.user_height_cm {
            (provided, HeightSource::Provided)
        } else if let Some(face) = &face {
            let cm = estimate_height_from_face(
                face,
                height,
                request.calibration.as_ref(),
                &self.config.face_ratio,
            );
            (cm, HeightSource::Face)
        } else if let Some(metres) = body
            .as_ref()
            .and_then(|b| estimate_height_from_body(b, height))
        {
            (metres * 100.0, HeightSource::Body)
        } else {
            log::warn!(
                "no height estimate available, assuming {}cm",
                self.config.default_user_height_cm
            );
            (self.config.default_user_height_cm, HeightSource::Default)
        };
        log::info!("user height: {user_height_cm:.1}cm ({height_source:?})");

        let (ideal_height, breakdown) = self.config.strategy.recommend(&DeskInput {
            user_height_cm,
            metrics: metrics.as_ref(),
            assessment: &assessment,
            current_desk_height_cm: current,
        });
        log::info!("ideal desk height: {ideal_height}cm ({:?})", self.config.strategy);

        let message = match outcome {
            Outcome::Degraded(reason) => {
                format!("Partial analysis ({reason}). Ideal height: {ideal_height}cm")
            }
            _ => format!("Analysis complete. Ideal height: {ideal_height}cm"),
        };

        AnalysisResult {
            success: true,
            ideal_height,
            current_height: current,
            posture: metrics
                .as_ref()
                .map_or(PostureClass::Unknown, |m| m.posture_type.into()),
            confidence: metrics.as_ref().map_or(0.0, |m| m.posture_confidence),
            user_height_estimated: Some(round1(user_height_cm)),
            height_source: Some(height_source),
            analysis_breakdown: Some(breakdown),
            posture_analysis: Some(assessment),
            detection_quality: Some(if face.is_some() {
                DetectionQuality::Good
            } else {
                DetectionQuality::Limited
            }),
            outcome,
            message,
        }
    }
}

fn detect_or_absent<T>(what: &str, detection: Result<Option<T>>) -> Option<T> {
    match detection {
        Ok(found) => {
            if found.is_none() {
                log::debug!("no {what} landmarks detected");
            }
            found
        }
        Err(e) => {
            log::warn!("{what} detection failed: {e:#}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let ok = AnalysisRequest {
            current_desk_height_cm: 72.0,
            user_height_cm: Some(180.0),
            calibration: None,
        };
        assert!(ok.validate().is_ok());

        let bad_current = AnalysisRequest {
            current_desk_height_cm: 250.0,
            ..ok
        };
        assert_eq!(
            bad_current.validate(),
            Err(AnalysisError::CurrentHeightOutOfRange(250.0))
        );

        let bad_user = AnalysisRequest {
            user_height_cm: Some(f32::NAN),
            ..ok
        };
        assert!(matches!(
            bad_user.validate(),
            Err(AnalysisError::UserHeightOutOfRange { .. })
        ));
    }

    #[test]
    fn test_config_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.strategy, DeskStrategy::Ergonomic);
        assert_eq!(cfg.default_user_height_cm, 170.0);
    }
}
