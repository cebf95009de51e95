//! User height estimation from facial or body proportions.
//!
//! Neither estimator fails: degenerate input resolves to a documented default so a
//! height is always available to the desk calculator.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::geometry::distance;
use crate::landmarks::{BodyLandmarks, FaceLandmarks};

/// Average adult interpupillary distance.
pub const AVERAGE_IPD_CM: f32 = 6.5;
/// Returned by the face estimator when the measurement is unusable.
pub const DEFAULT_FACE_HEIGHT_CM: f32 = 170.0;
pub const FACE_HEIGHT_MIN_CM: f32 = 150.0;
pub const FACE_HEIGHT_MAX_CM: f32 = 200.0;

/// Accepted range for [`FaceRatioParams::head_height_coefficient`].
pub const HEAD_COEFFICIENT_MIN: f32 = 2.2;
pub const HEAD_COEFFICIENT_MAX: f32 = 2.5;

/// Torso (shoulder center to hip center) as a fraction of standing height.
pub const TORSO_TO_HEIGHT_RATIO: f32 = 0.288;
pub const BODY_HEIGHT_MIN_M: f32 = 1.5;
pub const BODY_HEIGHT_MAX_M: f32 = 2.0;
// Assumes the subject stands roughly two metres from the camera.
const BODY_PIXELS_PER_METRE: f32 = 1000.0;

/// Pixels-per-centimeter scale from a prior calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pixels_per_cm: f32,
}

impl Calibration {
    pub fn new(pixels_per_cm: f32) -> Result<Self, CalibrationError> {
        if !(pixels_per_cm.is_finite() && pixels_per_cm > 0.0) {
            return Err(CalibrationError::InvalidScale(pixels_per_cm));
        }
        Ok(Self { pixels_per_cm })
    }

    pub fn pixels_per_cm(&self) -> f32 {
        self.pixels_per_cm
    }

    /// Derive the scale from the eye distance, assuming an average interpupillary
    /// distance. `actual_height_cm` is validated and logged but does not enter the
    /// formula.
    pub fn from_face(
        actual_height_cm: f32,
        face: &FaceLandmarks,
    ) -> Result<Self, CalibrationError> {
        validate_height(actual_height_cm)?;
        let eye_px = distance(face.left_eye.position, face.right_eye.position);
        if !(eye_px.is_finite() && eye_px > 0.0) {
            return Err(CalibrationError::DegenerateLandmarks);
        }
        let calibration = Self::new(eye_px / AVERAGE_IPD_CM)?;
        log::info!(
            "calibrated from face: eye distance {:.1}px, {:.3} px/cm (reported height {:.1}cm)",
            eye_px,
            calibration.pixels_per_cm,
            actual_height_cm
        );
        Ok(calibration)
    }

    /// Derive the scale from a known pixel span of the user's full height.
    pub fn from_measurement(
        actual_height_cm: f32,
        measured_pixels: f32,
    ) -> Result<Self, CalibrationError> {
        validate_height(actual_height_cm)?;
        if !(measured_pixels.is_finite() && measured_pixels > 0.0) {
            return Err(CalibrationError::InvalidMeasurement(measured_pixels));
        }
        let calibration = Self::new(measured_pixels / actual_height_cm)?;
        log::info!(
            "calibrated from measurement: {:.1}px over {:.1}cm, {:.3} px/cm",
            measured_pixels,
            actual_height_cm,
            calibration.pixels_per_cm
        );
        Ok(calibration)
    }
}

fn validate_height(actual_height_cm: f32) -> Result<(), CalibrationError> {
    if actual_height_cm.is_finite() && actual_height_cm > 0.0 {
        Ok(())
    } else {
        Err(CalibrationError::InvalidHeight(actual_height_cm))
    }
}

/// Tunable proportions for the face-ratio estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceRatioParams {
    /// Head height over eye-to-chin distance, typically 2.2 to 2.5.
    pub head_height_coefficient: f32,
    /// Body height in head heights.
    pub head_to_body_ratio: f32,
    /// Height an uncalibrated full-frame figure is assumed to have.
    pub reference_height_cm: f32,
}

impl Default for FaceRatioParams {
    fn default() -> Self {
        Self {
            head_height_coefficient: 2.5,
            head_to_body_ratio: 7.5,
            reference_height_cm: 170.0,
        }
    }
}

/// Estimate the user's height in centimeters from pixel-space face landmarks.
///
/// With a calibration the pixel height is converted directly; without one it is
/// taken as a fraction of the frame against `reference_height_cm`. The result is
/// clamped to [150, 200] cm, so a collapsed eye-to-chin span reads as 150 cm. A zero
/// frame height or a non-finite value falls back to 170 cm.
pub fn estimate_height_from_face(
    face: &FaceLandmarks,
    image_height: u32,
    calibration: Option<&Calibration>,
    params: &FaceRatioParams,
) -> f32 {
    match face_height_cm(face, image_height, calibration, params) {
        Some(cm) => cm.clamp(FACE_HEIGHT_MIN_CM, FACE_HEIGHT_MAX_CM),
        None => {
            log::warn!("face proportions unusable, assuming {DEFAULT_FACE_HEIGHT_CM}cm");
            DEFAULT_FACE_HEIGHT_CM
        }
    }
}

fn face_height_cm(
    face: &FaceLandmarks,
    image_height: u32,
    calibration: Option<&Calibration>,
    params: &FaceRatioParams,
) -> Option<f32> {
    let eye_px = distance(face.left_eye.position, face.right_eye.position);
    let eye_chin_px = distance(face.left_eye.position, face.chin.position);
    log::debug!("face: eye distance {eye_px:.1}px, eye to chin {eye_chin_px:.1}px");

    let coefficient = params
        .head_height_coefficient
        .clamp(HEAD_COEFFICIENT_MIN, HEAD_COEFFICIENT_MAX);
    let head_px = eye_chin_px * coefficient;
    let body_px = head_px * params.head_to_body_ratio;

    let cm = match calibration {
        Some(cal) => body_px / cal.pixels_per_cm(),
        None if image_height > 0 => body_px / image_height as f32 * params.reference_height_cm,
        None => return None,
    };
    (cm.is_finite() && cm >= 0.0).then_some(cm)
}

/// Estimate the user's height in meters from normalized body landmarks.
///
/// Scales the torso to pixels, extrapolates with the anthropometric torso ratio and
/// applies a fixed pixel-to-meter factor. `None` when the landmarks are degenerate.
pub fn estimate_height_from_body(body: &BodyLandmarks, image_height: u32) -> Option<f32> {
    if image_height == 0 || !body.is_finite() {
        return None;
    }
    let torso_px = distance(body.shoulder_center(), body.hip_center()) * image_height as f32;
    if torso_px <= 0.0 {
        return None;
    }
    let metres = torso_px / TORSO_TO_HEIGHT_RATIO / BODY_PIXELS_PER_METRE;
    log::debug!("body: torso {torso_px:.1}px, raw estimate {metres:.2}m");
    metres
        .is_finite()
        .then(|| metres.clamp(BODY_HEIGHT_MIN_M, BODY_HEIGHT_MAX_M))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use crate::landmarks::FacePoint;

    fn face(eye_px: f32, chin_drop_px: f32) -> FaceLandmarks {
        FaceLandmarks {
            left_eye: FacePoint::new(300.0, 200.0, 0.0),
            right_eye: FacePoint::new(300.0 + eye_px, 200.0, 0.0),
            nose_tip: FacePoint::new(300.0 + eye_px / 2.0, 240.0, -0.05),
            chin: FacePoint::new(300.0, 200.0 + chin_drop_px, 0.0),
        }
    }

    #[test]
    fn test_calibrated_round_trip() {
        let landmarks = face(65.0, 100.0);
        let cal = Calibration::from_face(180.0, &landmarks).unwrap();
        assert!((cal.pixels_per_cm() - 10.0).abs() < 1e-5);

        let params = FaceRatioParams::default();
        let height = estimate_height_from_face(&landmarks, 1080, Some(&cal), &params);
        // 100px * 2.5 * 7.5 = 1875px at 10 px/cm.
        assert!((height - 187.5).abs() < 1e-3);
    }

    #[test]
    fn test_uncalibrated_uses_frame_height() {
        let landmarks = face(65.0, 48.0);
        let params = FaceRatioParams::default();
        // 48 * 2.5 * 7.5 = 900px of a 900px frame -> reference height.
        let height = estimate_height_from_face(&landmarks, 900, None, &params);
        assert!((height - 170.0).abs() < 1e-3);
    }

    #[test]
    fn test_face_estimate_is_clamped() {
        let params = FaceRatioParams::default();
        let tall = estimate_height_from_face(&face(65.0, 100.0), 1080, None, &params);
        assert_eq!(tall, FACE_HEIGHT_MAX_CM);
        let short = estimate_height_from_face(&face(65.0, 10.0), 1080, None, &params);
        assert_eq!(short, FACE_HEIGHT_MIN_CM);
    }

    #[test]
    fn test_face_estimate_defaults_on_zero_frame() {
        let params = FaceRatioParams::default();
        let height = estimate_height_from_face(&face(65.0, 100.0), 0, None, &params);
        assert_eq!(height, DEFAULT_FACE_HEIGHT_CM);
    }

    #[test]
    fn test_chin_on_eye_clamps_to_floor() {
        let params = FaceRatioParams::default();
        let landmarks = face(65.0, 0.0);
        assert_eq!(
            estimate_height_from_face(&landmarks, 1080, None, &params),
            FACE_HEIGHT_MIN_CM
        );
        let cal = Calibration::new(10.0).unwrap();
        assert_eq!(
            estimate_height_from_face(&landmarks, 1080, Some(&cal), &params),
            FACE_HEIGHT_MIN_CM
        );
    }

    #[test]
    fn test_calibration_rejects_bad_input() {
        assert_eq!(
            Calibration::from_measurement(0.0, 500.0),
            Err(CalibrationError::InvalidHeight(0.0))
        );
        assert_eq!(
            Calibration::from_measurement(175.0, -3.0),
            Err(CalibrationError::InvalidMeasurement(-3.0))
        );
        assert_eq!(
            Calibration::from_face(175.0, &face(0.0, 100.0)),
            Err(CalibrationError::DegenerateLandmarks)
        );
        assert!(Calibration::new(f32::INFINITY).is_err());
    }

    #[test]
    fn test_measurement_calibration() {
        let cal = Calibration::from_measurement(175.0, 1750.0).unwrap();
        assert!((cal.pixels_per_cm() - 10.0).abs() < 1e-5);
    }

    fn body(shoulder_y: f32, hip_y: f32) -> BodyLandmarks {
        let p = |x, y| Point2D::new(x, y);
        BodyLandmarks {
            nose: p(0.5, 0.05),
            left_shoulder: p(0.4, shoulder_y),
            right_shoulder: p(0.6, shoulder_y),
            left_elbow: p(0.35, 0.3),
            right_elbow: p(0.65, 0.3),
            left_wrist: p(0.35, 0.4),
            right_wrist: p(0.65, 0.4),
            left_hip: p(0.45, hip_y),
            right_hip: p(0.55, hip_y),
            left_knee: p(0.45, 0.75),
            right_knee: p(0.55, 0.75),
            left_ankle: p(0.45, 0.95),
            right_ankle: p(0.55, 0.95),
        }
    }

    #[test]
    fn test_body_estimate() {
        // 0.3 * 2000px / 0.288 / 1000 = 2.083m, clamped.
        assert_eq!(estimate_height_from_body(&body(0.2, 0.5), 2000), Some(BODY_HEIGHT_MAX_M));
        // 0.3 * 1500px / 0.288 / 1000 = 1.5625m.
        let metres = estimate_height_from_body(&body(0.2, 0.5), 1500).unwrap();
        assert!((metres - 1.5625).abs() < 1e-4);
        // Small frames land on the lower bound.
        assert_eq!(estimate_height_from_body(&body(0.2, 0.5), 480), Some(BODY_HEIGHT_MIN_M));
    }

    #[test]
    fn test_body_estimate_unavailable() {
        assert_eq!(estimate_height_from_body(&body(0.4, 0.4), 1080), None);
        assert_eq!(estimate_height_from_body(&body(0.2, 0.5), 0), None);
        let mut broken = body(0.2, 0.5);
        broken.nose.x = f32::NAN;
        assert_eq!(estimate_height_from_body(&broken, 1080), None);
    }
}
