use std::io::Cursor;

use anyhow::Result;
use deskup_vision::desk::{DeskStrategy, GLOBAL_MAX_CM, GLOBAL_MIN_CM};
use deskup_vision::result::{
    DegradedReason, DetectionQuality, FallbackReason, HeightSource, PostureClass,
};
use deskup_vision::{
    AnalysisConfig, AnalysisError, AnalysisRequest, BodyLandmarks, CalibrationError, FaceLandmarks,
    FacePoint, LandmarkProvider, Outcome, Pipeline, Point2D,
};
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Provider that replays fixed landmarks and records the frames it was given.
#[derive(Default)]
struct Scripted {
    body: Option<BodyLandmarks>,
    face: Option<FaceLandmarks>,
    body_fails: bool,
    seen: Vec<(u32, u32)>,
}

impl LandmarkProvider for Scripted {
    fn detect_body(&mut self, img: &DynamicImage) -> Result<Option<BodyLandmarks>> {
        self.seen.push(img.dimensions());
        if self.body_fails {
            anyhow::bail!("inference exploded");
        }
        Ok(self.body.clone())
    }

    fn detect_face(&mut self, _img: &DynamicImage) -> Result<Option<FaceLandmarks>> {
        Ok(self.face.clone())
    }
}

/// Seated person: knees level with hips, shoulders well below the nose.
fn seated_body() -> BodyLandmarks {
    BodyLandmarks {
        nose: Point2D::new(0.5, 0.1),
        left_shoulder: Point2D::new(0.4, 0.25),
        right_shoulder: Point2D::new(0.6, 0.25),
        left_elbow: Point2D::new(0.4, 0.4),
        right_elbow: Point2D::new(0.6, 0.4),
        left_wrist: Point2D::new(0.5, 0.4),
        right_wrist: Point2D::new(0.7, 0.4),
        left_hip: Point2D::new(0.45, 0.55),
        right_hip: Point2D::new(0.55, 0.55),
        left_knee: Point2D::new(0.4, 0.55),
        right_knee: Point2D::new(0.6, 0.55),
        left_ankle: Point2D::new(0.4, 0.9),
        right_ankle: Point2D::new(0.6, 0.9),
    }
}

/// Eyes 65px apart, chin 100px below the left eye.
fn face() -> FaceLandmarks {
    FaceLandmarks {
        left_eye: FacePoint::new(300.0, 200.0, 0.0),
        right_eye: FacePoint::new(365.0, 200.0, 0.0),
        nose_tip: FacePoint::new(332.5, 240.0, -0.05),
        chin: FacePoint::new(300.0, 300.0, 0.0),
    }
}

fn frame() -> DynamicImage {
    DynamicImage::new_rgb8(640, 480)
}

fn pipeline(provider: Scripted) -> Pipeline<Scripted> {
    env_logger::try_init().ok();
    Pipeline::new(provider, AnalysisConfig::default())
}

#[test]
fn test_undecodable_image_falls_back() -> Result<()> {
    let mut pipeline = pipeline(Scripted::default());
    let result = pipeline.analyze_bytes(b"definitely not a png", &AnalysisRequest::default())?;

    assert!(result.success);
    assert_eq!(result.ideal_height, 75.0);
    assert_eq!(result.posture, PostureClass::Unknown);
    assert_eq!(result.outcome, Outcome::Fallback(FallbackReason::InvalidImage));
    assert!(pipeline.provider_mut().seen.is_empty());
    Ok(())
}

#[test]
fn test_nobody_in_frame_clamps_current_height() -> Result<()> {
    let mut pipeline = pipeline(Scripted::default());
    let request = AnalysisRequest {
        current_desk_height_cm: 95.0,
        ..Default::default()
    };
    let result = pipeline.analyze(&frame(), &request)?;

    assert!(result.success);
    assert_eq!(result.ideal_height, 85.0);
    assert_eq!(result.confidence, 0.3);
    assert_eq!(
        result.outcome,
        Outcome::Fallback(FallbackReason::NoPersonDetected)
    );
    assert!(result.analysis_breakdown.is_none());
    Ok(())
}

#[test]
fn test_invalid_request_is_rejected() {
    let mut pipeline = pipeline(Scripted::default());
    let request = AnalysisRequest {
        current_desk_height_cm: 250.0,
        ..Default::default()
    };
    assert_eq!(
        pipeline.analyze(&frame(), &request).unwrap_err(),
        AnalysisError::CurrentHeightOutOfRange(250.0)
    );
}

#[test]
fn test_encoded_frame_complete_analysis() -> Result<()> {
    let mut png = Vec::new();
    frame().write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let mut pipeline = pipeline(Scripted {
        body: Some(seated_body()),
        face: Some(face()),
        ..Default::default()
    });
    let request = AnalysisRequest {
        user_height_cm: Some(240.0),
        current_desk_height_cm: 100.0,
        ..Default::default()
    };
    let result = pipeline.analyze_bytes(&png, &request)?;

    assert_eq!(pipeline.provider_mut().seen, vec![(640, 480)]);
    assert_eq!(result.outcome, Outcome::Complete);
    assert_eq!(result.posture, PostureClass::Sitting);
    assert!((result.confidence - 0.9).abs() < 1e-5);
    assert_eq!(result.detection_quality, Some(DetectionQuality::Good));
    assert!(result.message.starts_with("Analysis complete."));

    // Straight arms and torso leave only the sitting bonus: 60 - 2 = 58, blended
    // with the confident sitting pose as 0.7 * 58 + 0.3 * 100 = 70.6, inside [60, 76.8].
    assert!((result.ideal_height - 70.6).abs() < 1e-3, "{}", result.ideal_height);
    let breakdown = result.analysis_breakdown.expect("breakdown");
    assert_eq!(breakdown.strategy, DeskStrategy::Ergonomic);
    assert_eq!(breakdown.base_height_cm, 60.0);
    assert_eq!(breakdown.adjustments.len(), 4);
    assert_eq!(breakdown.adjustments["posture_bonus"], -2.0);
    assert_eq!(breakdown.total_adjustment_cm, -2.0);
    assert_eq!(breakdown.calculated_ideal_cm, result.ideal_height);
    Ok(())
}

#[test]
fn test_face_only_is_degraded() -> Result<()> {
    let mut pipeline = pipeline(Scripted {
        face: Some(face()),
        ..Default::default()
    });
    let result = pipeline.analyze(&frame(), &AnalysisRequest::default())?;

    assert_eq!(result.outcome, Outcome::Degraded(DegradedReason::FaceOnly));
    assert_eq!(result.posture, PostureClass::Unknown);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.height_source, Some(HeightSource::Face));
    // 1875px of body in a 480px frame is far above the clamp.
    assert_eq!(result.user_height_estimated, Some(200.0));
    assert!(result.message.starts_with("Partial analysis"));
    assert!(result.ideal_height >= GLOBAL_MIN_CM && result.ideal_height <= GLOBAL_MAX_CM);

    let breakdown = result.analysis_breakdown.expect("breakdown");
    assert!(breakdown.adjustments.is_empty());
    assert_eq!(breakdown.posture_type, None);
    Ok(())
}

#[test]
fn test_body_only_estimates_height_from_torso() -> Result<()> {
    let mut pipeline = pipeline(Scripted {
        body: Some(seated_body()),
        ..Default::default()
    });
    let result = pipeline.analyze(&frame(), &AnalysisRequest::default())?;

    assert_eq!(result.outcome, Outcome::Degraded(DegradedReason::BodyOnly));
    assert_eq!(result.detection_quality, Some(DetectionQuality::Limited));
    assert_eq!(result.height_source, Some(HeightSource::Body));
    // 144px torso extrapolates to 0.5m, clamped up to 1.5m.
    assert_eq!(result.user_height_estimated, Some(150.0));
    // User band for 150cm lies below the global floor.
    assert_eq!(result.ideal_height, 60.0);
    Ok(())
}

#[test]
fn test_provided_height_wins() -> Result<()> {
    let mut pipeline = pipeline(Scripted {
        body: Some(seated_body()),
        face: Some(face()),
        ..Default::default()
    });
    let request = AnalysisRequest {
        user_height_cm: Some(180.0),
        ..Default::default()
    };
    let result = pipeline.analyze(&frame(), &request)?;

    assert_eq!(result.height_source, Some(HeightSource::Provided));
    assert_eq!(result.user_height_estimated, Some(180.0));
    Ok(())
}

#[test]
fn test_provider_error_counts_as_absent() -> Result<()> {
    let mut pipeline = pipeline(Scripted {
        face: Some(face()),
        body_fails: true,
        ..Default::default()
    });
    let result = pipeline.analyze(&frame(), &AnalysisRequest::default())?;

    assert!(result.success);
    assert_eq!(result.outcome, Outcome::Degraded(DegradedReason::FaceOnly));
    Ok(())
}

#[test]
fn test_calibration_feeds_face_estimate() -> Result<()> {
    let mut pipeline = pipeline(Scripted {
        face: Some(face()),
        ..Default::default()
    });
    let calibration = pipeline.calibrate(&frame(), 180.0)?;
    assert!((calibration.pixels_per_cm() - 10.0).abs() < 1e-5);

    let request = AnalysisRequest {
        calibration: Some(calibration),
        ..Default::default()
    };
    let result = pipeline.analyze(&frame(), &request)?;
    assert_eq!(result.user_height_estimated, Some(187.5));
    Ok(())
}

#[test]
fn test_calibration_needs_a_face() {
    let mut pipeline = pipeline(Scripted::default());
    assert_eq!(
        pipeline.calibrate(&frame(), 180.0),
        Err(CalibrationError::NoFaceDetected)
    );
}

#[test]
fn test_calibration_rejects_bad_height() {
    let mut pipeline = pipeline(Scripted {
        face: Some(face()),
        ..Default::default()
    });
    assert_eq!(
        pipeline.calibrate(&frame(), -5.0),
        Err(CalibrationError::InvalidHeight(-5.0))
    );
}

#[test]
fn test_non_finite_body_is_ignored() -> Result<()> {
    let mut broken = seated_body();
    broken.left_shoulder.y = f32::NAN;

    let mut pipeline = pipeline(Scripted {
        body: Some(broken.clone()),
        face: Some(face()),
        ..Default::default()
    });
    let request = AnalysisRequest {
        user_height_cm: Some(250.0),
        ..Default::default()
    };
    let result = pipeline.analyze(&frame(), &request)?;

    assert_eq!(result.outcome, Outcome::Degraded(DegradedReason::FaceOnly));
    assert_eq!(result.posture, PostureClass::Unknown);
    let breakdown = result.analysis_breakdown.as_ref().expect("breakdown");
    assert!(breakdown.adjustments.is_empty());
    assert!(breakdown.total_adjustment_cm.is_finite());
    assert!(result.ideal_height.is_finite());

    let json = serde_json::to_value(&result)?;
    assert!(json["analysis_breakdown"]["total_adjustment_cm"].is_number());
    assert_eq!(json["posture_analysis"]["shoulder_tension"], 0.0);
    assert_eq!(json["posture_analysis"]["issues"][0], "no_pose_detected");

    // Without a face the frame has nobody usable in it.
    let provider = Scripted {
        body: Some(broken),
        ..Default::default()
    };
    let mut body_only = Pipeline::new(provider, AnalysisConfig::default());
    let result = body_only.analyze(&frame(), &request)?;
    assert_eq!(
        result.outcome,
        Outcome::Fallback(FallbackReason::NoPersonDetected)
    );
    Ok(())
}

#[test]
fn test_elbow_ratio_strategy() -> Result<()> {
    let config = AnalysisConfig {
        strategy: DeskStrategy::ElbowRatio,
        ..Default::default()
    };
    let provider = Scripted {
        body: Some(seated_body()),
        face: Some(face()),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(provider, config);
    let request = AnalysisRequest {
        user_height_cm: Some(175.0),
        ..Default::default()
    };
    let result = pipeline.analyze(&frame(), &request)?;

    // 175 * 0.63 = 110.25, no shoulder issues.
    assert!((result.ideal_height - 110.3).abs() < 1e-3);
    let breakdown = result.analysis_breakdown.expect("breakdown");
    assert_eq!(breakdown.strategy, DeskStrategy::ElbowRatio);
    assert!(breakdown.adjustments.is_empty());
    assert_eq!(result.posture_analysis.map(|a| a.posture_score), Some(100));
    Ok(())
}

#[test]
fn test_result_json_shape() -> Result<()> {
    let mut pipeline = pipeline(Scripted {
        face: Some(face()),
        ..Default::default()
    });
    let result = pipeline.analyze(&frame(), &AnalysisRequest::default())?;
    let json = serde_json::to_value(&result)?;

    assert_eq!(json["success"], true);
    assert_eq!(json["posture"], "unknown");
    assert_eq!(json["height_source"], "face");
    assert_eq!(json["outcome"]["status"], "degraded");
    assert_eq!(json["outcome"]["reason"], "face_only");
    Ok(())
}
