//! ONNX Runtime implementation of [`LandmarkProvider`].
//!
//! Body: MoveNet single-pose, input `[1, 192, 192, 3]` int32 RGB, output
//! `[1, 1, 17, 3]` holding (y, x, score) per COCO keypoint, normalized to the input.
//!
//! Face: face-mesh, input `[1, 192, 192, 3]` float32 RGB in [0, 1], outputs
//! `[1, 1404]` (468 x/y/z in input pixels) and `[1, 1]` face-presence logit.
//!
//! Both models see a letterboxed square copy of the frame; coordinates are mapped
//! back to the source frame before they leave this module.

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::{session::Session, value::Value};
use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;
use crate::landmarks::{BodyLandmarks, FaceLandmarks, FacePoint, LandmarkProvider};

const MOVENET_INPUT: u32 = 192;
const FACE_MESH_INPUT: u32 = 192;
const MOVENET_KEYPOINTS: usize = 17;
const FACE_MESH_POINTS: usize = 468;

// COCO keypoint order used by MoveNet.
const KP_NOSE: usize = 0;
const KP_LEFT_SHOULDER: usize = 5;
const KP_RIGHT_SHOULDER: usize = 6;
const KP_LEFT_ELBOW: usize = 7;
const KP_RIGHT_ELBOW: usize = 8;
const KP_LEFT_WRIST: usize = 9;
const KP_RIGHT_WRIST: usize = 10;
const KP_LEFT_HIP: usize = 11;
const KP_RIGHT_HIP: usize = 12;
const KP_LEFT_KNEE: usize = 13;
const KP_RIGHT_KNEE: usize = 14;
const KP_LEFT_ANKLE: usize = 15;
const KP_RIGHT_ANKLE: usize = 16;

// Face-mesh vertices.
const MESH_LEFT_EYE: usize = 33;
const MESH_RIGHT_EYE: usize = 263;
const MESH_NOSE_TIP: usize = 1;
const MESH_CHIN: usize = 152;

/// Model locations and acceptance thresholds (`[models]` config section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub body: PathBuf,
    pub face: PathBuf,
    /// Minimum mean keypoint score over the upper body.
    pub body_score_threshold: f32,
    /// Minimum face-presence probability.
    pub face_score_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            body: PathBuf::from("/usr/local/share/deskup/models/movenet_singlepose_lightning.onnx"),
            face: PathBuf::from("/usr/local/share/deskup/models/face_mesh.onnx"),
            body_score_threshold: 0.3,
            face_score_threshold: 0.5,
        }
    }
}

/// Square, padded copy of a frame and the transform back to frame pixels.
struct Letterbox {
    canvas: image::RgbImage,
    scale: f32,
    offset_x: f32,
    offset_y: f32,
}

impl Letterbox {
    fn new(img: &DynamicImage, size: u32) -> Self {
        let (width, height) = img.dimensions();
        let scale = size as f32 / width.max(height) as f32;
        let new_width = ((width as f32 * scale) as u32).clamp(1, size);
        let new_height = ((height as f32 * scale) as u32).clamp(1, size);

        let resized =
            img.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle);
        let mut canvas = DynamicImage::new_rgb8(size, size);
        let offset_x = (size - new_width) / 2;
        let offset_y = (size - new_height) / 2;
        image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

        Self {
            canvas: canvas.to_rgb8(),
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        }
    }

    /// Canvas pixel coordinates to frame pixel coordinates.
    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.offset_x) / self.scale, (y - self.offset_y) / self.scale)
    }
}

pub struct OnnxLandmarkProvider {
    body: Session,
    face: Session,
    config: DetectorConfig,
}

impl OnnxLandmarkProvider {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        Ok(Self {
            body: crate::model::load_session(&config.body).context("body pose model")?,
            face: crate::model::load_session(&config.face).context("face mesh model")?,
            config: config.clone(),
        })
    }
}

impl LandmarkProvider for OnnxLandmarkProvider {
    fn detect_body(&mut self, img: &DynamicImage) -> Result<Option<BodyLandmarks>> {
        let (width, height) = img.dimensions();
        let boxed = Letterbox::new(img, MOVENET_INPUT);
        let size = MOVENET_INPUT as usize;

        let input = Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            boxed.canvas.get_pixel(x as u32, y as u32)[c] as i32
        });
        let outputs = self.body.run(ort::inputs![Value::from_array(input)?])?;
        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        if data.len() < MOVENET_KEYPOINTS * 3 {
            anyhow::bail!(
                "pose model returned {} values, expected {}",
                data.len(),
                MOVENET_KEYPOINTS * 3
            );
        }

        // Keypoint in frame-normalized coordinates, with its score.
        let keypoint = |k: usize| {
            let y = data[k * 3] * MOVENET_INPUT as f32;
            let x = data[k * 3 + 1] * MOVENET_INPUT as f32;
            let (fx, fy) = boxed.to_frame(x, y);
            (Point2D::new(fx / width as f32, fy / height as f32), data[k * 3 + 2])
        };

        let torso = [
            KP_NOSE,
            KP_LEFT_SHOULDER,
            KP_RIGHT_SHOULDER,
            KP_LEFT_HIP,
            KP_RIGHT_HIP,
        ];
        let score = torso.iter().map(|&k| keypoint(k).1).sum::<f32>() / torso.len() as f32;
        log::debug!("body pose score {score:.3}");
        if score < self.config.body_score_threshold {
            return Ok(None);
        }

        let p = |k: usize| keypoint(k).0;
        Ok(Some(BodyLandmarks {
            nose: p(KP_NOSE),
            left_shoulder: p(KP_LEFT_SHOULDER),
            right_shoulder: p(KP_RIGHT_SHOULDER),
            left_elbow: p(KP_LEFT_ELBOW),
            right_elbow: p(KP_RIGHT_ELBOW),
            left_wrist: p(KP_LEFT_WRIST),
            right_wrist: p(KP_RIGHT_WRIST),
            left_hip: p(KP_LEFT_HIP),
            right_hip: p(KP_RIGHT_HIP),
            left_knee: p(KP_LEFT_KNEE),
            right_knee: p(KP_RIGHT_KNEE),
            left_ankle: p(KP_LEFT_ANKLE),
            right_ankle: p(KP_RIGHT_ANKLE),
        }))
    }

    fn detect_face(&mut self, img: &DynamicImage) -> Result<Option<FaceLandmarks>> {
        let boxed = Letterbox::new(img, FACE_MESH_INPUT);
        let size = FACE_MESH_INPUT as usize;

        let input = Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            boxed.canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        let outputs = self.face.run(ort::inputs![Value::from_array(input)?])?;
        let count = outputs.iter().count();
        if count < 2 {
            anyhow::bail!("face mesh model returned {count} outputs, expected 2");
        }

        let (_shape, flag) = outputs[1].try_extract_tensor::<f32>()?;
        let presence = flag.first().map_or(0.0, |logit| 1.0 / (1.0 + (-logit).exp()));
        log::debug!("face presence {presence:.3}");
        if presence < self.config.face_score_threshold {
            return Ok(None);
        }

        let (_shape, mesh) = outputs[0].try_extract_tensor::<f32>()?;
        if mesh.len() < FACE_MESH_POINTS * 3 {
            anyhow::bail!(
                "face mesh returned {} values, expected {}",
                mesh.len(),
                FACE_MESH_POINTS * 3
            );
        }

        let vertex = |i: usize| {
            let (x, y) = boxed.to_frame(mesh[i * 3], mesh[i * 3 + 1]);
            FacePoint::new(x, y, mesh[i * 3 + 2] / boxed.scale)
        };
        Ok(Some(FaceLandmarks {
            left_eye: vertex(MESH_LEFT_EYE),
            right_eye: vertex(MESH_RIGHT_EYE),
            nose_tip: vertex(MESH_NOSE_TIP),
            chin: vertex(MESH_CHIN),
        }))
    }
}
