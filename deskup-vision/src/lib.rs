pub mod desk;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod height;
pub mod landmarks;
pub mod model;
pub mod pipeline;
pub mod posture;
pub mod result;
pub mod video;

// Re-export commonly used types
pub use desk::{Breakdown, DeskStrategy};
pub use detector::{DetectorConfig, OnnxLandmarkProvider};
pub use error::{AnalysisError, CalibrationError};
pub use geometry::Point2D;
pub use height::{Calibration, FaceRatioParams};
pub use landmarks::{BodyLandmarks, FaceLandmarks, FacePoint, LandmarkProvider};
pub use pipeline::{AnalysisConfig, AnalysisRequest, Pipeline};
pub use posture::{PostureAssessment, PostureMetrics, PostureType};
pub use result::{AnalysisResult, Outcome};
pub use video::Camera;
