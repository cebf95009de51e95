pub mod config;
pub mod storage;

// Re-export vision types for convenience
pub use deskup_vision::{
    pipeline, video, AnalysisConfig, AnalysisRequest, AnalysisResult, Calibration, DeskStrategy,
    DetectorConfig, OnnxLandmarkProvider, Pipeline,
};
