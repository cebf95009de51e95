//! Desk height recommendation.
//!
//! Two strategies are kept side by side because they disagree on purpose:
//! [`DeskStrategy::Ergonomic`] scales from a sitting-height ratio and corrects for
//! measured posture, [`DeskStrategy::ElbowRatio`] scales from elbow height and only
//! reacts to flagged shoulder issues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::posture::{
    PostureAssessment, PostureIssue, PostureMetrics, PostureType, ELBOW_ANGLE_IDEAL,
};

pub const GLOBAL_MIN_CM: f32 = 60.0;
pub const GLOBAL_MAX_CM: f32 = 130.0;
pub const USER_MIN_RATIO: f32 = 0.22;
pub const USER_MAX_RATIO: f32 = 0.32;
pub const SITTING_HEIGHT_RATIO: f32 = 0.25;

const ELBOW_CM_PER_DEGREE: f32 = 0.1;
const TORSO_CM_PER_DEGREE: f32 = 0.05;
const SHOULDER_SYMMETRY_SCALE: f32 = 100.0 * 0.1;
const SITTING_BONUS_CM: f32 = -2.0;
const STANDING_PENALTY_CM: f32 = 5.0;

const BLEND_MIN_CONFIDENCE: f32 = 0.7;
const BLEND_IDEAL_WEIGHT: f32 = 0.7;
const BLEND_CURRENT_WEIGHT: f32 = 0.3;

pub const ELBOW_HEIGHT_RATIO: f32 = 0.63;
pub const ELBOW_RATIO_MIN_CM: f32 = 70.0;
pub const ELBOW_RATIO_MAX_CM: f32 = 120.0;
const ELBOW_RATIO_MAX_USER_RATIO: f32 = 0.75;
const SHOULDERS_RAISED_CM: f32 = -3.0;
const UNEVEN_SHOULDERS_CM: f32 = -2.0;

pub const ADJ_ELBOW_ANGLE: &str = "elbow_angle";
pub const ADJ_TORSO_INCLINATION: &str = "torso_inclination";
pub const ADJ_SHOULDER_SYMMETRY: &str = "shoulder_symmetry";
pub const ADJ_POSTURE_BONUS: &str = "posture_bonus";
pub const ADJ_POSTURE_PENALTY: &str = "posture_penalty";
pub const ADJ_SHOULDERS_RAISED: &str = "shoulders_raised";
pub const ADJ_UNEVEN_SHOULDERS: &str = "uneven_shoulders";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskStrategy {
    #[default]
    Ergonomic,
    ElbowRatio,
}

/// Everything a strategy may draw on. Heights in centimeters.
#[derive(Debug, Clone, Copy)]
pub struct DeskInput<'a> {
    pub user_height_cm: f32,
    /// `None` when only a face was detected.
    pub metrics: Option<&'a PostureMetrics>,
    pub assessment: &'a PostureAssessment,
    /// 0 when the desk height was never set.
    pub current_desk_height_cm: f32,
}

/// Auditable account of how a recommendation was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub strategy: DeskStrategy,
    pub base_height_cm: f32,
    /// Named contributions in cm, each rounded to one decimal.
    pub adjustments: BTreeMap<String, f32>,
    pub total_adjustment_cm: f32,
    pub calculated_ideal_cm: f32,
    pub posture_type: Option<PostureType>,
    pub posture_confidence: f32,
}

impl DeskStrategy {
    /// Recommended desk height in cm, rounded to one decimal, with its breakdown.
    pub fn recommend(self, input: &DeskInput<'_>) -> (f32, Breakdown) {
        match self {
            DeskStrategy::Ergonomic => ergonomic_desk_height(
                input.user_height_cm,
                input.metrics,
                input.current_desk_height_cm,
            ),
            DeskStrategy::ElbowRatio => {
                elbow_ratio_desk_height(input.user_height_cm, input.assessment)
            }
        }
    }
}

/// Named posture adjustments in cm, unrounded.
pub fn posture_adjustments(metrics: &PostureMetrics) -> Vec<(&'static str, f32)> {
    let posture = match metrics.posture_type {
        PostureType::Sitting => (ADJ_POSTURE_BONUS, SITTING_BONUS_CM),
        PostureType::Standing => (ADJ_POSTURE_PENALTY, STANDING_PENALTY_CM),
    };
    vec![
        (
            ADJ_ELBOW_ANGLE,
            (metrics.elbow_angles.average - ELBOW_ANGLE_IDEAL) * ELBOW_CM_PER_DEGREE,
        ),
        (
            ADJ_TORSO_INCLINATION,
            metrics.torso_inclination * TORSO_CM_PER_DEGREE,
        ),
        (
            ADJ_SHOULDER_SYMMETRY,
            metrics.shoulder_symmetry * SHOULDER_SYMMETRY_SCALE,
        ),
        posture,
    ]
}

/// Sitting-ratio recommendation corrected by posture, blended with the current
/// desk when the user already sits confidently, then constrained.
pub fn ergonomic_desk_height(
    user_height_cm: f32,
    metrics: Option<&PostureMetrics>,
    current_desk_height_cm: f32,
) -> (f32, Breakdown) {
    let base = user_height_cm * SITTING_HEIGHT_RATIO;
    let adjustments = metrics.map(posture_adjustments).unwrap_or_default();
    let total: f32 = adjustments.iter().map(|(_, cm)| cm).sum();

    let mut ideal = base + total;
    if !ideal.is_finite() {
        log::warn!("non-finite desk height input, using base height");
        ideal = if base.is_finite() { base } else { GLOBAL_MIN_CM };
    }

    if let Some(m) = metrics {
        if current_desk_height_cm > 0.0
            && m.posture_type == PostureType::Sitting
            && m.posture_confidence > BLEND_MIN_CONFIDENCE
        {
            log::debug!("blending with current desk height {current_desk_height_cm:.1}cm");
            ideal = ideal * BLEND_IDEAL_WEIGHT + current_desk_height_cm * BLEND_CURRENT_WEIGHT;
        }
    }

    let ideal = round1(apply_ergonomic_constraints(ideal, user_height_cm));

    let breakdown = Breakdown {
        strategy: DeskStrategy::Ergonomic,
        base_height_cm: round1(base),
        adjustments: adjustments
            .into_iter()
            .map(|(name, cm)| (name.to_string(), round1(cm)))
            .collect(),
        total_adjustment_cm: round1(total),
        calculated_ideal_cm: ideal,
        posture_type: metrics.map(|m| m.posture_type),
        posture_confidence: metrics.map_or(0.0, |m| round2(m.posture_confidence)),
    };
    (ideal, breakdown)
}

/// Clamp to the global band, then narrow towards the user band.
///
/// The user band is [22%, 32%] of body height. Where it lies outside the global
/// band the global limit wins, so the result never leaves [60, 130] cm.
pub fn apply_ergonomic_constraints(height_cm: f32, user_height_cm: f32) -> f32 {
    let constrained = height_cm.clamp(GLOBAL_MIN_CM, GLOBAL_MAX_CM);
    if !(user_height_cm.is_finite() && user_height_cm > 0.0) {
        return constrained;
    }
    let user_min = (user_height_cm * USER_MIN_RATIO).clamp(GLOBAL_MIN_CM, GLOBAL_MAX_CM);
    let user_max = (user_height_cm * USER_MAX_RATIO).clamp(GLOBAL_MIN_CM, GLOBAL_MAX_CM);
    constrained.clamp(user_min, user_max)
}

/// Elbow-height recommendation with flat penalties for flagged shoulder issues.
pub fn elbow_ratio_desk_height(
    user_height_cm: f32,
    assessment: &PostureAssessment,
) -> (f32, Breakdown) {
    let base = user_height_cm * ELBOW_HEIGHT_RATIO;

    let mut adjustments = BTreeMap::new();
    if assessment.has(PostureIssue::ShouldersRaised) {
        adjustments.insert(ADJ_SHOULDERS_RAISED.to_string(), SHOULDERS_RAISED_CM);
    }
    if assessment.has(PostureIssue::UnevenShoulders) {
        adjustments.insert(ADJ_UNEVEN_SHOULDERS.to_string(), UNEVEN_SHOULDERS_CM);
    }
    let total: f32 = adjustments.values().sum();

    let upper = (user_height_cm * ELBOW_RATIO_MAX_USER_RATIO)
        .min(ELBOW_RATIO_MAX_CM)
        .max(ELBOW_RATIO_MIN_CM);
    let recommended = base + total;
    let recommended = if recommended.is_finite() {
        recommended.clamp(ELBOW_RATIO_MIN_CM, upper)
    } else {
        ELBOW_RATIO_MIN_CM
    };
    let recommended = round1(recommended);

    let breakdown = Breakdown {
        strategy: DeskStrategy::ElbowRatio,
        base_height_cm: round1(base),
        adjustments,
        total_adjustment_cm: round1(total),
        calculated_ideal_cm: recommended,
        posture_type: None,
        posture_confidence: 0.0,
    };
    (recommended, breakdown)
}

pub(crate) fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
