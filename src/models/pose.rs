// Data models for labeled pose samples, predictions and evaluation results

use crate::models::hand::{Hand, HAND_LANDMARK_COUNT, LANDMARK_DIMENSIONS};
use serde::{Deserialize, Serialize};

/// Length of a flattened pose feature vector (21 landmarks x 3 coordinates)
pub const POSE_FEATURE_LEN: usize = HAND_LANDMARK_COUNT * LANDMARK_DIMENSIONS;

// ==============================================================================
// Pose Sample
// ==============================================================================

/// A labeled, flattened hand pose.
///
/// Serialized as `{"points": [...63 floats], "label": "..."}`. Deserialization
/// goes through the same checks as [`PoseSample::new`], so a loaded dataset
/// can never hold a sample of the wrong length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoseSample")]
pub struct PoseSample {
    points: Vec<f32>,
    label: String,
}

#[derive(Deserialize)]
struct RawPoseSample {
    points: Vec<f32>,
    label: String,
}

impl TryFrom<RawPoseSample> for PoseSample {
    type Error = PoseError;

    fn try_from(raw: RawPoseSample) -> PoseResult<Self> {
        PoseSample::new(raw.points, raw.label)
    }
}

impl PoseSample {
    pub fn new(points: Vec<f32>, label: impl Into<String>) -> PoseResult<Self> {
        let label = label.into();
        if points.len() != POSE_FEATURE_LEN {
            return Err(PoseError::FeatureLength {
                expected: POSE_FEATURE_LEN,
                actual: points.len(),
            });
        }
        if label.trim().is_empty() {
            return Err(PoseError::EmptyLabel);
        }
        Ok(Self { points, label })
    }

    pub fn from_hand(hand: &Hand, label: impl Into<String>) -> PoseResult<Self> {
        Self::new(hand.flatten(), label)
    }

    pub fn points(&self) -> &[f32] {
        &self.points
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

// ==============================================================================
// Prediction & Evaluation
// ==============================================================================

/// One classifier output: a label and its confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Per-sample evaluation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub expected: String,
    pub predicted: String,
    pub confidence: f32,
}

impl EvaluationOutcome {
    pub fn is_correct(&self) -> bool {
        self.expected == self.predicted
    }
}

/// Result of scoring a classifier against a labeled test set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64, // Percentage, rounded to two decimals
    pub outcomes: Vec<EvaluationOutcome>,
}

impl Evaluation {
    pub fn from_outcomes(outcomes: Vec<EvaluationOutcome>) -> Self {
        let total = outcomes.len();
        let correct = outcomes.iter().filter(|o| o.is_correct()).count();
        Self {
            total,
            correct,
            accuracy: accuracy_percent(correct, total),
            outcomes,
        }
    }
}

/// Fraction correct as a percentage rounded to two decimals; 0.0 for an empty set
pub fn accuracy_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = correct as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose must have {expected} coordinates, got {actual}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("Pose label must not be empty")]
    EmptyLabel,

    #[error("Landmark detection failed: {0}")]
    DetectionFailed(String),

    #[error("Landmark detector not available: {0}")]
    DetectorUnavailable(String),
}

pub type PoseResult<T> = Result<T, PoseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hand::Landmark;

    #[test]
    fn test_pose_sample_length_check() {
        assert!(PoseSample::new(vec![0.0; 63], "open").is_ok());
        assert!(matches!(
            PoseSample::new(vec![0.0; 62], "open"),
            Err(PoseError::FeatureLength { expected: 63, actual: 62 })
        ));
    }

    #[test]
    fn test_pose_sample_rejects_empty_label() {
        assert!(matches!(
            PoseSample::new(vec![0.0; 63], "  "),
            Err(PoseError::EmptyLabel)
        ));
    }

    #[test]
    fn test_pose_sample_from_hand() {
        let hand = Hand::new([Landmark::new(0.5, 0.5, 0.0); HAND_LANDMARK_COUNT]);
        let sample = PoseSample::from_hand(&hand, "open").unwrap();
        assert_eq!(sample.points().len(), POSE_FEATURE_LEN);
        assert_eq!(sample.label(), "open");
    }

    #[test]
    fn test_deserialize_validates_points() {
        let short = r#"{"points": [0.1, 0.2, 0.3], "label": "fist"}"#;
        assert!(serde_json::from_str::<PoseSample>(short).is_err());

        let points = vec!["0.5"; 63].join(",");
        let valid = format!(r#"{{"points": [{}], "label": "fist"}}"#, points);
        let sample: PoseSample = serde_json::from_str(&valid).unwrap();
        assert_eq!(sample.label(), "fist");
    }

    #[test]
    fn test_accuracy_percent() {
        assert_eq!(accuracy_percent(10, 10), 100.0);
        assert_eq!(accuracy_percent(0, 10), 0.0);
        assert_eq!(accuracy_percent(7, 10), 70.0);
        assert_eq!(accuracy_percent(2, 3), 66.67);
        assert_eq!(accuracy_percent(0, 0), 0.0);
    }
}
