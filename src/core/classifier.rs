// Classifier service abstraction - train on labeled poses, predict labels for new ones

use crate::models::pose::Prediction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for one training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub epochs: u32,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self { epochs: 100 }
    }
}

/// Summary reported once training completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: u32,
    pub samples: usize,
    pub labels: Vec<String>,
    pub final_loss: f32,
}

/// Error types for classifier operations
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Expected {expected} features, got {actual}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("No training data")]
    NoTrainingData,

    #[error("Training data has not been normalized")]
    NotNormalized,

    #[error("Model has not been trained")]
    NotTrained,

    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model file error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Trainable pose classifier.
///
/// The call sequence for a training run is `add_training_sample` for every
/// sample, then `normalize`, then `train`. Implementations own their state;
/// callers only observe it through these operations.
#[async_trait]
pub trait ClassifierService: Send + Sync {
    /// Queue one labeled feature vector for the next training run
    fn add_training_sample(&mut self, features: &[f32], label: &str) -> ClassifierResult<()>;

    /// Fix the normalization of the queued samples
    fn normalize(&mut self) -> ClassifierResult<()>;

    /// Train on the queued samples; resolves once training is complete
    async fn train(&mut self, options: TrainingOptions) -> ClassifierResult<TrainingReport>;

    /// Scores for every known label, highest confidence first
    async fn predict(&self, features: &[f32]) -> ClassifierResult<Vec<Prediction>>;

    /// Write the trained model to disk
    async fn persist_model(&self, path: &Path) -> ClassifierResult<()>;

    /// Human readable backend description
    fn get_model_info(&self) -> String;
}
