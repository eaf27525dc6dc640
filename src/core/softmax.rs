// Built-in classifier backend: min-max normalized features feeding a single
// softmax layer, trained by full-batch gradient descent

use crate::core::classifier::{
    ClassifierError, ClassifierResult, ClassifierService, TrainingOptions, TrainingReport,
};
use crate::models::pose::{Prediction, POSE_FEATURE_LEN};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const MIN_RANGE: f32 = 1e-6;

/// Per-feature min-max bounds taken from the training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl Normalization {
    fn fit(inputs: &[Vec<f32>]) -> Self {
        let mut min = vec![f32::INFINITY; POSE_FEATURE_LEN];
        let mut max = vec![f32::NEG_INFINITY; POSE_FEATURE_LEN];
        for features in inputs {
            for (j, &value) in features.iter().enumerate() {
                min[j] = min[j].min(value);
                max[j] = max[j].max(value);
            }
        }
        Self { min, max }
    }

    /// Scale into [0, 1] using the training bounds; constant features map to 0
    pub fn apply(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .enumerate()
            .map(|(j, &value)| {
                let range = self.max[j] - self.min[j];
                if range.abs() < MIN_RANGE {
                    0.0
                } else {
                    (value - self.min[j]) / range
                }
            })
            .collect()
    }
}

/// Trained parameters, also the on-disk model format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub labels: Vec<String>,
    pub normalization: Normalization,
    pub weights: Vec<Vec<f32>>, // One row of POSE_FEATURE_LEN weights per label
    pub bias: Vec<f32>,
}

impl SoftmaxModel {
    fn zeroed(labels: Vec<String>, normalization: Normalization) -> Self {
        let classes = labels.len();
        Self {
            labels,
            normalization,
            weights: vec![vec![0.0; POSE_FEATURE_LEN]; classes],
            bias: vec![0.0; classes],
        }
    }

    /// Class probabilities for an already normalized input
    fn probabilities(&self, normalized: &[f32]) -> Vec<f32> {
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(normalized).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();
        softmax(&logits)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// In-process pose classifier
pub struct SoftmaxClassifier {
    learning_rate: f32,
    samples: Vec<(Vec<f32>, usize)>,
    labels: Vec<String>,
    normalization: Option<Normalization>,
    model: Option<SoftmaxModel>,
}

impl SoftmaxClassifier {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            samples: Vec::new(),
            labels: Vec::new(),
            normalization: None,
            model: None,
        }
    }

    /// Restore a model written by `persist_model`
    pub async fn load(path: &Path, learning_rate: f32) -> ClassifierResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let model: SoftmaxModel = serde_json::from_slice(&bytes)?;

        if model.weights.len() != model.labels.len()
            || model.bias.len() != model.labels.len()
            || model.weights.iter().any(|row| row.len() != POSE_FEATURE_LEN)
            || model.normalization.min.len() != POSE_FEATURE_LEN
            || model.normalization.max.len() != POSE_FEATURE_LEN
        {
            return Err(ClassifierError::InferenceFailed(format!(
                "Model file {} has inconsistent dimensions",
                path.display()
            )));
        }

        info!("Loaded classifier with labels {:?} from {}", model.labels, path.display());

        Ok(Self {
            learning_rate,
            samples: Vec::new(),
            labels: model.labels.clone(),
            normalization: Some(model.normalization.clone()),
            model: Some(model),
        })
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn check_len(features: &[f32]) -> ClassifierResult<()> {
        if features.len() != POSE_FEATURE_LEN {
            return Err(ClassifierError::FeatureLength {
                expected: POSE_FEATURE_LEN,
                actual: features.len(),
            });
        }
        Ok(())
    }

    fn label_index(&mut self, label: &str) -> usize {
        match self.labels.iter().position(|known| known == label) {
            Some(index) => index,
            None => {
                self.labels.push(label.to_string());
                self.labels.len() - 1
            }
        }
    }
}

#[async_trait]
impl ClassifierService for SoftmaxClassifier {
    fn add_training_sample(&mut self, features: &[f32], label: &str) -> ClassifierResult<()> {
        Self::check_len(features)?;
        let index = self.label_index(label);
        self.samples.push((features.to_vec(), index));
        // New data invalidates the previous bounds
        self.normalization = None;
        Ok(())
    }

    fn normalize(&mut self) -> ClassifierResult<()> {
        if self.samples.is_empty() {
            return Err(ClassifierError::NoTrainingData);
        }
        let inputs: Vec<Vec<f32>> = self.samples.iter().map(|(x, _)| x.clone()).collect();
        self.normalization = Some(Normalization::fit(&inputs));
        Ok(())
    }

    async fn train(&mut self, options: TrainingOptions) -> ClassifierResult<TrainingReport> {
        if self.samples.is_empty() {
            return Err(ClassifierError::NoTrainingData);
        }
        let normalization = self
            .normalization
            .clone()
            .ok_or(ClassifierError::NotNormalized)?;

        let inputs: Vec<(Vec<f32>, usize)> = self
            .samples
            .iter()
            .map(|(x, y)| (normalization.apply(x), *y))
            .collect();

        let classes = self.labels.len();
        let n = inputs.len() as f32;
        let mut model = SoftmaxModel::zeroed(self.labels.clone(), normalization);
        let mut loss = 0.0f32;

        for epoch in 0..options.epochs {
            let mut grad_w = vec![vec![0.0f32; POSE_FEATURE_LEN]; classes];
            let mut grad_b = vec![0.0f32; classes];
            loss = 0.0;

            for (x, y) in &inputs {
                let p = model.probabilities(x);
                loss -= p[*y].max(1e-12).ln();
                for k in 0..classes {
                    let g = p[k] - if k == *y { 1.0 } else { 0.0 };
                    grad_b[k] += g;
                    for (gw, xj) in grad_w[k].iter_mut().zip(x) {
                        *gw += g * xj;
                    }
                }
            }

            for k in 0..classes {
                model.bias[k] -= self.learning_rate * grad_b[k] / n;
                for (w, gw) in model.weights[k].iter_mut().zip(&grad_w[k]) {
                    *w -= self.learning_rate * gw / n;
                }
            }

            loss /= n;
            if !loss.is_finite() {
                return Err(ClassifierError::TrainingFailed(format!(
                    "Loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            if (epoch + 1) % 10 == 0 {
                debug!("epoch {}/{} loss {:.4}", epoch + 1, options.epochs, loss);
            }
        }

        self.model = Some(model);

        Ok(TrainingReport {
            epochs: options.epochs,
            samples: inputs.len(),
            labels: self.labels.clone(),
            final_loss: loss,
        })
    }

    async fn predict(&self, features: &[f32]) -> ClassifierResult<Vec<Prediction>> {
        Self::check_len(features)?;
        let model = self.model.as_ref().ok_or(ClassifierError::NotTrained)?;

        let normalized = model.normalization.apply(features);
        let mut predictions: Vec<Prediction> = model
            .labels
            .iter()
            .zip(model.probabilities(&normalized))
            .map(|(label, confidence)| Prediction {
                label: label.clone(),
                confidence,
            })
            .collect();
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(predictions)
    }

    async fn persist_model(&self, path: &Path) -> ClassifierResult<()> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotTrained)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let contents = serde_json::to_vec_pretty(model)?;
        tokio::fs::write(path, contents).await?;

        info!("Saved classifier model to {}", path.display());
        Ok(())
    }

    fn get_model_info(&self) -> String {
        format!(
            "Softmax classifier ({} labels, {} queued samples, trained: {})",
            self.labels.len(),
            self.samples.len(),
            self.model.is_some()
        )
    }
}
