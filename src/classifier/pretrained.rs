//! Pretrained classifier: vectorizer + model loaded from JSON artifacts.

use std::path::Path;

use serde::de::DeserializeOwned;

use super::model::{ModelArtifact, SpamModel, prediction_from_score};
use super::vectorizer::{Vectorizer, VectorizerArtifact};
use super::{ClassificationResult, Classifier, Label, MAX_TEXT_CHARS, truncate_chars};
use crate::config::ModelConfig;
use crate::error::ModelError;

/// Vectorizer and model pair. Built once; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PretrainedClassifier {
    vectorizer: Vectorizer,
    model: SpamModel,
}

impl PretrainedClassifier {
    /// Combine a vectorizer and a model, checking their feature spaces agree.
    pub fn new(vectorizer: Vectorizer, model: SpamModel) -> Result<Self, ModelError> {
        if vectorizer.n_features() != model.n_features() {
            return Err(ModelError::Invalid(format!(
                "vectorizer produces {} features but model expects {}",
                vectorizer.n_features(),
                model.n_features()
            )));
        }
        Ok(Self { vectorizer, model })
    }

    /// Load both artifacts from disk.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let vectorizer: VectorizerArtifact = read_artifact(&config.vectorizer_path)?;
        let model: ModelArtifact = read_artifact(&config.model_path)?;
        let classifier = Self::new(
            Vectorizer::from_artifact(vectorizer)?,
            SpamModel::from_artifact(model)?,
        )?;

        tracing::info!(
            model = %config.model_path.display(),
            vectorizer = %config.vectorizer_path.display(),
            features = classifier.model.n_features(),
            "Model and vectorizer loaded"
        );
        Ok(classifier)
    }
}

impl Classifier for PretrainedClassifier {
    fn classify(&self, text: &str) -> ClassificationResult {
        let text = truncate_chars(text, MAX_TEXT_CHARS);
        let row = self.vectorizer.transform(text);
        let score = self.model.decision_score(&row);
        let raw_prediction = prediction_from_score(score);

        ClassificationResult {
            text: text.to_string(),
            label: Label::from_prediction(raw_prediction),
            raw_prediction,
            score,
        }
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
        path: path.display().to_string(),
        source,
    })
}
