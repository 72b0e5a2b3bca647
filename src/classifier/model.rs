//! Binary decision models over sparse feature vectors.

use serde::Deserialize;

use crate::error::ModelError;

/// On-disk model artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Multinomial naive Bayes. Row 0 is the ham class, row 1 spam.
    MultinomialNb {
        class_log_prior: Vec<f64>,
        feature_log_prob: Vec<Vec<f64>>,
    },
    /// Linear decision function (logistic regression, linear SVM). Positive = spam.
    Linear { coef: Vec<f64>, intercept: f64 },
}

/// A validated binary model.
#[derive(Debug, Clone)]
pub struct SpamModel {
    artifact: ModelArtifact,
    n_features: usize,
}

impl SpamModel {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let n_features = match &artifact {
            ModelArtifact::MultinomialNb {
                class_log_prior,
                feature_log_prob,
            } => {
                if class_log_prior.len() != 2 || feature_log_prob.len() != 2 {
                    return Err(ModelError::Invalid(format!(
                        "naive Bayes model must have exactly 2 classes, got {} priors and {} rows",
                        class_log_prior.len(),
                        feature_log_prob.len()
                    )));
                }
                let n = feature_log_prob[0].len();
                if feature_log_prob[1].len() != n {
                    return Err(ModelError::Invalid(
                        "naive Bayes class rows differ in length".into(),
                    ));
                }
                n
            }
            ModelArtifact::Linear { coef, .. } => coef.len(),
        };

        if n_features == 0 {
            return Err(ModelError::Invalid("model has no feature weights".into()));
        }

        Ok(Self {
            artifact,
            n_features,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Spam-vs-ham decision score. Positive means spam.
    ///
    /// Columns outside the model's range contribute nothing.
    pub fn decision_score(&self, row: &[(usize, f64)]) -> f64 {
        match &self.artifact {
            ModelArtifact::MultinomialNb {
                class_log_prior,
                feature_log_prob,
            } => {
                let joint = |class: usize| {
                    class_log_prior[class]
                        + row
                            .iter()
                            .filter_map(|&(col, x)| feature_log_prob[class].get(col).map(|p| p * x))
                            .sum::<f64>()
                };
                joint(1) - joint(0)
            }
            ModelArtifact::Linear { coef, intercept } => {
                intercept
                    + row
                        .iter()
                        .filter_map(|&(col, x)| coef.get(col).map(|w| w * x))
                        .sum::<f64>()
            }
        }
    }

    /// Binary prediction: 1 = spam, 0 = not spam.
    pub fn predict(&self, row: &[(usize, f64)]) -> u8 {
        prediction_from_score(self.decision_score(row))
    }
}

/// Class for a decision score. Ties go to not spam.
pub fn prediction_from_score(score: f64) -> u8 {
    u8::from(score > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nb() -> SpamModel {
        let artifact: ModelArtifact = serde_json::from_str(
            r#"{
                "kind": "multinomial_nb",
                "class_log_prior": [-0.2, -1.7],
                "feature_log_prob": [[-4.0, -4.0, -1.0], [-0.5, -0.7, -5.0]]
            }"#,
        )
        .unwrap();
        SpamModel::from_artifact(artifact).unwrap()
    }

    #[test]
    fn naive_bayes_prefers_spam_terms() {
        let model = nb();
        assert_eq!(model.n_features(), 3);
        assert_eq!(model.predict(&[(0, 1.0), (1, 1.0)]), 1);
        assert_eq!(model.predict(&[(2, 1.0)]), 0);
    }

    #[test]
    fn naive_bayes_empty_row_follows_prior() {
        let model = nb();
        let score = model.decision_score(&[]);
        assert!((score - (-1.7 + 0.2)).abs() < 1e-12);
        assert_eq!(model.predict(&[]), 0);
    }

    #[test]
    fn linear_model_uses_sign_of_score() {
        let artifact: ModelArtifact = serde_json::from_str(
            r#"{"kind": "linear", "coef": [2.0, -3.0], "intercept": -0.5}"#,
        )
        .unwrap();
        let model = SpamModel::from_artifact(artifact).unwrap();
        assert_eq!(model.predict(&[(0, 1.0)]), 1);
        assert_eq!(model.predict(&[(0, 1.0), (1, 1.0)]), 0);
        assert_eq!(model.predict(&[(0, 0.25)]), 0);
    }

    #[test]
    fn zero_score_is_not_spam() {
        assert_eq!(prediction_from_score(0.0), 0);
        assert_eq!(prediction_from_score(f64::MIN_POSITIVE), 1);
        assert_eq!(prediction_from_score(-0.1), 0);
    }

    #[test]
    fn out_of_range_columns_are_ignored() {
        let artifact = ModelArtifact::Linear {
            coef: vec![1.0],
            intercept: 0.0,
        };
        let model = SpamModel::from_artifact(artifact).unwrap();
        assert_eq!(model.decision_score(&[(0, 1.0), (7, 100.0)]), 1.0);
    }

    #[test]
    fn rejects_wrong_class_count() {
        let artifact = ModelArtifact::MultinomialNb {
            class_log_prior: vec![-0.1, -0.2, -0.3],
            feature_log_prob: vec![vec![-1.0], vec![-1.0], vec![-1.0]],
        };
        assert!(SpamModel::from_artifact(artifact).is_err());
    }

    #[test]
    fn rejects_ragged_rows() {
        let artifact = ModelArtifact::MultinomialNb {
            class_log_prior: vec![-0.1, -0.2],
            feature_log_prob: vec![vec![-1.0, -2.0], vec![-1.0]],
        };
        assert!(SpamModel::from_artifact(artifact).is_err());
    }
}
