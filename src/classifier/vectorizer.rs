//! Text vectorizer: raw text → sparse term-weight vector.
//!
//! Mirrors the bag-of-words vectorizers the classifier was trained with:
//! lowercase, `\b\w\w+\b` tokens, optional stop words and word n-grams,
//! raw or binary counts, optional sublinear tf, idf weighting and row norm.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ModelError;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\w\w+\b").unwrap_or_else(|e| panic!("token pattern is invalid: {e}"))
});

/// Sparse feature vector: `(column, weight)` pairs sorted by column.
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorizerKind {
    Count,
    Tfidf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// On-disk vectorizer artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorizerArtifact {
    pub kind: VectorizerKind,
    pub vocabulary: HashMap<String, usize>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub stop_words: Vec<String>,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    /// Absent: the kind's default. `null` or `"none"`: no normalization.
    #[serde(default, deserialize_with = "deserialize_norm")]
    pub norm: Option<Option<Norm>>,
}

fn default_true() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn deserialize_norm<'de, D>(deserializer: D) -> Result<Option<Option<Norm>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("none") => Ok(Some(None)),
        Some("l1") => Ok(Some(Some(Norm::L1))),
        Some("l2") => Ok(Some(Some(Norm::L2))),
        Some(other) => Err(serde::de::Error::custom(format!("unknown norm '{other}'"))),
    }
}

/// A loaded, validated vectorizer. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    kind: VectorizerKind,
    vocabulary: HashMap<String, usize>,
    lowercase: bool,
    ngram_range: (usize, usize),
    stop_words: HashSet<String>,
    binary: bool,
    sublinear_tf: bool,
    idf: Option<Vec<f64>>,
    norm: Option<Norm>,
    n_features: usize,
}

impl Vectorizer {
    /// Validate an artifact and build the vectorizer.
    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self, ModelError> {
        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ModelError::Invalid(format!(
                "invalid ngram_range ({min_n}, {max_n})"
            )));
        }
        if artifact.vocabulary.is_empty() {
            return Err(ModelError::Invalid("vectorizer vocabulary is empty".into()));
        }

        let n_features = artifact.vocabulary.values().max().map_or(0, |m| m + 1);
        if n_features != artifact.vocabulary.len() {
            return Err(ModelError::Invalid(format!(
                "vocabulary columns are not contiguous ({} terms, max column {})",
                artifact.vocabulary.len(),
                n_features.saturating_sub(1)
            )));
        }

        let idf = match (artifact.kind, artifact.idf) {
            (VectorizerKind::Tfidf, Some(idf)) if idf.len() == n_features => Some(idf),
            (VectorizerKind::Tfidf, Some(idf)) => {
                return Err(ModelError::Invalid(format!(
                    "idf has {} entries, vocabulary has {n_features}",
                    idf.len()
                )));
            }
            (VectorizerKind::Tfidf, None) => {
                return Err(ModelError::Invalid("tfidf vectorizer is missing idf".into()));
            }
            (VectorizerKind::Count, _) => None,
        };

        let norm = match (artifact.kind, artifact.norm) {
            (_, Some(explicit)) => explicit,
            (VectorizerKind::Tfidf, None) => Some(Norm::L2),
            (VectorizerKind::Count, None) => None,
        };

        let lowercase = artifact.lowercase;
        let stop_words = artifact
            .stop_words
            .into_iter()
            .map(|w| if lowercase { w.to_lowercase() } else { w })
            .collect();

        Ok(Self {
            kind: artifact.kind,
            vocabulary: artifact.vocabulary,
            lowercase,
            ngram_range: artifact.ngram_range,
            stop_words,
            binary: artifact.binary,
            sublinear_tf: artifact.sublinear_tf,
            idf,
            norm,
            n_features,
        })
    }

    pub fn kind(&self) -> VectorizerKind {
        self.kind
    }

    /// Number of feature columns produced.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Split text into analyzed terms (tokens and n-grams), before vocabulary lookup.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let normalized = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let tokens: Vec<&str> = TOKEN_RE
            .find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|t| !self.stop_words.contains(*t))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    /// Transform text into a sparse feature vector. Unknown terms are dropped.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.analyze(text) {
            if let Some(&col) = self.vocabulary.get(&term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(col, count)| {
                let mut tf = if self.binary { 1.0 } else { count };
                if self.sublinear_tf {
                    tf = 1.0 + tf.ln();
                }
                let weight = match &self.idf {
                    Some(idf) => tf * idf[col],
                    None => tf,
                };
                (col, weight)
            })
            .collect();

        if let Some(norm) = self.norm {
            let total = match norm {
                Norm::L1 => row.iter().map(|(_, w)| w.abs()).sum::<f64>(),
                Norm::L2 => row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            };
            if total > 0.0 {
                for (_, w) in &mut row {
                    *w /= total;
                }
            }
        }

        row
    }
}
