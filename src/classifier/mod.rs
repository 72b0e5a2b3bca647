//! Spam classification.
//!
//! A [`Classifier`] turns already-truncated text into a [`ClassificationResult`].
//! The production implementation is [`PretrainedClassifier`], loaded once at
//! boot from vectorizer + model artifacts and shared read-only afterwards.

pub mod model;
pub mod pretrained;
pub mod vectorizer;

pub use pretrained::PretrainedClassifier;

use serde::{Deserialize, Serialize};

/// Maximum number of characters of any text that reaches the classifier.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Predicted label. Serialized the way API clients display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "SPAM")]
    Spam,
    #[serde(rename = "Not Spam")]
    NotSpam,
}

impl Label {
    /// Map a raw binary prediction (1 = spam) to a label.
    pub fn from_prediction(prediction: u8) -> Self {
        if prediction == 1 {
            Label::Spam
        } else {
            Label::NotSpam
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Spam => "SPAM",
            Label::NotSpam => "Not Spam",
        }
    }

    pub fn is_spam(&self) -> bool {
        matches!(self, Label::Spam)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one piece of text. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// The text that was classified (at most [`MAX_TEXT_CHARS`] characters).
    pub text: String,
    pub label: Label,
    /// Raw binary prediction: 1 = spam, 0 = not spam.
    pub raw_prediction: u8,
    /// Model decision score; positive leans spam.
    pub score: f64,
}

/// Text classifier seam. Implementations must be deterministic and side-effect free.
pub trait Classifier: Send + Sync {
    /// Classify text. Callers truncate with [`truncate_chars`] first;
    /// implementations truncate again so the bound holds regardless.
    fn classify(&self, text: &str) -> ClassificationResult;
}

/// First `max` characters of `text` (character-, not byte-based).
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_wire_names() {
        assert_eq!(serde_json::to_string(&Label::Spam).unwrap(), "\"SPAM\"");
        assert_eq!(serde_json::to_string(&Label::NotSpam).unwrap(), "\"Not Spam\"");
        assert_eq!(Label::NotSpam.to_string(), "Not Spam");
    }

    #[test]
    fn label_from_prediction() {
        assert_eq!(Label::from_prediction(1), Label::Spam);
        assert_eq!(Label::from_prediction(0), Label::NotSpam);
        assert!(Label::Spam.is_spam());
        assert!(!Label::NotSpam.is_spam());
    }

    #[test]
    fn truncate_short_text_untouched() {
        assert_eq!(truncate_chars("hello", 1000), "hello");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn truncate_long_text_to_limit() {
        let long = "a".repeat(1500);
        assert_eq!(truncate_chars(&long, MAX_TEXT_CHARS).len(), 1000);
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let text = "é".repeat(1200);
        let truncated = truncate_chars(&text, MAX_TEXT_CHARS);
        assert_eq!(truncated.chars().count(), 1000);
        assert_eq!(truncated.len(), 2000);
    }
}
