//! Request pipelines: classify-and-notify and scan-and-notify.
//!
//! Both are stateless and strictly sequential. Any failure aborts the request
//! before a report is sent; nothing is retried.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, Label, MAX_TEXT_CHARS, truncate_chars};
use crate::error::{ScanError, ValidationError};
use crate::mail::MailGateway;
use crate::report::{
    SCAN_REPORT_SUBJECT, SINGLE_REPORT_SUBJECT, ScanReport, SpamDetail, build_scan_report,
    build_single_report,
};

/// `POST /predict` body. Missing fields deserialize as empty and fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub text: String,
}

/// `POST /scan-inbox` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub email: String,
}

/// A validated predict request: trimmed email, trimmed and truncated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPredict {
    pub email: String,
    pub text: String,
}

impl PredictRequest {
    pub fn validate(&self) -> Result<ValidPredict, ValidationError> {
        let email = self.email.trim();
        let text = truncate_chars(self.text.trim(), MAX_TEXT_CHARS);
        if email.is_empty() || text.is_empty() {
            return Err(ValidationError::MissingEmailOrText);
        }
        Ok(ValidPredict {
            email: email.to_string(),
            text: text.to_string(),
        })
    }
}

impl ScanRequest {
    /// The trimmed recipient address.
    pub fn validate(&self) -> Result<String, ValidationError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        Ok(email.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictResponse {
    pub email: String,
    pub prediction: u8,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResponse {
    pub email: String,
    pub spam_detected: usize,
    pub details: Vec<SpamDetail>,
}

/// The service core shared by all HTTP handlers.
pub struct SpamScanner {
    classifier: Arc<dyn Classifier>,
    gateway: Arc<dyn MailGateway>,
    scan_limit: usize,
}

impl SpamScanner {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        gateway: Arc<dyn MailGateway>,
        scan_limit: usize,
    ) -> Self {
        Self {
            classifier,
            gateway,
            scan_limit,
        }
    }

    /// Classify one submitted message and email the verdict to the submitter.
    pub async fn classify_and_notify(
        &self,
        request: &PredictRequest,
    ) -> Result<PredictResponse, ScanError> {
        let ValidPredict { email, text } = request.validate()?;

        let result = self.classifier.classify(&text);
        tracing::info!(recipient = %email, label = %result.label, "Message classified");

        let body = build_single_report(&result.text, result.label);
        if let Err(e) = self.gateway.send(&email, SINGLE_REPORT_SUBJECT, &body).await {
            tracing::error!(
                operation = "predict",
                recipient = %email,
                error = %e,
                "Result email failed"
            );
            return Err(e.into());
        }

        Ok(PredictResponse {
            email,
            prediction: result.raw_prediction,
            label: result.label,
        })
    }

    /// Classify the most recent inbox messages and email a summary of the spam found.
    ///
    /// Messages are classified one at a time in provider order. The report is
    /// only sent once every message was classified.
    pub async fn scan_and_notify(&self, request: &ScanRequest) -> Result<ScanResponse, ScanError> {
        let email = request.validate()?;

        let report = match self.scan(&email).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    operation = "scan_inbox",
                    recipient = %email,
                    error = %e,
                    "Inbox scan failed"
                );
                return Err(e);
            }
        };

        let body = build_scan_report(&report);
        if let Err(e) = self.gateway.send(&email, SCAN_REPORT_SUBJECT, &body).await {
            tracing::error!(
                operation = "scan_inbox",
                recipient = %email,
                error = %e,
                "Report email failed"
            );
            return Err(e.into());
        }

        tracing::info!(
            recipient = %email,
            scanned = report.scanned,
            spam = report.spam_count(),
            "Inbox scan reported"
        );

        Ok(ScanResponse {
            email,
            spam_detected: report.spam_count(),
            details: report.details,
        })
    }

    async fn scan(&self, email: &str) -> Result<ScanReport, ScanError> {
        let messages = self.gateway.list_recent_messages(self.scan_limit).await?;

        let mut details = Vec::new();
        for message in &messages {
            let snippet = truncate_chars(&message.snippet, MAX_TEXT_CHARS);
            let result = self.classifier.classify(snippet);
            if result.label.is_spam() {
                details.push(SpamDetail {
                    sender: message.sender.clone(),
                    snippet: result.text,
                    label: result.label,
                });
            }
        }

        Ok(ScanReport {
            recipient_email: email.to_string(),
            scanned: messages.len(),
            details,
        })
    }
}
