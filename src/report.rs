//! Report bodies emailed back to the user. Pure string building, no I/O.

use serde::{Deserialize, Serialize};

use crate::classifier::Label;

pub const SINGLE_REPORT_SUBJECT: &str = "Spam Scanner - Message Result";
pub const SCAN_REPORT_SUBJECT: &str = "Spam Scanner - Inbox Report";

/// Sentence used in scan reports when nothing was flagged.
pub const NO_SPAM_SENTENCE: &str = "No spam messages found.";

/// One flagged inbox message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpamDetail {
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(rename = "message")]
    pub snippet: String,
    pub label: Label,
}

/// Aggregate of one inbox scan. Details keep provider order (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub recipient_email: String,
    /// How many messages were inspected.
    pub scanned: usize,
    pub details: Vec<SpamDetail>,
}

impl ScanReport {
    pub fn spam_count(&self) -> usize {
        self.details.len()
    }
}

/// Body for a single classified message.
pub fn build_single_report(text: &str, label: Label) -> String {
    format!(
        "Hi,\n\
         \n\
         You submitted the following message:\n\
         \n\
         {text}\n\
         \n\
         Prediction: {label}\n\
         \n\
         Thanks,\n\
         Spam Scanner\n"
    )
}

/// Body for an inbox scan: the spam count, then one `From:`/`Message:` block per
/// flagged message, or [`NO_SPAM_SENTENCE`] when there are none.
pub fn build_scan_report(report: &ScanReport) -> String {
    let findings = if report.details.is_empty() {
        NO_SPAM_SENTENCE.to_string()
    } else {
        report
            .details
            .iter()
            .map(|d| format!("From: {}\nMessage: {}", d.sender, d.snippet))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    let noun = if report.scanned == 1 { "message" } else { "messages" };

    format!(
        "Hi,\n\
         \n\
         We scanned your latest {scanned} inbox {noun}.\n\
         \n\
         Spam detected: {count}\n\
         \n\
         {findings}\n\
         \n\
         Thanks,\n\
         Spam Scanner\n",
        scanned = report.scanned,
        count = report.spam_count(),
    )
}
