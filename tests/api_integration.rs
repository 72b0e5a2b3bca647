//! Integration tests for the HTTP API.
//!
//! Each test spins up the Axum router on a random port with the real
//! pretrained classifier (built from inline artifacts) and a recording mail
//! gateway, then exercises the REST contract over HTTP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use spam_scanner::api::routes;
use spam_scanner::classifier::PretrainedClassifier;
use spam_scanner::classifier::model::SpamModel;
use spam_scanner::classifier::vectorizer::Vectorizer;
use spam_scanner::error::MailError;
use spam_scanner::mail::{InboxMessage, MailGateway};
use spam_scanner::scanner::SpamScanner;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const VECTORIZER: &str = r#"{
    "kind": "tfidf",
    "vocabulary": {"win": 0, "free": 1, "money": 2, "now": 3, "prize": 4,
                   "meeting": 5, "lunch": 6, "tomorrow": 7, "report": 8},
    "idf": [1.2, 1.1, 1.3, 1.0, 1.5, 1.4, 1.6, 1.2, 1.3]
}"#;

const MODEL: &str = r#"{
    "kind": "linear",
    "coef": [2.0, 2.5, 1.8, 0.6, 2.2, -2.4, -2.0, -1.1, -1.9],
    "intercept": -0.4
}"#;

fn classifier() -> PretrainedClassifier {
    let vectorizer = Vectorizer::from_artifact(serde_json::from_str(VECTORIZER).unwrap()).unwrap();
    let model = SpamModel::from_artifact(serde_json::from_str(MODEL).unwrap()).unwrap();
    PretrainedClassifier::new(vectorizer, model).unwrap()
}

/// Sent mail: (to, subject, body).
type Outbox = Arc<Mutex<Vec<(String, String, String)>>>;

/// Stub mail provider: serves a fixed inbox and records sends.
struct StubMail {
    inbox: Vec<InboxMessage>,
    fetch_error: Option<String>,
    fetches: Arc<Mutex<usize>>,
    outbox: Outbox,
}

#[async_trait]
impl MailGateway for StubMail {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.outbox
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }

    async fn list_recent_messages(&self, limit: usize) -> Result<Vec<InboxMessage>, MailError> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(reason) = &self.fetch_error {
            return Err(MailError::Fetch {
                reason: reason.clone(),
            });
        }
        Ok(self.inbox.iter().take(limit).cloned().collect())
    }
}

struct Harness {
    port: u16,
    outbox: Outbox,
    fetches: Arc<Mutex<usize>>,
}

/// Start an Axum server on a random port.
async fn start_server(inbox: Vec<InboxMessage>, fetch_error: Option<&str>) -> Harness {
    let outbox: Outbox = Arc::default();
    let fetches = Arc::new(Mutex::new(0));
    let gateway = Arc::new(StubMail {
        inbox,
        fetch_error: fetch_error.map(str::to_string),
        fetches: Arc::clone(&fetches),
        outbox: Arc::clone(&outbox),
    });
    let scanner = Arc::new(SpamScanner::new(Arc::new(classifier()), gateway, 10));
    let app = routes(scanner);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Harness {
        port,
        outbox,
        fetches,
    }
}

fn message(id: &str, sender: &str, snippet: &str) -> InboxMessage {
    InboxMessage {
        id: id.into(),
        sender: sender.into(),
        snippet: snippet.into(),
    }
}

async fn post(port: u16, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![], None).await;
        let resp = reqwest::get(format!("http://127.0.0.1:{}/health", h.port))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "spam-scanner");
    })
    .await
    .expect("test timed out");
}

// ── /predict ────────────────────────────────────────────────────────

#[tokio::test]
async fn predict_spam_sends_one_email() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![], None).await;

        let (status, body) = post(
            h.port,
            "/predict",
            json!({"email": "a@b.com", "text": "WIN FREE MONEY NOW"}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({"email": "a@b.com", "prediction": 1, "label": "SPAM"})
        );

        let outbox = h.outbox.lock().unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, "a@b.com");
        assert_eq!(outbox[0].1, "Spam Scanner - Message Result");
        assert!(outbox[0].2.contains("WIN FREE MONEY NOW"));
        assert!(outbox[0].2.contains("Prediction: SPAM"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn predict_ham() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![], None).await;

        let (status, body) = post(
            h.port,
            "/predict",
            json!({"email": "a@b.com", "text": "Lunch meeting tomorrow?"}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["prediction"], 0);
        assert_eq!(body["label"], "Not Spam");
        assert_eq!(h.outbox.lock().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn predict_missing_text_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![], None).await;

        let (status, body) = post(h.port, "/predict", json!({"email": "a@b.com"})).await;

        assert_eq!(status, 400);
        assert_eq!(body, json!({"error": "Email and message text required"}));
        assert!(h.outbox.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn predict_malformed_json_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![], None).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{}/predict", h.port))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
        assert!(h.outbox.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── /scan-inbox ─────────────────────────────────────────────────────

#[tokio::test]
async fn scan_inbox_reports_spam() {
    timeout(TEST_TIMEOUT, async {
        let inbox = vec![
            message("5", "promo@spam.biz", "Claim your FREE prize now"),
            message("4", "boss@work.com", "Report due tomorrow, meeting at 10"),
            message("3", "Lottery <win@spam.biz>", "You win money"),
        ];
        let h = start_server(inbox, None).await;

        let (status, body) = post(h.port, "/scan-inbox", json!({"email": "a@b.com"})).await;

        assert_eq!(status, 200);
        assert_eq!(body["email"], "a@b.com");
        assert_eq!(body["spam_detected"], 2);
        assert_eq!(
            body["details"],
            json!([
                {"from": "promo@spam.biz", "message": "Claim your FREE prize now", "label": "SPAM"},
                {"from": "Lottery <win@spam.biz>", "message": "You win money", "label": "SPAM"}
            ])
        );

        let outbox = h.outbox.lock().unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].1, "Spam Scanner - Inbox Report");
        assert!(outbox[0].2.contains("Spam detected: 2"));
        assert!(outbox[0].2.contains("From: promo@spam.biz\nMessage: Claim your FREE prize now"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scan_inbox_empty_email_returns_400_without_fetching() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![message("1", "x@y.com", "free money")], None).await;

        let (status, body) = post(h.port, "/scan-inbox", json!({"email": ""})).await;

        assert_eq!(status, 400);
        assert_eq!(body, json!({"error": "Email address required"}));
        assert_eq!(*h.fetches.lock().unwrap(), 0);
        assert!(h.outbox.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scan_inbox_fetch_failure_returns_500() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![], Some("IMAP AUTHENTICATE rejected: NO invalid token")).await;

        let (status, body) = post(h.port, "/scan-inbox", json!({"email": "a@b.com"})).await;

        assert_eq!(status, 500);
        assert_eq!(
            body,
            json!({"error": "IMAP AUTHENTICATE rejected: NO invalid token"})
        );
        assert!(h.outbox.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scan_inbox_clean_inbox() {
    timeout(TEST_TIMEOUT, async {
        let h = start_server(vec![message("1", "friend@example.com", "lunch tomorrow?")], None)
            .await;

        let (status, body) = post(h.port, "/scan-inbox", json!({"email": "a@b.com"})).await;

        assert_eq!(status, 200);
        assert_eq!(body["spam_detected"], 0);
        assert_eq!(body["details"], json!([]));
        assert!(h.outbox.lock().unwrap()[0].2.contains("No spam messages found."));
    })
    .await
    .expect("test timed out");
}
