use std::sync::Arc;

use spam_scanner::api::routes;
use spam_scanner::classifier::{Classifier, PretrainedClassifier};
use spam_scanner::config::{MailAuthConfig, ServerConfig};
use spam_scanner::mail::{ImapSmtpGateway, MailGateway};
use spam_scanner::scanner::SpamScanner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("📨 Spam Scanner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model.model_path.display());
    eprintln!("   Vectorizer: {}", config.model.vectorizer_path.display());
    eprintln!(
        "   Mailbox: {} (IMAP {}:{}, SMTP {}:{})",
        config.mail.username,
        config.mail.imap_host,
        config.mail.imap_port,
        config.mail.smtp_host,
        config.mail.smtp_port
    );
    match &config.mail.auth {
        MailAuthConfig::Password(_) => eprintln!("   Auth: app password"),
        MailAuthConfig::OAuth2(oauth) => {
            eprintln!("   Auth: OAuth2 (tokens: {})", oauth.token_path.display())
        }
    }
    eprintln!("   Scan limit: {}", config.scan_limit);

    // ── Model ───────────────────────────────────────────────────────────
    // Loaded once; shared read-only by every request.
    let classifier: Arc<dyn Classifier> = match PretrainedClassifier::load(&config.model) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            tracing::error!(error = %e, "Cannot start without a model");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // ── Mail ────────────────────────────────────────────────────────────
    let gateway: Arc<dyn MailGateway> = Arc::new(ImapSmtpGateway::from_config(&config.mail));

    let scanner = Arc::new(SpamScanner::new(classifier, gateway, config.scan_limit));
    let app = routes(scanner);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Spam Scanner listening");
    eprintln!("   API: http://{}\n", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
