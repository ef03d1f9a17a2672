use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::{CrawlError, CrawlResult, CrawlStats};

type HmacSha256 = Hmac<Sha256>;

/// External consumption interface for a running crawl (spec §6, §9 design
/// note 2: converts the original's per-page/per-error/on-complete closures
/// into an explicit capability trait so the orchestrator never has to guess
/// what a plain closure is allowed to do — send across tasks, clone, etc.)
#[async_trait::async_trait]
pub trait CrawlSink: Send + Sync {
    async fn on_page(&self, result: CrawlResult);
    async fn on_error(&self, error: CrawlError);
    async fn on_complete(&self, stats: CrawlStats);
}

/// Sink that delivers pages, errors, and the final summary to an HTTP
/// callback URL with HMAC-SHA256-signed bodies, grounded on the original
/// job-batch callback pattern.
pub struct HttpCallbackSink {
    client: reqwest::Client,
    callback_url: String,
    shared_secret: String,
}

impl HttpCallbackSink {
    pub fn new(client: reqwest::Client, callback_url: String, shared_secret: String) -> Self {
        HttpCallbackSink {
            client,
            callback_url,
            shared_secret,
        }
    }

    async fn post_signed(&self, event: &str, body: &serde_json::Value) {
        let body = match serde_json::to_string(body) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(event, error = %e, "failed to serialize sink payload");
                return;
            }
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string();

        let mut mac = HmacSha256::new_from_slice(self.shared_secret.as_bytes())
            .expect("HMAC can take a key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(body.as_bytes());
        let signature = format!("hmac-sha256={}", hex::encode(mac.finalize().into_bytes()));

        match self
            .client
            .post(&self.callback_url)
            .header("Content-Type", "application/json")
            .header("X-Event", event)
            .header("X-Timestamp", &timestamp)
            .header("X-Signature", &signature)
            .body(body)
            .send()
            .await
        {
            Ok(resp) => {
                tracing::debug!(event, status = resp.status().as_u16(), "sink callback sent");
            }
            Err(e) => {
                tracing::warn!(event, error = %e, "sink callback failed (non-fatal)");
            }
        }
    }
}

#[async_trait::async_trait]
impl CrawlSink for HttpCallbackSink {
    async fn on_page(&self, result: CrawlResult) {
        self.post_signed("page", &serde_json::json!({ "page": result })).await;
    }

    async fn on_error(&self, error: CrawlError) {
        self.post_signed("error", &serde_json::json!({ "error": error })).await;
    }

    async fn on_complete(&self, stats: CrawlStats) {
        self.post_signed("complete", &serde_json::json!({ "stats": stats })).await;
    }
}
