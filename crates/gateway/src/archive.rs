use std::time::Duration;

use {
    botline_config::schema::ArchiveConfig,
    botline_relay::AggregatedResult,
    tracing::{debug, warn},
};

/// Fire-and-forget archival of successful results.
///
/// The dispatch path never awaits the sink; a slow or broken archive only
/// produces a warning. The request timeout is kept short for the same
/// reason.
#[derive(Clone)]
pub struct ArchiveSink {
    client: reqwest::Client,
    base_url: String,
}

impl ArchiveSink {
    pub fn new(config: &ArchiveConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.url.is_empty(), "archive.url is required when enabled");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Post the result to `{base_url}/{kind}` in the background.
    pub fn record(&self, command: &str, kind: &str, result: &AggregatedResult) {
        let url = format!("{}/{kind}", self.base_url);
        let payload = serde_json::json!({
            "command": command,
            "saved_at": chrono::Utc::now(),
            "result": result,
        });
        let client = self.client.clone();

        tokio::spawn(async move {
            let outcome = client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .and_then(|response| response.error_for_status());
            match outcome {
                Ok(_) => debug!(%url, "result archived"),
                Err(e) => warn!(%url, error = %e, "archival sink call failed"),
            }
        });
    }
}
