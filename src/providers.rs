//! Default HTTP-backed implementations of the capability interfaces.
//!
//! - **[`HttpDocumentOcr`]** — posts chunk bytes (base64) to a
//!   document-AI-style REST endpoint and maps the response onto
//!   [`OcrOutput`].
//! - **[`HttpRegionOcr`]** — same transport against a header/footer band
//!   endpoint.
//! - **[`OpenAiCompletionModel`]** — chat-completions call returning the
//!   raw message content.
//! - **[`DisabledOcr`]** / **[`DisabledCompletionModel`]** — always-error
//!   stand-ins for deployments where the services are not configured.
//! - **[`StaticAliasLookup`]** — in-memory issuing-authority alias table.
//!
//! # Retry strategy
//!
//! All HTTP providers retry transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! No [`crate::traits::DocumentStore`] implementation lives here: that is
//! the CRUD layer's database and always arrives from the caller.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::config::AliasConfig;
use crate::models::{Entity, OcrOutput, RegionScan};
use crate::traits::{AliasLookup, CompletionModel, DocumentOcr, RegionOcr};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// POST a JSON body with retry/backoff; returns the decoded JSON response.
async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("{} error {}: {}", url, status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("{} error {}: {}", url, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed after retries")))
}

// ============ Document OCR ============

/// OCR over a document-AI-style REST endpoint.
///
/// Request: `{"content": "<base64 bytes>", "mime_type": "application/pdf"}`.
/// Response: `{"text": "...", "entities": [{"type": "...",
/// "mention_text": "...", "confidence": 0.97}]}`.
pub struct HttpDocumentOcr {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    entities: Vec<OcrEntity>,
}

#[derive(Deserialize)]
struct OcrEntity {
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    mention_text: String,
    #[serde(default)]
    confidence: f64,
}

impl HttpDocumentOcr {
    /// `api_key` is optional; when present it is sent as a bearer token.
    pub fn new(endpoint: String, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            endpoint,
            api_key,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }
}

#[async_trait]
impl DocumentOcr for HttpDocumentOcr {
    async fn analyze(&self, bytes: &[u8], mime_type: &str) -> Result<OcrOutput> {
        let body = serde_json::json!({
            "content": base64::engine::general_purpose::STANDARD.encode(bytes),
            "mime_type": mime_type,
        });
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
        )
        .await?;

        let response: OcrResponse = serde_json::from_value(json)?;
        Ok(OcrOutput {
            text: response.text,
            entities: response
                .entities
                .into_iter()
                .map(|e| Entity {
                    entity_type: e.entity_type,
                    mention_text: e.mention_text,
                    confidence: e.confidence.clamp(0.0, 1.0),
                })
                .collect(),
        })
    }
}

// ============ Region OCR ============

/// Header/footer band scan over the same transport.
///
/// Request: `{"content": "<base64 first page>"}`. Response:
/// `{"header_text": "...", "footer_text": "..."}`.
pub struct HttpRegionOcr {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_retries: u32,
}

#[derive(Deserialize)]
struct RegionResponse {
    #[serde(default)]
    header_text: String,
    #[serde(default)]
    footer_text: String,
}

impl HttpRegionOcr {
    pub fn new(endpoint: String, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            endpoint,
            api_key,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }
}

#[async_trait]
impl RegionOcr for HttpRegionOcr {
    async fn scan_header_footer(&self, first_page: &[u8]) -> Result<RegionScan> {
        let body = serde_json::json!({
            "content": base64::engine::general_purpose::STANDARD.encode(first_page),
        });
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
        )
        .await?;

        let response: RegionResponse = serde_json::from_value(json)?;
        Ok(RegionScan {
            header_text: response.header_text,
            footer_text: response.footer_text,
        })
    }
}

// ============ Completion model ============

/// Completion provider calling the OpenAI chat-completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiCompletionModel {
    model: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiCompletionModel {
    pub fn new(model: String, timeout_secs: u64) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            model,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletionModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
        });
        let json = post_json_with_retry(
            &self.client,
            "https://api.openai.com/v1/chat/completions",
            Some(&api_key),
            &body,
            self.max_retries,
        )
        .await?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("completion response missing message content"))
    }
}

// ============ Disabled stand-ins ============

/// OCR stand-in that always errors; use when the service is unconfigured.
pub struct DisabledOcr;

#[async_trait]
impl DocumentOcr for DisabledOcr {
    async fn analyze(&self, _bytes: &[u8], _mime_type: &str) -> Result<OcrOutput> {
        bail!("OCR service is disabled")
    }
}

/// Completion stand-in that always errors.
pub struct DisabledCompletionModel;

#[async_trait]
impl CompletionModel for DisabledCompletionModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("completion model is disabled")
    }
}

// ============ Alias lookup ============

/// In-memory issuing-authority alias table, built from config. Keys are
/// compared case-insensitively; unknown names pass through trimmed.
pub struct StaticAliasLookup {
    canonical: BTreeMap<String, String>,
}

impl StaticAliasLookup {
    pub fn from_config(config: &AliasConfig) -> Self {
        Self {
            canonical: config
                .canonical
                .iter()
                .map(|(alias, canonical)| (alias.trim().to_uppercase(), canonical.clone()))
                .collect(),
        }
    }
}

impl AliasLookup for StaticAliasLookup {
    fn normalize(&self, org_name: &str) -> String {
        let trimmed = org_name.trim();
        self.canonical
            .get(&trimmed.to_uppercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}
