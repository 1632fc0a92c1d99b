//! Async client for the remote text-to-image service.
//!
//! One call per request, raced against the configured timeout and an optional
//! caller-owned cancellation token. Every outcome is folded into a
//! [`GenerationResult`]; nothing here returns `Err` to the caller.

use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use imagegen_contracts::extract::extract_with_strategy;
use imagegen_contracts::prompts::compose_with;
use imagegen_contracts::request::{GenerationMetadata, GenerationRequest, GenerationResult};
use imagegen_contracts::styles::StyleCatalog;
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;

pub const TIMEOUT_MESSAGE: &str = "Generation timed out. Please try again with a simpler prompt.";
pub const CANCELLED_MESSAGE: &str = "Generation was cancelled.";
pub const NO_IMAGE_URL_MESSAGE: &str = "No image URL found in response";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("API request failed: {code} {reason}")]
    Status { code: u16, reason: String },
    #[error("{0}")]
    Transport(String),
    #[error("Invalid JSON in response: {0}")]
    InvalidJson(String),
    #[error("{}", TIMEOUT_MESSAGE)]
    TimedOut,
    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,
    #[error("{}", NO_IMAGE_URL_MESSAGE)]
    NoImageUrl,
}

impl CallError {
    fn kind(&self) -> &'static str {
        match self {
            CallError::Status { .. } | CallError::Transport(_) => "transport",
            CallError::InvalidJson(_) | CallError::NoImageUrl => "extraction",
            CallError::TimedOut => "timeout",
            CallError::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: HttpClient,
    config: GeneratorConfig,
    styles: StyleCatalog,
}

impl GenerationClient {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: HttpClient, config: GeneratorConfig) -> Self {
        Self {
            http,
            config,
            styles: StyleCatalog::default(),
        }
    }

    pub fn with_styles(mut self, styles: StyleCatalog) -> Self {
        self.styles = styles;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn styles(&self) -> &StyleCatalog {
        &self.styles
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_with_cancellation(request, &CancellationToken::new())
            .await
    }

    /// Single attempt; resolves once, to either variant.
    pub async fn generate_with_cancellation(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let composed = compose_with(&self.styles, request);
        let started = Instant::now();
        info!(
            model = %self.config.model,
            style = request.style.as_deref().unwrap_or("none"),
            aspect_ratio = %request.aspect_ratio,
            quality = %request.quality,
            composed_chars = composed.chars().count(),
            "starting image generation"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CallError::Cancelled),
            timed = tokio::time::timeout(self.config.timeout, self.call(&composed)) => {
                timed.unwrap_or(Err(CallError::TimedOut))
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let image_url = outcome.and_then(|body| match extract_with_strategy(&body) {
            Some((url, strategy)) => {
                debug!(strategy = strategy.name(), "image url extracted");
                Ok(url)
            }
            None => Err(CallError::NoImageUrl),
        });

        match image_url {
            Ok(image_url) => {
                info!(elapsed_ms, %image_url, "image generation succeeded");
                GenerationResult::Success {
                    image_url,
                    metadata: GenerationMetadata {
                        model: self.config.model.clone(),
                        processing_time: Utc::now(),
                        elapsed_ms,
                        prompt: request.prompt.clone(),
                    },
                }
            }
            Err(err) => {
                warn!(elapsed_ms, kind = err.kind(), error = %err, "image generation failed");
                GenerationResult::failure(err.to_string())
            }
        }
    }

    async fn call(&self, composed: &str) -> Result<Value, CallError> {
        let payload = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: composed,
            }],
        };

        let mut builder = self.http.post(&self.config.endpoint).json(&payload);
        if let Some(api_key) = self.config.api_key.as_deref() {
            builder = builder.bearer_auth(api_key);
        }
        if let Some(customer_id) = self.config.customer_id.as_deref() {
            builder = builder.header("customerId", customer_id);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| CallError::Transport(error_chain_text(&err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| CallError::Transport(error_chain_text(&err)))?;
        debug!(bytes = body.len(), "generation response received");
        serde_json::from_str(&body).map_err(|err| CallError::InvalidJson(err.to_string()))
    }
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    parts.join(": ")
}
