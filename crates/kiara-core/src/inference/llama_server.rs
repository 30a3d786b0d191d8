//! [`InferenceBackend`] backed by a llama.cpp-compatible HTTP server.
//!
//! The server's `POST /completion` endpoint returns only the newly generated
//! text.  The backend prepends the prompt so callers see the same full
//! sequence a local `decode(output[0])` would produce.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use super::{GenerationError, GenerationOptions, InferenceBackend};

/// Longest error body kept from a failed response.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    stream: bool,
}

impl<'a> CompletionRequest<'a> {
    fn new(prompt: &'a str, options: &GenerationOptions) -> Self {
        Self {
            prompt,
            n_predict: options.max_new_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            repeat_penalty: options.repetition_penalty,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Client for one inference server.
#[derive(Debug, Clone)]
pub struct LlamaServerBackend {
    client: reqwest::Client,
    completion_url: String,
    /// Bounds in-flight generations; the server typically runs one slot.
    permits: Arc<Semaphore>,
}

impl LlamaServerBackend {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        max_concurrent: usize,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GenerationError::Request)?;
        Ok(Self {
            client,
            completion_url: completion_url(base_url),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    pub fn completion_url(&self) -> &str {
        &self.completion_url
    }
}

fn completion_url(base_url: &str) -> String {
    format!("{}/completion", base_url.trim_end_matches('/'))
}

fn map_transport(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Request(e)
    }
}

#[async_trait]
impl InferenceBackend for LlamaServerBackend {
    fn name(&self) -> &str {
        "llama-server"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GenerationError::Unavailable("generation queue closed".into()))?;

        let response = self
            .client
            .post(&self.completion_url)
            .json(&CompletionRequest::new(prompt, options))
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::InvalidResponse(e.to_string())
            }
        })?;

        debug!(
            prompt_len = prompt.len(),
            completion_len = completion.content.len(),
            "completion received"
        );

        let mut raw = String::with_capacity(prompt.len() + completion.content.len());
        raw.push_str(prompt);
        raw.push_str(&completion.content);
        Ok(raw)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
