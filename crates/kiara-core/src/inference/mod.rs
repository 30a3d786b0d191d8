//! Contract with the model-inference collaborator.
//!
//! Kiara never runs the model itself.  An [`InferenceBackend`] takes a fully
//! formatted prompt and returns the decoded text of the whole sequence,
//! special tokens included; cleaning happens afterwards in
//! [`crate::cleaner`].

pub mod llama_server;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompt::PromptError;

pub use llama_server::LlamaServerBackend;

/// Sampling parameters sent with every generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature: 0.3,
            top_p: 0.7,
            repetition_penalty: 1.2,
        }
    }
}

/// Everything that can go wrong between formatting a prompt and receiving
/// raw model output.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to render chat prompt")]
    Prompt(#[from] PromptError),

    #[error("inference request failed")]
    Request(#[source] reqwest::Error),

    #[error("inference request timed out")]
    Timeout,

    #[error("inference runtime returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("inference runtime returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("inference backend unavailable: {0}")]
    Unavailable(String),
}

/// Opaque text-generation capability.
///
/// Implementations may block on a single device or batch requests; callers
/// only rely on `generate` resolving once per call.
#[async_trait]
pub trait InferenceBackend: Send + Sync + 'static {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt` and return the decoded sequence.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}
