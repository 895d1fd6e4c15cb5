//! Text-completion port used by the relay's automated room participant.
//!
//! The relay only needs one capability from a generative model: turn a
//! prompt into a reply. [`TextCompletion`] captures that, and
//! [`GeminiClient`] implements it against Google's `generateContent` API.

mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use parlor_config::AppConfig;

pub use gemini::GeminiClient;

/// Environment variable consulted when no key is present in configuration.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("missing Gemini API key")]
    MissingApiKey,
    #[error("completion request timed out")]
    Timeout,
    #[error("completion http request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("completion provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion provider returned no text")]
    EmptyResponse,
    #[error("invalid completion response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error)
        }
    }
}

/// A service that answers a prompt with generated text.
///
/// Implementations enforce their own timeout; callers treat every error as
/// "no reply".
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

/// Build the completion backend described by `config`.
///
/// Returns `Ok(None)` when the assistant is disabled or no API key is
/// available, so the relay can keep serving rooms without AI replies.
pub fn bootstrap_completion(
    config: &AppConfig,
) -> Result<Option<Arc<dyn TextCompletion>>, CompletionError> {
    if !config.assistant.enabled {
        info!("assistant disabled by configuration");
        return Ok(None);
    }

    let mut gemini = config.orchestrator.gemini.clone();
    if gemini.api_key.is_none() {
        gemini.api_key = std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
    }

    match GeminiClient::from_config(&gemini) {
        Ok(client) => {
            info!(model = %client.model(), "gemini completion client ready");
            Ok(Some(Arc::new(client)))
        }
        Err(CompletionError::MissingApiKey) => {
            warn!("no Gemini API key configured, AI replies are disabled");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}
