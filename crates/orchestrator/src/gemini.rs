use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parlor_config::GeminiProviderConfig;

use crate::{CompletionError, TextCompletion};

/// Client for the Gemini `models/{model}:generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    endpoint: String,
    model: String,
    system_instruction: Option<String>,
}

impl GeminiClient {
    pub fn from_config(config: &GeminiProviderConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CompletionError::MissingApiKey)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            http,
            api_key,
            endpoint,
            model: config.model.clone(),
            system_instruction: config.system_instruction.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: self.system_instruction.as_deref().map(|text| Content {
                parts: vec![Part { text }],
            }),
        }
    }
}

#[async_trait]
impl TextCompletion for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "requesting gemini completion");

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}
