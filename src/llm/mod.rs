//! Reqwest-based client for the Gemini generateContent API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Outcome of one generation attempt. A blocked reply is a distinct,
/// user-facing state carrying the engine's reason code, never an empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    Text(String),
    Blocked { reason: String },
}

/// The process-wide engine handle is constructed once at startup and passed
/// by reference into the request handler, so tests can substitute a double.
#[async_trait]
pub trait GenerativeEngine: Send + Sync {
    async fn generate(&self, instruction: &str) -> Result<EngineReply>;
}

#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn from_config(cfg: &Config, model: &str) -> Result<Self> {
        let api_key = cfg.api_key().ok_or_else(|| {
            anyhow::anyhow!("Missing GOOGLE_API_KEY. Set it in env or ~/.config/plotgpt/.plotgptrc")
        })?;

        let base_url = cfg
            .get("API_BASE_URL")
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into())
            .trim_end_matches('/')
            .to_string();

        let timeout = cfg.get_u64("REQUEST_TIMEOUT").unwrap_or(60);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl GenerativeEngine for GeminiClient {
    async fn generate(&self, instruction: &str) -> Result<EngineReply> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![Part {
                    text: Some(instruction.to_string()),
                }],
            }],
            generation_config: GenerationConfig::default(),
        };

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("failed to send generateContent request")?;

        match resp.status() {
            StatusCode::OK => {}
            status => {
                let text = resp.text().await.unwrap_or_default();
                bail!("engine returned {}: {}", status, text);
            }
        }

        let reply: GenerateResponse = resp
            .json()
            .await
            .context("failed to decode generateContent response")?;
        reply.into_engine_reply()
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 1.0,
            top_k: 32,
            max_output_tokens: 4096,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_engine_reply(self) -> Result<EngineReply> {
        // Prompt-level block: no candidates are produced at all.
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Ok(EngineReply::Blocked { reason });
        }

        let candidate = self
            .candidates
            .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
            .ok_or_else(|| anyhow::anyhow!("engine reply contained no candidates"))?;

        let text: String = candidate
            .content
            .and_then(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            // Candidate-level block: generation stopped for a safety reason
            // before any text was emitted.
            if let Some(reason) = candidate.finish_reason {
                if reason != "STOP" && reason != "MAX_TOKENS" {
                    return Ok(EngineReply::Blocked { reason });
                }
            }
            bail!("engine reply contained no text");
        }

        Ok(EngineReply::Text(text))
    }
}
