use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use pagecraft_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The text-generation collaborator. Output format is never guaranteed.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Builds the client named by `config.provider`.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("llm.api_key is required for the gemini provider"))?;
            Arc::new(GeminiClient::new(
                config.effective_base_url(),
                &config.model,
                api_key,
                config.temperature,
            )?)
        }
        LlmProvider::Ollama => Arc::new(OllamaClient::new(
            config.effective_base_url(),
            &config.model,
            config.temperature,
        )?),
    };
    Ok(client)
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")
}

/// Google Generative Language API client.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: SecretString, temperature: f32) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: [GeminiContentRequest<'a>; 1],
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContentRequest<'a> {
    parts: [GeminiPartRequest<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPartRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate; empty when the model returned none.
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GeminiRequest {
            contents: [GeminiContentRequest { parts: [GeminiPartRequest { text: prompt }] }],
            generation_config: GeminiGenerationConfig { temperature: self.temperature },
        };

        debug!(event_name = "llm.request", provider = "gemini", model = %self.model, "sending prompt");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("gemini returned {status}: {}", truncate(&body, 300));
        }

        let parsed: GeminiResponse =
            response.json().await.context("failed to decode gemini response")?;
        Ok(parsed.into_text())
    }
}

/// Local Ollama instance client.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, temperature: f32) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions { temperature: self.temperature },
        };

        debug!(event_name = "llm.request", provider = "ollama", model = %self.model, "sending prompt");
        let response = self.client.post(&url).json(&body).send().await.map_err(|error| {
            if error.is_connect() {
                anyhow!("could not connect to ollama at {}", self.base_url)
            } else {
                anyhow!(error).context("ollama request failed")
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("ollama returned {status}: {}", truncate(&body, 300));
        }

        let parsed: OllamaGenerateResponse =
            response.json().await.context("failed to decode ollama response")?;
        Ok(parsed.response)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Scripted client for tests and offline runs. Replies are consumed in order;
/// once the script is exhausted every call fails.
#[derive(Clone, Default)]
pub struct ScriptedLlmClient {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone, Debug)]
enum ScriptedReply {
    Text(String),
    Failure(String),
    Stall(Duration, String),
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for reply in replies {
            client.push(ScriptedReply::Text(reply.into()));
        }
        client
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.push(ScriptedReply::Text(reply.into()));
        self
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(ScriptedReply::Failure(message.into()));
        self
    }

    /// Sleeps for `delay` before answering, to exercise timeouts.
    pub fn then_stall(self, delay: Duration, reply: impl Into<String>) -> Self {
        self.push(ScriptedReply::Stall(delay, reply.into()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        match self.prompts.lock() {
            Ok(prompts) => prompts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn remaining(&self) -> usize {
        match self.replies.lock() {
            Ok(replies) => replies.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn push(&self, reply: ScriptedReply) {
        match self.replies.lock() {
            Ok(mut replies) => replies.push_back(reply),
            Err(poisoned) => poisoned.into_inner().push_back(reply),
        }
    }

    fn next_reply(&self, prompt: &str) -> Option<ScriptedReply> {
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(prompt.to_string()),
            Err(poisoned) => poisoned.into_inner().push(prompt.to_string()),
        }
        match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.next_reply(prompt) {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(message)) => Err(anyhow!(message)),
            Some(ScriptedReply::Stall(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => bail!("scripted client has no reply left"),
        }
    }
}
