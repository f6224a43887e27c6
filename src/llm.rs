//! Text generation backends.
//!
//! The orchestrator only needs "messages in, one block of text out". Hosted and
//! local backends implement [`TextGenerator`]; [`StubGenerator`] replays a script
//! for tests and demos.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{ModelConfig, Provider};
use crate::error::{AgentError, Result};
use crate::message::Message;

/// Produces the next model turn for a conversation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, messages: &[Message], model: &str) -> Result<String>;
}

/// A deterministic generator used for tests and demos.
pub struct StubGenerator {
    responses: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<usize>>,
}

impl StubGenerator {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Scripts `times` copies of the same response.
    pub fn repeating(response: impl Into<String>, times: usize) -> Arc<Self> {
        let response = response.into();
        Self::new(vec![response; times])
    }

    /// Conversation length observed on each call, in call order.
    pub fn seen_lengths(&self) -> Vec<usize> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.seen_lengths().len()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, messages: &[Message], _model: &str) -> Result<String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.len());
        }
        let mut locked = self
            .responses
            .lock()
            .map_err(|_| AgentError::Generation("stub generator poisoned".into()))?;
        locked.pop_front().ok_or_else(|| {
            AgentError::Generation("StubGenerator ran out of scripted responses".into())
        })
    }
}

/// Builds the backend selected by `cfg.provider`.
pub fn generator_from_config(cfg: &ModelConfig) -> Result<Arc<dyn TextGenerator>> {
    match cfg.provider {
        Provider::Stub => Err(AgentError::Config(
            "the stub provider has no script; construct StubGenerator directly".into(),
        )),
        #[cfg(feature = "http-generators")]
        Provider::OpenAi => Ok(Arc::new(http::OpenAiGenerator::from_config(cfg)?)),
        #[cfg(feature = "http-generators")]
        Provider::Ollama => Ok(Arc::new(http::OllamaGenerator::from_config(cfg)?)),
        #[cfg(not(feature = "http-generators"))]
        other => Err(AgentError::Config(format!(
            "provider {other:?} requires the `http-generators` feature"
        ))),
    }
}

/// Flattens a conversation into the single-prompt form used by completion-style
/// endpoints.
pub fn flatten_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let label = match message.role {
            crate::message::Role::System => "System",
            crate::message::Role::User => "User",
            crate::message::Role::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{label}: {}\n\n", message.content));
    }
    prompt.push_str("Assistant: ");
    prompt
}

#[cfg(feature = "http-generators")]
pub use http::{OllamaGenerator, OpenAiGenerator};

#[cfg(feature = "http-generators")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::{flatten_prompt, TextGenerator};
    use crate::config::ModelConfig;
    use crate::error::{AgentError, Result};
    use crate::message::Message;

    fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AgentError::Generation(format!("{provider} rate limit exceeded: {body}"));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return AgentError::Generation(format!("{provider} rejected the credentials: {body}"));
        }
        AgentError::Generation(format!("{provider} request failed with {status}: {body}"))
    }

    fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| AgentError::Generation(format!("http client error: {err}")))
    }

    /// OpenAI chat-completions backend.
    #[derive(Clone)]
    pub struct OpenAiGenerator {
        http: reqwest::Client,
        api_key: String,
        base_url: String,
        temperature: f32,
        max_tokens: u32,
    }

    impl OpenAiGenerator {
        pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
            let api_key = cfg.api_key.clone().ok_or_else(|| {
                AgentError::Config("OPENAI_API_KEY not found in model config or environment".into())
            })?;
            Ok(Self {
                http: http_client(cfg.request_timeout_secs)?,
                api_key,
                base_url: cfg
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
            })
        }
    }

    #[async_trait]
    impl TextGenerator for OpenAiGenerator {
        async fn generate(&self, messages: &[Message], model: &str) -> Result<String> {
            let payload = json!({
                "model": model,
                "messages": messages,
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
            });

            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bearer {}", self.api_key),
                )
                .json(&payload)
                .send()
                .await
                .map_err(|err| AgentError::Generation(format!("OpenAI request error: {err}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(coalesce_error(status, &body, "openai"));
            }

            let body: ChatResponse = resp.json().await.map_err(|err| {
                AgentError::Generation(format!("OpenAI response parse error: {err}"))
            })?;

            body.choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content.unwrap_or_default())
                .ok_or_else(|| AgentError::Generation("OpenAI returned no choices".into()))
        }
    }

    /// Ollama backend using the completion-style `/api/generate` endpoint.
    #[derive(Clone)]
    pub struct OllamaGenerator {
        http: reqwest::Client,
        base_url: String,
        temperature: f32,
        max_tokens: u32,
    }

    impl OllamaGenerator {
        pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
            Ok(Self {
                // Local models can be slow.
                http: http_client(cfg.request_timeout_secs.max(300))?,
                base_url: cfg
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                temperature: cfg.temperature,
                max_tokens: cfg.max_tokens,
            })
        }

        /// Names of the models the local server has pulled. Fails when the
        /// server is unreachable, so callers can check it before a session.
        pub async fn list_models(&self) -> Result<Vec<String>> {
            let resp = self
                .http
                .get(format!("{}/api/tags", self.base_url))
                .send()
                .await
                .map_err(|e| {
                    AgentError::Generation(format!(
                        "Ollama is not reachable at {}: {e}",
                        self.base_url
                    ))
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(coalesce_error(status, &body, "Ollama"));
            }

            let parsed: TagsResponse = resp
                .json()
                .await
                .map_err(|e| AgentError::Generation(format!("Ollama parse error: {e}")))?;
            Ok(parsed.model_names())
        }
    }

    #[async_trait]
    impl TextGenerator for OllamaGenerator {
        async fn generate(&self, messages: &[Message], model: &str) -> Result<String> {
            let prompt = flatten_prompt(messages);
            tracing::debug!(model, prompt_chars = prompt.len(), "sending prompt to ollama");
            let body = json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": self.temperature,
                    "num_predict": self.max_tokens,
                }
            });

            let resp = self
                .http
                .post(format!("{}/api/generate", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| AgentError::Generation(format!("Ollama request failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(coalesce_error(status, &body, "Ollama"));
            }

            let parsed: GenerateResponse = resp
                .json()
                .await
                .map_err(|e| AgentError::Generation(format!("Ollama parse error: {e}")))?;
            Ok(parsed.response)
        }
    }

    #[derive(Debug, Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Debug, Deserialize)]
    struct ChatChoice {
        message: ChatChoiceMessage,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct ChatChoiceMessage {
        content: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct GenerateResponse {
        #[serde(default)]
        response: String,
    }

    #[derive(Debug, Deserialize)]
    struct TagsResponse {
        #[serde(default)]
        models: Vec<LocalModel>,
    }

    #[derive(Debug, Deserialize)]
    struct LocalModel {
        name: String,
    }

    impl TagsResponse {
        fn model_names(self) -> Vec<String> {
            self.models.into_iter().map(|model| model.name).collect()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn openai_requires_api_key() {
            let cfg = ModelConfig::default();

            let err = OpenAiGenerator::from_config(&cfg).err().unwrap();

            assert!(matches!(err, AgentError::Config(message) if message.contains("OPENAI_API_KEY")));
        }

        #[test]
        fn ollama_builds_without_credentials() {
            assert!(OllamaGenerator::from_config(&ModelConfig::default()).is_ok());
        }

        #[test]
        fn parses_chat_response_shape() {
            let body: ChatResponse = serde_json::from_str(
                r#"{"choices":[{"message":{"role":"assistant","content":"Answer: 4."},"finish_reason":"stop"}]}"#,
            )
            .unwrap();

            assert_eq!(body.choices[0].message.content.as_deref(), Some("Answer: 4."));
        }

        #[test]
        fn parses_tags_response_shape() {
            let body: TagsResponse = serde_json::from_str(
                r#"{"models":[{"name":"llama3.1:8b","modified_at":"2024-07-23T10:00:00Z","size":4661224676,"digest":"abc"},{"name":"mistral:latest","size":1}]}"#,
            )
            .unwrap();

            assert_eq!(body.model_names(), vec!["llama3.1:8b", "mistral:latest"]);
        }

        #[tokio::test]
        async fn listing_models_fails_when_server_is_down() {
            let cfg = ModelConfig {
                base_url: Some("http://127.0.0.1:1".into()),
                ..ModelConfig::default()
            };
            let ollama = OllamaGenerator::from_config(&cfg).unwrap();

            let err = ollama.list_models().await.unwrap_err();

            assert!(matches!(err, AgentError::Generation(message) if message.contains("not reachable")));
        }
    }
}
