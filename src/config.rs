use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::extract::DEFAULT_PAUSE_TOKEN;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_EXHAUSTED_MESSAGE: &str =
    "I could not complete the task within the allowed number of tool-calling iterations.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_pause_token")]
    pub pause_token: String,
    #[serde(default = "default_require_pause_signal")]
    pub require_pause_signal: bool,
    #[serde(default = "default_observation_prefix")]
    pub observation_prefix: String,
    #[serde(default = "default_exhausted_message")]
    pub exhausted_message: String,
    #[serde(default)]
    pub generation_timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            pause_token: default_pause_token(),
            require_pause_signal: default_require_pause_signal(),
            observation_prefix: default_observation_prefix(),
            exhausted_message: default_exhausted_message(),
            generation_timeout_secs: None,
        }
    }
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_pause_token() -> String {
    DEFAULT_PAUSE_TOKEN.into()
}

fn default_require_pause_signal() -> bool {
    true
}

fn default_observation_prefix() -> String {
    "Action_Response: ".into()
}

fn default_exhausted_message() -> String {
    DEFAULT_EXHAUSTED_MESSAGE.into()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Stub,
    OpenAi,
    Ollama,
}

impl std::str::FromStr for Provider {
    type Err = AgentError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "stub" => Ok(Provider::Stub),
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(AgentError::Config(format!("unknown provider `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut cfg: Self = toml::from_str(raw)
            .map_err(|err| AgentError::Config(format!("Failed to parse configuration: {err}")))?;
        cfg.normalize();
        Ok(cfg)
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = env::var("REACT_AGENT_MAX_ITERATIONS") {
            if let Ok(parsed) = raw.parse::<usize>() {
                self.agent.max_iterations = parsed;
            }
        }
        if let Ok(token) = env::var("REACT_AGENT_PAUSE_TOKEN") {
            self.agent.pause_token = token;
        }
        if let Ok(raw) = env::var("REACT_AGENT_REQUIRE_PAUSE") {
            if let Ok(parsed) = raw.parse::<bool>() {
                self.agent.require_pause_signal = parsed;
            }
        }
        if let Ok(raw) = env::var("REACT_AGENT_PROVIDER") {
            if let Ok(parsed) = raw.parse::<Provider>() {
                self.model.provider = parsed;
            }
        }
        if let Ok(model) = env::var("REACT_AGENT_MODEL").or_else(|_| env::var("OPENAI_MODEL")) {
            self.model.model = model;
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(raw) = env::var("OPENAI_TEMPERATURE") {
            if let Ok(parsed) = raw.parse::<f32>() {
                self.model.temperature = parsed;
            }
        }
        if let Ok(raw) = env::var("OPENAI_MAX_TOKENS") {
            if let Ok(parsed) = raw.parse::<u32>() {
                self.model.max_tokens = parsed;
            }
        }
        if let Ok(host) = env::var("OLLAMA_HOST") {
            if self.model.provider == Provider::Ollama {
                self.model.base_url = Some(host);
            }
        }
        if let Ok(filter) = env::var("REACT_AGENT_LOG") {
            self.logging.filter = filter;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.agent.max_iterations = self.agent.max_iterations.max(1);
        self.model.temperature = self.model.temperature.clamp(0.0, 2.0);
    }
}
