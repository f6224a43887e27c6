//! A ReAct-style tool-calling engine for text-only language models.
//!
//! The crate provides:
//! - A text generation abstraction (`TextGenerator`) with scripted, OpenAI and Ollama backends.
//! - A tool interface (`Tool`, `FnTool`) and a shared, read-only `ToolRegistry`.
//! - An extractor that recovers `{"function_name": .., "function_parms": {..}}`
//!   directives from free-form model text.
//! - An `Agent` that loops generate → extract → dispatch → observe until the model
//!   answers or the iteration budget is spent.

mod agent;
mod config;
mod conversation;
mod dispatch;
mod error;
mod extract;
mod hooks;
mod llm;
mod message;
mod metrics;
pub mod prompt;
mod telemetry;
mod tool;
mod toolkit;

pub use agent::{Agent, SessionOutcome, SessionStatus};
pub use config::{
    AgentConfig, AppConfig, LoggingConfig, ModelConfig, Provider, DEFAULT_EXHAUSTED_MESSAGE,
    DEFAULT_MAX_ITERATIONS,
};
pub use conversation::Conversation;
pub use dispatch::{render_value, Dispatcher, ToolResult};
pub use error::{AgentError, Result};
pub use extract::{
    extract_directive, has_pause_signal, Directive, Parameters, DEFAULT_PAUSE_TOKEN,
    FUNCTION_NAME_KEY, PARAMETERS_KEY,
};
pub use hooks::AgentHook;
#[cfg(feature = "http-generators")]
pub use llm::{OllamaGenerator, OpenAiGenerator};
pub use llm::{flatten_prompt, generator_from_config, StubGenerator, TextGenerator};
pub use message::{Message, Role};
pub use metrics::{MetricsTracker, SessionGuard, SessionReport};
pub use telemetry::init_tracing;
pub use tool::{FnTool, Tool, ToolDescription, ToolRegistry};
pub use toolkit::basic_toolkit;
