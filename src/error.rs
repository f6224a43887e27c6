use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool `{0}` not found")]
    ToolNotFound(String),

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    /// Convenience for tools that want to fail with a plain message.
    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        AgentError::ToolInvocation {
            name: name.into(),
            source: message.into(),
        }
    }
}
