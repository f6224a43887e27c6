use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::extract::Directive;
use crate::tool::ToolRegistry;

/// Text outcome of a dispatched directive. Every variant renders to the single
/// observation string fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success { name: String, output: String },
    NotFound { name: String },
    Failed { name: String, error: String },
}

impl ToolResult {
    pub fn name(&self) -> &str {
        match self {
            ToolResult::Success { name, .. }
            | ToolResult::NotFound { name }
            | ToolResult::Failed { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ToolResult::Success { .. })
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolResult::Success { output, .. } => f.write_str(output),
            ToolResult::NotFound { name } => write!(f, "Function {name} not found"),
            ToolResult::Failed { name, error } => write!(f, "Error executing {name}: {error}"),
        }
    }
}

/// Resolves directives against a shared registry. Never returns an error:
/// unknown tools, tool errors and tool panics all become a [`ToolResult`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, directive: &Directive) -> ToolResult {
        let name = directive.function_name.clone();
        let call = self
            .registry
            .call(&name, directive.parameters.clone());

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => {
                debug!(tool = %name, "tool call succeeded");
                ToolResult::Success {
                    name,
                    output: render_value(&value),
                }
            }
            Ok(Err(AgentError::ToolNotFound(_))) => {
                warn!(tool = %name, "model requested an unregistered tool");
                ToolResult::NotFound { name }
            }
            Ok(Err(AgentError::ToolInvocation { source, .. })) => {
                warn!(tool = %name, error = %source, "tool call failed");
                ToolResult::Failed {
                    name,
                    error: source.to_string(),
                }
            }
            Ok(Err(other)) => {
                warn!(tool = %name, error = %other, "tool call failed");
                ToolResult::Failed {
                    name,
                    error: other.to_string(),
                }
            }
            Err(panic) => {
                let error = panic_message(panic.as_ref());
                warn!(tool = %name, error = %error, "tool panicked");
                ToolResult::Failed { name, error }
            }
        }
    }
}

/// Strings are emitted verbatim; everything else as compact JSON. Object keys
/// come out in sorted order so the rendering is deterministic.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("tool panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("tool panicked: {message}")
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::extract::Parameters;

    fn dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register_fn("calc", "Adds a and b", |params: Parameters| async move {
            let a = params.get("a").and_then(Value::as_i64).unwrap_or_default();
            let b = params.get("b").and_then(Value::as_i64).unwrap_or_default();
            Ok::<_, AgentError>(json!(a + b))
        });
        registry.register_fn("time", "Current time", |_| async {
            Ok::<_, AgentError>(json!({"zone": "UTC", "hour": 12}))
        });
        registry.register_fn("greet", "Says hi", |_| async {
            Ok::<_, AgentError>(json!("hello"))
        });
        registry.register_fn("broken", "Always fails", |_| async {
            Err::<Value, _>(AgentError::tool("broken", "upstream timed out"))
        });
        registry.register_fn("panicky", "Panics", |_| async {
            if true {
                panic!("index out of range");
            }
            Ok::<_, AgentError>(Value::Null)
        });
        Dispatcher::new(Arc::new(registry))
    }

    fn directive(name: &str, params: Value) -> Directive {
        Directive::new(name, params.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn renders_successful_values() {
        let dispatcher = dispatcher();

        let sum = dispatcher.dispatch(&directive("calc", json!({"a": 2, "b": 2}))).await;
        let time = dispatcher.dispatch(&directive("time", json!({}))).await;
        let greet = dispatcher.dispatch(&directive("greet", json!({}))).await;

        assert_eq!(sum.text(), "4");
        assert_eq!(time.text(), r#"{"hour":12,"zone":"UTC"}"#);
        assert_eq!(greet.text(), "hello");
        assert!(!sum.is_failure());
    }

    #[tokio::test]
    async fn unknown_tool_becomes_not_found_observation() {
        let dispatcher = dispatcher();

        let result = dispatcher
            .dispatch(&directive("get_weather_info", json!({"city": "tokyo"})))
            .await;

        assert_eq!(
            result,
            ToolResult::NotFound {
                name: "get_weather_info".into()
            }
        );
        assert_eq!(result.text(), "Function get_weather_info not found");
    }

    #[tokio::test]
    async fn tool_errors_carry_name_and_message() {
        let result = dispatcher().dispatch(&directive("broken", json!({}))).await;

        assert!(result.is_failure());
        assert_eq!(result.text(), "Error executing broken: upstream timed out");
    }

    #[tokio::test]
    async fn tool_panics_are_contained() {
        let result = dispatcher().dispatch(&directive("panicky", json!({}))).await;

        assert_eq!(result.name(), "panicky");
        assert!(result.text().starts_with("Error executing panicky:"));
        assert!(result.text().contains("index out of range"));
    }
}
