use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::extract::Parameters;
use crate::tool::{Tool, ToolRegistry};

/// Demo tools that need no network access.
pub fn basic_toolkit() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);
    registry.register(CurrentTimeTool);
    registry
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the provided parameters back to the caller."
    }

    async fn call(&self, params: Parameters) -> Result<Value> {
        Ok(json!({ "echo": params }))
    }
}

struct CurrentTimeTool;

const ZONE_OFFSETS: &[(&str, i64)] = &[("UTC", 0), ("EST", -5), ("PST", -8), ("CET", 1), ("JST", 9)];

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Returns the current unix time, optionally shifted to a zone. Expects {\"timezone\": string} (default UTC)."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {"timezone": {"type": "string"}},
        }))
    }

    async fn call(&self, params: Parameters) -> Result<Value> {
        let zone = params
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC")
            .to_ascii_uppercase();
        let offset_hours = ZONE_OFFSETS
            .iter()
            .find(|(name, _)| *name == zone)
            .map(|(_, hours)| *hours)
            .ok_or_else(|| AgentError::tool(self.name(), format!("unknown timezone `{zone}`")))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| AgentError::tool(self.name(), err.to_string()))?
            .as_secs() as i64;

        Ok(json!({
            "timezone": zone,
            "timestamp": now,
            "local_timestamp": now + offset_hours * 3600,
        }))
    }
}
