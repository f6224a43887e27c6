use async_trait::async_trait;

use crate::dispatch::ToolResult;
use crate::extract::Directive;
use crate::message::Message;

/// Observer for the agent loop. Hooks see every step but cannot alter it.
#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn before_generate(&self, _messages: &[Message]) {}

    async fn after_generate(&self, _raw_response: &str) {}

    async fn before_dispatch(&self, _directive: &Directive) {}

    async fn after_dispatch(&self, _result: &ToolResult) {}
}
