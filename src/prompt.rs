//! System prompts that teach a text-only model the Thought / Action / PAUSE /
//! observation / Answer protocol.

use crate::extract::{FUNCTION_NAME_KEY, PARAMETERS_KEY};
use crate::tool::ToolRegistry;

pub const GENERAL_ASSISTANT: &str = "You are a helpful AI Agent.";
pub const SEO_AUDITOR: &str = "You are an SEO Auditor AI Agent.";
pub const FINANCIAL_ANALYST: &str = "You are a Financial Analyst AI Agent.";
pub const DATA_SCIENTIST: &str = "You are a Data Scientist AI Agent.";

/// Renders the loop protocol, the tool catalog and a worked example.
pub fn react_system_prompt(
    persona: &str,
    tools: &ToolRegistry,
    pause_token: &str,
    observation_prefix: &str,
) -> String {
    let observation_label = observation_prefix.trim().trim_end_matches(':');
    let mut prompt = String::new();
    if !persona.trim().is_empty() {
        prompt.push_str(persona.trim());
        prompt.push(' ');
    }
    prompt.push_str(&format!(
        "You run in a loop of Thought, Action, {pause_token}, {observation_label}.\n"
    ));
    prompt.push_str("At the end of the loop you output an Answer.\n\n");
    prompt.push_str("Use Thought to understand the question you have been asked.\n");
    prompt.push_str(&format!(
        "Use Action to run one of the actions available to you - then return {pause_token}.\n"
    ));
    prompt.push_str(&format!(
        "{observation_label} will be the result of running those actions.\n\n"
    ));

    let catalog = tools.describe();
    if catalog.is_empty() {
        prompt.push_str("No actions are available. Answer directly.\n");
        return prompt;
    }

    prompt.push_str("Your available actions are:\n\n");
    for tool in &catalog {
        prompt.push_str(&format!("{}:\n{}\n", tool.name, tool.description));
        if let Some(params) = &tool.parameters {
            prompt.push_str(&format!("parameters: {params}\n"));
        }
        prompt.push('\n');
    }

    let example = &catalog[0].name;
    prompt.push_str("Always express an Action as a single JSON object:\n\n");
    prompt.push_str(&format!(
        "{{\n  \"{FUNCTION_NAME_KEY}\": \"{example}\",\n  \"{PARAMETERS_KEY}\": {{ ... }}\n}}\n\n"
    ));
    prompt.push_str(&format!("{pause_token}\n\n"));
    prompt.push_str("You will be called again with this:\n\n");
    prompt.push_str(&format!("{observation_prefix}<result of {example}>\n\n"));
    prompt.push_str("When you have enough information, output:\n\n");
    prompt.push_str("Answer: <your final answer>\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::error::AgentError;

    #[test]
    fn lists_tools_and_protocol_markers() {
        let mut tools = ToolRegistry::new();
        tools.register_fn("get_stock_price", "Returns stock price for a symbol", |_| async {
            Ok::<_, AgentError>(json!(150.25))
        });
        tools.register_fn("get_current_time", "Returns the current time", |_| async {
            Ok::<_, AgentError>(json!("12:00"))
        });

        let prompt = react_system_prompt(FINANCIAL_ANALYST, &tools, "PAUSE", "Action_Response: ");

        assert!(prompt.starts_with("You are a Financial Analyst AI Agent. You run in a loop"));
        assert!(prompt.contains("Thought, Action, PAUSE, Action_Response."));
        assert!(prompt.contains("get_stock_price:\nReturns stock price for a symbol"));
        assert!(prompt.contains("\"function_name\": \"get_current_time\""));
        assert!(prompt.contains("\"function_parms\""));
        assert!(prompt.contains("Action_Response: <result of get_current_time>"));
    }

    #[test]
    fn empty_registry_asks_for_direct_answers() {
        let prompt = react_system_prompt("", &ToolRegistry::new(), "PAUSE", "Action_Response: ");

        assert!(prompt.starts_with("You run in a loop"));
        assert!(prompt.contains("No actions are available"));
    }
}
