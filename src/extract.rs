//! Recovers a tool-call directive from free-form model text.
//!
//! Extraction runs in two stages. The primary stage scans the text for
//! brace-balanced object spans (string literals are respected) and parses the
//! first span that mentions both directive keys. If that yields nothing usable,
//! the fallback stage parses everything between the first `{` and the last `}`.
//! Any failure downgrades to "no directive"; nothing here returns an error.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Named arguments passed to a tool.
pub type Parameters = Map<String, Value>;

/// Literal the model emits when it proposes a call and waits for the result.
pub const DEFAULT_PAUSE_TOKEN: &str = "PAUSE";

pub const FUNCTION_NAME_KEY: &str = "function_name";
pub const PARAMETERS_KEY: &str = "function_parms";

/// A tool name plus its arguments, parsed out of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub function_name: String,
    #[serde(
        rename = "function_parms",
        default,
        deserialize_with = "nullable_parameters"
    )]
    pub parameters: Parameters,
}

impl Directive {
    pub fn new(function_name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            function_name: function_name.into(),
            parameters,
        }
    }
}

fn nullable_parameters<'de, D>(deserializer: D) -> Result<Parameters, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Parameters>::deserialize(deserializer)?.unwrap_or_default())
}

fn directive_keys() -> &'static Regex {
    static KEYS: OnceLock<Regex> = OnceLock::new();
    KEYS.get_or_init(|| {
        Regex::new(r#""function_name"[\s\S]*"function_parms""#)
            .expect("directive key pattern is valid")
    })
}

/// Cheap pre-filter: did the model signal that it is waiting on a tool?
pub fn has_pause_signal(text: &str, pause_token: &str) -> bool {
    !pause_token.is_empty() && text.contains(pause_token)
}

/// Returns the first recoverable directive in `text`, if any.
pub fn extract_directive(text: &str) -> Option<Directive> {
    if let Some(directive) = primary_candidate(text).and_then(parse_directive) {
        return Some(directive);
    }
    fallback_span(text).and_then(parse_directive)
}

fn primary_candidate(text: &str) -> Option<&str> {
    object_spans(text)
        .into_iter()
        .find(|span| directive_keys().is_match(span))
}

fn fallback_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_directive(candidate: &str) -> Option<Directive> {
    serde_json::from_str(candidate).ok()
}

/// Outermost brace-balanced spans, in order of appearance, found in one pass.
/// String literals are only tracked inside an open brace. A brace that never
/// closes contributes nothing, but the balanced spans inside it still count.
fn object_spans(text: &str) -> Vec<&str> {
    let mut open: Vec<usize> = Vec::new();
    let mut closed: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(idx),
            '}' => {
                let Some(start) = open.pop() else {
                    continue;
                };
                while closed.last().is_some_and(|&(inner, _)| inner > start) {
                    closed.pop();
                }
                closed.push((start, idx + 1));
            }
            _ => {}
        }
    }
    closed
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn recovers_directive_surrounded_by_prose() {
        let text = r#"Thought: compute. Action: {"function_name":"calc","function_parms":{"expression":"2+2"}} PAUSE"#;

        let directive = extract_directive(text).unwrap();

        assert_eq!(
            directive,
            Directive::new("calc", params(json!({"expression": "2+2"})))
        );
    }

    #[test]
    fn recovers_multiline_directive() {
        let text = "Thought: I need the weather.\nAction:\n\n{\n  \"function_name\": \"get_weather_info\",\n  \"function_parms\": {\n    \"city\": \"tokyo\"\n  }\n}\n\nPAUSE";

        let directive = extract_directive(text).unwrap();

        assert_eq!(directive.function_name, "get_weather_info");
        assert_eq!(directive.parameters["city"], "tokyo");
    }

    #[test]
    fn picks_first_of_several_candidates() {
        let text = r#"Action: {"function_name":"first","function_parms":{"n":1}} or maybe {"function_name":"second","function_parms":{"n":2}} PAUSE"#;

        assert_eq!(extract_directive(text).unwrap().function_name, "first");
    }

    #[test]
    fn skips_objects_without_directive_keys() {
        let text = r#"Given {"note": "ignore me"}, Action: {"function_name":"echo","function_parms":{"text":"hi"}} PAUSE"#;

        assert_eq!(extract_directive(text).unwrap().function_name, "echo");
    }

    #[test]
    fn tolerates_unbalanced_prose_braces() {
        let text = r#"Sets look like { this. Action: {"function_name":"echo","function_parms":{"text":"}"}} PAUSE"#;

        let directive = extract_directive(text).unwrap();

        assert_eq!(directive.function_name, "echo");
        assert_eq!(directive.parameters["text"], "}");
    }

    #[test]
    fn missing_or_null_parameters_are_empty() {
        let absent = extract_directive(r#"{"function_name":"get_current_time"}"#).unwrap();
        let null =
            extract_directive(r#"{"function_name":"get_current_time","function_parms":null}"#)
                .unwrap();

        assert!(absent.parameters.is_empty());
        assert!(null.parameters.is_empty());
    }

    #[test]
    fn non_object_parameters_are_rejected() {
        let text = r#"{"function_name":"calc","function_parms":["2+2"]}"#;

        assert_eq!(extract_directive(text), None);
    }

    #[test]
    fn no_braces_means_no_directive() {
        assert_eq!(extract_directive("Answer: 4."), None);
        assert_eq!(extract_directive(""), None);
        assert_eq!(extract_directive("} backwards {"), None);
    }

    #[test]
    fn malformed_json_means_no_directive() {
        let text = r#"Action: {"function_name": "calc", "function_parms": {"expression": } PAUSE"#;

        assert_eq!(extract_directive(text), None);
    }

    #[test]
    fn fallback_swallows_everything_between_outer_braces() {
        // Keys in the opposite order are not a primary candidate, so the
        // outermost span is parsed instead.
        let text = r#"Action: {"function_parms":{"q":"rust"},"function_name":"search_web"} PAUSE"#;

        let directive = extract_directive(text).unwrap();

        assert_eq!(directive.function_name, "search_web");
        assert_eq!(directive.parameters["q"], "rust");
    }

    #[test]
    fn pause_signal_is_a_plain_substring_check() {
        assert!(has_pause_signal("Action: {...}\nPAUSE", DEFAULT_PAUSE_TOKEN));
        assert!(!has_pause_signal("Answer: done", DEFAULT_PAUSE_TOKEN));
        assert!(!has_pause_signal("anything", ""));
    }

    #[test]
    fn long_runs_of_unclosed_braces_stay_linear() {
        let started = std::time::Instant::now();

        assert_eq!(extract_directive(&"{".repeat(200_000)), None);
        let mut text = "{ ".repeat(100_000);
        text.push_str(r#"Action: {"function_name":"calc","function_parms":{"expression":"2+2"}} PAUSE (see {note})"#);
        let directive = extract_directive(&text).unwrap();

        assert_eq!(directive.function_name, "calc");
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn balanced_spans_inside_an_unclosed_brace_are_candidates() {
        let text = r#"note { {"function_name":"echo","function_parms":{"text":"a"}} trailing PAUSE"#;

        assert_eq!(
            object_spans(text),
            vec![r#"{"function_name":"echo","function_parms":{"text":"a"}}"#]
        );
        assert_eq!(extract_directive(text).unwrap().function_name, "echo");
    }

    #[test]
    fn directive_serializes_to_wire_shape() {
        let directive = Directive::new("calc", params(json!({"expression": "1+1"})));

        let wire = serde_json::to_value(&directive).unwrap();

        assert_eq!(
            wire,
            json!({"function_name": "calc", "function_parms": {"expression": "1+1"}})
        );
    }
}
