use crate::error::{AgentError, Result};
use crate::message::{Message, Role};

/// Append-only transcript owned by a single agent session.
///
/// A conversation always opens with one system message followed by one user
/// message. Only the orchestrator appends to it afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn initialize(system_prompt: impl Into<String>, question: impl Into<String>) -> Result<Self> {
        let system_prompt = system_prompt.into();
        let question = question.into();
        if system_prompt.trim().is_empty() {
            return Err(AgentError::InvalidConversation(
                "system prompt must not be empty".into(),
            ));
        }
        if question.trim().is_empty() {
            return Err(AgentError::InvalidConversation(
                "user question must not be empty".into(),
            ));
        }
        Ok(Self {
            messages: vec![Message::system(system_prompt), Message::user(question)],
        })
    }

    pub(crate) fn append_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Observations travel back to the model as user-role turns.
    pub(crate) fn append_observation(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of completed assistant/observation rounds.
    pub fn rounds(&self) -> usize {
        self.messages
            .iter()
            .skip(2)
            .filter(|m| m.role == Role::Assistant)
            .count()
    }
}
