use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{AgentConfig, AppConfig};
use crate::conversation::Conversation;
use crate::dispatch::Dispatcher;
use crate::error::{AgentError, Result};
use crate::extract::{extract_directive, has_pause_signal, Directive};
use crate::hooks::AgentHook;
use crate::llm::TextGenerator;
use crate::message::Message;
use crate::metrics::{MetricsTracker, SessionGuard};
use crate::tool::ToolRegistry;

/// Terminal status of a session that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Answered,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionState {
    Running { iteration: usize },
    Answered(String),
    Exhausted,
}

/// Mutable state of one run: the transcript, the round counter and the state
/// machine position. Only [`Agent::run`] advances it.
#[derive(Debug, Clone)]
pub(crate) struct AgentSession {
    id: Uuid,
    conversation: Conversation,
    iteration: usize,
    max_iterations: usize,
    state: SessionState,
}

impl AgentSession {
    fn new(conversation: Conversation, max_iterations: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation,
            iteration: 0,
            max_iterations,
            state: SessionState::Running { iteration: 0 },
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn record_round(&mut self, assistant_text: String, observation: String) {
        self.conversation.append_assistant(assistant_text);
        self.conversation.append_observation(observation);
        self.iteration += 1;
        self.state = if self.iteration >= self.max_iterations {
            SessionState::Exhausted
        } else {
            SessionState::Running {
                iteration: self.iteration,
            }
        };
    }

    fn into_outcome(self, exhausted_message: &str) -> SessionOutcome {
        let (status, text) = match self.state {
            SessionState::Answered(text) => (SessionStatus::Answered, text),
            SessionState::Exhausted | SessionState::Running { .. } => {
                (SessionStatus::Exhausted, exhausted_message.to_string())
            }
        };
        SessionOutcome {
            session_id: self.id,
            status,
            text,
            iterations: self.iteration,
            transcript: self.conversation,
        }
    }
}

/// What a finished session reports back to its caller.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub text: String,
    pub iterations: usize,
    pub transcript: Conversation,
}

impl SessionOutcome {
    pub fn is_answered(&self) -> bool {
        self.status == SessionStatus::Answered
    }
}

/// A ReAct-style agent that alternates between the text generator and the
/// registered tools until the model answers or the round budget runs out.
pub struct Agent<G: TextGenerator + ?Sized> {
    generator: Arc<G>,
    dispatcher: Dispatcher,
    model: String,
    config: AgentConfig,
    hooks: Vec<Arc<dyn AgentHook>>,
    metrics: Option<MetricsTracker>,
}

impl<G: TextGenerator + ?Sized> Clone for Agent<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            dispatcher: self.dispatcher.clone(),
            model: self.model.clone(),
            config: self.config.clone(),
            hooks: self.hooks.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<G: TextGenerator + ?Sized> Agent<G> {
    pub fn new(generator: Arc<G>, tools: Arc<ToolRegistry>) -> Self {
        let defaults = AppConfig::default();
        Self {
            generator,
            dispatcher: Dispatcher::new(tools),
            model: defaults.model.model,
            config: defaults.agent,
            hooks: Vec::new(),
            metrics: None,
        }
    }

    pub fn from_config(cfg: &AppConfig, generator: Arc<G>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(generator, tools)
            .with_model(cfg.model.model.clone())
            .with_config(cfg.agent.clone())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self.config.max_iterations = self.config.max_iterations.max(1);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsTracker) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs one session to completion.
    ///
    /// `Ok` carries either an answer or the exhaustion notice; `Err` is reserved
    /// for invalid input and text-generator failures.
    pub async fn run(
        &self,
        system_prompt: impl Into<String>,
        question: impl Into<String>,
    ) -> Result<SessionOutcome> {
        let conversation = Conversation::initialize(system_prompt, question)?;
        let session = AgentSession::new(conversation, self.config.max_iterations);
        let span = info_span!("agent_session", session_id = %session.id(), model = %self.model);
        self.drive(session).instrument(span).await
    }

    async fn drive(&self, mut session: AgentSession) -> Result<SessionOutcome> {
        let mut guard = self.metrics.as_ref().map(MetricsTracker::start_session);
        info!(max_iterations = session.max_iterations, "session started");

        while let SessionState::Running { iteration } = session.state {
            let text = match self.generate(session.conversation.snapshot()).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(iteration, error = %err, "text generation failed");
                    finish(guard, None);
                    return Err(err);
                }
            };

            let Some(directive) = self.recover_directive(&text) else {
                info!(iteration, "model produced a final answer");
                session.state = SessionState::Answered(text);
                break;
            };

            let observation = self.dispatch(&directive, guard.as_mut()).await;
            session.record_round(text, observation);
        }

        let outcome = session.into_outcome(&self.config.exhausted_message);
        if outcome.status == SessionStatus::Exhausted {
            warn!(iterations = outcome.iterations, "iteration budget exhausted");
        }
        finish(guard, Some(outcome.status));
        Ok(outcome)
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        for hook in &self.hooks {
            hook.before_generate(messages).await;
        }
        let pending = self.generator.generate(messages, &self.model);
        let text = match self.config.generation_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), pending)
                .await
                .map_err(|_| {
                    AgentError::Generation(format!("no response within {secs}s"))
                })??,
            None => pending.await?,
        };
        debug!(chars = text.len(), "received model text");
        for hook in &self.hooks {
            hook.after_generate(&text).await;
        }
        Ok(text)
    }

    fn recover_directive(&self, text: &str) -> Option<Directive> {
        // An empty pause token turns the pre-filter off instead of rejecting every turn.
        let gated = self.config.require_pause_signal && !self.config.pause_token.is_empty();
        if gated && !has_pause_signal(text, &self.config.pause_token) {
            return None;
        }
        let directive = extract_directive(text);
        if directive.is_none() {
            debug!("no directive recovered from model text");
        }
        directive
    }

    async fn dispatch(&self, directive: &Directive, guard: Option<&mut SessionGuard>) -> String {
        for hook in &self.hooks {
            hook.before_dispatch(directive).await;
        }
        info!(tool = %directive.function_name, "dispatching directive");
        let result = self.dispatcher.dispatch(directive).await;
        if let Some(guard) = guard {
            guard.record_dispatch(result.is_failure());
        }
        for hook in &self.hooks {
            hook.after_dispatch(&result).await;
        }
        format!("{}{}", self.config.observation_prefix, result)
    }
}

fn finish(guard: Option<SessionGuard>, status: Option<SessionStatus>) {
    if let Some(guard) = guard {
        guard.finish(status);
    }
}
