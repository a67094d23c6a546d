//! One chat window: the transcript plus everything the composer and the
//! stream transport need around it.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::actions::AbortReason;
use super::actions::ChatInput;
use super::actions::StreamEvent;
use super::config::ChatConfig;
use super::interactive;
use super::interactive::InteractiveError;
use super::interactive::InteractiveResolution;
use super::reducer;
use super::reducer::ChatEffect;
use super::reducer::Notification;
use super::reducer::NotifyLevel;
use super::state::ChatTranscript;
use super::state::ChatTurn;
use super::state::TurnId;
use super::variables::request_variables;
use super::variables::VariableDecl;
use super::variables::VariablesStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

/// Read the current transcript and feed it stream events. Consumers that
/// only render or relay events depend on this rather than on the session.
pub trait TranscriptStore {
    fn transcript(&self) -> &ChatTranscript;
    fn dispatch(&mut self, stream_id: StreamId, event: StreamEvent) -> Vec<ChatEffect>;
}

/// Handed to the transport when a prompt is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTicket {
    pub stream_id: StreamId,
    pub response_turn_id: TurnId,
    pub prompt: ChatInput,
    /// Declared workflow variables, coerced to their declared types.
    pub variables: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a reply is still streaming")]
    AlreadyChatting,
    #[error("nothing to send")]
    EmptyContent,
    #[error("answer the pending prompt first ({0})")]
    InteractionPending(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Interactive(#[from] InteractiveError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

#[derive(Debug, Clone)]
struct ActiveStream {
    id: StreamId,
    len_before: usize,
    prompt: ChatInput,
}

#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    transcript: ChatTranscript,
    composer: ChatInput,
    variables: VariablesStore,
    variable_decls: Vec<VariableDecl>,
    notifications: Vec<Notification>,
    active: Option<ActiveStream>,
    next_stream: u64,
    config: ChatConfig,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ChatConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn from_transcript(transcript: ChatTranscript) -> Self {
        Self {
            transcript,
            ..Self::default()
        }
    }

    pub fn composer(&self) -> &ChatInput {
        &self.composer
    }

    pub fn set_composer(&mut self, input: ChatInput) {
        self.composer = input;
    }

    pub fn variables(&self) -> &VariablesStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariablesStore {
        &mut self.variables
    }

    /// Variables the workflow declares; only these are sent with a prompt.
    pub fn declare_variables(&mut self, decls: Vec<VariableDecl>) {
        self.variable_decls = decls;
    }

    pub fn is_chatting(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_stream(&self) -> Option<StreamId> {
        self.active.as_ref().map(|active| active.id)
    }

    pub fn can_send_query(&self) -> bool {
        interactive::can_send_query(&self.transcript, self.is_chatting())
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Appends the (Human, AI) pair for `input` and opens a stream for it.
    /// Surrounding whitespace is trimmed from the prompt text.
    pub fn submit(&mut self, input: ChatInput) -> Result<StreamTicket, SubmitError> {
        let input = ChatInput {
            text: input.text.trim().to_string(),
            ..input
        };
        if self.is_chatting() {
            warn!("prompt rejected: reply still streaming");
            self.notify(NotifyLevel::Warning, SubmitError::AlreadyChatting.to_string());
            return Err(SubmitError::AlreadyChatting);
        }
        if input.text.is_empty() && input.files.is_empty() {
            warn!("prompt rejected: empty content");
            self.notify(NotifyLevel::Warning, SubmitError::EmptyContent.to_string());
            return Err(SubmitError::EmptyContent);
        }
        let state = interactive::interaction_state(&self.transcript);
        if state.blocks_free_text() {
            warn!(state = state.label(), "prompt rejected: interaction pending");
            return Err(SubmitError::InteractionPending(state.label()));
        }

        let len_before = self.transcript.len();
        let response_turn_id = TurnId::generate();
        self.transcript
            .push(ChatTurn::human(&input.text, input.files.clone(), input.hide_in_ui));
        self.transcript
            .push(ChatTurn::ai_placeholder(response_turn_id.clone()));
        self.composer = ChatInput::default();

        self.next_stream += 1;
        let stream_id = StreamId(self.next_stream);
        self.active = Some(ActiveStream {
            id: stream_id,
            len_before,
            prompt: input.clone(),
        });
        info!(stream = stream_id.0, turn = response_turn_id.as_str(), "stream opened");

        Ok(StreamTicket {
            stream_id,
            response_turn_id,
            prompt: input,
            variables: request_variables(&self.variable_decls, &self.variables),
        })
    }

    /// Stream finished normally.
    pub fn complete(&mut self, stream_id: StreamId) -> Vec<ChatEffect> {
        if self.take_active(stream_id).is_none() {
            return Vec::new();
        }
        let (next, effects) = reducer::finish_stream(&self.transcript);
        self.transcript = next;
        self.route_effects(&effects);
        info!(stream = stream_id.0, "stream completed");
        effects
    }

    /// Transport error. A turn that never received answer text is rolled
    /// back and its prompt returns to the composer.
    pub fn fail(&mut self, stream_id: StreamId, message: &str) -> Vec<ChatEffect> {
        let Some(active) = self.take_active(stream_id) else {
            return Vec::new();
        };

        let streamed = self
            .transcript
            .last()
            .is_some_and(|turn| turn.is_ai() && turn.has_streamed_text());
        if !streamed {
            warn!(stream = stream_id.0, error = message, "stream failed before any text, rolling back");
            self.transcript.truncate(active.len_before);
            self.composer = active.prompt;
            let effects = vec![ChatEffect::Notify(Notification::new(
                NotifyLevel::Error,
                message,
            ))];
            self.route_effects(&effects);
            return effects;
        }

        warn!(stream = stream_id.0, error = message, "stream failed");
        let (next, effects) = reducer::fail_stream(&self.transcript, message);
        self.transcript = next;
        self.route_effects(&effects);
        effects
    }

    /// Stops the active stream and keeps whatever it produced.
    pub fn abort(&mut self, reason: AbortReason) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.transcript = reducer::abort_stream(&self.transcript);
        info!(stream = active.id.0, reason = reason.label(), "stream aborted");
    }

    /// Answers the pending interactive prompt. A confirmed plan is also sent
    /// as a prompt, so the ticket for that stream is returned.
    pub fn resolve_interactive(
        &mut self,
        resolution: InteractiveResolution,
    ) -> Result<Option<StreamTicket>, ResolveError> {
        if self.is_chatting() {
            return Err(SubmitError::AlreadyChatting.into());
        }
        let (next, outcome) = interactive::resolve_interactive(&self.transcript, resolution)?;
        self.transcript = next;
        if !outcome.sends_query {
            return Ok(None);
        }

        let confirm = ChatInput {
            text: self.config.plan_confirm_query.clone(),
            files: Vec::new(),
            hide_in_ui: true,
        };
        Ok(Some(self.submit(confirm)?))
    }

    fn take_active(&mut self, stream_id: StreamId) -> Option<ActiveStream> {
        if self.active_stream() != Some(stream_id) {
            debug!(stream = stream_id.0, "ignoring stale stream");
            return None;
        }
        self.active.take()
    }

    fn route_effects(&mut self, effects: &[ChatEffect]) {
        for effect in effects {
            match effect {
                ChatEffect::UpdateVariables(update) => self.variables.apply_update(update.clone()),
                ChatEffect::Notify(notification) => self.notifications.push(notification.clone()),
                ChatEffect::ScrollToBottom { .. } => {}
            }
        }
    }

    fn notify(&mut self, level: NotifyLevel, message: String) {
        self.notifications.push(Notification::new(level, message));
    }
}

impl TranscriptStore for ChatSession {
    fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    fn dispatch(&mut self, stream_id: StreamId, event: StreamEvent) -> Vec<ChatEffect> {
        if self.active_stream() != Some(stream_id) {
            debug!(stream = stream_id.0, event = event.label(), "ignoring stale stream event");
            return Vec::new();
        }
        let (next, effects) = reducer::reduce(&self.transcript, event);
        self.transcript = next;
        self.route_effects(&effects);
        effects
    }
}
