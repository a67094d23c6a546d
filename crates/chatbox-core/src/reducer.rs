use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::actions::StreamEvent;
use super::response_data::merge_response_data;
use super::state::round2;
use super::state::ChatStatus;
use super::state::ChatTranscript;
use super::state::ChatTurn;
use super::state::ContentBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

impl NotifyLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A transient, user-facing message (a toast in the UI).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotifyLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEffect {
    ScrollToBottom { force: bool },
    UpdateVariables(BTreeMap<String, serde_json::Value>),
    Notify(Notification),
}

/// Applies one stream event to the last turn.
///
/// Events that cannot apply (no open AI turn, unknown tool id, empty delta)
/// return the input transcript unchanged and no effects.
pub fn reduce(transcript: &ChatTranscript, event: StreamEvent) -> (ChatTranscript, Vec<ChatEffect>) {
    let Some(turn) = transcript.open_ai_turn() else {
        debug!(event = event.label(), "no open AI turn, dropping stream event");
        return (transcript.clone(), Vec::new());
    };

    let mut next = transcript.clone();
    let applied = match event {
        StreamEvent::VariablesUpdate { variables } => {
            return (next, vec![ChatEffect::UpdateVariables(variables)]);
        }
        StreamEvent::ToolParamsDelta { id, params } => {
            let Some(position) = turn.find_tool_call(&id) else {
                debug!(tool_id = %id, "tool params for unknown tool call, dropping");
                return (next, Vec::new());
            };
            with_last(&mut next, |turn| {
                if let Some(call) = turn.tool_call_mut(position) {
                    call.params.push_str(&params);
                }
            })
        }
        StreamEvent::ToolResponse { id, response } => {
            let Some(position) = turn.find_tool_call(&id) else {
                debug!(tool_id = %id, "tool response for unknown tool call, dropping");
                return (next, Vec::new());
            };
            with_last(&mut next, |turn| {
                if let Some(call) = turn.tool_call_mut(position) {
                    call.response = response;
                }
            })
        }
        StreamEvent::TextDelta { text } | StreamEvent::ReasoningDelta { text }
            if text.is_empty() =>
        {
            return (next, Vec::new());
        }
        StreamEvent::DurationDelta { seconds } if seconds == 0.0 => {
            return (next, Vec::new());
        }
        StreamEvent::TextDelta { text } => with_last(&mut next, |turn| {
            match turn.value.last_mut() {
                Some(ContentBlock::Text { content }) => content.push_str(&text),
                _ => turn.value.push(ContentBlock::Text { content: text }),
            }
        }),
        StreamEvent::ReasoningDelta { text } => with_last(&mut next, |turn| {
            match turn.value.last_mut() {
                Some(ContentBlock::Reasoning { content }) => content.push_str(&text),
                _ => turn.value.push(ContentBlock::Reasoning { content: text }),
            }
        }),
        StreamEvent::ToolCallStart { tool } => with_last(&mut next, |turn| {
            turn.value.push(ContentBlock::Tool {
                entries: vec![tool],
            });
        }),
        StreamEvent::NodeStatus { status, name } => with_last(&mut next, |turn| {
            turn.status = status;
            turn.module_name = name;
        }),
        StreamEvent::NodeResponse { record } => with_last(&mut next, |turn| {
            turn.response_data.push(record);
        }),
        StreamEvent::DurationDelta { seconds } => with_last(&mut next, |turn| {
            turn.duration_seconds = accumulate_duration(turn.duration_seconds, seconds);
        }),
        StreamEvent::Interactive { payload } => {
            with_last(&mut next, |turn| {
                turn.value.push(ContentBlock::Interactive { payload });
            });
            return (next, vec![ChatEffect::ScrollToBottom { force: true }]);
        }
    };

    if applied {
        (next, vec![ChatEffect::ScrollToBottom { force: false }])
    } else {
        (next, Vec::new())
    }
}

fn with_last(transcript: &mut ChatTranscript, apply: impl FnOnce(&mut ChatTurn)) -> bool {
    match transcript.last_mut() {
        Some(turn) => {
            apply(turn);
            true
        }
        None => false,
    }
}

/// The first duration is stored as reported; later ones are added and
/// rounded to two decimals at every step. A zero delta leaves the total alone.
pub fn accumulate_duration(current: Option<f64>, seconds: f64) -> Option<f64> {
    match current {
        _ if seconds == 0.0 => current,
        Some(previous) if previous != 0.0 => Some(round2(previous + seconds)),
        _ => Some(seconds),
    }
}

/// Stream completed: finalize the AI turn and merge its diagnostic records.
pub fn finish_stream(transcript: &ChatTranscript) -> (ChatTranscript, Vec<ChatEffect>) {
    let mut next = transcript.clone();
    let mut effects = Vec::new();
    let Some(turn) = next.last_mut().filter(|turn| turn.is_ai()) else {
        return (next, effects);
    };

    turn.status = ChatStatus::Finish;
    turn.response_data = merge_response_data(&turn.response_data);
    if let Some(error) = turn.response_data.last().and_then(|record| record.error.clone()) {
        effects.push(ChatEffect::Notify(Notification::new(NotifyLevel::Error, error)));
    }
    effects.push(ChatEffect::ScrollToBottom { force: true });
    (next, effects)
}

/// Transport failure: finalize the AI turn and keep the error on it.
pub fn fail_stream(transcript: &ChatTranscript, message: &str) -> (ChatTranscript, Vec<ChatEffect>) {
    let mut next = transcript.clone();
    if let Some(turn) = next.last_mut().filter(|turn| turn.is_ai()) {
        turn.status = ChatStatus::Finish;
        turn.error_msg = Some(message.to_string());
    }
    (
        next,
        vec![ChatEffect::Notify(Notification::new(NotifyLevel::Error, message))],
    )
}

/// User stop or navigation: finalize the AI turn, keep partial content.
pub fn abort_stream(transcript: &ChatTranscript) -> ChatTranscript {
    let mut next = transcript.clone();
    if let Some(turn) = next.last_mut().filter(|turn| turn.is_ai()) {
        turn.status = ChatStatus::Finish;
    }
    next
}

#[cfg(test)]
mod tests;
