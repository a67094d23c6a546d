use pretty_assertions::assert_eq;

pub(super) use super::abort_stream;
pub(super) use super::fail_stream;
pub(super) use super::finish_stream;
pub(super) use super::reduce;
pub(super) use super::ChatEffect;
pub(super) use super::NotifyLevel;
pub(super) use crate::actions::StreamEvent;
pub(super) use crate::interactive::Interactive;
pub(super) use crate::interactive::PaymentPauseParams;
pub(super) use crate::state::ChatStatus;
pub(super) use crate::state::ChatTranscript;
pub(super) use crate::state::ChatTurn;
pub(super) use crate::state::ContentBlock;
pub(super) use crate::state::ResponseRecord;
pub(super) use crate::state::ToolCall;
pub(super) use crate::state::TurnId;

mod finalize;
mod turn_metadata;

/// Human turn followed by a fresh AI turn, as a submit produces.
fn streaming() -> ChatTranscript {
    ChatTranscript::from_turns(vec![
        ChatTurn::human("hi", Vec::new(), false),
        ChatTurn::ai_placeholder(TurnId::generate()),
    ])
}

fn apply(transcript: ChatTranscript, events: Vec<StreamEvent>) -> ChatTranscript {
    events
        .into_iter()
        .fold(transcript, |acc, event| reduce(&acc, event).0)
}

fn ai(transcript: &ChatTranscript) -> &ChatTurn {
    let turn = transcript.last().expect("last turn");
    assert!(turn.is_ai());
    turn
}

fn tool_start(id: &str, name: &str) -> StreamEvent {
    StreamEvent::ToolCallStart {
        tool: ToolCall::new(id, name),
    }
}

fn tool_params(id: &str, params: &str) -> StreamEvent {
    StreamEvent::ToolParamsDelta {
        id: id.to_string(),
        params: params.to_string(),
    }
}

fn tool_calls(turn: &ChatTurn) -> Vec<&ToolCall> {
    turn.value
        .iter()
        .flat_map(|block| match block {
            ContentBlock::Tool { entries } => entries.iter().collect::<Vec<_>>(),
            _ => Vec::new(),
        })
        .collect()
}

fn assert_unchanged(before: &ChatTranscript, after: &ChatTranscript) {
    assert_eq!(before, after);
    assert!(before.shares_turns_with(after));
}
