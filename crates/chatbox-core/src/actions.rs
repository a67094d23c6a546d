use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::interactive::Interactive;
use super::state::ChatFile;
use super::state::ChatStatus;
use super::state::ResponseRecord;
use super::state::ToolCall;

/// One server-sent update for the turn currently being streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    ToolCallStart {
        tool: ToolCall,
    },
    ToolParamsDelta {
        id: String,
        params: String,
    },
    ToolResponse {
        id: String,
        response: String,
    },
    NodeStatus {
        status: ChatStatus,
        name: Option<String>,
    },
    NodeResponse {
        record: ResponseRecord,
    },
    DurationDelta {
        seconds: f64,
    },
    Interactive {
        payload: Interactive,
    },
    VariablesUpdate {
        variables: BTreeMap<String, serde_json::Value>,
    },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::ReasoningDelta { text: text.into() }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ReasoningDelta { .. } => "reasoning_delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolParamsDelta { .. } => "tool_params_delta",
            Self::ToolResponse { .. } => "tool_response",
            Self::NodeStatus { .. } => "node_status",
            Self::NodeResponse { .. } => "node_response",
            Self::DurationDelta { .. } => "duration_delta",
            Self::Interactive { .. } => "interactive",
            Self::VariablesUpdate { .. } => "variables_update",
        }
    }
}

/// What the user typed into the composer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInput {
    pub text: String,
    #[serde(default)]
    pub files: Vec<ChatFile>,
    #[serde(default)]
    pub hide_in_ui: bool,
}

impl ChatInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_files(mut self, files: Vec<ChatFile>) -> Self {
        self.files = files;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Stop button.
    Stop,
    /// Page, app or chat id changed under the stream.
    Leave,
}

impl AbortReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Leave => "leave",
        }
    }
}
