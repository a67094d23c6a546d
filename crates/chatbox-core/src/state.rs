use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use super::interactive::Interactive;

pub const TURN_ID_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TURN_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    Human,
    #[serde(rename = "AI")]
    Ai,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::Human => "Human",
            Self::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Loading,
    Running,
    Finish,
}

impl ChatStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Running => "running",
            Self::Finish => "finish",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finish)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "toolName")]
    pub name: String,
    #[serde(default, rename = "toolAvatar", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub params: String,
    #[serde(default)]
    pub response: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            params: String::new(),
            response: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    Text { content: String },
    Reasoning { content: String },
    Tool { entries: Vec<ToolCall> },
    Interactive { payload: Interactive },
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn reasoning(content: impl Into<String>) -> Self {
        Self::Reasoning {
            content: content.into(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Reasoning { .. } => "reasoning",
            Self::Tool { .. } => "tool",
            Self::Interactive { .. } => "interactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFileKind {
    Image,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFile {
    #[serde(rename = "type")]
    pub kind: ChatFileKind,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Diagnostic record emitted by a workflow node. Only the fields the merge and
/// flatten views need are typed; everything else rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub module_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_sign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_detail: Vec<ResponseRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugin_detail: Vec<ResponseRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loop_detail: Vec<ResponseRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_detail: Vec<ResponseRecord>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResponseRecord {
    pub fn new(id: impl Into<String>, module_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module_name: module_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: TurnId,
    pub role: ChatRole,
    pub status: ChatStatus,
    pub value: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ChatFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_data: Vec<ResponseRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    pub created_at_ms: i64,
    #[serde(default)]
    pub hide_in_ui: bool,
}

impl ChatTurn {
    pub fn human(text: &str, files: Vec<ChatFile>, hide_in_ui: bool) -> Self {
        let value = if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(text)]
        };
        Self {
            id: TurnId::generate(),
            role: ChatRole::Human,
            status: ChatStatus::Finish,
            value,
            files,
            response_data: Vec::new(),
            module_name: None,
            duration_seconds: None,
            error_msg: None,
            created_at_ms: now_ms(),
            hide_in_ui,
        }
    }

    /// A fresh AI turn: `Loading` with a single empty text block.
    pub fn ai_placeholder(id: TurnId) -> Self {
        Self {
            id,
            role: ChatRole::Ai,
            status: ChatStatus::Loading,
            value: vec![ContentBlock::text("")],
            files: Vec::new(),
            response_data: Vec::new(),
            module_name: None,
            duration_seconds: None,
            error_msg: None,
            created_at_ms: now_ms(),
            hide_in_ui: false,
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self.role, ChatRole::Ai)
    }

    /// Whether any non-empty answer text reached this turn.
    pub fn has_streamed_text(&self) -> bool {
        self.value.iter().any(|block| match block {
            ContentBlock::Text { content } => !content.is_empty(),
            _ => false,
        })
    }

    pub fn text(&self) -> String {
        self.value
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn find_tool_call(&self, id: &str) -> Option<(usize, usize)> {
        self.value
            .iter()
            .enumerate()
            .find_map(|(block_idx, block)| match block {
                ContentBlock::Tool { entries } => entries
                    .iter()
                    .position(|call| call.id == id)
                    .map(|call_idx| (block_idx, call_idx)),
                _ => None,
            })
    }

    pub fn tool_call_mut(&mut self, position: (usize, usize)) -> Option<&mut ToolCall> {
        match self.value.get_mut(position.0) {
            Some(ContentBlock::Tool { entries }) => entries.get_mut(position.1),
            _ => None,
        }
    }

    pub fn last_interactive(&self) -> Option<&Interactive> {
        match self.value.last() {
            Some(ContentBlock::Interactive { payload }) => Some(payload),
            _ => None,
        }
    }

    pub fn last_interactive_mut(&mut self) -> Option<&mut Interactive> {
        match self.value.last_mut() {
            Some(ContentBlock::Interactive { payload }) => Some(payload),
            _ => None,
        }
    }
}

/// Ordered chat turns. Clones share every turn; writers go through
/// [`ChatTranscript::last_mut`], which copies only the last turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatTranscript {
    turns: Vec<Arc<ChatTurn>>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns: turns.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter().map(|turn| turn.as_ref())
    }

    pub fn get(&self, index: usize) -> Option<&ChatTurn> {
        self.turns.get(index).map(|turn| turn.as_ref())
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last().map(|turn| turn.as_ref())
    }

    pub fn last_mut(&mut self) -> Option<&mut ChatTurn> {
        self.turns.last_mut().map(Arc::make_mut)
    }

    /// The last turn when it is an AI turn still accepting stream events.
    pub fn open_ai_turn(&self) -> Option<&ChatTurn> {
        self.last()
            .filter(|turn| turn.is_ai() && !turn.status.is_finished())
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(Arc::new(turn));
    }

    pub fn truncate(&mut self, len: usize) {
        self.turns.truncate(len);
    }

    /// True when both transcripts hold the very same turn allocations.
    pub fn shares_turns_with(&self, other: &ChatTranscript) -> bool {
        self.turns.len() == other.turns.len()
            && self
                .turns
                .iter()
                .zip(other.turns.iter())
                .all(|(left, right)| Arc::ptr_eq(left, right))
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
