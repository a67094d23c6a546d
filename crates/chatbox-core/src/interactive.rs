//! Interactive pauses inside an AI turn and how a user resolves them.
//!
//! Workflow payloads can wrap each other (`childrenInteractive`,
//! `loopInteractive`); every pending check and every resolution targets the
//! innermost payload reached by [`Interactive::deepest`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::state::ChatTranscript;

/// Nesting bound for wrapped payloads. Descent stops here and the payload
/// reached so far is treated as the deepest one.
pub const MAX_INTERACTIVE_DEPTH: usize = 100;

/// Query text sent on behalf of the user when a plan is confirmed.
pub const PLAN_CONFIRM_QUERY: &str = "CONFIRM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum Interactive {
    UserSelect(UserSelectParams),
    AgentPlanAskUserSelect(UserSelectParams),
    UserInput(UserInputParams),
    AgentPlanAskUserForm(UserInputParams),
    PaymentPause(PaymentPauseParams),
    AgentPlanCheck(PlanCheckParams),
    AgentPlanAskQuery(PlanAskQueryParams),
    ChildrenInteractive(NestedInteractiveParams),
    LoopInteractive(NestedInteractiveParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSelectOption {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSelectParams {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_select_options: Vec<UserSelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_selected_val: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFormItem {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputParams {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_form: Vec<InputFormItem>,
    #[serde(default)]
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentPauseParams {
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "continue")]
    pub continue_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanCheckParams {
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanAskQueryParams {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedInteractiveParams {
    pub children_response: Box<Interactive>,
}

impl Interactive {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserSelect(_) => "userSelect",
            Self::AgentPlanAskUserSelect(_) => "agentPlanAskUserSelect",
            Self::UserInput(_) => "userInput",
            Self::AgentPlanAskUserForm(_) => "agentPlanAskUserForm",
            Self::PaymentPause(_) => "paymentPause",
            Self::AgentPlanCheck(_) => "agentPlanCheck",
            Self::AgentPlanAskQuery(_) => "agentPlanAskQuery",
            Self::ChildrenInteractive(_) => "childrenInteractive",
            Self::LoopInteractive(_) => "loopInteractive",
        }
    }

    pub fn deepest(&self) -> &Interactive {
        self.deepest_at(0)
    }

    fn deepest_at(&self, depth: usize) -> &Interactive {
        if depth >= MAX_INTERACTIVE_DEPTH {
            return self;
        }
        match self {
            Self::ChildrenInteractive(params) | Self::LoopInteractive(params) => {
                params.children_response.deepest_at(depth + 1)
            }
            other => other,
        }
    }

    pub fn deepest_mut(&mut self) -> &mut Interactive {
        self.deepest_mut_at(0)
    }

    fn deepest_mut_at(&mut self, depth: usize) -> &mut Interactive {
        if depth >= MAX_INTERACTIVE_DEPTH {
            return self;
        }
        match self {
            Self::ChildrenInteractive(params) | Self::LoopInteractive(params) => {
                params.children_response.deepest_mut_at(depth + 1)
            }
            other => other,
        }
    }

    /// Whether the innermost payload still waits for the user.
    pub fn is_pending(&self) -> bool {
        match self.deepest() {
            Self::UserSelect(params) | Self::AgentPlanAskUserSelect(params) => {
                params.user_selected_val.is_none()
            }
            Self::UserInput(params) | Self::AgentPlanAskUserForm(params) => !params.submitted,
            Self::PaymentPause(params) => !params.continue_run,
            Self::AgentPlanCheck(params) => !params.confirmed,
            Self::AgentPlanAskQuery(_) => true,
            // Only reachable past the depth bound.
            Self::ChildrenInteractive(_) | Self::LoopInteractive(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    None,
    AwaitingUserSelect,
    AwaitingUserInput,
    AwaitingPaymentConfirm,
    AwaitingPlanConfirm,
    AwaitingQuery,
    Resolved,
}

impl InteractionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AwaitingUserSelect => "awaiting-user-select",
            Self::AwaitingUserInput => "awaiting-user-input",
            Self::AwaitingPaymentConfirm => "awaiting-payment-confirm",
            Self::AwaitingPlanConfirm => "awaiting-plan-confirm",
            Self::AwaitingQuery => "awaiting-query",
            Self::Resolved => "resolved",
        }
    }

    /// Free-text prompts are refused in these states; only the matching
    /// resolution action moves the conversation on.
    pub fn blocks_free_text(self) -> bool {
        matches!(
            self,
            Self::AwaitingUserSelect
                | Self::AwaitingUserInput
                | Self::AwaitingPaymentConfirm
                | Self::AwaitingPlanConfirm
        )
    }
}

pub fn interaction_state(transcript: &ChatTranscript) -> InteractionState {
    let Some(payload) = transcript
        .last()
        .filter(|turn| turn.is_ai())
        .and_then(|turn| turn.last_interactive())
    else {
        return InteractionState::None;
    };

    if !payload.is_pending() {
        return InteractionState::Resolved;
    }
    match payload.deepest() {
        Interactive::UserSelect(_) | Interactive::AgentPlanAskUserSelect(_) => {
            InteractionState::AwaitingUserSelect
        }
        Interactive::UserInput(_) | Interactive::AgentPlanAskUserForm(_) => {
            InteractionState::AwaitingUserInput
        }
        Interactive::PaymentPause(_) => InteractionState::AwaitingPaymentConfirm,
        Interactive::AgentPlanCheck(_) => InteractionState::AwaitingPlanConfirm,
        Interactive::AgentPlanAskQuery(_) => InteractionState::AwaitingQuery,
        Interactive::ChildrenInteractive(_) | Interactive::LoopInteractive(_) => {
            InteractionState::Resolved
        }
    }
}

pub fn can_send_query(transcript: &ChatTranscript, is_chatting: bool) -> bool {
    !is_chatting && !interaction_state(transcript).blocks_free_text()
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveResolution {
    Select(String),
    SubmitForm(BTreeMap<String, serde_json::Value>),
    ConfirmPayment,
    ConfirmPlan,
}

impl InteractiveResolution {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::SubmitForm(_) => "submit-form",
            Self::ConfirmPayment => "confirm-payment",
            Self::ConfirmPlan => "confirm-plan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// The resolution is also a prompt: the caller sends
    /// [`PLAN_CONFIRM_QUERY`] right away.
    pub sends_query: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractiveError {
    #[error("no interactive prompt is waiting for input")]
    NothingPending,
    #[error("cannot {resolution} while {state}")]
    Mismatch {
        state: &'static str,
        resolution: &'static str,
    },
    #[error("'{0}' is not one of the offered options")]
    UnknownOption(String),
}

/// Writes the user's answer into the innermost pending payload of the last
/// AI turn. The turn may already be finished: resolution is an explicit user
/// operation, not a stream event.
pub fn resolve_interactive(
    transcript: &ChatTranscript,
    resolution: InteractiveResolution,
) -> Result<(ChatTranscript, ResolveOutcome), InteractiveError> {
    let state = interaction_state(transcript);
    if matches!(
        state,
        InteractionState::None | InteractionState::Resolved | InteractionState::AwaitingQuery
    ) {
        return Err(InteractiveError::NothingPending);
    }

    let mut next = transcript.clone();
    let Some(payload) = next.last_mut().and_then(|turn| turn.last_interactive_mut()) else {
        return Err(InteractiveError::NothingPending);
    };
    let mismatch = InteractiveError::Mismatch {
        state: state.label(),
        resolution: resolution.label(),
    };

    let mut sends_query = false;
    match (payload.deepest_mut(), resolution) {
        (
            Interactive::UserSelect(params) | Interactive::AgentPlanAskUserSelect(params),
            InteractiveResolution::Select(value),
        ) => {
            if !params
                .user_select_options
                .iter()
                .any(|option| option.value == value)
            {
                return Err(InteractiveError::UnknownOption(value));
            }
            params.user_selected_val = Some(value);
        }
        (
            Interactive::UserInput(params) | Interactive::AgentPlanAskUserForm(params),
            InteractiveResolution::SubmitForm(values),
        ) => {
            for item in &mut params.input_form {
                if let Some(value) = values.get(&item.key) {
                    item.value = Some(value.clone());
                }
            }
            params.submitted = true;
        }
        (Interactive::PaymentPause(params), InteractiveResolution::ConfirmPayment) => {
            params.continue_run = true;
        }
        (Interactive::AgentPlanCheck(params), InteractiveResolution::ConfirmPlan) => {
            params.confirmed = true;
            sends_query = true;
        }
        _ => return Err(mismatch),
    }

    debug!(state = state.label(), sends_query, "interactive prompt resolved");
    Ok((next, ResolveOutcome { sends_query }))
}
