//! Dialog state machine — tracks where a running dialog instance is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::prompt::Prompt;
use crate::error::DialogError;

/// Lifecycle of one dialog instance.
///
/// `Idle → RunningStep → (WaitingForInput ⇄ RunningStep)* → Complete | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    Idle,
    WaitingForInput,
    RunningStep,
    Complete,
    Cancelled,
}

impl DialogState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: DialogState) -> bool {
        use DialogState::*;
        matches!(
            (self, target),
            (Idle, RunningStep)
                | (Idle, Cancelled)
                | (RunningStep, RunningStep)
                | (RunningStep, WaitingForInput)
                | (RunningStep, Complete)
                | (RunningStep, Cancelled)
                | (WaitingForInput, RunningStep)
                | (WaitingForInput, Cancelled)
        )
    }

    /// Whether the instance is finished and should be discarded.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

impl Default for DialogState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for DialogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::WaitingForInput => "waiting_for_input",
            Self::RunningStep => "running_step",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Persisted state of the dialog running in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    pub dialog_id: String,
    pub state: DialogState,
    /// Index of the step that ran last.
    pub step: usize,
    /// Step to run when the next input arrives.
    pub resume_step: usize,
    /// Values accumulated by the steps (the step context bag).
    pub values: Map<String, Value>,
    /// Prompt the instance is waiting on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<Prompt>,
    /// Unrecognized replies to the pending prompt.
    #[serde(default)]
    pub retries: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialogInstance {
    pub fn new(dialog_id: &str) -> Self {
        let now = Utc::now();
        Self {
            dialog_id: dialog_id.to_string(),
            state: DialogState::Idle,
            step: 0,
            resume_step: 0,
            values: Map::new(),
            pending: None,
            retries: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Move to `target`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, target: DialogState) -> Result<(), DialogError> {
        if !self.state.can_transition_to(target) {
            return Err(DialogError::InvalidTransition {
                id: self.dialog_id.clone(),
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the instance has waited for input longer than `timeout`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return false;
        };
        self.state == DialogState::WaitingForInput && now - self.updated_at > timeout
    }

    /// Reset to a fresh instance of the same dialog.
    pub fn restart(&mut self) {
        *self = Self::new(&self.dialog_id);
    }
}
