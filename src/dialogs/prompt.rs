//! Prompts — what a suspended dialog is waiting for, and how a reply is
//! recognized against it.

use serde::{Deserialize, Serialize};

use crate::activity::{Activity, Attachment};

/// Kind of input a prompt accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    /// Any non-empty text.
    Text,
    /// One of a fixed list, by value (case-insensitive) or 1-based number.
    Choice { choices: Vec<String> },
    /// At least one attachment.
    Attachment,
}

/// A prompt sent to the user. The dialog suspends until a reply is recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub kind: PromptKind,
    /// Sent when the prompt is issued. `None` when the step already sent its
    /// own instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sent when a reply is not recognized. Falls back to `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
}

/// A recognized reply (or a value passed between steps).
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    None,
    Text(String),
    Choice { index: usize, value: String },
    Attachments(Vec<Attachment>),
    Json(serde_json::Value),
}

impl StepValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Choice { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::None => None,
            Self::Text(t) => Some(t.into()),
            Self::Choice { value, .. } => Some(value.into()),
            Self::Attachments(list) => serde_json::to_value(list).ok(),
            Self::Json(v) => Some(v),
        }
    }
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Text,
            text: Some(text.into()),
            retry: None,
        }
    }

    /// Wait for free text without sending anything.
    pub fn silent_text() -> Self {
        Self {
            kind: PromptKind::Text,
            text: None,
            retry: None,
        }
    }

    pub fn choice<I, S>(text: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: PromptKind::Choice {
                choices: choices.into_iter().map(Into::into).collect(),
            },
            text: Some(text.into()),
            retry: None,
        }
    }

    pub fn attachment(text: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Attachment,
            text: Some(text.into()),
            retry: None,
        }
    }

    pub fn with_retry(mut self, retry: impl Into<String>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    /// Text to send after an unrecognized reply.
    pub fn retry_text(&self) -> Option<String> {
        self.retry.clone().or_else(|| self.render())
    }

    /// Full text sent when the prompt is issued.
    pub fn render(&self) -> Option<String> {
        match (&self.kind, &self.text) {
            (PromptKind::Choice { choices }, Some(text)) => {
                Some(format!("{text}\n\n{}", render_choices(choices)))
            }
            (_, text) => text.clone(),
        }
    }

    /// Recognize an inbound activity against this prompt.
    pub fn recognize(&self, activity: &Activity) -> Option<StepValue> {
        match &self.kind {
            PromptKind::Text => {
                let text = activity.text_trimmed();
                (!text.is_empty()).then(|| StepValue::Text(text.to_string()))
            }
            PromptKind::Choice { choices } => recognize_choice(choices, &activity.normalized_text()),
            PromptKind::Attachment => (!activity.attachments.is_empty())
                .then(|| StepValue::Attachments(activity.attachments.clone())),
        }
    }
}

fn recognize_choice(choices: &[String], input: &str) -> Option<StepValue> {
    if input.is_empty() {
        return None;
    }
    let by_value = choices
        .iter()
        .position(|c| c.to_lowercase() == input);
    let by_number = input
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=choices.len()).contains(n))
        .map(|n| n - 1);
    by_value.or(by_number).map(|index| StepValue::Choice {
        index,
        value: choices[index].clone(),
    })
}

fn render_choices(choices: &[String]) -> String {
    choices
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {c}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
