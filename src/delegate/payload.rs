//! Request payload sent to automation webhooks.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::activity::{Activity, AttachmentDescriptor};

/// Flat JSON object: the dialog's collected values plus the caller identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestPayload(Map<String, Value>);

impl RequestPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the values a dialog accumulated.
    pub fn from_values(values: &Map<String, Value>) -> Self {
        Self(values.clone())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Add the sender, conversation and attachments of the current activity.
    ///
    /// Identity keys overwrite collected values of the same name.
    pub fn with_activity(mut self, activity: &Activity) -> Self {
        let map = &mut self.0;
        map.insert("userId".into(), activity.user_id().into());
        map.insert("userName".into(), activity.user_name().into());
        if let Some(aad) = &activity.from.aad_object_id {
            map.insert("userObject".into(), aad.clone().into());
        }
        map.insert("chatId".into(), activity.conversation_id().into());
        map.insert("conversationId".into(), activity.conversation_id().into());
        if let Some(id) = &activity.id {
            map.insert("replyToId".into(), id.clone().into());
        }
        if let Some(url) = &activity.service_url {
            map.insert("serviceUrl".into(), url.clone().into());
        }
        let attachments: Vec<AttachmentDescriptor> =
            activity.attachments.iter().map(|a| a.descriptor()).collect();
        map.insert(
            "attachments".into(),
            serde_json::to_value(attachments).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
