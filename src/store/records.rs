//! Persisted per-conversation and per-user records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialogs::DialogInstance;

/// Namespace of conversation records in the key-value store.
pub const CONVERSATIONS: &str = "conversation";

/// Namespace of user profiles in the key-value store.
pub const PROFILES: &str = "user";

/// Dialog state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    /// The dialog in progress, if any. At most one per conversation.
    #[serde(default)]
    pub active: Option<DialogInstance>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    /// Version the record was loaded at. `0` means not stored yet.
    #[serde(skip)]
    pub etag: u64,
}

impl ConversationRecord {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            active: None,
            last_activity: None,
            etag: 0,
        }
    }
}

/// What the bot remembers about a user across conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Last time the user was welcomed.
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
    /// Keyword matched while routing; cleared once the dialog begins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    #[serde(skip)]
    pub etag: u64,
}

impl UserProfile {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: None,
            last_interaction: None,
            selected_option: None,
            etag: 0,
        }
    }

    /// Whether the welcome should be sent again.
    pub fn welcome_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        let Some(last) = self.last_interaction else {
            return true;
        };
        match chrono::Duration::from_std(interval) {
            Ok(interval) => now - last > interval,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_due_without_previous_interaction() {
        let profile = UserProfile::new("u1");
        assert!(profile.welcome_due(Utc::now(), Duration::from_secs(21_600)));
    }

    #[test]
    fn welcome_due_after_interval() {
        let now = Utc::now();
        let mut profile = UserProfile::new("u1");
        profile.last_interaction = Some(now - chrono::Duration::hours(1));
        assert!(!profile.welcome_due(now, Duration::from_secs(21_600)));

        profile.last_interaction = Some(now - chrono::Duration::hours(7));
        assert!(profile.welcome_due(now, Duration::from_secs(21_600)));
    }

    #[test]
    fn etag_is_not_serialized() {
        let mut record = ConversationRecord::new("c1");
        record.etag = 7;
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("etag").is_none());
        let parsed: ConversationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.etag, 0);
    }
}
