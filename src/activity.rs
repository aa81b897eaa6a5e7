//! Bot Framework activity model — the JSON shape exchanged with channels.
//!
//! Only the fields the bot reads or writes are modelled; unknown fields are
//! ignored on input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type of the Teams "file download info" attachment wrapper.
pub const TEAMS_FILE_DOWNLOAD_INFO: &str = "application/vnd.microsoft.teams.file.download.info";

/// Content type of a hero card attachment.
pub const HERO_CARD: &str = "application/vnd.microsoft.card.hero";

/// Name given to attachments that arrive without one.
pub const UNNAMED_ATTACHMENT: &str = "archivo-sin-nombre";

/// Activity kinds the bot distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    #[serde(other)]
    Other,
}

impl Default for ActivityType {
    fn default() -> Self {
        Self::Message
    }
}

/// A user or bot identity on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Azure AD object id (Teams only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
}

/// A file reference carried on an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl Attachment {
    pub fn new(name: &str, content_type: &str, content_url: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            content_url: Some(content_url.to_string()),
            name: Some(name.to_string()),
            content: None,
        }
    }

    /// Resolve the URL the file can actually be downloaded from.
    ///
    /// Teams wraps uploaded files in a "download info" attachment whose real
    /// URL lives at `content.downloadUrl`; every other channel uses
    /// `contentUrl` directly.
    pub fn download_url(&self) -> Option<&str> {
        if self.content_type == TEAMS_FILE_DOWNLOAD_INFO {
            if let Some(url) = self
                .content
                .as_ref()
                .and_then(|c| c.get("downloadUrl"))
                .and_then(|v| v.as_str())
            {
                return Some(url);
            }
        }
        self.content_url.as_deref()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_ATTACHMENT)
    }

    /// Whether the attachment looks like a PDF document.
    pub fn is_pdf(&self) -> bool {
        if self.content_type.eq_ignore_ascii_case("application/pdf") {
            return true;
        }
        let teams_pdf = self
            .content
            .as_ref()
            .and_then(|c| c.get("fileType"))
            .and_then(|v| v.as_str())
            .is_some_and(|t| t.eq_ignore_ascii_case("pdf"));
        teams_pdf
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().ends_with(".pdf"))
    }

    /// Normalized `{name, contentUrl, contentType}` descriptor sent to delegates.
    pub fn descriptor(&self) -> AttachmentDescriptor {
        AttachmentDescriptor {
            name: self.display_name().to_string(),
            content_url: self.download_url().unwrap_or_default().to_string(),
            content_type: self.content_type.clone(),
        }
    }
}

/// Attachment reference as forwarded to external services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub name: String,
    pub content_url: String,
    pub content_type: String,
}

/// An inbound activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub kind: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<String>,
}

impl Activity {
    /// Build a plain text message (CLI channel and tests).
    pub fn message(conversation_id: &str, user_id: &str, user_name: &str, text: &str) -> Self {
        Self {
            kind: ActivityType::Message,
            id: Some(uuid::Uuid::new_v4().to_string()),
            from: ChannelAccount {
                id: user_id.to_string(),
                name: Some(user_name.to_string()),
                aad_object_id: None,
            },
            conversation: ConversationAccount {
                id: conversation_id.to_string(),
            },
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Message text with surrounding whitespace removed (empty if absent).
    pub fn text_trimmed(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Lowercased trimmed text, used for keyword and option matching.
    pub fn normalized_text(&self) -> String {
        self.text_trimmed().to_lowercase()
    }

    pub fn user_id(&self) -> &str {
        &self.from.id
    }

    pub fn user_name(&self) -> &str {
        self.from.name.as_deref().unwrap_or_default()
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }

    pub fn expects_replies(&self) -> bool {
        self.delivery_mode.as_deref() == Some("expectReplies")
    }

    /// Members added to the conversation other than the bot itself.
    pub fn new_members(&self) -> impl Iterator<Item = &ChannelAccount> {
        let bot_id = self.recipient.as_ref().map(|r| r.id.as_str());
        self.members_added
            .iter()
            .filter(move |m| Some(m.id.as_str()) != bot_id)
    }
}

/// A button on a hero card that posts its value back as a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub value: String,
}

impl CardAction {
    pub fn im_back(title: &str, value: &str) -> Self {
        Self {
            kind: "imBack".to_string(),
            title: title.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroCard {
    pub title: String,
    pub buttons: Vec<CardAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingAttachment {
    pub content_type: String,
    pub content: Value,
}

/// An activity sent back to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingActivity {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<OutgoingAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl OutgoingActivity {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ActivityType::Message,
            text: Some(text.into()),
            attachments: Vec::new(),
            reply_to_id: None,
        }
    }

    pub fn hero_card(card: HeroCard) -> Self {
        Self {
            kind: ActivityType::Message,
            text: None,
            attachments: vec![OutgoingAttachment {
                content_type: HERO_CARD.to_string(),
                content: serde_json::to_value(card).unwrap_or_default(),
            }],
            reply_to_id: None,
        }
    }

    /// Hero card carried by this activity, if any.
    pub fn card(&self) -> Option<HeroCard> {
        self.attachments
            .iter()
            .find(|a| a.content_type == HERO_CARD)
            .and_then(|a| serde_json::from_value(a.content.clone()).ok())
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render_plain(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref text) = self.text {
            parts.push(text.clone());
        }
        if let Some(card) = self.card() {
            parts.push(card.title.clone());
            for (i, button) in card.buttons.iter().enumerate() {
                parts.push(format!("  {}. {} ({})", i + 1, button.title, button.value));
            }
        }
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_teams_message() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "message",
            "id": "act-1",
            "serviceUrl": "https://smba.trafficmanager.net/amer/",
            "from": { "id": "29:abc", "name": "Ana Gómez", "aadObjectId": "aad-1" },
            "conversation": { "id": "a:conv" },
            "recipient": { "id": "28:bot" },
            "text": "  Solicitud ",
            "entities": [{ "type": "clientInfo" }]
        }))
        .unwrap();

        assert_eq!(activity.kind, ActivityType::Message);
        assert_eq!(activity.user_name(), "Ana Gómez");
        assert_eq!(activity.from.aad_object_id.as_deref(), Some("aad-1"));
        assert_eq!(activity.normalized_text(), "solicitud");
        assert!(!activity.expects_replies());
    }

    #[test]
    fn unknown_activity_type_is_other() {
        let activity: Activity =
            serde_json::from_value(json!({ "type": "typing", "conversation": { "id": "c" } }))
                .unwrap();
        assert_eq!(activity.kind, ActivityType::Other);
    }

    #[test]
    fn teams_download_info_uses_nested_url() {
        let attachment = Attachment {
            content_type: TEAMS_FILE_DOWNLOAD_INFO.to_string(),
            content_url: Some("https://teams.test/preview".into()),
            name: Some("perfil.pdf".into()),
            content: Some(json!({ "downloadUrl": "https://teams.test/download", "fileType": "pdf" })),
        };
        assert_eq!(attachment.download_url(), Some("https://teams.test/download"));
        assert!(attachment.is_pdf());
    }

    #[test]
    fn plain_attachment_uses_content_url() {
        let attachment = Attachment::new("cv.docx", "application/msword", "https://files.test/cv");
        assert_eq!(attachment.download_url(), Some("https://files.test/cv"));
        assert!(!attachment.is_pdf());

        let descriptor = attachment.descriptor();
        assert_eq!(descriptor.content_url, "https://files.test/cv");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["contentType"], "application/msword");
    }

    #[test]
    fn unnamed_attachment_gets_placeholder_name() {
        let attachment = Attachment {
            content_type: "application/pdf".into(),
            content_url: Some("https://files.test/x".into()),
            ..Default::default()
        };
        assert_eq!(attachment.descriptor().name, UNNAMED_ATTACHMENT);
        assert!(attachment.is_pdf());
    }

    #[test]
    fn new_members_excludes_bot() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "conversationUpdate",
            "conversation": { "id": "c" },
            "recipient": { "id": "bot" },
            "membersAdded": [{ "id": "bot" }, { "id": "user-1", "name": "Luis" }]
        }))
        .unwrap();
        let ids: Vec<&str> = activity.new_members().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["user-1"]);
    }

    #[test]
    fn hero_card_renders_buttons() {
        let out = OutgoingActivity::hero_card(HeroCard {
            title: "Menu".into(),
            buttons: vec![CardAction::im_back("Nueva", "solicitud")],
        });
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["attachments"][0]["contentType"], HERO_CARD);
        assert_eq!(json["attachments"][0]["content"]["buttons"][0]["type"], "imBack");
        assert!(out.render_plain().contains("1. Nueva (solicitud)"));
    }
}
