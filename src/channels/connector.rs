//! Connector client — posts replies back to the channel's service URL.
//!
//! Requests are sent without a bearer token; channel authentication is
//! expected to be handled in front of the bot.

use std::time::Duration;

use reqwest::Url;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::activity::{Activity, OutgoingActivity};
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "connector";

/// Sends outgoing activities through the Bot Framework connector API.
#[derive(Clone)]
pub struct ConnectorClient {
    client: reqwest::Client,
}

impl ConnectorClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for connector");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Post one reply as an answer to `inbound`.
    pub async fn send(&self, inbound: &Activity, reply: &OutgoingActivity) -> Result<(), ChannelError> {
        let url = reply_url(inbound, reply.reply_to_id.as_deref())?;
        let body = reply_body(inbound, reply)?;
        debug!(url = %url, "Posting reply");

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(send_failed(format!("connector answered HTTP {}", status.as_u16())));
        }
        Ok(())
    }
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.to_string(),
        reason,
    }
}

/// `{serviceUrl}/v3/conversations/{id}/activities[/{replyToId}]`. Ids are
/// escaped as single path segments.
pub fn reply_url(inbound: &Activity, reply_to_id: Option<&str>) -> Result<Url, ChannelError> {
    let service_url = inbound
        .service_url
        .as_deref()
        .ok_or_else(|| ChannelError::InvalidActivity("missing serviceUrl".into()))?;
    let mut url = Url::parse(service_url)
        .map_err(|e| ChannelError::InvalidActivity(format!("serviceUrl {service_url:?}: {e}")))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ChannelError::InvalidActivity(format!("serviceUrl {service_url:?} cannot be a base")))?;
        segments
            .pop_if_empty()
            .extend(["v3", "conversations", inbound.conversation_id(), "activities"]);
        if let Some(id) = reply_to_id {
            segments.push(id);
        }
    }
    Ok(url)
}

/// The reply activity addressed from the bot back to the sender.
fn reply_body(inbound: &Activity, reply: &OutgoingActivity) -> Result<Value, ChannelError> {
    let mut body = serde_json::to_value(reply)
        .map_err(|e| send_failed(format!("reply serialization: {e}")))?;
    if let Value::Object(map) = &mut body {
        map.insert("conversation".into(), json!({ "id": inbound.conversation_id() }));
        map.insert("recipient".into(), json!(inbound.from));
        if let Some(bot) = &inbound.recipient {
            map.insert("from".into(), json!(bot));
        }
        if let Some(channel) = &inbound.channel_id {
            map.insert("channelId".into(), json!(channel));
        }
    }
    Ok(body)
}
