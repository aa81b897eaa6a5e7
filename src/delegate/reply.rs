//! Interpretation of delegate responses and relaying them to the user.

use serde_json::Value;
use tracing::{info, warn};

use super::DelegateTarget;
use crate::error::DelegateError;
use crate::turn::TurnContext;

/// Sent when the delegate answers with nothing usable.
pub const MAINTENANCE_MESSAGE: &str = "El aplicativo se encuentra en mantenimiento.";

/// Sent when the delegate could not be reached.
pub const APOLOGY_MESSAGE: &str = "Ocurrió un error al procesar tu mensaje.";

/// Sent before every delegate call.
pub const WORKING_MESSAGE: &str = "Estamos trabajando en su solicitud...";

/// User-facing text extracted from a delegate response.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateReply {
    pub text: String,
    pub raw: Value,
}

impl DelegateReply {
    /// Pick the reply text out of a response body.
    ///
    /// A list uses its first element's `text`; an object uses `mensaje`, then
    /// `message`, then `text`. Anything else is answered with the maintenance
    /// message.
    pub fn from_json(raw: Value) -> Self {
        let text = match &raw {
            Value::Array(items) => items.first().and_then(|first| non_empty(first, "text")),
            Value::Object(_) => ["mensaje", "message", "text"]
                .iter()
                .find_map(|key| non_empty(&raw, key)),
            _ => None,
        };
        Self {
            text: text.unwrap_or_else(|| MAINTENANCE_MESSAGE.to_string()),
            raw,
        }
    }

    /// Whether no usable text was found.
    pub fn is_fallback(&self) -> bool {
        self.text == MAINTENANCE_MESSAGE
    }
}

fn non_empty(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Send the outcome of a delegate call to the user. Failures are logged and
/// answered with an apology; they never fail the turn.
pub fn relay(
    turn: &mut TurnContext,
    target: DelegateTarget,
    result: Result<DelegateReply, DelegateError>,
) {
    match result {
        Ok(reply) => {
            info!(%target, fallback = reply.is_fallback(), "Delegate replied");
            turn.send(reply.text);
        }
        Err(e) => {
            warn!(%target, error = %e, "Delegate call failed");
            turn.send(APOLOGY_MESSAGE);
        }
    }
}
