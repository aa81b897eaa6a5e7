//! PDF-to-fields pipeline: a text service turns the file into plain text and
//! an Azure OpenAI deployment structures it into request fields.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::activity::Attachment;
use crate::config::{AzureOpenAiConfig, DocumentConfig};
use crate::error::DocumentError;
use crate::extract::{normalize_fields, SOLICITUD_FIELDS};

const SYSTEM_PROMPT: &str = r#"Eres un asistente especializado en extraer información de solicitudes de reclutamiento.

Extrae la siguiente información del texto y devuélvela en formato JSON válido:

{
    "cliente": "nombre del cliente",
    "origen": "origen de la solicitud",
    "usuarioSolicitante": "usuario que solicita",
    "tipoPerfil": "tipo de perfil solicitado",
    "skills": "habilidades requeridas separadas por comas",
    "prioridad": "Alta/Media/Baja",
    "valorOportunidad": "valor económico",
    "ciudad": "ciudad donde se requiere"
}

Reglas:
- Si no encuentras algún campo, ponlo como null
- La prioridad debe ser exactamente: "Alta", "Media" o "Baja"
- Las skills deben estar separadas por comas
- Responde SOLO con el JSON, sin texto adicional"#;

const TEXT_STAGE: &str = "Text service";
const AI_STAGE: &str = "AI service";

/// Turns an uploaded document into request fields.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, attachment: &Attachment) -> Result<Map<String, Value>, DocumentError>;
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text service + Azure OpenAI chat completions.
pub struct AiDocumentExtractor {
    client: reqwest::Client,
    text_endpoint: String,
    azure: AzureOpenAiConfig,
    timeout: Duration,
}

impl AiDocumentExtractor {
    pub fn new(text_endpoint: String, azure: AzureOpenAiConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            text_endpoint,
            azure,
            timeout,
        }
    }

    /// Build from config; both the text service and Azure must be configured.
    pub fn from_config(config: &DocumentConfig) -> Result<Self, DocumentError> {
        match (&config.text_endpoint, &config.azure) {
            (Some(endpoint), Some(azure)) => Ok(Self::new(
                endpoint.clone(),
                azure.clone(),
                config.timeout,
            )),
            _ => Err(DocumentError::NotConfigured),
        }
    }

    fn timed_out(&self, stage: &'static str, e: reqwest::Error) -> Option<DocumentError> {
        e.is_timeout().then_some(DocumentError::Timeout {
            stage,
            timeout: self.timeout,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.azure.endpoint, self.azure.deployment, self.azure.api_version
        )
    }

    async fn document_text(&self, attachment: &Attachment) -> Result<String, DocumentError> {
        let descriptor = attachment.descriptor();
        if descriptor.content_url.is_empty() {
            return Err(DocumentError::MissingUrl {
                name: descriptor.name,
            });
        }

        let resp = self
            .client
            .post(&self.text_endpoint)
            .timeout(self.timeout)
            .json(&descriptor)
            .send()
            .await
            .map_err(|e| {
                let reason = e.to_string();
                self.timed_out(TEXT_STAGE, e)
                    .unwrap_or(DocumentError::TextService(reason))
            })?;
        if !resp.status().is_success() {
            return Err(DocumentError::TextService(format!(
                "HTTP {}",
                resp.status()
            )));
        }
        let body: TextResponse = resp.json().await.map_err(|e| {
            let reason = e.to_string();
            self.timed_out(TEXT_STAGE, e)
                .unwrap_or(DocumentError::TextService(reason))
        })?;

        let text = body.text.trim();
        if text.is_empty() {
            return Err(DocumentError::EmptyText);
        }
        Ok(text.to_string())
    }

    async fn structure(&self, text: &str) -> Result<Map<String, Value>, DocumentError> {
        let body = json!({
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Extrae la información de esta solicitud de reclutamiento:\n\n{text}")
                }
            ],
            "max_tokens": 1000,
            "temperature": 0.1,
            "top_p": 1.0,
            "frequency_penalty": 0,
            "presence_penalty": 0
        });

        let resp = self
            .client
            .post(self.completions_url())
            .timeout(self.timeout)
            .header("api-key", self.azure.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let reason = e.to_string();
                self.timed_out(AI_STAGE, e).unwrap_or(DocumentError::Ai(reason))
            })?;
        if !resp.status().is_success() {
            return Err(DocumentError::Ai(format!("HTTP {}", resp.status())));
        }
        let chat: ChatResponse = resp.json().await.map_err(|e| {
            let reason = e.to_string();
            self.timed_out(AI_STAGE, e).unwrap_or(DocumentError::Ai(reason))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DocumentError::InvalidAiReply("empty completion".into()))?;
        debug!(reply = %content, "AI extraction reply");
        parse_fields(&content)
    }
}

#[async_trait]
impl DocumentExtractor for AiDocumentExtractor {
    async fn extract(&self, attachment: &Attachment) -> Result<Map<String, Value>, DocumentError> {
        info!(name = attachment.display_name(), "Extracting fields from document");
        let text = self.document_text(attachment).await?;
        debug!(chars = text.chars().count(), "Document text received");
        self.structure(&text).await
    }
}

/// Parse the model's JSON object reply, tolerating a fenced code block, and
/// normalize it against the request schema.
pub fn parse_fields(reply: &str) -> Result<Map<String, Value>, DocumentError> {
    let json = strip_fence(reply.trim());
    let value: Value =
        serde_json::from_str(json).map_err(|e| DocumentError::InvalidAiReply(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(normalize_fields(SOLICITUD_FIELDS, &map)),
        other => Err(DocumentError::InvalidAiReply(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
