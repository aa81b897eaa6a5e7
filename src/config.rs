//! Configuration types.
//!
//! Everything is read from the process environment. Variable names follow
//! the deployment the bot was first hosted in (`MicrosoftAppId`,
//! `Candidato_n8n`, ...), so existing `.env` files keep working.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default listen port (Bot Framework convention).
pub const DEFAULT_PORT: u16 = 3978;

/// Azure OpenAI API version used for chat completions.
pub const AZURE_API_VERSION: &str = "2023-12-01-preview";

/// Channel identity. Authentication itself is handled outside this crate;
/// the values are carried so the deployment can be inspected at startup.
#[derive(Debug, Clone, Default)]
pub struct AppCredentials {
    pub app_id: Option<String>,
    pub app_password: Option<SecretString>,
    pub app_type: Option<String>,
    pub tenant_id: Option<String>,
}

/// Per-dialog webhook endpoints. Each one is an independent automation flow.
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub solicitud: Option<String>,
    pub candidato: Option<String>,
    pub validacion: Option<String>,
    pub vitae: Option<String>,
}

/// Azure OpenAI deployment used to structure document text.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    pub deployment: String,
    pub api_version: String,
}

/// PDF field extraction services.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Service that turns an attachment descriptor into plain text.
    pub text_endpoint: Option<String>,
    pub azure: Option<AzureOpenAiConfig>,
    /// Deadline applied to each call to the text service and to Azure.
    pub timeout: Duration,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            text_endpoint: None,
            azure: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub port: u16,
    pub app: AppCredentials,
    pub webhooks: WebhookConfig,
    /// Deadline applied to every outbound delegate call.
    pub delegate_timeout: Duration,
    /// A user idle for longer than this is greeted again.
    pub welcome_interval: Duration,
    /// An active dialog idle for longer than this is discarded.
    pub dialog_timeout: Duration,
    /// libSQL file for conversation/profile state. `None` keeps state in memory.
    pub state_db_path: Option<PathBuf>,
    pub document: DocumentConfig,
    pub cli_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            app: AppCredentials::default(),
            webhooks: WebhookConfig::default(),
            delegate_timeout: Duration::from_secs(45),
            welcome_interval: Duration::from_secs(6 * 60 * 60),
            dialog_timeout: Duration::from_secs(60 * 60),
            state_db_path: None,
            document: DocumentConfig::default(),
            cli_enabled: false,
        }
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let port = match get("PORT").or_else(|| get("port")) {
            Some(raw) => parse_value::<u16>("PORT", &raw)?,
            None => defaults.port,
        };

        let app = AppCredentials {
            app_id: get("MicrosoftAppId"),
            app_password: get("MicrosoftAppPassword").map(SecretString::from),
            app_type: get("MicrosoftAppType"),
            tenant_id: get("MicrosoftAppTenantId"),
        };

        let vitae = get("Vitae_n8n");
        let webhooks = WebhookConfig {
            solicitud: get("Solicitud_n8n"),
            candidato: get("Candidato_n8n"),
            validacion: get("Validacion_n8n").or_else(|| vitae.clone()),
            vitae,
        };

        let azure = match (get("AZURE_OPENAI_ENDPOINT"), get("AZURE_OPENAI_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(AzureOpenAiConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key: SecretString::from(api_key),
                deployment: get("AZURE_OPENAI_DEPLOYMENT")
                    .unwrap_or_else(|| "gpt-35-turbo".to_string()),
                api_version: AZURE_API_VERSION.to_string(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("AZURE_OPENAI_API_KEY".into()));
            }
            _ => None,
        };

        Ok(Self {
            port,
            app,
            webhooks,
            delegate_timeout: secs(&get, "DELEGATE_TIMEOUT_SECS", defaults.delegate_timeout)?,
            welcome_interval: secs(&get, "WELCOME_INTERVAL_SECS", defaults.welcome_interval)?,
            dialog_timeout: secs(&get, "DIALOG_TIMEOUT_SECS", defaults.dialog_timeout)?,
            state_db_path: get("STATE_DB_PATH").map(PathBuf::from),
            document: DocumentConfig {
                text_endpoint: get("PDF_TEXT_ENDPOINT"),
                azure,
                timeout: secs(&get, "DOCUMENT_TIMEOUT_SECS", defaults.document.timeout)?,
            },
            cli_enabled: get("BOT_CLI")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

fn secs<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value::<u64>(key, &raw).map(Duration::from_secs),
        None => Ok(default),
    }
}
