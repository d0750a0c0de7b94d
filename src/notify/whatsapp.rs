//! Meta WhatsApp Cloud API transport.

use crate::notify::NotificationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Credentials and endpoint for the Cloud API.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Permanent or system-user access token (Bearer).
    pub access_token: String,

    /// Sender phone number id from the Meta app dashboard.
    pub phone_number_id: String,

    /// Graph API base URL. Override this for testing against a mock server.
    pub api_base_url: String,

    /// Graph API version segment.
    pub api_version: String,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl WhatsAppConfig {
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
            api_base_url: "https://graph.facebook.com".to_owned(),
            api_version: "v19.0".to_owned(),
        }
    }

    /// Read `WHATSAPP_ACCESS_TOKEN` and `WHATSAPP_PHONE_NUMBER_ID`; `None` if either is unset.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("WHATSAPP_ACCESS_TOKEN").ok().filter(|v| !v.is_empty())?;
        let phone = std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok().filter(|v| !v.is_empty())?;
        Some(Self::new(token, phone))
    }

    /// Override the API base URL (useful for testing).
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}

/// A message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Free-form text; only allowed inside the session window.
    Text { body: String },
    /// A document fetched by WhatsApp from `link`; only allowed inside the session window.
    Document {
        link: String,
        filename: String,
        caption: String,
    },
    /// Pre-approved template; allowed at any time.
    Template { name: String, language: String },
}

impl OutboundMessage {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Text { .. } => "text",
            OutboundMessage::Document { .. } => "document",
            OutboundMessage::Template { .. } => "template",
        }
    }

    /// Cloud API request body for recipient `to`.
    pub fn to_payload(&self, to: &str) -> Value {
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": self.kind(),
        });
        let body = match self {
            OutboundMessage::Text { body } => json!({ "preview_url": true, "body": body }),
            OutboundMessage::Document {
                link,
                filename,
                caption,
            } => json!({ "link": link, "filename": filename, "caption": caption }),
            OutboundMessage::Template { name, language } => {
                json!({ "name": name, "language": { "code": language } })
            }
        };
        payload[self.kind()] = body;
        payload
    }
}

/// Transport acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Provider message id (`wamid…`), when returned.
    pub message_id: Option<String>,
}

/// Something that can deliver an [`OutboundMessage`].
#[async_trait]
pub trait MessageTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, message: &OutboundMessage)
        -> Result<SentMessage, NotificationError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Cloud API client.
pub struct WhatsAppCloud {
    config: WhatsAppConfig,
    client: Client,
}

impl WhatsAppCloud {
    /// Create a client with a 15 s request timeout.
    pub fn new(config: WhatsAppConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { config, client })
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(config: WhatsAppConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.phone_number_id
        )
    }
}

#[async_trait]
impl MessageTransport for WhatsAppCloud {
    fn name(&self) -> &str {
        "whatsapp-cloud"
    }

    async fn send(
        &self,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<SentMessage, NotificationError> {
        debug!(to = %to, kind = message.kind(), "sending WhatsApp message");

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&message.to_payload(to))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("WhatsApp API rate limit hit");
            return Err(NotificationError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Api(format!("HTTP {status}: {body}")));
        }

        let parsed: SendResponse = response.json().await?;
        Ok(SentMessage {
            message_id: parsed.messages.into_iter().next().map(|m| m.id),
        })
    }
}
