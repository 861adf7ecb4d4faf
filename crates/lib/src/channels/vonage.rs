//! Vonage Messages API transports for WhatsApp text.
//!
//! - [`SandboxTransport`]: v0.1 sandbox endpoint, Basic auth with api key and secret.
//! - [`ApplicationTransport`]: v1 endpoint, Bearer JWT signed (RS256) with the application private key.

use crate::channels::transport::{MessageTransport, OutboundReply, SendError, SendReceipt};
use crate::config::{MessagingConfig, TransportKind};
use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const SANDBOX_MESSAGES_URL: &str = "https://messages-sandbox.nexmo.com/v0.1/messages";
const DEFAULT_API_HOST: &str = "https://messages-sandbox.nexmo.com";
/// Lifetime of an application JWT, in seconds.
const APP_TOKEN_TTL: i64 = 900;

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    message_uuid: Option<String>,
}

/// Reads the response: non-2xx is an error, otherwise extract message_uuid when the body has one.
async fn read_send_response(res: reqwest::Response) -> Result<SendReceipt, SendError> {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(SendError::Api(format!("{} {}", status, body)));
    }
    let message_uuid = serde_json::from_str::<SendResponse>(&body)
        .ok()
        .and_then(|r| r.message_uuid);
    Ok(SendReceipt { message_uuid })
}

/// Raw POST to the sandbox messages endpoint with Basic credentials.
pub struct SandboxTransport {
    url: String,
    authorization: String,
    from_number: String,
    client: reqwest::Client,
}

impl SandboxTransport {
    pub fn new(api_key: &str, api_secret: &str, from_number: String, url: Option<String>) -> Self {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", api_key, api_secret));
        Self {
            url: url.unwrap_or_else(|| SANDBOX_MESSAGES_URL.to_string()),
            authorization: format!("Basic {}", credentials),
            from_number,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MessageTransport for SandboxTransport {
    fn name(&self) -> &str {
        "sandbox"
    }

    async fn send(&self, reply: &OutboundReply) -> Result<SendReceipt, SendError> {
        let body = json!({
            "from": { "type": "whatsapp", "number": self.from_number },
            "to": { "type": "whatsapp", "number": reply.recipient },
            "message": { "content": { "type": "text", "text": reply.text } },
        });
        let res = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&body)
            .send()
            .await?;
        read_send_response(res).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AppClaims {
    application_id: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// v1 Messages API request for a WhatsApp text.
#[derive(Debug, Serialize)]
struct WhatsAppText<'a> {
    message_type: &'static str,
    channel: &'static str,
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

/// v1 Messages API authenticated with a short-lived application JWT.
pub struct ApplicationTransport {
    messages_url: String,
    application_id: String,
    key: EncodingKey,
    from_number: String,
    client: reqwest::Client,
}

impl ApplicationTransport {
    /// `private_key_pem` is the application's RSA private key (PKCS#1 or PKCS#8 PEM).
    pub fn new(
        application_id: String,
        private_key_pem: &str,
        from_number: String,
        api_host: Option<String>,
    ) -> Result<Self, SendError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;
        let host = api_host
            .map(|h| h.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        Ok(Self {
            messages_url: format!("{}/v1/messages", host),
            application_id,
            key,
            from_number,
            client: reqwest::Client::new(),
        })
    }

    /// Fresh token per request; no caching.
    fn token(&self) -> Result<String, SendError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AppClaims {
            application_id: self.application_id.clone(),
            iat,
            exp: iat + APP_TOKEN_TTL,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

#[async_trait]
impl MessageTransport for ApplicationTransport {
    fn name(&self) -> &str {
        "application"
    }

    async fn send(&self, reply: &OutboundReply) -> Result<SendReceipt, SendError> {
        let token = self.token()?;
        let body = WhatsAppText {
            message_type: "text",
            channel: "whatsapp",
            from: &self.from_number,
            to: &reply.recipient,
            text: &reply.text,
        };
        let res = self
            .client
            .post(&self.messages_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_send_response(res).await
    }
}

/// Build the configured transport. Fails when its credentials are missing.
pub fn transport_from_config(
    config: &MessagingConfig,
) -> anyhow::Result<Arc<dyn MessageTransport>> {
    let from_number = config.require_whatsapp_number()?;
    match config.resolve_transport() {
        TransportKind::Sandbox => {
            let api_key = config
                .api_key
                .as_deref()
                .context("messaging.apiKey (VONAGE_API_KEY) is required for the sandbox transport")?;
            let api_secret = config.api_secret.as_deref().context(
                "messaging.apiSecret (VONAGE_API_SECRET) is required for the sandbox transport",
            )?;
            Ok(Arc::new(SandboxTransport::new(
                api_key,
                api_secret,
                from_number,
                config.sandbox_url.clone(),
            )))
        }
        TransportKind::Application => {
            let application_id = config.application_id.clone().context(
                "messaging.applicationId (VONAGE_APPLICATION_ID) is required for the application transport",
            )?;
            let pem = config.resolve_private_key_pem()?;
            let transport =
                ApplicationTransport::new(application_id, &pem, from_number, config.api_host.clone())
                    .context("loading application private key")?;
            Ok(Arc::new(transport))
        }
    }
}
