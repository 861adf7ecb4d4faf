//! Outbound transport trait and the sender that wraps it.

use async_trait::async_trait;
use std::sync::Arc;

/// A reply to deliver to a WhatsApp address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub recipient: String,
    pub text: String,
}

/// Provider acknowledgement of an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_uuid: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("messages api error: {0}")]
    Api(String),
    #[error("signing application token failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Delivers one text message through the messaging provider.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Short name for logs and the health probe (e.g. "sandbox").
    fn name(&self) -> &str;

    async fn send(&self, reply: &OutboundReply) -> Result<SendReceipt, SendError>;
}

/// Best-effort sender: failures are logged and swallowed so the HTTP response
/// never depends on delivery.
#[derive(Clone)]
pub struct OutboundSender {
    transport: Arc<dyn MessageTransport>,
}

impl OutboundSender {
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self { transport }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Send `text` to `to`. Never fails.
    pub async fn send_message(&self, text: &str, to: &str) {
        let reply = OutboundReply {
            recipient: to.to_string(),
            text: text.to_string(),
        };
        match self.transport.send(&reply).await {
            Ok(SendReceipt {
                message_uuid: Some(uuid),
            }) => log::info!("the message was successfully sent with message_uuid: {}", uuid),
            Ok(_) => log::info!("the message was successfully sent"),
            Err(e) => log::error!("sending message via {} failed: {}", self.transport.name(), e),
        }
    }
}
