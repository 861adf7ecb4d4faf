//! The relay pipeline: model reply for an inbound message, delivered back to the sender.
//! Any failure before delivery turns into the apology reply and a 500.

use crate::auth::AuthError;
use crate::channels::{InboundMessage, OutboundSender};
use crate::llm::{LlmError, ReplyGenerator};
use axum::http::StatusCode;
use std::sync::Arc;

/// Fallback text sent to the user when the pipeline fails.
pub const APOLOGY_TEXT: &str = "Apologies, something went wrong. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unauthorized: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("inbound body has no {0}")]
    Malformed(&'static str),
}

/// LLM client and outbound sender, constructed once and shared by all requests.
pub struct Relay {
    llm: Arc<dyn ReplyGenerator>,
    outbound: OutboundSender,
}

impl Relay {
    pub fn new(llm: Arc<dyn ReplyGenerator>, outbound: OutboundSender) -> Self {
        Self { llm, outbound }
    }

    pub fn outbound(&self) -> &OutboundSender {
        &self.outbound
    }

    async fn reply_to(&self, msg: &InboundMessage) -> Result<(), PipelineError> {
        let reply = self.llm.reply(&msg.text).await?;
        self.outbound.send_message(&reply, &msg.sender).await;
        Ok(())
    }

    /// Run the pipeline for one request from `sender`. `authorized` is the validator's verdict;
    /// a failed verdict takes the same apology path as a model failure.
    pub async fn handle(
        &self,
        sender: &str,
        text: Option<String>,
        authorized: Result<(), AuthError>,
    ) -> StatusCode {
        let result = match (authorized, text) {
            (Err(e), _) => Err(PipelineError::Auth(e)),
            (Ok(()), None) => Err(PipelineError::Malformed("text")),
            (Ok(()), Some(text)) => {
                let msg = InboundMessage {
                    sender: sender.to_string(),
                    text,
                };
                self.reply_to(&msg).await
            }
        };
        match result {
            Ok(()) => StatusCode::OK,
            Err(e) => {
                log::error!("inbound pipeline failed: {}", e);
                self.outbound.send_message(APOLOGY_TEXT, sender).await;
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
