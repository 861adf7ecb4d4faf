//! Generative-model client.
//!
//! The gateway only needs one thing from a model: a reply to a single user turn. That seam is
//! [`ReplyGenerator`], implemented by [`GeminiClient`] and by stubs in tests.

mod gemini;

use async_trait::async_trait;

pub use gemini::{GeminiClient, GeminiError, DEFAULT_MODEL};

/// Error signaled to callers of [`ReplyGenerator::reply`]. Detail is logged, not carried.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM query error")]
    Query,
}

/// Produces a reply for one inbound message text.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, text: &str) -> Result<String, LlmError>;
}
