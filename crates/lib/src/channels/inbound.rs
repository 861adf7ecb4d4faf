//! Inbound message from the provider callback.
//!
//! Two body shapes are understood: the Messages API v1 flat form
//! (`{"from": "447700900000", "text": "hi"}`) and the v0.1 sandbox nested form
//! (`{"from": {"number": "..."}, "message": {"content": {"text": "..."}}}`).

use serde_json::Value;

/// A message from a WhatsApp user, to be answered by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
}

/// Sender address of a callback body, if one can be found.
pub fn sender_of(body: &Value) -> Option<String> {
    let from = body.get("from")?;
    let from = from.get("number").unwrap_or(from);
    match from {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Message text of a callback body, if present.
pub fn text_of(body: &Value) -> Option<String> {
    body.get("text")
        .or_else(|| body.pointer("/message/content/text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
