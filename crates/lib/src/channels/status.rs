//! Delivery-status callback payload. Only logged; every field is optional.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub message_uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub to: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl StatusUpdate {
    pub fn from_json(body: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }

    /// Recipient address: `to` as a plain string or the sandbox `{"number": ...}` object.
    pub fn recipient(&self) -> Option<String> {
        let to = self.to.as_ref()?;
        let to = to.get("number").unwrap_or(to);
        match to {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
