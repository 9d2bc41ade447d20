use serde::{Deserialize, Serialize};

use crate::error::{MailgunError, Result};

/// Provider reply to a message send
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SendResponse {
    /// Decode a send reply; a missing or non-string `id` is a transport error
    pub fn parse_id(body: &str) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
            MailgunError::transport(format!("invalid send response: {}: {}", e, body))
        })?;

        match value.get("id").and_then(|v| v.as_str()) {
            Some(id) => Ok(id.to_string()),
            None => Err(MailgunError::transport(format!(
                "send response has no id: {}",
                body
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DomainList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<DomainRecord>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DomainRecord {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub web_prefix: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub disabled: Option<DomainDisabled>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DomainDisabled {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub permanently: bool,
    #[serde(default)]
    pub reason: String,
}

impl DomainList {
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|d| d.name.clone()).collect()
    }
}
