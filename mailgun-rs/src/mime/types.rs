use crate::error::{MailgunError, Result};
use crate::webhook::Verdict;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A mailbox: optional display name plus address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub address: String,
}

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Parse `addr@domain`, `<addr@domain>` or `Name <addr@domain>`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let (name, address) = match (input.rfind('<'), input.rfind('>')) {
            (Some(start), Some(end)) if start < end => {
                let name = input[..start].trim().trim_matches('"').trim();
                let name = (!name.is_empty()).then(|| name.to_string());
                (name, input[start + 1..end].trim())
            }
            (None, None) => (None, input),
            _ => {
                return Err(MailgunError::Validation(format!(
                    "Invalid address: {}",
                    input
                )))
            }
        };

        if address.is_empty() || address.contains(char::is_whitespace) {
            return Err(MailgunError::Validation(format!(
                "Invalid address: {}",
                input
            )));
        }

        Ok(Self {
            name,
            address: address.to_string(),
        })
    }

    /// Domain part of the address
    pub fn domain(&self) -> Result<&str> {
        match self.address.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(domain),
            _ => Err(MailgunError::Validation(format!(
                "Address has no domain: {}",
                self.address
            ))),
        }
    }
}

impl fmt::Display for Address {
    /// RFC 5322 form: `"Name" <addr>` or `<addr>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{}\" <{}>", escaped, self.address)
            }
            None => write!(f, "<{}>", self.address),
        }
    }
}

/// Parsed inbound message plus the provider's security verdicts
#[derive(Debug, Clone, Default, Serialize)]
pub struct CanonicalMessage {
    pub subject: String,
    pub from: Address,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub reply_to: Vec<Address>,
    /// Message-ID including angle brackets
    pub message_id: String,
    pub date: Option<DateTime<Utc>>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    /// MIME bytes as received
    #[serde(skip)]
    pub raw: Bytes,
    pub spam_verdict: Verdict,
    pub dkim_verdict: Verdict,
    pub spf_verdict: Verdict,
}
