//! Webhook form decoding and field extraction
//!
//! The provider posts either `application/x-www-form-urlencoded` or
//! `multipart/form-data`. Field names changed case across provider
//! versions (`body-mime` vs `Body-mime`), so lookups try the exact name
//! first and then fall back to an ASCII case-insensitive match.
//!
//! Values are kept as raw bytes. `body-mime` may carry 8-bit text in any
//! charset and goes to the MIME parser untouched.

use crate::error::{MailgunError, Result};
use crate::webhook::signature::WebhookSignature;
use bytes::Bytes;
use multer::{Constraints, Multipart, SizeLimit};
use percent_encoding::percent_decode;
use tracing::debug;

/// Hard ceiling on a multipart webhook body
pub const MAX_MULTIPART_BYTES: usize = 32 << 20;

pub const FIELD_SPAM_FLAG: &str = "X-Mailgun-Sflag";
pub const FIELD_DKIM_RESULT: &str = "X-Mailgun-Dkim-Check-Result";
pub const FIELD_SPF_RESULT: &str = "X-Mailgun-Spf-Mailgun";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_TOKEN: &str = "token";
pub const FIELD_SIGNATURE: &str = "signature";
pub const FIELD_BODY_MIME: &str = "body-mime";

/// Decoded webhook form, in field order
#[derive(Debug, Clone, Default)]
pub struct WebhookForm {
    fields: Vec<(String, Bytes)>,
}

impl WebhookForm {
    /// Decode `body` according to the request's `Content-Type`.
    pub async fn parse(content_type: Option<&str>, body: Bytes) -> Result<Self> {
        let content_type = content_type.unwrap_or_default();
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/x-www-form-urlencoded" => Ok(Self::from_urlencoded(&body)),
            "multipart/form-data" => Self::from_multipart(content_type, body).await,
            other => Err(MailgunError::Validation(format!(
                "Unsupported webhook content type: {:?}",
                other
            ))),
        }
    }

    pub fn from_urlencoded(body: &[u8]) -> Self {
        let fields = body
            .split(|b| *b == b'&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = match pair.iter().position(|b| *b == b'=') {
                    Some(pos) => (&pair[..pos], &pair[pos + 1..]),
                    None => (pair, &pair[pair.len()..]),
                };
                let name = String::from_utf8_lossy(&form_decode(name)).into_owned();
                (name, Bytes::from(form_decode(value)))
            })
            .collect();
        Self { fields }
    }

    pub async fn from_multipart(content_type: &str, body: Bytes) -> Result<Self> {
        if body.len() > MAX_MULTIPART_BYTES {
            return Err(MailgunError::Validation(format!(
                "Multipart body of {} bytes exceeds the {} byte limit",
                body.len(),
                MAX_MULTIPART_BYTES
            )));
        }

        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| MailgunError::Parse(format!("Invalid multipart content type: {}", e)))?;

        let constraints = Constraints::new()
            .size_limit(SizeLimit::new().whole_stream(MAX_MULTIPART_BYTES as u64));
        let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
        let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

        let mut fields = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| MailgunError::Parse(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| MailgunError::Parse(format!("Invalid multipart field {}: {}", name, e)))?;
            fields.push((name, data));
        }

        debug!("Decoded {} multipart field(s)", fields.len());
        Ok(Self { fields })
    }

    /// First value for `name`: exact match, then case-insensitive
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| self.fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    /// Value for `name` as text, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.get(name)
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// `+` to space, then percent-decode, without any charset step
fn form_decode(input: &[u8]) -> Vec<u8> {
    let plus_as_space: Vec<u8> = input
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();
    percent_decode(&plus_as_space).collect()
}

/// The fields this adapter consumes from a webhook
#[derive(Debug, Clone, Default)]
pub struct WebhookFields {
    pub spam_flag: String,
    pub dkim_result: String,
    pub spf_result: String,
    pub signature: WebhookSignature,
    pub body_mime: Option<Bytes>,
}

impl WebhookFields {
    pub fn extract(form: &WebhookForm) -> Self {
        Self {
            spam_flag: form.text(FIELD_SPAM_FLAG),
            dkim_result: form.text(FIELD_DKIM_RESULT),
            spf_result: form.text(FIELD_SPF_RESULT),
            signature: WebhookSignature::new(
                form.text(FIELD_TIMESTAMP),
                form.text(FIELD_TOKEN),
                form.text(FIELD_SIGNATURE),
            ),
            body_mime: form.get(FIELD_BODY_MIME).cloned(),
        }
    }
}
