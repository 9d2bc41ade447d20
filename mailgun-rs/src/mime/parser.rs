use bytes::Bytes;
use chrono::{DateTime, Utc};
use mail_parser::{Address as ParsedAddress, MessageParser};

use super::types::{Address, CanonicalMessage};
use crate::error::{MailgunError, Result};

/// MIME decoding seam
///
/// The webhook processor and the SMTP relay transport only ever go
/// through this trait, so tests can count or stub parser invocations.
#[cfg_attr(test, mockall::automock)]
pub trait MimeParse: Send + Sync {
    /// Parse a raw RFC 5322 message. Verdicts are left at their defaults.
    fn parse(&self, raw: &[u8]) -> Result<CanonicalMessage>;
}

/// [`MimeParse`] backed by the `mail-parser` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct MailParser;

impl MailParser {
    pub fn new() -> Self {
        Self
    }

    fn addresses(address: Option<&ParsedAddress<'_>>) -> Vec<Address> {
        let Some(address) = address else {
            return Vec::new();
        };

        let addrs: Vec<&mail_parser::Addr<'_>> = match address {
            ParsedAddress::List(list) => list.iter().collect(),
            ParsedAddress::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
        };

        addrs
            .into_iter()
            .filter_map(|addr| {
                let email = addr.address()?;
                Some(Address {
                    name: addr.name().map(str::to_string),
                    address: email.to_string(),
                })
            })
            .collect()
    }
}

impl MimeParse for MailParser {
    fn parse(&self, raw: &[u8]) -> Result<CanonicalMessage> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MailgunError::Parse("not a MIME message".to_string()))?;

        if message.headers().is_empty() {
            return Err(MailgunError::Parse("message has no headers".to_string()));
        }

        let from = Self::addresses(message.from())
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(CanonicalMessage {
            subject: message.subject().unwrap_or_default().to_string(),
            from,
            to: Self::addresses(message.to()),
            cc: Self::addresses(message.cc()),
            reply_to: Self::addresses(message.reply_to()),
            message_id: message
                .message_id()
                .map(|id| format!("<{}>", id))
                .unwrap_or_default(),
            date: message
                .date()
                .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0)),
            text_body: message.body_text(0).map(|b| b.into_owned()),
            html_body: message.body_html(0).map(|b| b.into_owned()),
            raw: Bytes::copy_from_slice(raw),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"From: Redfin <listings@redfin.com>\r\n\
Reply-To: listings_support@redfin.com\r\n\
To: igor.amplio@gmail.com, \"Second\" <second@example.com>\r\n\
Subject: Tour Insights\r\n\
Message-ID: <abc-123@us-west-2.amazonses.com>\r\n\
Date: Tue, 19 Mar 2024 15:04:05 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello from the listing.\r\n";

    #[test]
    fn test_parse_headers() {
        let msg = MailParser::new().parse(SAMPLE).unwrap();
        assert_eq!(msg.subject, "Tour Insights");
        assert_eq!(msg.from.address, "listings@redfin.com");
        assert_eq!(msg.from.name.as_deref(), Some("Redfin"));
        assert_eq!(msg.to.len(), 2);
        assert_eq!(msg.to[0].address, "igor.amplio@gmail.com");
        assert_eq!(msg.to[1].name.as_deref(), Some("Second"));
        assert_eq!(msg.reply_to.len(), 1);
        assert_eq!(msg.reply_to[0].address, "listings_support@redfin.com");
        assert_eq!(msg.message_id, "<abc-123@us-west-2.amazonses.com>");
        assert!(msg.date.is_some());
    }

    #[test]
    fn test_parse_body_and_raw() {
        let msg = MailParser::new().parse(SAMPLE).unwrap();
        assert!(msg.text_body.unwrap().contains("Hello from the listing."));
        assert_eq!(&msg.raw[..], SAMPLE);
    }

    #[test]
    fn test_parse_empty_fails() {
        let err = MailParser::new().parse(b"").unwrap_err();
        assert!(err.is_parse());
    }
}
