//! Integration tests for inbound webhook processing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mailgun_rs::mime::{CanonicalMessage, MailParser, MimeParse};
use mailgun_rs::webhook::{
    sign_webhook, InboundRequest, InboundWebhookProcessor, SignatureVerifier, Verdict,
};
use mailgun_rs::{MailgunError, Result};

const SIGNING_KEY: &str = "key-3ax6xnjp29jd6fds4gc373sgvjxteol0";
const BOUNDARY: &str = "----mailgun-webhook-boundary";

const RAW_MIME: &str = "From: Igor Rendulic <igor@mmmm.io>\r\n\
To: test@mailiomail.com\r\n\
Reply-To: replies@mmmm.io\r\n\
Subject: Inbound webhook test\r\n\
Message-ID: <inbound-1@mmmm.io>\r\n\
Date: Mon, 01 Jan 2024 10:00:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello from the other side.\r\n";

/// Real parser that counts how often it runs
#[derive(Default)]
struct CountingParser {
    calls: AtomicUsize,
    inner: MailParser,
}

impl MimeParse for CountingParser {
    fn parse(&self, raw: &[u8]) -> Result<CanonicalMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(raw)
    }
}

fn multipart_bytes(fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_body(fields: &[(&str, &str)]) -> Vec<u8> {
    let fields: Vec<(&str, &[u8])> = fields
        .iter()
        .map(|(name, value)| (*name, value.as_bytes()))
        .collect();
    multipart_bytes(&fields)
}

fn multipart_request(signature: &str) -> InboundRequest {
    let body = multipart_body(&[
        ("timestamp", "1700000000"),
        ("token", "5c4a2d8e9f0b1c7d3e6a8b2f4c1d9e0a7b3c5d8e2f"),
        ("signature", signature),
        ("X-Mailgun-Sflag", "false"),
        ("X-Mailgun-Dkim-Check-Result", "pass"),
        ("X-Mailgun-Spf-Mailgun", "softfail"),
        ("body-mime", RAW_MIME),
    ]);
    InboundRequest::new(
        Some(format!("multipart/form-data; boundary={}", BOUNDARY)),
        body,
    )
}

fn processor() -> (InboundWebhookProcessor, Arc<CountingParser>) {
    let parser = Arc::new(CountingParser::default());
    let processor =
        InboundWebhookProcessor::new(SignatureVerifier::new(SIGNING_KEY), parser.clone());
    (processor, parser)
}

fn valid_signature() -> String {
    sign_webhook(
        "1700000000",
        "5c4a2d8e9f0b1c7d3e6a8b2f4c1d9e0a7b3c5d8e2f",
        SIGNING_KEY.as_bytes(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_multipart_webhook_end_to_end() {
    let (processor, parser) = processor();

    let message = processor
        .receive(multipart_request(&valid_signature()))
        .await
        .unwrap();

    assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    assert_eq!(message.spam_verdict, Verdict::Pass);
    assert_eq!(message.dkim_verdict, Verdict::Pass);
    assert_eq!(message.spf_verdict, Verdict::Fail);

    assert_eq!(message.subject, "Inbound webhook test");
    assert_eq!(message.from.address, "igor@mmmm.io");
    assert_eq!(message.from.name.as_deref(), Some("Igor Rendulic"));
    assert_eq!(message.to.len(), 1);
    assert_eq!(message.to[0].address, "test@mailiomail.com");
    assert_eq!(message.reply_to[0].address, "replies@mmmm.io");
    assert_eq!(message.message_id, "<inbound-1@mmmm.io>");
    assert!(message.date.is_some());
    assert!(message
        .text_body
        .as_deref()
        .unwrap_or_default()
        .contains("Hello from the other side."));
}

#[tokio::test]
async fn test_tampered_signature_never_parses() {
    let (processor, parser) = processor();

    let mut signature = valid_signature();
    let flipped = if signature.ends_with('0') { "1" } else { "0" };
    signature.replace_range(signature.len() - 1.., flipped);

    let err = processor
        .receive(multipart_request(&signature))
        .await
        .unwrap_err();

    assert!(matches!(err, MailgunError::UnauthenticatedWebhook(_)));
    assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undecodable_signature_rejected() {
    let (processor, parser) = processor();

    let err = processor
        .receive(multipart_request("not-hex-at-all"))
        .await
        .unwrap_err();

    assert!(matches!(err, MailgunError::UnauthenticatedWebhook(_)));
    assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_urlencoded_webhook() {
    let (processor, parser) = processor();

    let body: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("timestamp", "1700000000")
        .append_pair("token", "5c4a2d8e9f0b1c7d3e6a8b2f4c1d9e0a7b3c5d8e2f")
        .append_pair("signature", &valid_signature())
        .append_pair("X-Mailgun-Sflag", "True")
        .append_pair("X-Mailgun-Dkim-Check-Result", "fail")
        .append_pair("X-Mailgun-Spf-Mailgun", "Neutral")
        .append_pair("body-mime", RAW_MIME)
        .finish();

    let message = processor
        .receive(InboundRequest::new(
            Some("application/x-www-form-urlencoded".to_string()),
            body.into_bytes(),
        ))
        .await
        .unwrap();

    assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    assert_eq!(message.spam_verdict, Verdict::Fail);
    assert_eq!(message.dkim_verdict, Verdict::Fail);
    assert_eq!(message.spf_verdict, Verdict::NotAvailable);
    assert_eq!(message.message_id, "<inbound-1@mmmm.io>");
}

#[tokio::test]
async fn test_missing_body_mime() {
    let (processor, parser) = processor();

    let body = multipart_body(&[
        ("timestamp", "1700000000"),
        ("token", "5c4a2d8e9f0b1c7d3e6a8b2f4c1d9e0a7b3c5d8e2f"),
        ("signature", &valid_signature()),
    ]);
    let err = processor
        .receive(InboundRequest::new(
            Some(format!("multipart/form-data; boundary={}", BOUNDARY)),
            body,
        ))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_8bit_latin1_body_reaches_parser_unchanged() {
    let (processor, parser) = processor();

    let mime: &[u8] = b"From: igor@mmmm.io\r\n\
To: test@mailiomail.com\r\n\
Subject: caf\xe9\r\n\
Message-ID: <latin1-1@mmmm.io>\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: 8bit\r\n\
\r\n\
d\xe9j\xe0 vu\r\n";

    let signature = valid_signature();
    let body = multipart_bytes(&[
        ("timestamp", &b"1700000000"[..]),
        ("token", &b"5c4a2d8e9f0b1c7d3e6a8b2f4c1d9e0a7b3c5d8e2f"[..]),
        ("signature", signature.as_bytes()),
        ("body-mime", mime),
    ]);
    let message = processor
        .receive(InboundRequest::new(
            Some(format!("multipart/form-data; boundary={}", BOUNDARY)),
            body,
        ))
        .await
        .unwrap();

    assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    assert_eq!(&message.raw[..], mime);
    assert_eq!(message.message_id, "<latin1-1@mmmm.io>");
}
