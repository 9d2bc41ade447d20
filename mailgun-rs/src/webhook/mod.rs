//! Inbound webhook handling
//!
//! - [`signature`]: HMAC-SHA256 webhook signature verification
//! - [`verdict`]: provider spam/DKIM/SPF results to [`Verdict`]
//! - [`form`]: form decoding and field extraction
//! - [`processor`]: the verify-then-parse pipeline

pub mod form;
pub mod processor;
pub mod signature;
pub mod verdict;

pub use form::{WebhookFields, WebhookForm, MAX_MULTIPART_BYTES};
pub use processor::{InboundRequest, InboundWebhookProcessor};
pub use signature::{sign_webhook, verify_webhook_signature, SignatureVerifier, WebhookSignature};
pub use verdict::{normalize_verdict, spam_verdict, Verdict};
