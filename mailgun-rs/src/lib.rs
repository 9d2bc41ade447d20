//! mailgun-rs: Mailgun transport adapter
//!
//! Sends and receives mail through Mailgun without leaking the provider's
//! protocol details into the application.
//!
//! # Features
//!
//! - **Outbound**: multipart HTTPS upload, SMTP relay with adaptive AUTH, or
//!   streamed API send, selected per deployment
//! - **Inbound**: HMAC-verified webhooks decoded into a [`mime::CanonicalMessage`]
//!   with spam, DKIM and SPF verdicts
//! - **Inventory**: active domain listing
//!
//! # Example
//!
//! ```no_run
//! use mailgun_rs::config::{Config, TransportKind};
//! use mailgun_rs::mime::Address;
//! use mailgun_rs::outbound::{OutboundDispatcher, OutboundEnvelope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let dispatcher = OutboundDispatcher::from_config(&config, TransportKind::Http)?;
//!     dispatcher.registry().set_domain_key("example.com", "key-...")?;
//!
//!     let envelope = OutboundEnvelope::new(
//!         Address::new("sender@example.com"),
//!         vec![Address::new("recipient@other.com")],
//!         &b"Subject: Test\r\n\r\nHello!"[..],
//!     );
//!     let id = dispatcher.send(&envelope).await?;
//!     println!("queued as {}", id);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`outbound`]: Transports, dispatcher and domain key registry
//! - [`smtp`]: SMTP relay client and AUTH negotiation
//! - [`webhook`]: Inbound signature verification and decoding
//! - [`mime`]: MIME parsing seam
//! - [`api`]: Provider REST client and the webhook HTTP server

pub mod api;
pub mod config;
pub mod error;
pub mod mime;
pub mod outbound;
pub mod smtp;
pub mod webhook;

// Re-export commonly used types
pub use config::Config;
pub use error::{MailgunError, Result};
