//! Provider REST API and the HTTP surface of this service
//!
//! - [`client`]: calls out to the provider (domains, MIME send)
//! - [`server`] and [`handlers`]: the webhook receiver

pub mod client;
pub mod handlers;
pub mod server;
pub mod types;

pub use client::{MailgunClient, MimeMessage, API_USER};
pub use handlers::{LoggingSink, MessageSink};
pub use server::ApiServer;
pub use types::{DomainList, DomainRecord, SendResponse};
