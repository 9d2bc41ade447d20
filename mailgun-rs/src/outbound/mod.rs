//! Outbound sending
//!
//! [`OutboundDispatcher`] validates an [`OutboundEnvelope`], resolves the
//! sending key for the sender's domain and hands the message to one of the
//! [`Transport`] strategies.

pub mod dispatcher;
pub mod http;
pub mod registry;
pub mod relay;
pub mod sdk;
pub mod types;

pub use dispatcher::{Dispatch, OutboundDispatcher, Transport};
pub use http::HttpTransport;
pub use registry::DomainKeyRegistry;
pub use relay::SmtpRelayTransport;
pub use sdk::SdkTransport;
pub use types::{OutboundEnvelope, MAX_RECIPIENTS};
