//! MIME message parsing seam
//!
//! Inbound webhooks and the SMTP relay transport decode messages
//! through [`MimeParse`]; [`MailParser`] is the default implementation.

pub mod parser;
pub mod types;

pub use parser::{MailParser, MimeParse};
pub use types::{Address, CanonicalMessage};
