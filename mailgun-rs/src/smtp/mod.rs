//! SMTP relay client (RFC 5321)
//!
//! - [`auth`]: adaptive AUTH PLAIN/LOGIN negotiation
//! - [`client`]: TLS relay client and the protocol session it drives

pub mod auth;
pub mod client;

pub use auth::{AdaptiveSmtpAuthenticator, AuthError, AuthMechanism, AuthState, ServerInfo};
pub use client::{Reply, SmtpClient, SmtpSession};
