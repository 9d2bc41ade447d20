//! Client-side SMTP AUTH negotiation
//!
//! Picks PLAIN when the relay advertises it and falls back to LOGIN
//! otherwise, so sending does not fail outright on relays that only
//! offer one of the two.
//!
//! # Security
//! - Credentials are only offered over an encrypted session
//! - The session's server name must match the configured relay host
//!
//! The authenticator is a two-state machine ([`AuthState`]) and never
//! touches a socket: the SMTP client feeds it the server greeting
//! information and the decoded challenges, and sends back whatever it
//! returns.
//!
//! # Usage
//! ```
//! use mailgun_rs::smtp::{AdaptiveSmtpAuthenticator, AuthMechanism, ServerInfo};
//!
//! let mut auth = AdaptiveSmtpAuthenticator::new("user", "secret", "smtp.mailgun.org");
//! let server = ServerInfo::new("smtp.mailgun.org", true, vec!["LOGIN".to_string()]);
//!
//! let (mechanism, initial) = auth.start(&server).unwrap();
//! assert_eq!(mechanism, AuthMechanism::Login);
//! assert!(initial.is_empty());
//! assert_eq!(auth.next(b"Username:", true).unwrap(), b"user");
//! ```

use std::fmt;
use thiserror::Error;
use tracing::debug;

/// SMTP authentication mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    /// PLAIN mechanism (RFC 4616)
    Plain,
    /// LOGIN mechanism
    Login,
}

impl AuthMechanism {
    /// Get mechanism name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the client knows about the server when AUTH begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Host name the session was opened against
    pub name: String,
    /// Whether the session runs over TLS
    pub tls: bool,
    /// Mechanisms advertised in the EHLO `AUTH` line
    pub auth: Vec<String>,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, tls: bool, auth: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tls,
            auth,
        }
    }

    /// Whether the server advertised the given mechanism
    pub fn supports(&self, mechanism: AuthMechanism) -> bool {
        self.auth
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mechanism.as_str()))
    }
}

/// Negotiation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unencrypted connection")]
    InsecureTransport,

    #[error("wrong host name: expected {expected}, got {actual}")]
    HostMismatch { expected: String, actual: String },

    #[error("unexpected server challenge: {0}")]
    UnexpectedChallenge(String),

    #[error("authentication has not been started")]
    NotStarted,
}

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Init,
    Chosen(AuthMechanism),
}

/// PLAIN-or-LOGIN authenticator bound to one relay host
#[derive(Clone)]
pub struct AdaptiveSmtpAuthenticator {
    username: String,
    password: String,
    host: String,
    state: AuthState,
}

impl fmt::Debug for AdaptiveSmtpAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveSmtpAuthenticator")
            .field("username", &self.username)
            .field("host", &self.host)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl AdaptiveSmtpAuthenticator {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            state: AuthState::Init,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Choose a mechanism and produce the initial response.
    ///
    /// PLAIN answers in a single shot (`\0username\0password`); LOGIN
    /// starts with an empty response and waits for challenges.
    pub fn start(&mut self, server: &ServerInfo) -> Result<(AuthMechanism, Vec<u8>), AuthError> {
        if !server.tls {
            return Err(AuthError::InsecureTransport);
        }
        if server.name != self.host {
            return Err(AuthError::HostMismatch {
                expected: self.host.clone(),
                actual: server.name.clone(),
            });
        }

        let mechanism = if server.supports(AuthMechanism::Plain) {
            AuthMechanism::Plain
        } else {
            AuthMechanism::Login
        };
        self.state = AuthState::Chosen(mechanism);
        debug!("SMTP AUTH {} selected for {}", mechanism, server.name);

        let initial = match mechanism {
            AuthMechanism::Plain => {
                let mut resp = Vec::with_capacity(self.username.len() + self.password.len() + 2);
                resp.push(0);
                resp.extend_from_slice(self.username.as_bytes());
                resp.push(0);
                resp.extend_from_slice(self.password.as_bytes());
                resp
            }
            AuthMechanism::Login => Vec::new(),
        };

        Ok((mechanism, initial))
    }

    /// Answer a server challenge.
    ///
    /// `more` is false once the server has accepted the exchange; the
    /// answer is then empty.
    pub fn next(&mut self, challenge: &[u8], more: bool) -> Result<Vec<u8>, AuthError> {
        if !more {
            return Ok(Vec::new());
        }

        match self.state {
            AuthState::Init => Err(AuthError::NotStarted),
            // PLAIN already sent everything
            AuthState::Chosen(AuthMechanism::Plain) => Err(AuthError::UnexpectedChallenge(
                String::from_utf8_lossy(challenge).into_owned(),
            )),
            AuthState::Chosen(AuthMechanism::Login) => match challenge {
                b"Username:" => Ok(self.username.as_bytes().to_vec()),
                b"Password:" => Ok(self.password.as_bytes().to_vec()),
                other => Err(AuthError::UnexpectedChallenge(
                    String::from_utf8_lossy(other).into_owned(),
                )),
            },
        }
    }
}
