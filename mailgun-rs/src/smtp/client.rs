//! SMTP client for relaying outgoing mail through the provider
//!
//! This module handles the outgoing connection to the provider's SMTP relay.
//!
//! # Features
//! - Implicit TLS (port 465) or STARTTLS (port 587)
//! - Adaptive AUTH PLAIN/LOGIN via [`AdaptiveSmtpAuthenticator`]
//! - Multiple recipients per transaction
//! - Dot-stuffing of the DATA payload
//!
//! The protocol part lives in [`SmtpSession`], which works over any
//! `AsyncRead + AsyncWrite` stream.

use crate::config::SmtpConfig;
use crate::error::{MailgunError, Result};
use crate::smtp::auth::{AdaptiveSmtpAuthenticator, ServerInfo};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info};

/// A complete (possibly multi-line) server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    /// Text of the last line, without the code
    pub fn text(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }
}

/// One SMTP conversation over an established stream
pub struct SmtpSession<S> {
    stream: BufReader<S>,
    server_name: String,
    tls: bool,
    auth_mechanisms: Vec<String>,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream. `tls` states whether the stream is encrypted.
    pub fn new(stream: S, server_name: impl Into<String>, tls: bool) -> Self {
        Self {
            stream: BufReader::new(stream),
            server_name: server_name.into(),
            tls,
            auth_mechanisms: Vec::new(),
        }
    }

    /// Mechanisms advertised by the last EHLO
    pub fn auth_mechanisms(&self) -> &[String] {
        &self.auth_mechanisms
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    pub async fn greeting(&mut self) -> Result<Reply> {
        self.expect(220).await
    }

    pub async fn ehlo(&mut self, client_name: &str) -> Result<()> {
        self.write_line(&format!("EHLO {}", client_name)).await?;
        let reply = self.expect(250).await?;

        self.auth_mechanisms = reply
            .lines
            .iter()
            .skip(1)
            .filter_map(|line| {
                let upper = line.to_uppercase();
                upper
                    .strip_prefix("AUTH ")
                    .or_else(|| upper.strip_prefix("AUTH="))
                    .map(|rest| rest.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            })
            .flatten()
            .collect();

        debug!("Server advertises AUTH {:?}", self.auth_mechanisms);
        Ok(())
    }

    pub async fn starttls(&mut self) -> Result<()> {
        self.write_line("STARTTLS").await?;
        self.expect(220).await?;
        Ok(())
    }

    /// Run AUTH until the server accepts (235) or rejects.
    pub async fn authenticate(&mut self, auth: &mut AdaptiveSmtpAuthenticator) -> Result<()> {
        let info = ServerInfo::new(
            self.server_name.clone(),
            self.tls,
            self.auth_mechanisms.clone(),
        );
        let (mechanism, initial) = auth.start(&info)?;

        if initial.is_empty() {
            self.write_line(&format!("AUTH {}", mechanism)).await?;
        } else {
            self.write_secret(&format!("AUTH {} {}", mechanism, BASE64.encode(initial)))
                .await?;
        }

        loop {
            let reply = self.read_reply().await?;
            match reply.code {
                235 => {
                    auth.next(&[], false)?;
                    info!("Authenticated to {} using {}", self.server_name, mechanism);
                    return Ok(());
                }
                334 => {
                    let challenge = BASE64.decode(reply.text().trim()).map_err(|e| {
                        MailgunError::Parse(format!("Invalid base64 challenge: {}", e))
                    })?;
                    let response = match auth.next(&challenge, true) {
                        Ok(response) => response,
                        Err(e) => {
                            // Cancel the exchange before bailing out
                            let _ = self.write_line("*").await;
                            return Err(e.into());
                        }
                    };
                    self.write_secret(&BASE64.encode(response)).await?;
                }
                code => {
                    error!("Authentication rejected: {} {}", code, reply.text());
                    return Err(MailgunError::Transport {
                        message: format!("authentication rejected: {} {}", code, reply.text()),
                        status: Some(code),
                    });
                }
            }
        }
    }

    /// MAIL FROM, RCPT TO for each recipient, then DATA
    pub async fn send(&mut self, from: &str, to: &[String], data: &[u8]) -> Result<()> {
        self.write_line(&format!("MAIL FROM:<{}>", from)).await?;
        self.expect(250).await?;

        for rcpt in to {
            self.write_line(&format!("RCPT TO:<{}>", rcpt)).await?;
            self.expect_any(&[250, 251]).await?;
        }

        self.write_line("DATA").await?;
        self.expect(354).await?;

        self.stream.write_all(&dot_stuff(data)).await?;
        self.stream.flush().await?;
        self.expect(250).await?;

        Ok(())
    }

    pub async fn quit(&mut self) -> Result<()> {
        self.write_line("QUIT").await?;
        // Some relays close without answering
        let _ = self.read_reply().await;
        Ok(())
    }

    async fn expect(&mut self, code: u16) -> Result<Reply> {
        self.expect_any(&[code]).await
    }

    async fn expect_any(&mut self, codes: &[u16]) -> Result<Reply> {
        let reply = self.read_reply().await?;
        if !codes.contains(&reply.code) {
            error!("Unexpected response: {} {}", reply.code, reply.text());
            return Err(MailgunError::Transport {
                message: format!(
                    "expected {:?}, got: {} {}",
                    codes,
                    reply.code,
                    reply.lines.join(" / ")
                ),
                status: Some(reply.code),
            });
        }
        Ok(reply)
    }

    /// Read response lines until the one without a dash after the code
    async fn read_reply(&mut self) -> Result<Reply> {
        let mut code = None;
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line).await? == 0 {
                return Err(MailgunError::transport("connection closed by server"));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            debug!("< {}", line);

            let parsed = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| MailgunError::Parse(format!("Malformed SMTP reply: {}", line)))?;
            code.get_or_insert(parsed);
            lines.push(line.get(4..).unwrap_or("").to_string());

            if line.as_bytes().get(3) != Some(&b'-') {
                break;
            }
        }

        Ok(Reply {
            code: code.unwrap_or_default(),
            lines,
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        debug!("> {}", line);
        self.write_raw(line).await
    }

    async fn write_secret(&mut self, line: &str) -> Result<()> {
        debug!("> [credentials elided]");
        self.write_raw(line).await
    }

    async fn write_raw(&mut self, line: &str) -> Result<()> {
        self.stream
            .write_all(format!("{}\r\n", line).as_bytes())
            .await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Normalize line endings to CRLF, escape leading dots and append the
/// terminating `.` line.
pub fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 64);
    let body = data.strip_suffix(b"\n").unwrap_or(data);

    if !body.is_empty() {
        for line in body.split(|b| *b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

/// SMTP client for the provider relay
///
/// # Examples
/// ```no_run
/// use mailgun_rs::config::SmtpConfig;
/// use mailgun_rs::smtp::SmtpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SmtpClient::new(&SmtpConfig::default());
/// client.send_mail(
///     "sender@example.com",
///     &["recipient@other.com".to_string()],
///     b"Subject: Test\r\n\r\nHello!"
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub struct SmtpClient {
    host: String,
    port: u16,
    implicit_tls: bool,
    timeout: Duration,
    authenticator: AdaptiveSmtpAuthenticator,
}

impl SmtpClient {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            implicit_tls: config.implicit_tls,
            timeout: Duration::from_secs(config.timeout_secs),
            authenticator: AdaptiveSmtpAuthenticator::new(
                config.username.clone(),
                config.password.clone(),
                config.host.clone(),
            ),
        }
    }

    /// Send raw message data to the given recipients
    ///
    /// # Errors
    /// Returns error if:
    /// - Cannot connect to the relay or the TLS handshake fails
    /// - AUTH negotiation fails
    /// - The SMTP transaction is rejected
    /// - The whole exchange exceeds the configured timeout
    pub async fn send_mail(&self, from: &str, to: &[String], data: &[u8]) -> Result<()> {
        info!(
            "Relaying mail from {} to {} recipient(s) via {}:{}",
            from,
            to.len(),
            self.host,
            self.port
        );

        tokio::time::timeout(self.timeout, self.connect_and_send(from, to, data))
            .await
            .map_err(|_| {
                MailgunError::transport(format!(
                    "SMTP session with {} timed out after {:?}",
                    self.host, self.timeout
                ))
            })?
    }

    async fn connect_and_send(&self, from: &str, to: &[String], data: &[u8]) -> Result<()> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                MailgunError::transport(format!(
                    "failed to connect to {}:{}: {}",
                    self.host, self.port, e
                ))
            })?;

        if self.implicit_tls {
            let tls = self.tls_handshake(tcp).await?;
            let mut session = SmtpSession::new(tls, self.host.clone(), true);
            session.greeting().await?;
            return self.deliver(&mut session, from, to, data).await;
        }

        let mut plain = SmtpSession::new(tcp, self.host.clone(), false);
        plain.greeting().await?;
        plain.ehlo(&local_hostname()).await?;
        plain.starttls().await?;

        let tls = self.tls_handshake(plain.into_inner()).await?;
        let mut session = SmtpSession::new(tls, self.host.clone(), true);
        self.deliver(&mut session, from, to, data).await
    }

    /// EHLO, AUTH, transaction and QUIT over an established session
    pub async fn deliver<S>(
        &self,
        session: &mut SmtpSession<S>,
        from: &str,
        to: &[String],
        data: &[u8],
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        session.ehlo(&local_hostname()).await?;

        let mut auth = self.authenticator.clone();
        session.authenticate(&mut auth).await?;

        session.send(from, to, data).await?;
        session.quit().await?;

        info!("Mail relayed to {} recipient(s)", to.len());
        Ok(())
    }

    async fn tls_handshake(
        &self,
        tcp: TcpStream,
    ) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
        let server_name = rustls::ServerName::try_from(self.host.as_str())
            .map_err(|e| MailgunError::Config(format!("Invalid SMTP host {}: {}", self.host, e)))?;

        tls_connector()
            .connect(server_name, tcp)
            .await
            .map_err(|e| MailgunError::transport(format!("TLS handshake failed: {}", e)))
    }
}

fn tls_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_stuff_escapes_leading_dots() {
        let out = dot_stuff(b"Subject: x\r\n\r\n.hidden\r\nplain\r\n");
        assert_eq!(out, b"Subject: x\r\n\r\n..hidden\r\nplain\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_normalizes_bare_lf() {
        let out = dot_stuff(b"a\nb");
        assert_eq!(out, b"a\r\nb\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_empty() {
        assert_eq!(dot_stuff(b""), b".\r\n");
    }

    #[test]
    fn test_reply_text() {
        let reply = Reply {
            code: 250,
            lines: vec!["smtp.example.com".into(), "AUTH PLAIN".into()],
        };
        assert_eq!(reply.text(), "AUTH PLAIN");
    }

    #[tokio::test]
    async fn test_ehlo_collects_auth_mechanisms() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut session = SmtpSession::new(client, "smtp.example.com", true);

        let script = tokio::spawn(async move {
            let mut buf = vec![0u8; 256];
            let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).starts_with("EHLO "));
            server
                .write_all(b"250-smtp.example.com\r\n250-SIZE 52428800\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n")
                .await
                .unwrap();
        });

        session.ehlo("client.local").await.unwrap();
        script.await.unwrap();
        assert_eq!(session.auth_mechanisms(), ["PLAIN", "LOGIN"]);
    }
}
