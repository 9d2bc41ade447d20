use crate::error::{MailgunError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mailgun: MailgunConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which mechanism carries outbound messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Multipart upload to `messages.mime`
    #[default]
    Http,
    /// Direct SMTP relay
    Smtp,
    /// Typed API client message send
    Sdk,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailgunConfig {
    pub base_url: String,
    pub domains_url: String,
    pub webhook_signing_key: String,
    /// Account-wide key, used for domain listing
    pub api_key: String,
    pub request_timeout_secs: u64,
    pub transport: TransportKind,
    /// Sending keys registered at startup
    pub domain_keys: Vec<DomainKeyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainKeyConfig {
    pub domain: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// TLS from the first byte (465); false means STARTTLS (587)
    pub implicit_tls: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub webhook_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for MailgunConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mailgun.net/v3".to_string(),
            domains_url: "https://api.mailgun.net/v4/domains".to_string(),
            webhook_signing_key: String::new(),
            api_key: String::new(),
            request_timeout_secs: 10,
            transport: TransportKind::Http,
            domain_keys: Vec::new(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.mailgun.org".to_string(),
            port: 465,
            username: String::new(),
            password: String::new(),
            implicit_tls: true,
            timeout_secs: 30,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            webhook_path: "/webhooks/mailgun/mime".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailgunError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| MailgunError::Config(e.to_string()))
    }

    /// Read `path` if given (defaults otherwise) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override secrets and relay settings from the environment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAILGUN_WEBHOOK_SIGNING_KEY") {
            self.mailgun.webhook_signing_key = v;
        }
        if let Some(v) = lookup("MAILGUN_API_KEY") {
            self.mailgun.api_key = v;
        }
        if let Some(v) = lookup("MAILGUN_BASE_URL") {
            self.mailgun.base_url = v;
        }
        if let Some(v) = lookup("SMTP_SERVER") {
            self.smtp.host = v;
        }
        if let Some(v) = lookup("SMTP_PORT") {
            self.smtp.port = v
                .parse()
                .map_err(|_| MailgunError::Config(format!("Invalid SMTP_PORT: {}", v)))?;
        }
        if let Some(v) = lookup("SMTP_USERNAME") {
            self.smtp.username = v;
        }
        if let Some(v) = lookup("SMTP_PASSWORD") {
            self.smtp.password = v;
        }
        Ok(())
    }

    /// Checks required before serving webhooks
    pub fn validate(&self) -> Result<()> {
        if self.mailgun.webhook_signing_key.is_empty() {
            return Err(MailgunError::Config(
                "mailgun.webhook_signing_key must be set".to_string(),
            ));
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(MailgunError::Config(format!(
                "server.webhook_path must start with '/': {}",
                self.server.webhook_path
            )));
        }
        Ok(())
    }
}
