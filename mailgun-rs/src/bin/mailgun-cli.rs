//! CLI tool for exercising the Mailgun adapter
//!
//! # Usage
//!
//! ```bash
//! # List active sending domains
//! mailgun-cli --config mailgun.toml domains
//!
//! # Send a raw MIME file
//! mailgun-cli send --from me@example.com --to you@other.com --file message.eml
//!
//! # Produce and check webhook signatures
//! mailgun-cli sign --timestamp 1700000000 --token abc
//! mailgun-cli verify --timestamp 1700000000 --token abc --signature 5f0c...
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mailgun_rs::api::MailgunClient;
use mailgun_rs::config::{Config, TransportKind};
use mailgun_rs::mime::Address;
use mailgun_rs::outbound::{OutboundDispatcher, OutboundEnvelope};
use mailgun_rs::webhook::{SignatureVerifier, WebhookSignature};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailgun-cli")]
#[command(about = "Send mail and check webhooks through Mailgun", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MAILGUN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List active domains on the account
    Domains,
    /// Send a raw MIME message
    Send {
        /// Sender address
        #[arg(long)]
        from: String,
        /// Recipient address (repeatable)
        #[arg(long, required = true)]
        to: Vec<String>,
        /// File holding the encoded message
        #[arg(long)]
        file: PathBuf,
        /// Overrides mailgun.transport
        #[arg(long, value_enum)]
        transport: Option<TransportKind>,
        /// Sending key for the sender's domain
        #[arg(long, env = "MAILGUN_SENDING_KEY")]
        api_key: Option<String>,
    },
    /// Print the signature the provider would send
    Sign {
        #[arg(long)]
        timestamp: String,
        #[arg(long)]
        token: String,
    },
    /// Check a webhook signature
    Verify {
        #[arg(long)]
        timestamp: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        signature: String,
    },
}

fn signing_key(config: &Config) -> anyhow::Result<&str> {
    let key = config.mailgun.webhook_signing_key.as_str();
    if key.is_empty() {
        bail!("No webhook signing key: set MAILGUN_WEBHOOK_SIGNING_KEY or mailgun.webhook_signing_key");
    }
    Ok(key)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Domains => {
            let client = MailgunClient::new(&config.mailgun)?;
            let domains = client.list_domains().await?;

            if domains.is_empty() {
                println!("No active domains.");
            } else {
                for domain in &domains {
                    println!("{}", domain);
                }
                println!("\nTotal: {} domain(s)", domains.len());
            }
        }
        Commands::Send {
            from,
            to,
            file,
            transport,
            api_key,
        } => {
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let from = Address::parse(&from)?;
            let to = to
                .iter()
                .map(|t| Address::parse(t))
                .collect::<Result<Vec<_>, _>>()?;

            let kind = transport.unwrap_or(config.mailgun.transport);
            let dispatcher = OutboundDispatcher::from_config(&config, kind)?;
            if let Some(key) = api_key {
                dispatcher.registry().set_domain_key(from.domain()?, &key)?;
            }

            let id = dispatcher
                .send(&OutboundEnvelope::new(from, to, raw))
                .await?;
            println!("✓ Sent: {}", id);
        }
        Commands::Sign { timestamp, token } => {
            let verifier = SignatureVerifier::new(signing_key(&config)?);
            println!("{}", verifier.sign(&timestamp, &token)?);
        }
        Commands::Verify {
            timestamp,
            token,
            signature,
        } => {
            let verifier = SignatureVerifier::new(signing_key(&config)?);
            let sig = WebhookSignature::new(timestamp, token, signature);
            if verifier.verify(&sig)? {
                println!("✓ Signature valid");
            } else {
                println!("✗ Signature does not match");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
