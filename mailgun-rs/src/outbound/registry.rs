//! Per-domain sending keys
//!
//! Each sending domain has its own provider API key. The registry is
//! shared by every concurrent send; the lock covers the map operation
//! only, never network I/O.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::info;

use crate::config::DomainKeyConfig;
use crate::error::{MailgunError, Result};

#[derive(Debug, Default)]
pub struct DomainKeyRegistry {
    keys: RwLock<HashMap<String, String>>,
}

impl DomainKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled from configuration
    pub fn from_config(entries: &[DomainKeyConfig]) -> Result<Self> {
        let registry = Self::new();
        for entry in entries {
            registry.set_domain_key(&entry.domain, &entry.api_key)?;
        }
        Ok(registry)
    }

    /// Associate `domain` with its sending key, replacing any previous key.
    /// Domains are matched case-insensitively.
    pub fn set_domain_key(&self, domain: &str, api_key: &str) -> Result<()> {
        let domain = domain.trim();
        if domain.is_empty() || api_key.is_empty() {
            return Err(MailgunError::Validation(
                "domain and api key cannot be empty".to_string(),
            ));
        }

        self.keys
            .write()
            .insert(domain.to_ascii_lowercase(), api_key.to_string());
        info!("Registered sending key for {}", domain);
        Ok(())
    }

    pub fn lookup(&self, domain: &str) -> Option<String> {
        self.keys
            .read()
            .get(&domain.trim().to_ascii_lowercase())
            .cloned()
    }

    /// Registered domains, sorted
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.keys.read().keys().cloned().collect();
        domains.sort();
        domains
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}
