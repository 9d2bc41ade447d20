use bytes::Bytes;

use crate::mime::Address;

/// Upper bound on recipients for a single dispatch
pub const MAX_RECIPIENTS: usize = 20;

/// One outbound message: sender, recipients and the encoded MIME
///
/// Recipients include Cc and Bcc addresses; Bcc must not appear in the
/// MIME headers themselves.
#[derive(Debug, Clone)]
pub struct OutboundEnvelope {
    from: Address,
    to: Vec<Address>,
    raw_mime: Bytes,
}

impl OutboundEnvelope {
    pub fn new(from: Address, to: Vec<Address>, raw_mime: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            raw_mime: raw_mime.into(),
        }
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    pub fn raw_mime(&self) -> &Bytes {
        &self.raw_mime
    }

    /// Recipients in display form, comma separated
    pub fn recipients_joined(&self) -> String {
        self.to
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Bare recipient addresses, at most [`MAX_RECIPIENTS`]
    pub fn recipient_addresses(&self) -> Vec<String> {
        self.to
            .iter()
            .take(MAX_RECIPIENTS)
            .map(|a| a.address.clone())
            .collect()
    }
}
