pub mod sms;
pub mod whatsapp;

use crate::models::Bill;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sms::SmsChannel;
pub use whatsapp::WhatsAppChannel;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not enabled: {0}")]
    NotEnabled(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

impl ChannelError {
    /// True when the failure is about the recipient, not the transport.
    pub fn is_recipient_error(&self) -> bool {
        matches!(self, ChannelError::InvalidRecipient(_))
    }
}

/// Whether a receipt came from a real provider call or a simulated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    Live,
    Simulated,
}

/// What a channel hands back after a successful send.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub kind: DeliveryKind,
    pub sid: String,
    pub to: String,
    pub from: String,
    pub status: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A notification transport. Channels are interchangeable from the
/// dispatcher's point of view: hand them a bill, get back a receipt.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send_bill(&self, bill: &Bill) -> Result<DeliveryReceipt, ChannelError>;
}

/// Strip whitespace and punctuation from a phone number, keeping digits and
/// any '+'.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// Provider-style message id: prefix plus a short random suffix.
pub fn provider_sid(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_everything_but_digits_and_plus() {
        assert_eq!(normalize_phone("98765 43210"), "9876543210");
        assert_eq!(normalize_phone("+91 98765-43210"), "+919876543210");
        assert_eq!(normalize_phone("(987) 654-3210"), "9876543210");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn provider_sid_carries_prefix() {
        let sid = provider_sid("SIM_");
        assert!(sid.starts_with("SIM_"));
        assert_eq!(sid.len(), "SIM_".len() + 13);
        assert!(sid["SIM_".len()..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
