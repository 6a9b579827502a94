//! Multi-channel notification dispatch.
//!
//! WhatsApp is tried first when enabled, SMS is the fallback. A WhatsApp
//! failure is swallowed here; only a failure of both channels surfaces to
//! the caller, at which point the attempt has already been queued for
//! redelivery.

use crate::error::AppError;
use crate::models::{Bill, BillItem, RetryEntry};
use crate::services::channels::{
    normalize_phone, Channel, ChannelError, DeliveryKind, DeliveryReceipt, SmsChannel,
    WhatsAppChannel,
};
use crate::services::metrics;
use crate::services::retry::RetryQueue;
use crate::services::settings::SettingsStore;
use crate::services::store::BillStore;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const TEST_BILL_ID: u64 = 9999;

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub recipient: String,
    pub bill_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    pub simulated: bool,
}

impl DeliveryResult {
    fn from_receipt(method: &str, bill_id: u64, receipt: DeliveryReceipt) -> Self {
        Self {
            success: true,
            method: method.to_string(),
            timestamp: Utc::now(),
            recipient: receipt.to,
            bill_id,
            provider_message_id: Some(receipt.sid),
            simulated: receipt.kind == DeliveryKind::Simulated,
        }
    }
}

/// Soft result of an operator-initiated test send.
#[derive(Debug, Clone, Serialize)]
pub struct TestSendOutcome {
    pub success: bool,
    pub method: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: BillStore,
    settings: SettingsStore,
    whatsapp: Arc<WhatsAppChannel>,
    sms: Arc<SmsChannel>,
    retries: RetryQueue,
}

impl NotificationDispatcher {
    pub fn new(
        store: BillStore,
        settings: SettingsStore,
        whatsapp: Arc<WhatsAppChannel>,
        sms: Arc<SmsChannel>,
        retries: RetryQueue,
    ) -> Self {
        Self {
            store,
            settings,
            whatsapp,
            sms,
            retries,
        }
    }

    /// Deliver a bill notification, preferring WhatsApp. `phone` overrides
    /// the number stored on the bill; either way the target is normalized
    /// and written back as the bill's current number.
    pub async fn send_bill_notification(
        &self,
        bill_id: u64,
        phone: Option<&str>,
    ) -> Result<DeliveryResult, AppError> {
        self.dispatch(bill_id, phone, true).await
    }

    /// Redrive a queued attempt. The retry worker owns the requeue decision,
    /// so a failure here must not enqueue a second entry.
    pub async fn redrive(&self, bill_id: u64, phone: &str) -> Result<DeliveryResult, AppError> {
        self.dispatch(bill_id, Some(phone), false).await
    }

    async fn dispatch(
        &self,
        bill_id: u64,
        phone: Option<&str>,
        enqueue_on_failure: bool,
    ) -> Result<DeliveryResult, AppError> {
        let mut bill = self.store.get_bill(bill_id).await?;

        let target = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| bill.phone.trim().to_string());
        if target.is_empty() {
            return Err(AppError::BadRequest(anyhow!("phone number is required")));
        }

        let normalized = normalize_phone(&target);
        self.store.record_phone(bill_id, &normalized).await?;
        bill.phone = normalized.clone();

        let whatsapp_error = if self.settings.whatsapp_enabled().await {
            match self.whatsapp.send_bill(&bill).await {
                Ok(receipt) => {
                    self.store.record_whatsapp_sent(bill_id).await?;
                    metrics::NOTIFICATIONS_TOTAL
                        .with_label_values(&["whatsapp", "sent"])
                        .inc();
                    tracing::info!(bill_id, recipient = %receipt.to, "bill notification delivered via whatsapp");
                    return Ok(DeliveryResult::from_receipt("whatsapp", bill_id, receipt));
                }
                Err(e) => {
                    metrics::NOTIFICATIONS_TOTAL
                        .with_label_values(&["whatsapp", "failed"])
                        .inc();
                    tracing::warn!(bill_id, error = %e, "whatsapp delivery failed, falling back to sms");
                    Some(e)
                }
            }
        } else {
            tracing::debug!(bill_id, "whatsapp channel disabled, using sms directly");
            None
        };

        match self.sms.send_bill(&bill).await {
            Ok(receipt) => {
                self.store
                    .record_sms_sent(bill_id, &receipt.body, &receipt.sid)
                    .await?;
                metrics::NOTIFICATIONS_TOTAL
                    .with_label_values(&["sms", "sent"])
                    .inc();
                tracing::info!(bill_id, recipient = %receipt.to, "bill notification delivered via sms");
                Ok(DeliveryResult::from_receipt("sms", bill_id, receipt))
            }
            Err(sms_error) => {
                metrics::NOTIFICATIONS_TOTAL
                    .with_label_values(&["sms", "failed"])
                    .inc();
                let details = match &whatsapp_error {
                    Some(w) => format!("whatsapp: {}; sms: {}", w, sms_error),
                    None => format!("sms: {}", sms_error),
                };
                tracing::error!(bill_id, %details, "all notification channels failed");

                if enqueue_on_failure {
                    self.retries
                        .push(RetryEntry::new(bill_id, &normalized, details.clone()))
                        .await?;
                }

                let recipient_only = sms_error.is_recipient_error()
                    && whatsapp_error
                        .as_ref()
                        .map_or(true, ChannelError::is_recipient_error);
                if recipient_only {
                    Err(AppError::InvalidPhone(details))
                } else {
                    Err(AppError::TransportError(anyhow!(details)))
                }
            }
        }
    }

    /// Fire a canned bill at the given number through whichever channel is
    /// currently preferred. Nothing is stored; failures come back as data.
    pub async fn send_test_message(&self, phone: &str) -> TestSendOutcome {
        let bill = Bill::new(
            TEST_BILL_ID,
            "Test Customer",
            phone,
            vec![
                BillItem {
                    name: "Test Item 1".to_string(),
                    price: 99.99,
                    quantity: 1,
                },
                BillItem {
                    name: "Test Item 2".to_string(),
                    price: 100.0,
                    quantity: 1,
                },
            ],
        );

        let channel: &dyn Channel = if self.settings.whatsapp_enabled().await {
            self.whatsapp.as_ref()
        } else {
            self.sms.as_ref()
        };

        match channel.send_bill(&bill).await {
            Ok(receipt) => TestSendOutcome {
                success: true,
                method: channel.name().to_string(),
                message: format!("Test message sent via {}", channel.name()),
                provider_message_id: Some(receipt.sid),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, channel = channel.name(), "test message failed");
                TestSendOutcome {
                    success: false,
                    method: channel.name().to_string(),
                    message: "Failed to send test message".to_string(),
                    provider_message_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
