//! Simulated WhatsApp channel.
//!
//! There is no WhatsApp Business API behind this: a send renders the bill
//! into the rich message template, validates the recipient as an Indian
//! mobile number, and appends the message to the durable outbound log. The
//! receipt is always tagged simulated.

use super::{normalize_phone, provider_sid, Channel, ChannelError, DeliveryKind, DeliveryReceipt};
use crate::config::{BusinessConfig, Config};
use crate::models::{Bill, BillStatus};
use crate::services::storage::{Storage, WHATSAPP_LOG_KEY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Entry in the outbound WhatsApp log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub phone: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub bill_id: u64,
}

pub struct WhatsAppChannel {
    business: BusinessConfig,
    country_code: String,
    storage: Storage,
}

impl WhatsAppChannel {
    pub fn new(config: &Config, storage: Storage) -> Self {
        Self {
            business: config.business.clone(),
            country_code: config.whatsapp.country_code.clone(),
            storage,
        }
    }

    /// Normalize to E.164 and validate: country code followed by 10 digits
    /// starting 6-9. Local numbers get the country code prepended.
    pub fn normalize_recipient(&self, raw: &str) -> Result<String, ChannelError> {
        let cleaned = normalize_phone(raw);
        if cleaned.is_empty() {
            return Err(ChannelError::InvalidRecipient(
                "no phone number provided".to_string(),
            ));
        }

        let formatted = if cleaned.starts_with('+') {
            cleaned
        } else {
            format!("+{}{}", self.country_code, cleaned)
        };

        if !self.is_valid_mobile(&formatted) {
            return Err(ChannelError::InvalidRecipient(format!(
                "{} is not a valid +{} mobile number (10 digits starting 6-9)",
                formatted, self.country_code
            )));
        }

        Ok(formatted)
    }

    fn is_valid_mobile(&self, formatted: &str) -> bool {
        let Some(rest) = formatted
            .strip_prefix('+')
            .and_then(|s| s.strip_prefix(self.country_code.as_str()))
        else {
            return false;
        };
        rest.len() == 10
            && rest.bytes().all(|b| b.is_ascii_digit())
            && matches!(rest.as_bytes()[0], b'6'..=b'9')
    }

    /// Render the rich bill message. Items come from the structured list when
    /// present, with the denormalized count as fallback for old snapshots.
    pub fn render_message(&self, bill: &Bill) -> String {
        let now = Utc::now();
        let header = self.business.name.replace('\'', "").to_uppercase();

        let items_section = if bill.items_list.is_empty() {
            format!("   • {} items", bill.items)
        } else {
            bill.items_list
                .iter()
                .map(|item| {
                    format!(
                        "   • {} x {} = ₹{:.2}",
                        item.name,
                        item.quantity,
                        item.line_total()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let (status_line, status_note) = match bill.status {
            BillStatus::Paid => ("✅ Paid", "🎉 Thank you for your payment!"),
            BillStatus::Pending => (
                "⏳ Pending",
                "⚠️ Please complete the payment at your earliest convenience.",
            ),
            BillStatus::Cancelled => (
                "❌ Cancelled",
                "This bill has been cancelled. Please contact us if you have any questions.",
            ),
        };

        format!(
            "{rule}\n\
             🏪 *{header} - BILL RECEIPT* 🏪\n\
             {rule}\n\
             \n\
             📅 *Date:* {date}\n\
             ⏰ *Time:* {time}\n\
             📋 *Bill No:* {id}\n\
             \n\
             {rule}\n\
             👤 *CUSTOMER DETAILS*\n\
             {rule}\n\
             \x20  • Name: {name}\n\
             \x20  • Phone: {phone}\n\
             \n\
             {rule}\n\
             🛒 *ORDER SUMMARY*\n\
             {rule}\n\
             {items}\n\
             \n\
             {rule}\n\
             💵 *PAYMENT DETAILS*\n\
             {rule}\n\
             \x20  • Subtotal: ₹{subtotal:.2}\n\
             \x20  • GST (5%): ₹{gst:.2}\n\
             \x20  • Total Amount: ₹{total:.2}\n\
             \x20  • Status: {status}\n\
             \n\
             {note}\n\
             \n\
             {rule}\n\
             📱 *PAYMENT OPTIONS*\n\
             {rule}\n\
             \x20  • UPI: {upi}\n\
             \n\
             {rule}\n\
             📞 *NEED HELP?*\n\
             {rule}\n\
             \x20  • Call: {support}\n\
             \x20  • WhatsApp: {support}\n\
             \n\
             {rule}\n\
             Thank you for choosing {business}! 🍗\n\
             {rule}",
            rule = RULE,
            header = header,
            date = now.format("%d/%m/%Y"),
            time = now.format("%I:%M:%S %p"),
            id = bill.id,
            name = bill.customer_name,
            phone = bill.phone,
            items = items_section,
            subtotal = bill.total * 0.95,
            gst = bill.total * 0.05,
            total = bill.total,
            status = status_line,
            note = status_note,
            upi = self.business.upi_vpa,
            support = self.business.support_phone,
            business = self.business.name,
        )
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send_bill(&self, bill: &Bill) -> Result<DeliveryReceipt, ChannelError> {
        let to = self.normalize_recipient(&bill.phone)?;
        let body = self.render_message(bill);

        let record = SentMessage {
            phone: to.clone(),
            message: body.clone(),
            timestamp: Utc::now(),
            status: "sent".to_string(),
            bill_id: bill.id,
        };
        self.storage
            .append_log_entry(WHATSAPP_LOG_KEY, &record)
            .await
            .map_err(|e| {
                ChannelError::SendFailed(format!("failed to record outbound message: {}", e))
            })?;

        tracing::info!(bill_id = bill.id, to = %to, "WhatsApp message recorded");

        Ok(DeliveryReceipt {
            kind: DeliveryKind::Simulated,
            sid: provider_sid("WA_"),
            to,
            from: self.business.name.clone(),
            status: "sent".to_string(),
            body,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillItem;

    async fn channel() -> (tempfile::TempDir, WhatsAppChannel) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let channel = WhatsAppChannel {
            business: BusinessConfig {
                name: "Mammta's Food".to_string(),
                upi_vpa: "mammtas@upi".to_string(),
                support_phone: "+91 9876543210".to_string(),
            },
            country_code: "91".to_string(),
            storage,
        };
        (dir, channel)
    }

    fn bill() -> Bill {
        Bill::new(
            7,
            "Asha",
            "9876543210",
            vec![BillItem {
                name: "Tea".to_string(),
                price: 20.0,
                quantity: 3,
            }],
        )
    }

    #[tokio::test]
    async fn local_number_gets_country_code() {
        let (_dir, channel) = channel().await;
        assert_eq!(
            channel.normalize_recipient("98765 43210").unwrap(),
            "+919876543210"
        );
        assert_eq!(
            channel.normalize_recipient("987-654-3210").unwrap(),
            "+919876543210"
        );
    }

    #[tokio::test]
    async fn international_number_passes_through() {
        let (_dir, channel) = channel().await;
        assert_eq!(
            channel.normalize_recipient("+919876543210").unwrap(),
            "+919876543210"
        );
    }

    #[tokio::test]
    async fn rejects_short_and_badly_prefixed_numbers() {
        let (_dir, channel) = channel().await;
        assert!(channel.normalize_recipient("12345").is_err());
        // 10 digits but starts with 5
        assert!(channel.normalize_recipient("5876543210").is_err());
        assert!(channel.normalize_recipient("").is_err());
    }

    #[tokio::test]
    async fn message_renders_totals_and_gst_split() {
        let (_dir, channel) = channel().await;
        let message = channel.render_message(&bill());
        assert!(message.contains("MAMMTAS FOOD - BILL RECEIPT"));
        assert!(message.contains("• Tea x 3 = ₹60.00"));
        assert!(message.contains("Subtotal: ₹57.00"));
        assert!(message.contains("GST (5%): ₹3.00"));
        assert!(message.contains("Total Amount: ₹60.00"));
        assert!(message.contains("⏳ Pending"));
        assert!(message.contains("UPI: mammtas@upi"));
    }

    #[tokio::test]
    async fn cancelled_bill_renders_cancelled_status() {
        let (_dir, channel) = channel().await;
        let mut bill = bill();
        bill.status = BillStatus::Cancelled;
        let message = channel.render_message(&bill);
        assert!(message.contains("❌ Cancelled"));
        assert!(message.contains("This bill has been cancelled"));
    }

    #[tokio::test]
    async fn send_appends_to_outbound_log() {
        let (_dir, channel) = channel().await;
        let receipt = channel.send_bill(&bill()).await.unwrap();
        assert_eq!(receipt.kind, DeliveryKind::Simulated);
        assert_eq!(receipt.to, "+919876543210");
        assert!(receipt.sid.starts_with("WA_"));

        let log: Option<Vec<SentMessage>> =
            channel.storage.read_key(WHATSAPP_LOG_KEY).await.unwrap();
        let log = log.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].bill_id, 7);
        assert_eq!(log[0].status, "sent");
    }

    #[tokio::test]
    async fn send_rejects_invalid_bill_phone() {
        let (_dir, channel) = channel().await;
        let mut bill = bill();
        bill.phone = "12345".to_string();
        let err = channel.send_bill(&bill).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidRecipient(_)));
    }
}
