//! Bill model and derived dashboard statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bill lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Paid,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Paid => "paid",
            BillStatus::Cancelled => "cancelled",
        }
    }

    /// A pending bill may become paid or cancelled. Paid and cancelled are
    /// terminal.
    pub fn can_transition_to(&self, next: BillStatus) -> bool {
        matches!(
            (self, next),
            (BillStatus::Pending, BillStatus::Paid)
                | (BillStatus::Pending, BillStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single line item on a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl BillItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// Payment details stamped when a bill is settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub method: String,
    pub paid_utc: DateTime<Utc>,
}

/// Receipt metadata attached when a bill is marked paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_number: String,
    pub generated_utc: DateTime<Utc>,
    pub stored_in_system: bool,
}

/// A customer bill.
///
/// `items` is the line item count, kept denormalized for list views;
/// `items_detail` is the human-readable one-line summary rendered into
/// outbound messages. The structured `items_list` is the source both are
/// derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: u64,
    pub created_utc: DateTime<Utc>,
    pub customer_name: String,
    pub phone: String,
    pub items: usize,
    pub items_detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items_list: Vec<BillItem>,
    pub total: f64,
    pub status: BillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(default)]
    pub whatsapp_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_sent_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sms_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_sent_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_sid: Option<String>,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub sms_count: u32,
    #[serde(default)]
    pub notification_failed: bool,
}

impl Bill {
    pub fn new(id: u64, customer_name: &str, phone: &str, items_list: Vec<BillItem>) -> Self {
        let total = items_list.iter().map(BillItem::line_total).sum();
        let items_detail = items_list
            .iter()
            .map(|item| format!("{} - ₹{} x {}", item.name, item.price, item.quantity))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            id,
            created_utc: Utc::now(),
            customer_name: customer_name.trim().to_string(),
            phone: phone.trim().to_string(),
            items: items_list.len(),
            items_detail,
            items_list,
            total,
            status: BillStatus::Pending,
            paid_utc: None,
            payment: None,
            receipt: None,
            whatsapp_sent: false,
            whatsapp_sent_utc: None,
            sms_sent: false,
            sms_sent_utc: None,
            last_message: None,
            provider_sid: None,
            message_count: 0,
            sms_count: 0,
            notification_failed: false,
        }
    }

    /// Stamp the bill paid and record how.
    pub fn apply_payment(&mut self, method: &str) {
        let now = Utc::now();
        self.status = BillStatus::Paid;
        self.paid_utc = Some(now);
        self.payment = Some(Payment {
            method: method.to_string(),
            paid_utc: now,
        });
    }

    pub fn attach_receipt(&mut self, receipt_number: String) {
        self.receipt = Some(Receipt {
            receipt_number,
            generated_utc: Utc::now(),
            stored_in_system: true,
        });
    }

    /// WhatsApp bookkeeping. The rendered body lives in the outbound message
    /// log, not on the bill.
    pub fn mark_whatsapp_sent(&mut self) {
        self.whatsapp_sent = true;
        self.whatsapp_sent_utc = Some(Utc::now());
        self.message_count += 1;
        self.notification_failed = false;
    }

    pub fn mark_sms_sent(&mut self, message: &str, provider_sid: &str) {
        self.sms_sent = true;
        self.sms_sent_utc = Some(Utc::now());
        self.last_message = Some(message.to_string());
        self.provider_sid = Some(provider_sid.to_string());
        self.sms_count += 1;
        self.notification_failed = false;
    }

    pub fn mark_notification_failed(&mut self) {
        self.notification_failed = true;
    }
}

/// Aggregate counters shown on the dashboard.
///
/// `total_amount` is realized revenue: only paid bills contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_bills: usize,
    pub total_amount: f64,
    pub pending_bills: usize,
    pub paid_bills: usize,
    pub cancelled_bills: usize,
    pub pending_amount: f64,
}

impl DashboardStats {
    pub fn compute(bills: &[Bill]) -> Self {
        let mut stats = DashboardStats {
            total_bills: bills.len(),
            ..Default::default()
        };
        for bill in bills {
            match bill.status {
                BillStatus::Pending => {
                    stats.pending_bills += 1;
                    stats.pending_amount += bill.total;
                }
                BillStatus::Paid => {
                    stats.paid_bills += 1;
                    stats.total_amount += bill.total;
                }
                BillStatus::Cancelled => stats.cancelled_bills += 1,
            }
        }
        stats
    }
}
