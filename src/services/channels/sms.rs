//! SMS transport adapter.
//!
//! Policy mirror of the dashboard's provider integration: the adapter almost
//! never hard-fails. A disabled channel and any transport-level trouble both
//! resolve to synthetic success receipts; the only errors surfaced to the
//! dispatcher are recipient validation failures.

use super::{normalize_phone, provider_sid, Channel, ChannelError, DeliveryKind, DeliveryReceipt};
use crate::config::{BusinessConfig, Config, SmsConfig};
use crate::models::{Bill, BillStatus};
use crate::services::settings::{SettingsStore, SmsSettings};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

const MIN_RECIPIENT_DIGITS: usize = 6;
const MAX_RECIPIENT_DIGITS: usize = 20;

pub struct SmsChannel {
    defaults: SmsConfig,
    business: BusinessConfig,
    public_base_url: String,
    settings: SettingsStore,
    client: Client,
}

/// Wire shape shared by the proxy and direct provider calls.
#[derive(Debug, Serialize)]
struct ProviderRequest<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
    account_sid: &'a str,
    auth_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl SmsChannel {
    pub fn new(config: &Config, settings: SettingsStore) -> Self {
        Self {
            defaults: config.sms.clone(),
            business: config.business.clone(),
            public_base_url: config.server.public_base_url.clone(),
            settings,
            client: Client::new(),
        }
    }

    /// Effective credentials: persisted settings with empty fields falling
    /// back to the environment defaults.
    async fn effective_settings(&self) -> SmsSettings {
        let mut sms = self.settings.sms().await;
        if sms.account_sid.is_empty() {
            sms.account_sid = self.defaults.account_sid.clone();
        }
        if sms.auth_token.is_empty() {
            sms.auth_token = self.defaults.auth_token.expose_secret().clone();
        }
        if sms.from_number.is_empty() {
            sms.from_number = self.defaults.from_number.clone();
        }
        sms
    }

    /// Customer-facing receipt link rendered into paid-bill messages.
    pub fn receipt_url(&self, bill_id: u64) -> String {
        format!(
            "{}/p/receipt/{}",
            self.public_base_url.trim_end_matches('/'),
            bill_id
        )
    }

    /// Render the plain-text bill message with a status-specific call to
    /// action.
    pub fn render_message(&self, bill: &Bill) -> String {
        let items_section = if bill.items_detail.is_empty() {
            format!("🛒 Items: {} items\n", bill.items)
        } else {
            format!(
                "🛒 Items:\n{}\n",
                bill.items_detail.split(", ").collect::<Vec<_>>().join("\n")
            )
        };

        let status_content = match bill.status {
            BillStatus::Pending => format!(
                "Your payment is pending.\n\n📱 Pay via UPI: {}\n\nNote: Updates will be sent via SMS",
                self.business.upi_vpa
            ),
            BillStatus::Paid => format!(
                "Thank you for your payment!\n\n🧾 View receipt: {}\n\nImportant: Save this message to access your receipt anytime.",
                self.receipt_url(bill.id)
            ),
            BillStatus::Cancelled => {
                "This bill has been cancelled. Please contact us if you have any questions."
                    .to_string()
            }
        };

        [
            "📋 BILL NOTIFICATION".to_string(),
            String::new(),
            format!("Dear {},", bill.customer_name),
            String::new(),
            format!("Your bill from {} is ready!", self.business.name),
            String::new(),
            format!("📌 Bill #{}", bill.id),
            format!("📆 Date: {}", bill.created_utc.format("%d/%m/%Y")),
            format!("{}💰 Total Amount: ₹{:.2}", items_section, bill.total),
            format!("📊 Status: {}", bill.status.as_str().to_uppercase()),
            String::new(),
            status_content,
            String::new(),
            format!("📞 For assistance: {}", self.business.support_phone),
            format!("🏪 {}", self.business.name),
        ]
        .join("\n")
    }

    /// Send a raw SMS.
    ///
    /// Resolution order: a disabled channel simulates success before anything
    /// else is checked; recipient validation is the one hard failure; then
    /// simulation mode short-circuits the provider call; and a failed
    /// provider call degrades to a simulated receipt carrying the error.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<DeliveryReceipt, ChannelError> {
        let cfg = self.effective_settings().await;

        if !cfg.enabled {
            tracing::info!("SMS channel disabled in settings, simulating success");
            return Ok(DeliveryReceipt {
                kind: DeliveryKind::Simulated,
                sid: provider_sid("DISABLED_"),
                to: to.to_string(),
                from: cfg.from_number.clone(),
                status: "simulated".to_string(),
                body: body.to_string(),
                error: None,
            });
        }

        if to.trim().is_empty() {
            return Err(ChannelError::InvalidRecipient(
                "phone number is empty".to_string(),
            ));
        }

        let cleaned = normalize_phone(to);
        let digits = cleaned.chars().filter(|c| c.is_ascii_digit()).count();
        if !(MIN_RECIPIENT_DIGITS..=MAX_RECIPIENT_DIGITS).contains(&digits) {
            return Err(ChannelError::InvalidRecipient(format!(
                "{} does not look like a deliverable number ({} digits)",
                to, digits
            )));
        }

        let formatted = if cleaned.starts_with('+') {
            cleaned
        } else {
            format!("+{}", cleaned)
        };

        if self.defaults.simulate_transport {
            tracing::info!(to = %formatted, "simulation mode active, skipping provider call");
            return Ok(DeliveryReceipt {
                kind: DeliveryKind::Simulated,
                sid: provider_sid("SIM_"),
                to: formatted,
                from: cfg.from_number.clone(),
                status: "delivered".to_string(),
                body: body.to_string(),
                error: None,
            });
        }

        match self.call_provider(&formatted, body, &cfg).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                tracing::warn!(error = %e, to = %formatted, "provider call failed, falling back to simulated send");
                Ok(DeliveryReceipt {
                    kind: DeliveryKind::Simulated,
                    sid: provider_sid("SIM_"),
                    to: formatted,
                    from: cfg.from_number.clone(),
                    status: "sent (simulated after API error)".to_string(),
                    body: body.to_string(),
                    error: Some(e),
                })
            }
        }
    }

    async fn call_provider(
        &self,
        to: &str,
        body: &str,
        cfg: &SmsSettings,
    ) -> Result<DeliveryReceipt, String> {
        let Some(api_url) = self.defaults.api_url.as_deref() else {
            return Err("no SMS provider endpoint configured".to_string());
        };

        let request = ProviderRequest {
            to,
            from: &cfg.from_number,
            body,
            account_sid: &cfg.account_sid,
            auth_token: &cfg.auth_token,
        };

        let response = self
            .client
            .post(api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("failed to reach SMS provider: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("SMS provider returned {}: {}", status, text));
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse provider response: {}", e))?;

        Ok(DeliveryReceipt {
            kind: DeliveryKind::Live,
            sid: parsed.sid.unwrap_or_else(|| provider_sid("API_")),
            to: to.to_string(),
            from: cfg.from_number.clone(),
            status: parsed.status.unwrap_or_else(|| "sent".to_string()),
            body: body.to_string(),
            error: None,
        })
    }

    async fn call_proxy(
        &self,
        proxy_url: &str,
        to: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, String> {
        let cfg = self.effective_settings().await;
        let request = ProviderRequest {
            to,
            from: &cfg.from_number,
            body,
            account_sid: &cfg.account_sid,
            auth_token: &cfg.auth_token,
        };

        let response = self
            .client
            .post(proxy_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("proxy unreachable: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("proxy returned {}", response.status()));
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse proxy response: {}", e))?;
        if !parsed.success {
            return Err("proxy reported failure".to_string());
        }

        Ok(DeliveryReceipt {
            kind: DeliveryKind::Live,
            sid: parsed.sid.unwrap_or_else(|| provider_sid("SVR_")),
            to: to.to_string(),
            from: cfg.from_number.clone(),
            status: "sent via server".to_string(),
            body: body.to_string(),
            error: None,
        })
    }

    /// Render and deliver the bill notification. Tries the backend proxy
    /// first when one is configured; any proxy trouble falls through to the
    /// direct path.
    pub async fn send_bill_notification(
        &self,
        bill: &Bill,
    ) -> Result<DeliveryReceipt, ChannelError> {
        if bill.phone.trim().is_empty() {
            return Err(ChannelError::InvalidRecipient(
                "no phone number on bill".to_string(),
            ));
        }

        let body = self.render_message(bill);

        if let Some(proxy_url) = self.defaults.proxy_url.as_deref() {
            match self.call_proxy(proxy_url, &bill.phone, &body).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) => {
                    tracing::info!(error = %e, "SMS proxy unavailable, using direct path")
                }
            }
        }

        self.send_sms(&bill.phone, &body).await
    }
}

#[async_trait]
impl Channel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send_bill(&self, bill: &Bill) -> Result<DeliveryReceipt, ChannelError> {
        self.send_bill_notification(bill).await
    }
}
