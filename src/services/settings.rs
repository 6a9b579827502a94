//! Persisted channel settings: the WhatsApp-first flag and SMS credentials.
//!
//! Settings live in their own snapshot key so a dashboard restart keeps the
//! operator's choices. Until a snapshot exists, values fall back to the
//! environment-supplied defaults.

use crate::config::Config;
use crate::error::AppError;
use crate::services::storage::Storage;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub whatsapp_enabled: bool,
    pub sms: SmsSettings,
}

impl ChannelSettings {
    pub fn defaults(config: &Config) -> Self {
        Self {
            whatsapp_enabled: config.whatsapp.enabled_by_default,
            sms: SmsSettings {
                account_sid: config.sms.account_sid.clone(),
                auth_token: config.sms.auth_token.expose_secret().clone(),
                from_number: config.sms.from_number.clone(),
                enabled: config.sms.enabled_by_default,
            },
        }
    }
}

#[derive(Clone)]
pub struct SettingsStore {
    storage: Storage,
    inner: Arc<RwLock<ChannelSettings>>,
}

impl SettingsStore {
    pub async fn load(storage: Storage, config: &Config) -> Result<Self, AppError> {
        let settings = match storage.load_settings().await {
            Ok(Some(settings)) => settings,
            Ok(None) => ChannelSettings::defaults(config),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load channel settings, using defaults");
                ChannelSettings::defaults(config)
            }
        };

        Ok(Self {
            storage,
            inner: Arc::new(RwLock::new(settings)),
        })
    }

    pub async fn get(&self) -> ChannelSettings {
        self.inner.read().await.clone()
    }

    pub async fn whatsapp_enabled(&self) -> bool {
        self.inner.read().await.whatsapp_enabled
    }

    pub async fn sms(&self) -> SmsSettings {
        self.inner.read().await.sms.clone()
    }

    pub async fn update_sms(&self, sms: SmsSettings) -> Result<ChannelSettings, AppError> {
        let mut guard = self.inner.write().await;
        guard.sms = sms;
        self.storage.save_settings(&guard).await?;
        tracing::info!(enabled = guard.sms.enabled, "SMS settings updated");
        Ok(guard.clone())
    }

    pub async fn set_whatsapp_enabled(&self, enabled: bool) -> Result<ChannelSettings, AppError> {
        let mut guard = self.inner.write().await;
        guard.whatsapp_enabled = enabled;
        self.storage.save_settings(&guard).await?;
        tracing::info!(enabled, "WhatsApp-first flag updated");
        Ok(guard.clone())
    }
}
