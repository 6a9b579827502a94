//! Channel settings handlers.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::services::{ChannelSettings, SmsSettings};
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateSmsSettingsRequest {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWhatsAppRequest {
    pub enabled: bool,
}

pub async fn get_settings(State(state): State<AppState>) -> Json<ChannelSettings> {
    Json(state.settings.get().await)
}

/// Replace the SMS provider settings. Empty credential fields mean "use the
/// environment defaults" at send time.
#[tracing::instrument(skip(state, request))]
pub async fn update_sms_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSmsSettingsRequest>,
) -> Result<Json<ChannelSettings>, AppError> {
    let updated = state
        .settings
        .update_sms(SmsSettings {
            account_sid: request.account_sid,
            auth_token: request.auth_token,
            from_number: request.from_number,
            enabled: request.enabled,
        })
        .await?;
    Ok(Json(updated))
}

#[tracing::instrument(skip(state))]
pub async fn update_whatsapp(
    State(state): State<AppState>,
    Json(request): Json<UpdateWhatsAppRequest>,
) -> Result<Json<ChannelSettings>, AppError> {
    let updated = state.settings.set_whatsapp_enabled(request.enabled).await?;
    Ok(Json(updated))
}
