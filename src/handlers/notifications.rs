//! Notification dispatch handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::services::{DeliveryResult, TestSendOutcome};
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TestSendRequest {
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,
}

/// Deliver the bill to the customer, WhatsApp first with SMS fallback.
/// The body is optional; without one the bill's stored number is used.
#[tracing::instrument(skip(state, request))]
pub async fn send_bill_notification(
    State(state): State<AppState>,
    Path(bill_id): Path<u64>,
    request: Option<Json<SendNotificationRequest>>,
) -> Result<Json<DeliveryResult>, AppError> {
    let phone = request.and_then(|Json(r)| r.phone);
    let result = state
        .dispatcher
        .send_bill_notification(bill_id, phone.as_deref())
        .await?;
    Ok(Json(result))
}

/// Operator-facing connectivity probe through the preferred channel.
#[tracing::instrument(skip(state, request))]
pub async fn send_test_message(
    State(state): State<AppState>,
    Json(request): Json<TestSendRequest>,
) -> Result<Json<TestSendOutcome>, AppError> {
    request.validate()?;
    Ok(Json(state.dispatcher.send_test_message(&request.phone).await))
}
