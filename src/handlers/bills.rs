//! Bill CRUD, payment, and receipt handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::error::AppError;
use crate::models::{Bill, BillItem, BillStatus, DashboardStats, Product};
use crate::services::{MarkPaidOutcome, ReceiptOutcome};
use crate::startup::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct BillItemRequest {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<BillItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BillStatus,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_bill(
    State(state): State<AppState>,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<Bill>), AppError> {
    request.validate()?;

    let mut items = Vec::with_capacity(request.items.len());
    for item in request.items {
        if item.name.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "item name cannot be empty"
            )));
        }
        if item.price < 0.0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "item price cannot be negative"
            )));
        }
        if item.quantity == 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "item quantity must be at least 1"
            )));
        }
        items.push(BillItem {
            name: item.name.trim().to_string(),
            price: item.price,
            quantity: item.quantity,
        });
    }

    let bill = state
        .store
        .create_bill(&request.customer_name, &request.phone, items)
        .await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

pub async fn list_bills(State(state): State<AppState>) -> Json<Vec<Bill>> {
    Json(state.store.list_bills().await)
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<u64>,
) -> Result<Json<Bill>, AppError> {
    Ok(Json(state.store.get_bill(bill_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn update_bill_status(
    State(state): State<AppState>,
    Path(bill_id): Path<u64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Bill>, AppError> {
    let bill = state.store.update_status(bill_id, request.status).await?;
    Ok(Json(bill))
}

pub async fn delete_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<u64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_bill(bill_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Payment confirmation. Guard refusals come back as a 200 with
/// `success: false` so the UI shows the message instead of an error banner.
#[tracing::instrument(skip(state))]
pub async fn pay_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<u64>,
) -> Result<Json<MarkPaidOutcome>, AppError> {
    Ok(Json(state.store.mark_paid(bill_id).await?))
}

pub async fn bill_receipt(
    State(state): State<AppState>,
    Path(bill_id): Path<u64>,
) -> Result<Json<ReceiptOutcome>, AppError> {
    Ok(Json(state.store.receipt_data(bill_id).await?))
}

pub async fn list_receipts(State(state): State<AppState>) -> Json<Vec<Bill>> {
    Json(state.store.receipts().await)
}

pub async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.store.stats().await)
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.store.products().await?))
}

/// Wipe every bill and any pending retries through the normal save path.
#[tracing::instrument(skip(state))]
pub async fn clear_bills(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.clear_all().await?;
    state.retries.clear().await?;
    Ok(Json(json!({
        "success": true,
        "message": "All bills cleared successfully"
    })))
}
