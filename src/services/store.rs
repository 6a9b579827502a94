//! Bill collection and lifecycle operations.
//!
//! The store owns the bill list and the id counter. Every mutating method
//! persists a full snapshot before returning, so the durable state always
//! reflects the last completed operation.

use crate::error::AppError;
use crate::models::{Bill, BillItem, BillStatus, DashboardStats, Product};
use crate::services::metrics;
use crate::services::storage::{Storage, BILLS_KEY};
use anyhow::anyhow;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

struct StoreInner {
    bills: Vec<Bill>,
    last_id: u64,
}

#[derive(Clone)]
pub struct BillStore {
    storage: Storage,
    inner: Arc<RwLock<StoreInner>>,
}

/// Result of the payment-confirmation path. Guard refusals (already paid,
/// cancelled) are reported as data rather than errors.
#[derive(Debug, Clone, Serialize)]
pub struct MarkPaidOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill: Option<Bill>,
}

/// Printable receipt view for a paid bill.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptData {
    pub id: u64,
    pub customer_name: String,
    pub created_utc: chrono::DateTime<Utc>,
    pub paid_utc: chrono::DateTime<Utc>,
    pub items: String,
    pub total: f64,
    pub payment_method: String,
    pub receipt_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill: Option<Bill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_data: Option<ReceiptData>,
}

impl BillStore {
    /// Hydrate the store from durable state.
    ///
    /// The persisted counter is authoritative for id allocation. When it is
    /// missing (first run, or a store written before the counter existed)
    /// the highest existing id is adopted instead.
    pub async fn load(storage: Storage) -> Result<Self, AppError> {
        let bills = storage.load_bills().await?;
        let last_id = match storage.load_last_bill_id().await? {
            Some(id) => id,
            None => {
                let max_id = bills.iter().map(|b| b.id).max().unwrap_or(0);
                if max_id > 0 {
                    tracing::warn!(
                        last_id = max_id,
                        "id counter missing, adopting highest existing bill id"
                    );
                }
                max_id
            }
        };

        tracing::info!(bills = bills.len(), last_id, "bill store hydrated");
        Ok(Self {
            storage,
            inner: Arc::new(RwLock::new(StoreInner { bills, last_id })),
        })
    }

    async fn persist(&self, inner: &StoreInner) -> Result<(), AppError> {
        self.storage
            .save_snapshot(&inner.bills, inner.last_id)
            .await
    }

    pub async fn create_bill(
        &self,
        customer_name: &str,
        phone: &str,
        items: Vec<BillItem>,
    ) -> Result<Bill, AppError> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let bill = Bill::new(inner.last_id, customer_name, phone, items);
        inner.bills.push(bill.clone());
        self.persist(&inner).await?;

        metrics::BILLS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(bill_id = bill.id, customer = %bill.customer_name, total = bill.total, "bill created");
        Ok(bill)
    }

    pub async fn get_bill(&self, id: u64) -> Result<Bill, AppError> {
        let inner = self.inner.read().await;
        inner
            .bills
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))
    }

    /// All bills in insertion order.
    pub async fn list_bills(&self) -> Vec<Bill> {
        self.inner.read().await.bills.clone()
    }

    /// Generic status setter with a strict transition table: only pending
    /// bills may move, and only to paid or cancelled. Setting the current
    /// status again is a no-op.
    pub async fn update_status(&self, id: u64, next: BillStatus) -> Result<Bill, AppError> {
        let mut inner = self.inner.write().await;
        let bill = inner
            .bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;

        if bill.status == next {
            return Ok(bill.clone());
        }
        if !bill.status.can_transition_to(next) {
            return Err(AppError::Conflict(anyhow!(
                "cannot change a {} bill to {}",
                bill.status,
                next
            )));
        }

        match next {
            BillStatus::Paid => bill.apply_payment("upi"),
            _ => bill.status = next,
        }
        let updated = bill.clone();
        self.persist(&inner).await?;

        metrics::BILLS_TOTAL
            .with_label_values(&[updated.status.as_str()])
            .inc();
        tracing::info!(bill_id = id, status = %updated.status, "bill status updated");
        Ok(updated)
    }

    /// Remove a bill. The id counter is untouched, so a deleted id is never
    /// handed out again.
    pub async fn delete_bill(&self, id: u64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let index = inner
            .bills
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;
        inner.bills.remove(index);
        self.persist(&inner).await?;

        metrics::BILLS_TOTAL.with_label_values(&["deleted"]).inc();
        tracing::info!(bill_id = id, "bill deleted");
        Ok(())
    }

    /// Payment-confirmation path. Unlike the generic status setter, refusals
    /// are returned as an unsuccessful outcome so the caller can show the
    /// message verbatim.
    pub async fn mark_paid(&self, id: u64) -> Result<MarkPaidOutcome, AppError> {
        let mut inner = self.inner.write().await;
        let bill = inner
            .bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;

        match bill.status {
            BillStatus::Paid => {
                return Ok(MarkPaidOutcome {
                    success: false,
                    message: "Bill is already marked as paid".to_string(),
                    bill: None,
                })
            }
            BillStatus::Cancelled => {
                return Ok(MarkPaidOutcome {
                    success: false,
                    message: "Cannot mark a cancelled bill as paid".to_string(),
                    bill: None,
                })
            }
            BillStatus::Pending => {}
        }

        bill.apply_payment("upi");
        let receipt_number = format!("R-{}-{}", id, rand::thread_rng().gen_range(0..1000));
        bill.attach_receipt(receipt_number);
        let updated = bill.clone();
        self.persist(&inner).await?;

        metrics::BILLS_TOTAL.with_label_values(&["paid"]).inc();
        tracing::info!(bill_id = id, "bill marked paid, receipt stored");
        Ok(MarkPaidOutcome {
            success: true,
            message: format!("Bill #{} has been marked as paid and receipt stored in system", id),
            bill: Some(updated),
        })
    }

    /// Receipt view for one bill. Unpaid bills get an unsuccessful outcome
    /// carrying the bill itself so the caller can explain the state.
    pub async fn receipt_data(&self, id: u64) -> Result<ReceiptOutcome, AppError> {
        let bill = self.get_bill(id).await?;

        if bill.status != BillStatus::Paid {
            return Ok(ReceiptOutcome {
                success: false,
                message: Some("Cannot generate receipt for unpaid bill".to_string()),
                bill: Some(bill),
                receipt_data: None,
            });
        }

        let receipt_number = match &bill.receipt {
            Some(receipt) => receipt.receipt_number.clone(),
            None => format!("R-{}-{}", id, rand::thread_rng().gen_range(0..1000)),
        };
        let data = ReceiptData {
            id: bill.id,
            customer_name: bill.customer_name.clone(),
            created_utc: bill.created_utc,
            paid_utc: bill.paid_utc.unwrap_or_else(Utc::now),
            items: bill.items_detail.clone(),
            total: bill.total,
            payment_method: bill
                .payment
                .as_ref()
                .map(|p| p.method.clone())
                .unwrap_or_else(|| "upi".to_string()),
            receipt_number,
        };

        Ok(ReceiptOutcome {
            success: true,
            message: None,
            bill: None,
            receipt_data: Some(data),
        })
    }

    /// All paid bills, the collection backing the receipts page.
    pub async fn receipts(&self) -> Vec<Bill> {
        self.inner
            .read()
            .await
            .bills
            .iter()
            .filter(|b| b.status == BillStatus::Paid)
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> DashboardStats {
        DashboardStats::compute(&self.inner.read().await.bills)
    }

    pub async fn products(&self) -> Result<Vec<Product>, AppError> {
        self.storage.load_products().await
    }

    /// Wipe the collection through the normal save path. The id counter
    /// restarts, so this is a documented fresh start rather than a delete.
    pub async fn clear_all(&self) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.bills.clear();
        inner.last_id = 0;
        self.persist(&inner).await?;

        tracing::info!("all bills cleared");
        Ok(())
    }

    /// Hard reset: drop the collection and remove the durable bill key
    /// outright, bypassing the snapshot path. The id counter survives so
    /// allocation stays monotonic within the running session.
    pub async fn reset_system(&self) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.bills.clear();
        self.storage.remove_key(BILLS_KEY).await?;

        tracing::warn!("system reset, bill collection removed from durable store");
        Ok(())
    }

    /// Stamp the last-used send target onto the bill.
    pub async fn record_phone(&self, id: u64, phone: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let bill = inner
            .bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;
        if bill.phone != phone {
            bill.phone = phone.to_string();
            self.persist(&inner).await?;
        }
        Ok(())
    }

    pub async fn record_whatsapp_sent(&self, id: u64) -> Result<Bill, AppError> {
        let mut inner = self.inner.write().await;
        let bill = inner
            .bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;
        bill.mark_whatsapp_sent();
        let updated = bill.clone();
        self.persist(&inner).await?;
        Ok(updated)
    }

    pub async fn record_sms_sent(
        &self,
        id: u64,
        message: &str,
        provider_sid: &str,
    ) -> Result<Bill, AppError> {
        let mut inner = self.inner.write().await;
        let bill = inner
            .bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;
        bill.mark_sms_sent(message, provider_sid);
        let updated = bill.clone();
        self.persist(&inner).await?;
        Ok(updated)
    }

    /// Terminal marker set when every delivery attempt has been exhausted.
    pub async fn record_notification_failed(&self, id: u64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let bill = inner
            .bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(anyhow!("bill #{} not found", id)))?;
        bill.mark_notification_failed();
        self.persist(&inner).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<BillItem> {
        vec![BillItem {
            name: "Tea".to_string(),
            price: 20.0,
            quantity: 3,
        }]
    }

    async fn open_store() -> (tempfile::TempDir, BillStore) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let store = BillStore::load(storage).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn ids_are_monotonic_across_deletes() {
        let (_dir, store) = open_store().await;
        let first = store.create_bill("Asha", "9876543210", items()).await.unwrap();
        let second = store.create_bill("Ravi", "9876543210", items()).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        store.delete_bill(2).await.unwrap();
        let third = store.create_bill("Meera", "9876543210", items()).await.unwrap();
        assert_eq!(third.id, 3);
    }

    #[tokio::test]
    async fn counter_survives_rehydration() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = Storage::open(dir.path()).await.unwrap();
            let store = BillStore::load(storage).await.unwrap();
            store.create_bill("Asha", "9876543210", items()).await.unwrap();
            store.delete_bill(1).await.unwrap();
        }

        let storage = Storage::open(dir.path()).await.unwrap();
        let store = BillStore::load(storage).await.unwrap();
        let bill = store.create_bill("Ravi", "9876543210", items()).await.unwrap();
        assert_eq!(bill.id, 2);
    }

    #[tokio::test]
    async fn update_status_enforces_transition_table() {
        let (_dir, store) = open_store().await;
        let bill = store.create_bill("Asha", "9876543210", items()).await.unwrap();

        let paid = store.update_status(bill.id, BillStatus::Paid).await.unwrap();
        assert_eq!(paid.status, BillStatus::Paid);
        assert!(paid.paid_utc.is_some());
        assert_eq!(paid.payment.as_ref().map(|p| p.method.as_str()), Some("upi"));

        // Same status again is a no-op, a reversal is a conflict.
        store.update_status(bill.id, BillStatus::Paid).await.unwrap();
        let err = store
            .update_status(bill.id, BillStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn mark_paid_is_idempotent_and_guards_cancelled() {
        let (_dir, store) = open_store().await;
        let bill = store.create_bill("Asha", "9876543210", items()).await.unwrap();

        let outcome = store.mark_paid(bill.id).await.unwrap();
        assert!(outcome.success);
        let receipt = outcome.bill.unwrap().receipt.unwrap();
        assert!(receipt.receipt_number.starts_with(&format!("R-{}-", bill.id)));
        let first_number = receipt.receipt_number.clone();

        let again = store.mark_paid(bill.id).await.unwrap();
        assert!(!again.success);
        assert_eq!(again.message, "Bill is already marked as paid");
        let unchanged = store.get_bill(bill.id).await.unwrap();
        assert_eq!(unchanged.receipt.unwrap().receipt_number, first_number);

        let cancelled = store.create_bill("Ravi", "9876543210", items()).await.unwrap();
        store
            .update_status(cancelled.id, BillStatus::Cancelled)
            .await
            .unwrap();
        let refused = store.mark_paid(cancelled.id).await.unwrap();
        assert!(!refused.success);
        assert_eq!(refused.message, "Cannot mark a cancelled bill as paid");
        assert_eq!(
            store.get_bill(cancelled.id).await.unwrap().status,
            BillStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn receipt_data_refuses_unpaid_bills() {
        let (_dir, store) = open_store().await;
        let bill = store.create_bill("Asha", "9876543210", items()).await.unwrap();

        let outcome = store.receipt_data(bill.id).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Cannot generate receipt for unpaid bill")
        );

        store.mark_paid(bill.id).await.unwrap();
        let outcome = store.receipt_data(bill.id).await.unwrap();
        assert!(outcome.success);
        let data = outcome.receipt_data.unwrap();
        assert_eq!(data.payment_method, "upi");
        assert_eq!(data.items, "Tea - ₹20 x 3");
        // Matches the number stored on the bill rather than minting a new one.
        let stored = store.get_bill(bill.id).await.unwrap().receipt.unwrap();
        assert_eq!(data.receipt_number, stored.receipt_number);
    }

    #[tokio::test]
    async fn clear_all_restarts_ids_but_reset_keeps_counter() {
        let (_dir, store) = open_store().await;
        store.create_bill("Asha", "9876543210", items()).await.unwrap();
        store.create_bill("Ravi", "9876543210", items()).await.unwrap();

        store.clear_all().await.unwrap();
        assert!(store.list_bills().await.is_empty());
        assert_eq!(store.stats().await, DashboardStats::default());
        let fresh = store.create_bill("Meera", "9876543210", items()).await.unwrap();
        assert_eq!(fresh.id, 1);

        store.reset_system().await.unwrap();
        assert!(store.list_bills().await.is_empty());
        let next = store.create_bill("Devi", "9876543210", items()).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn record_phone_updates_send_target() {
        let (_dir, store) = open_store().await;
        let bill = store.create_bill("Asha", "9876543210", items()).await.unwrap();
        store.record_phone(bill.id, "+919812345678").await.unwrap();
        assert_eq!(store.get_bill(bill.id).await.unwrap().phone, "+919812345678");
    }
}
