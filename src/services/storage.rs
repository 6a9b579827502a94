//! Key-per-file JSON snapshot store.
//!
//! Every logical key lives in its own `<key>.json` under the data directory.
//! Writes go to a temp file first and are renamed into place, so a reader
//! always sees the last complete write. A process-wide write lock serializes
//! writers; readers never block.

use crate::error::AppError;
use crate::models::bill::{Bill, BillStatus, DashboardStats};
use crate::models::product::{default_catalog, Product};
use crate::models::retry::RetryEntry;
use crate::services::settings::ChannelSettings;
use anyhow::{anyhow, Context};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const BILLS_KEY: &str = "bills";
pub const LAST_BILL_ID_KEY: &str = "last_bill_id";
pub const RETRY_QUEUE_KEY: &str = "retry_queue";
pub const WHATSAPP_LOG_KEY: &str = "whatsapp_log";
pub const PRODUCTS_KEY: &str = "products";
pub const SETTINGS_KEY: &str = "channel_settings";
pub const STATS_KEY: &str = "stats";
pub const ORDER_HISTORY_KEY: &str = "order_history";
pub const RECEIPTS_KEY: &str = "receipts";
pub const RECENT_BILLS_KEY: &str = "recent_bills";

/// How many bills the derived recent-bills snapshot keeps.
const RECENT_BILLS_LIMIT: usize = 5;

#[derive(Clone)]
pub struct Storage {
    data_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Storage {
    /// Open (and create if needed) the data directory. Seeds the product
    /// catalog on first start.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            AppError::StorageError(anyhow!(
                "failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let storage = Self {
            data_dir,
            write_lock: Arc::new(Mutex::new(())),
        };

        if storage.read_key::<Vec<Product>>(PRODUCTS_KEY).await?.is_none() {
            storage.write_key(PRODUCTS_KEY, &default_catalog()).await?;
            tracing::info!("seeded default product catalog");
        }

        Ok(storage)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    /// Read and deserialize a key. Returns `Ok(None)` when the key has never
    /// been written (or was removed).
    pub async fn read_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let path = self.key_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::StorageError(anyhow!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.display()))
            .map_err(AppError::StorageError)?;
        Ok(Some(value))
    }

    /// Serialize and write a key atomically (temp file + rename).
    pub async fn write_key<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let path = self.key_path(key);
        let tmp = self.data_dir.join(format!(".{}.json.tmp", key));

        let bytes = serde_json::to_vec_pretty(value)
            .with_context(|| format!("failed to serialize key {}", key))
            .map_err(AppError::StorageError)?;

        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            AppError::StorageError(anyhow!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            AppError::StorageError(anyhow!(
                "failed to replace {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Remove a key entirely. Missing keys are not an error.
    pub async fn remove_key(&self, key: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let path = self.key_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageError(anyhow!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Append one entry to a JSON array key.
    pub async fn append_log_entry<T: Serialize>(
        &self,
        key: &str,
        entry: &T,
    ) -> Result<(), AppError> {
        let mut log: Vec<serde_json::Value> = self.read_key(key).await?.unwrap_or_default();
        log.push(serde_json::to_value(entry)?);
        self.write_key(key, &log).await
    }

    pub async fn load_bills(&self) -> Result<Vec<Bill>, AppError> {
        Ok(self.read_key(BILLS_KEY).await?.unwrap_or_default())
    }

    pub async fn load_last_bill_id(&self) -> Result<Option<u64>, AppError> {
        self.read_key(LAST_BILL_ID_KEY).await
    }

    pub async fn load_retry_entries(&self) -> Result<Vec<RetryEntry>, AppError> {
        Ok(self.read_key(RETRY_QUEUE_KEY).await?.unwrap_or_default())
    }

    pub async fn save_retry_entries(&self, entries: &[RetryEntry]) -> Result<(), AppError> {
        self.write_key(RETRY_QUEUE_KEY, entries).await
    }

    pub async fn load_settings(&self) -> Result<Option<ChannelSettings>, AppError> {
        self.read_key(SETTINGS_KEY).await
    }

    pub async fn save_settings(&self, settings: &ChannelSettings) -> Result<(), AppError> {
        self.write_key(SETTINGS_KEY, settings).await
    }

    pub async fn load_products(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.read_key(PRODUCTS_KEY).await?.unwrap_or_default())
    }

    /// Persist the bill collection plus the id counter, then refresh the
    /// derived views (stats, order history, receipts, recent bills).
    ///
    /// Failures on derived keys are logged and swallowed: the bill snapshot
    /// is the source of truth and every derived view is recomputed on the
    /// next save anyway.
    pub async fn save_snapshot(&self, bills: &[Bill], last_bill_id: u64) -> Result<(), AppError> {
        self.write_key(BILLS_KEY, bills).await?;
        self.write_key(LAST_BILL_ID_KEY, &last_bill_id).await?;

        let stats = DashboardStats::compute(bills);
        if let Err(e) = self.write_key(STATS_KEY, &stats).await {
            tracing::warn!(error = %e, "failed to persist dashboard stats");
        }
        if let Err(e) = self.write_key(ORDER_HISTORY_KEY, bills).await {
            tracing::warn!(error = %e, "failed to persist order history");
        }

        let receipts: Vec<&Bill> = bills
            .iter()
            .filter(|bill| bill.status == BillStatus::Paid)
            .collect();
        if let Err(e) = self.write_key(RECEIPTS_KEY, &receipts).await {
            tracing::warn!(error = %e, "failed to persist receipts");
        }

        let recent: Vec<&Bill> = bills.iter().rev().take(RECENT_BILLS_LIMIT).collect();
        if let Err(e) = self.write_key(RECENT_BILLS_KEY, &recent).await {
            tracing::warn!(error = %e, "failed to persist recent bills");
        }

        Ok(())
    }
}
