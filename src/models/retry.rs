//! Durable retry queue entry for failed notification dispatches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pending redelivery. Entries are processed FIFO by the retry worker;
/// `attempts` counts dispatch attempts made so far, including the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEntry {
    pub bill_id: u64,
    pub phone: String,
    pub attempts: u32,
    pub last_attempt_utc: DateTime<Utc>,
    pub error_details: String,
}

impl RetryEntry {
    pub fn new(bill_id: u64, phone: &str, error_details: String) -> Self {
        Self {
            bill_id,
            phone: phone.to_string(),
            attempts: 1,
            last_attempt_utc: Utc::now(),
            error_details,
        }
    }

    /// Next attempt of the same delivery, carrying the latest error.
    pub fn next_attempt(mut self, error_details: String) -> Self {
        self.attempts += 1;
        self.last_attempt_utc = Utc::now();
        self.error_details = error_details;
        self
    }
}
