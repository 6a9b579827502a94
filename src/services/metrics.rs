//! Prometheus metrics for billdesk.

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec, TextEncoder};

/// Bill counter by lifecycle event.
pub static BILLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billdesk_bills_total",
        "Total number of bill operations by event",
        &["event"] // created, paid, cancelled, deleted
    )
    .expect("Failed to register bills_total")
});

/// Notification counter by channel and outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billdesk_notifications_total",
        "Total number of notification dispatches by channel and outcome",
        &["channel", "outcome"] // whatsapp/sms, sent/failed
    )
    .expect("Failed to register notifications_total")
});

/// Retry queue entries pushed by a failed dispatch.
pub static RETRIES_ENQUEUED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "billdesk_retries_enqueued_total",
        "Total retry entries enqueued after a failed dispatch"
    )
    .expect("Failed to register retries_enqueued_total")
});

/// Retry entries requeued after another failed attempt.
pub static RETRIES_REQUEUED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "billdesk_retries_requeued_total",
        "Total retry entries requeued for another attempt"
    )
    .expect("Failed to register retries_requeued_total")
});

/// Retry entries dropped permanently (attempt bound reached or bill gone).
pub static RETRIES_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "billdesk_retries_dropped_total",
        "Total retry entries dropped permanently"
    )
    .expect("Failed to register retries_dropped_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&BILLS_TOTAL);
    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&RETRIES_ENQUEUED_TOTAL);
    Lazy::force(&RETRIES_REQUEUED_TOTAL);
    Lazy::force(&RETRIES_DROPPED_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
