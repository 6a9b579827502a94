pub mod channels;
pub mod dispatcher;
pub mod metrics;
pub mod retry;
pub mod settings;
pub mod storage;
pub mod store;

pub use channels::{Channel, ChannelError, DeliveryKind, DeliveryReceipt, SmsChannel, WhatsAppChannel};
pub use dispatcher::{DeliveryResult, NotificationDispatcher, TestSendOutcome};
pub use metrics::{get_metrics, init_metrics};
pub use retry::{retry_tick, run_retry_worker, RetryQueue, MAX_RETRY_ATTEMPTS};
pub use settings::{ChannelSettings, SettingsStore, SmsSettings};
pub use storage::Storage;
pub use store::{BillStore, MarkPaidOutcome, ReceiptData, ReceiptOutcome};
