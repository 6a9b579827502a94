pub mod bill;
pub mod product;
pub mod retry;

pub use bill::{Bill, BillItem, BillStatus, DashboardStats, Payment, Receipt};
pub use product::Product;
pub use retry::RetryEntry;
