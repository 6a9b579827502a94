//! billdesk: bill lifecycle and customer notification backend for a
//! small-business billing dashboard.
//!
//! The service owns the bill collection (create, status transitions, delete),
//! derives dashboard statistics from it, and dispatches bill notifications to
//! customers over WhatsApp with an SMS fallback. Failed deliveries land in a
//! durable retry queue drained by a background worker. All state snapshots to
//! a key-per-file JSON store so a restart resumes exactly where it left off.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use error::AppError;
pub use startup::{AppState, Application};
