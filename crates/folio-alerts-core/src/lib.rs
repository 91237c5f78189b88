//! # Folio Alerts
//!
//! Alert and notification delivery service for portfolio tracking.
//!
//! Users register standing alert conditions (for example `price > 150`) against
//! live portfolio metrics. When a condition holds, the alert is marked as
//! triggered and exactly one notification is recorded for delivery.
//!
//! ## Architecture
//!
//! - **Evaluator**: pure comparison of a live value against a stored condition
//! - **Lifecycle**: atomic trigger writes and the notification delivery state machine
//! - **Sweep / Dispatch**: periodic evaluation of active alerts and delivery of pending notifications
//! - **Storage**: SQLite via sqlx with embedded migrations
//! - **API**: REST API for users, alerts, notifications and summaries
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply migrations
//! folio-alerts migrate
//!
//! # Start the API server with the background sweep
//! folio-alerts serve
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertLifecycle, ConditionEvaluator, TriggerResult};
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
