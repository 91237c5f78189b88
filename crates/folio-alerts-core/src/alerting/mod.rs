//! Alerting for Folio Alerts
//!
//! Condition evaluation, the alert trigger lifecycle, periodic sweeps over
//! active alerts, and notification delivery.

mod delivery;
mod evaluator;
mod lifecycle;
mod repository;
mod sweep;

pub use delivery::{DeliveryDispatcher, DeliveryTransport, DispatchReport, WebhookTransport};
pub use evaluator::ConditionEvaluator;
pub use lifecycle::{AlertLifecycle, TriggerResult};
pub use repository::AlertRepository;
pub use sweep::{AlertSweeper, HttpMetricsSource, MetricsSource, SweepReport};
