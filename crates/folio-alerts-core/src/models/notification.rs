//! Notification data models and the delivery state machine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Alert, AlertType, ParseEnumError};
use crate::error::{Error, Result};

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Produced by a price threshold alert
    PriceThreshold,
    /// Produced by a portfolio performance alert
    PortfolioPerformance,
    /// Produced by a simulation outcome alert
    SimulationOutcome,
    /// Periodic daily summary
    DailySummary,
    /// Periodic weekly summary
    WeeklySummary,
}

impl NotificationType {
    /// Stored representation
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::PriceThreshold => "price_threshold",
            NotificationType::PortfolioPerformance => "portfolio_performance",
            NotificationType::SimulationOutcome => "simulation_outcome",
            NotificationType::DailySummary => "daily_summary",
            NotificationType::WeeklySummary => "weekly_summary",
        }
    }

    /// Whether this type is produced by periodic summaries rather than alerts
    pub fn is_summary(self) -> bool {
        matches!(
            self,
            NotificationType::DailySummary | NotificationType::WeeklySummary
        )
    }
}

impl From<AlertType> for NotificationType {
    fn from(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::PriceThreshold => NotificationType::PriceThreshold,
            AlertType::PortfolioPerformance => NotificationType::PortfolioPerformance,
            AlertType::SimulationOutcome => NotificationType::SimulationOutcome,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "price_threshold" => Ok(NotificationType::PriceThreshold),
            "portfolio_performance" => Ok(NotificationType::PortfolioPerformance),
            "simulation_outcome" => Ok(NotificationType::SimulationOutcome),
            "daily_summary" => Ok(NotificationType::DailySummary),
            "weekly_summary" => Ok(NotificationType::WeeklySummary),
            _ => Err(ParseEnumError::new("notification type", s)),
        }
    }
}

/// Delivery status of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Created, awaiting a delivery outcome
    #[default]
    Pending,
    /// Delivered (terminal)
    Delivered,
    /// Delivery failed (terminal)
    Failed,
}

impl DeliveryStatus {
    /// Stored representation
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }

    /// `delivered` and `failed` never transition again
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }

    /// The status reached by applying `outcome` to this status.
    ///
    /// Only `pending` accepts an outcome.
    pub fn transition(self, outcome: DeliveryOutcome) -> Result<DeliveryStatus> {
        let to = outcome.status();
        match self {
            DeliveryStatus::Pending => Ok(to),
            from => Err(Error::InvalidStateTransition { from, to }),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(ParseEnumError::new("delivery status", s)),
        }
    }
}

/// Outcome reported by a delivery transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// The transport accepted the notification
    Success,
    /// The transport gave up on the notification
    Failure,
}

impl DeliveryOutcome {
    /// Status a pending notification moves to on this outcome
    pub fn status(self) -> DeliveryStatus {
        match self {
            DeliveryOutcome::Success => DeliveryStatus::Delivered,
            DeliveryOutcome::Failure => DeliveryStatus::Failed,
        }
    }
}

/// A delivery record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier
    pub id: Uuid,

    /// Recipient
    pub user_id: Uuid,

    /// Originating alert (summaries have none)
    pub alert_id: Option<Uuid>,

    /// Kind of notification
    pub notification_type: NotificationType,

    /// Short title
    pub title: String,

    /// Body text
    pub message: String,

    /// Delivery status
    pub delivery_status: DeliveryStatus,

    /// Set only when delivered
    pub delivered_at: Option<DateTime<Utc>>,

    /// When the notification was created
    pub created_at: DateTime<Utc>,

    /// When the notification was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a notification directly (summaries), as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationInput {
    /// Notification type name
    pub notification_type: Option<String>,
    /// Short title
    pub title: Option<String>,
    /// Body text
    pub message: Option<String>,
}

/// A notification ready to be persisted in `pending` state
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// Recipient
    pub user_id: Uuid,
    /// Originating alert
    pub alert_id: Option<Uuid>,
    /// Kind of notification
    pub notification_type: NotificationType,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
}

impl NewNotification {
    /// The notification a triggered alert produces
    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            user_id: alert.user_id,
            alert_id: Some(alert.id),
            notification_type: alert.alert_type.into(),
            title: alert.notification_title(),
            message: alert.notification_message(),
        }
    }
}
