//! Alert data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// What an alert watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// A single instrument crossing a price level
    PriceThreshold,
    /// Whole-portfolio performance crossing a level
    PortfolioPerformance,
    /// Outcome of a portfolio simulation run
    SimulationOutcome,
}

impl AlertType {
    /// Every alert type, in declaration order
    pub const ALL: [AlertType; 3] = [
        AlertType::PriceThreshold,
        AlertType::PortfolioPerformance,
        AlertType::SimulationOutcome,
    ];

    /// Stored representation
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::PriceThreshold => "price_threshold",
            AlertType::PortfolioPerformance => "portfolio_performance",
            AlertType::SimulationOutcome => "simulation_outcome",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_threshold" => Ok(AlertType::PriceThreshold),
            "portfolio_performance" => Ok(AlertType::PortfolioPerformance),
            "simulation_outcome" => Ok(AlertType::SimulationOutcome),
            _ => Err(ParseEnumError::new("alert type", s)),
        }
    }
}

/// Comparison operator, applied as `current <op> threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `>=`
    #[serde(rename = ">=")]
    Gte,
    /// `<=`
    #[serde(rename = "<=")]
    Lte,
    /// `==`
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
}

impl ConditionOperator {
    /// Every operator, in declaration order
    pub const ALL: [ConditionOperator; 6] = [
        ConditionOperator::Gt,
        ConditionOperator::Lt,
        ConditionOperator::Gte,
        ConditionOperator::Lte,
        ConditionOperator::Eq,
        ConditionOperator::Ne,
    ];

    /// Stored (symbolic) representation
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionOperator::Gt => ">",
            ConditionOperator::Lt => "<",
            ConditionOperator::Gte => ">=",
            ConditionOperator::Lte => "<=",
            ConditionOperator::Eq => "==",
            ConditionOperator::Ne => "!=",
        }
    }

    /// Apply the operator. Equality is exact, with no epsilon.
    #[allow(clippy::float_cmp)]
    pub fn apply(self, current: f64, threshold: f64) -> bool {
        match self {
            ConditionOperator::Gt => current > threshold,
            ConditionOperator::Lt => current < threshold,
            ConditionOperator::Gte => current >= threshold,
            ConditionOperator::Lte => current <= threshold,
            ConditionOperator::Eq => current == threshold,
            ConditionOperator::Ne => current != threshold,
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionOperator {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(ConditionOperator::Gt),
            "<" => Ok(ConditionOperator::Lt),
            ">=" => Ok(ConditionOperator::Gte),
            "<=" => Ok(ConditionOperator::Lte),
            "==" => Ok(ConditionOperator::Eq),
            "!=" => Ok(ConditionOperator::Ne),
            _ => Err(ParseEnumError::new("condition operator", s)),
        }
    }
}

/// A standing watch condition owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// What kind of metric is watched
    pub alert_type: AlertType,

    // Condition
    /// Metric field name (e.g. "price")
    pub condition_field: String,

    /// Comparison operator
    pub condition_operator: ConditionOperator,

    /// Threshold, stored as text and parsed at evaluation time
    pub condition_value: String,

    // State
    /// Inactive alerts are skipped by evaluation
    pub is_active: bool,

    /// Last time this alert triggered
    pub triggered_at: Option<DateTime<Utc>>,

    // Metadata
    /// When the alert was created
    pub created_at: DateTime<Utc>,

    /// When the alert was last updated
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Notification title for this alert's type
    pub fn notification_title(&self) -> String {
        match self.alert_type {
            AlertType::PriceThreshold => format!("Price Alert: {}", self.condition_field),
            AlertType::PortfolioPerformance => "Portfolio Performance Alert".to_string(),
            AlertType::SimulationOutcome => "Simulation Result Alert".to_string(),
        }
    }

    /// Notification body.
    ///
    /// Echoes the stored condition, not the live value that tripped it.
    pub fn notification_message(&self) -> String {
        format!(
            "Alert triggered: {} {} {}",
            self.condition_field, self.condition_operator, self.condition_value
        )
    }
}

/// Input for creating a new alert, as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertInput {
    /// Alert type name
    pub alert_type: Option<String>,
    /// Metric field name
    pub condition_field: Option<String>,
    /// Operator symbol
    pub condition_operator: Option<String>,
    /// Threshold text
    pub condition_value: Option<String>,
    /// Active flag
    pub is_active: Option<bool>,
}

/// A validated alert ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    /// Owning user
    pub user_id: Uuid,
    /// Alert type
    pub alert_type: AlertType,
    /// Metric field name
    pub condition_field: String,
    /// Comparison operator
    pub condition_operator: ConditionOperator,
    /// Threshold text
    pub condition_value: String,
    /// Active flag
    pub is_active: bool,
}
