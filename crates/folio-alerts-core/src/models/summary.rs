//! Portfolio summary snapshots

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Summary period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    /// One trading day
    Daily,
    /// One week
    Weekly,
    /// One month
    Monthly,
}

impl SummaryType {
    /// Stored representation
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryType::Daily => "daily",
            SummaryType::Weekly => "weekly",
            SummaryType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(SummaryType::Daily),
            "weekly" => Ok(SummaryType::Weekly),
            "monthly" => Ok(SummaryType::Monthly),
            _ => Err(ParseEnumError::new("summary type", s)),
        }
    }
}

/// Immutable periodic snapshot of a user's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Unique identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Reporting period kind
    pub summary_type: SummaryType,
    /// First day covered
    pub period_start: NaiveDate,
    /// Last day covered, never before `period_start`
    pub period_end: NaiveDate,
    /// Never negative
    pub total_value: f64,
    /// Signed percentage change over the period
    pub performance_percentage: f64,
    /// When the summary was recorded
    pub generated_at: DateTime<Utc>,
}

/// Input for recording a summary, as submitted by the summary generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryInput {
    /// `daily`, `weekly` or `monthly`
    pub summary_type: Option<String>,
    /// First day covered
    pub period_start: Option<NaiveDate>,
    /// Last day covered
    pub period_end: Option<NaiveDate>,
    /// Portfolio value at period end
    pub total_value: Option<f64>,
    /// Percentage change over the period
    pub performance_percentage: Option<f64>,
}

/// A validated summary ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewPortfolioSummary {
    /// Owning user
    pub user_id: Uuid,
    /// Reporting period kind
    pub summary_type: SummaryType,
    /// First day covered
    pub period_start: NaiveDate,
    /// Last day covered
    pub period_end: NaiveDate,
    /// Portfolio value at period end
    pub total_value: f64,
    /// Percentage change over the period
    pub performance_percentage: f64,
}
