//! Portfolio summary storage

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::parse_column;
use crate::error::{Error, Result};
use crate::models::{NewPortfolioSummary, PortfolioSummary, SummaryType};
use crate::validation;

/// Repository for portfolio summaries. Summaries are never updated.
#[derive(Clone)]
pub struct SummaryRepository {
    pool: SqlitePool,
}

impl SummaryRepository {
    /// Create a new summary repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a validated summary
    pub async fn create(&self, input: NewPortfolioSummary) -> Result<PortfolioSummary> {
        validation::check_summary(&input)?;

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(input.user_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(Error::not_found("User", input.user_id));
        }

        let summary = PortfolioSummary {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            summary_type: input.summary_type,
            period_start: input.period_start,
            period_end: input.period_end,
            total_value: input.total_value,
            performance_percentage: input.performance_percentage,
            generated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_summaries (
                id, user_id, summary_type, period_start, period_end,
                total_value, performance_percentage, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(summary.id)
        .bind(summary.user_id)
        .bind(summary.summary_type.as_str())
        .bind(summary.period_start)
        .bind(summary.period_end)
        .bind(summary.total_value)
        .bind(summary.performance_percentage)
        .bind(summary.generated_at)
        .execute(&self.pool)
        .await?;

        debug!(summary_id = %summary.id, user_id = %summary.user_id, summary_type = %summary.summary_type, "Summary recorded");
        Ok(summary)
    }

    /// Summaries for a user, most recently generated first, optionally of one type
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        summary_type: Option<SummaryType>,
    ) -> Result<Vec<PortfolioSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT * FROM portfolio_summaries
            WHERE user_id = $1 AND ($2 IS NULL OR summary_type = $2)
            ORDER BY generated_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .bind(summary_type.map(SummaryType::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PortfolioSummary::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    user_id: Uuid,
    summary_type: String,
    period_start: NaiveDate,
    period_end: NaiveDate,
    total_value: f64,
    performance_percentage: f64,
    generated_at: DateTime<Utc>,
}

impl TryFrom<SummaryRow> for PortfolioSummary {
    type Error = Error;

    fn try_from(row: SummaryRow) -> Result<Self> {
        Ok(PortfolioSummary {
            id: row.id,
            user_id: row.user_id,
            summary_type: parse_column("portfolio_summaries", "summary_type", &row.summary_type)?,
            period_start: row.period_start,
            period_end: row.period_end,
            total_value: row.total_value,
            performance_percentage: row.performance_percentage,
            generated_at: row.generated_at,
        })
    }
}
