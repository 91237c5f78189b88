//! User storage and cascading deletion

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewUser, PreferenceMap, User};
use crate::validation::{self, ValidationErrors};

/// Rows removed by a cascading user delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Alerts removed
    pub alerts: u64,
    /// Notifications removed
    pub notifications: u64,
    /// Portfolio summaries removed
    pub summaries: u64,
}

/// Repository for users
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a validated user. A taken `external_user_id` is a validation error.
    pub async fn create(&self, input: NewUser) -> Result<User> {
        validation::check_user(&input)?;

        if self.find_by_external_id(&input.external_user_id).await?.is_some() {
            return Err(taken().into());
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            external_user_id: input.external_user_id,
            email: input.email,
            notification_preferences: input.notification_preferences,
            created_at: now,
            updated_at: now,
        };

        let prefs_json = user
            .notification_preferences
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO users (id, external_user_id, email, notification_preferences, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.external_user_id)
        .bind(&user.email)
        .bind(prefs_json)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => taken().into(),
            other => Error::Database(other),
        })?;

        info!(user_id = %user.id, external_user_id = %user.external_user_id, "User created");
        Ok(user)
    }

    /// Get a user by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by the external auth provider's identifier
    pub async fn find_by_external_id(&self, external_user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_user_id = $1")
            .bind(external_user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    /// Replace the stored preference toggles
    pub async fn update_preferences(&self, id: Uuid, prefs: &PreferenceMap) -> Result<User> {
        let json = serde_json::to_string(prefs)?;

        let result = sqlx::query(
            "UPDATE users SET notification_preferences = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("User", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::not_found("User", id))
    }

    /// Delete a user together with every alert, notification and summary it owns.
    ///
    /// Runs in one transaction; on any failure nothing is removed.
    pub async fn delete(&self, id: Uuid) -> Result<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let notifications = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let alerts = sqlx::query("DELETE FROM alerts WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let summaries = sqlx::query("DELETE FROM portfolio_summaries WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let users = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if users == 0 {
            // Dropping the transaction rolls it back
            return Err(Error::not_found("User", id));
        }

        tx.commit().await?;

        let report = CascadeReport {
            alerts,
            notifications,
            summaries,
        };
        info!(user_id = %id, ?report, "User deleted");
        Ok(report)
    }
}

fn taken() -> ValidationErrors {
    ValidationErrors::single("external_user_id", "has already been taken")
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    external_user_id: String,
    email: String,
    notification_preferences: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let notification_preferences = row
            .notification_preferences
            .as_deref()
            .map(serde_json::from_str::<PreferenceMap>)
            .transpose()?;

        Ok(User {
            id: row.id,
            external_user_id: row.external_user_id,
            email: row.email,
            notification_preferences,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
