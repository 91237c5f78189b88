//! Alert repository for storing and querying alerts and their notifications

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db::parse_column;
use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertType, DeliveryStatus, NewAlert, NewNotification, Notification, NotificationType,
};
use crate::validation;

/// Repository for alerts and notifications
#[derive(Clone)]
pub struct AlertRepository {
    pool: SqlitePool,
}

impl AlertRepository {
    /// Create a new alert repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // --- Alerts ---

    /// Insert a validated alert
    pub async fn create_alert(&self, input: NewAlert) -> Result<Alert> {
        validation::check_alert(&input)?;
        self.ensure_user(input.user_id).await?;

        let now = Utc::now();
        let alert = Alert {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            alert_type: input.alert_type,
            condition_field: input.condition_field,
            condition_operator: input.condition_operator,
            condition_value: input.condition_value,
            is_active: input.is_active,
            triggered_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, user_id, alert_type, condition_field, condition_operator,
                condition_value, is_active, triggered_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(alert.id)
        .bind(alert.user_id)
        .bind(alert.alert_type.as_str())
        .bind(&alert.condition_field)
        .bind(alert.condition_operator.as_str())
        .bind(&alert.condition_value)
        .bind(alert.is_active)
        .bind(alert.triggered_at)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(alert_id = %alert.id, user_id = %alert.user_id, "Alert created");
        Ok(alert)
    }

    /// Get an alert by ID
    pub async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Alert::try_from).transpose()
    }

    /// List a user's alerts
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE user_id = $1 ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    /// List active alerts across all users
    pub async fn list_active(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE is_active = 1 ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    /// List alerts of one type across all users
    pub async fn list_by_type(&self, alert_type: AlertType) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE alert_type = $1 ORDER BY created_at, rowid",
        )
        .bind(alert_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    /// Mark an alert triggered and insert its notification in one transaction.
    ///
    /// Returns `None` without writing anything if the alert is no longer
    /// active, and `NotFound` if it no longer exists.
    pub async fn trigger(
        &self,
        alert_id: Uuid,
        triggered_at: DateTime<Utc>,
        notification: &NewNotification,
    ) -> Result<Option<(Alert, Notification)>> {
        validation::check_notification(notification)?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE alerts SET triggered_at = $2, updated_at = $2
            WHERE id = $1 AND is_active = 1
            "#,
        )
        .bind(alert_id)
        .bind(triggered_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = $1")
            .bind(alert_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(Error::not_found("Alert", alert_id));
        };
        if updated == 0 {
            return Ok(None);
        }
        let alert = Alert::try_from(row)?;

        let notification = insert_notification(&mut tx, notification, triggered_at).await?;

        tx.commit().await?;
        Ok(Some((alert, notification)))
    }

    // --- Notifications ---

    /// Insert a notification outside of any alert trigger (summaries)
    pub async fn create_notification(&self, input: &NewNotification) -> Result<Notification> {
        validation::check_notification(input)?;
        self.ensure_user(input.user_id).await?;

        let mut tx = self.pool.begin().await?;
        let notification = insert_notification(&mut tx, input, Utc::now()).await?;
        tx.commit().await?;

        Ok(notification)
    }

    /// Get a notification by ID
    pub async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Notification::try_from).transpose()
    }

    /// List a user's notifications, newest first, optionally filtered by status
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        status: Option<DeliveryStatus>,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND ($2 IS NULL OR delivery_status = $2)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .bind(status.map(DeliveryStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// List notifications of one type across all users
    pub async fn list_notifications_by_type(
        &self,
        notification_type: NotificationType,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE notification_type = $1 ORDER BY created_at, rowid",
        )
        .bind(notification_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Oldest pending notifications, up to `limit`
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT * FROM notifications
            WHERE delivery_status = 'pending'
            ORDER BY created_at, rowid
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Move a pending notification to a terminal status.
    ///
    /// The update only matches rows still `pending`, so of two racing outcome
    /// reports exactly one applies. Returns whether this call applied.
    pub async fn complete_delivery(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        delivered_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET delivery_status = $2, delivered_at = $3, updated_at = $4
            WHERE id = $1 AND delivery_status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(delivered_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        exists
            .map(|_| ())
            .ok_or_else(|| Error::not_found("User", user_id))
    }
}

async fn insert_notification(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    input: &NewNotification,
    now: DateTime<Utc>,
) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: input.user_id,
        alert_id: input.alert_id,
        notification_type: input.notification_type,
        title: input.title.clone(),
        message: input.message.clone(),
        delivery_status: DeliveryStatus::Pending,
        delivered_at: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO notifications (
            id, user_id, alert_id, notification_type, title, message,
            delivery_status, delivered_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(notification.alert_id)
    .bind(notification.notification_type.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.delivery_status.as_str())
    .bind(notification.delivered_at)
    .bind(notification.created_at)
    .bind(notification.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(notification)
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    user_id: Uuid,
    alert_type: String,
    condition_field: String,
    condition_operator: String,
    condition_value: String,
    is_active: bool,
    triggered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        Ok(Alert {
            id: row.id,
            user_id: row.user_id,
            alert_type: parse_column("alerts", "alert_type", &row.alert_type)?,
            condition_field: row.condition_field,
            condition_operator: parse_column("alerts", "condition_operator", &row.condition_operator)?,
            condition_value: row.condition_value,
            is_active: row.is_active,
            triggered_at: row.triggered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    alert_id: Option<Uuid>,
    notification_type: String,
    title: String,
    message: String,
    delivery_status: String,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            alert_id: row.alert_id,
            notification_type: parse_column(
                "notifications",
                "notification_type",
                &row.notification_type,
            )?,
            title: row.title,
            message: row.message,
            delivery_status: parse_column("notifications", "delivery_status", &row.delivery_status)?,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ConditionOperator, NewUser};
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, Uuid) {
        let db = Database::in_memory().await.unwrap();
        let user = db
            .users()
            .create(NewUser {
                external_user_id: "repo-user".to_string(),
                email: "repo@example.com".to_string(),
                notification_preferences: None,
            })
            .await
            .unwrap();
        (db, user.id)
    }

    fn new_alert(user_id: Uuid, is_active: bool) -> NewAlert {
        NewAlert {
            user_id,
            alert_type: AlertType::PriceThreshold,
            condition_field: "price".to_string(),
            condition_operator: ConditionOperator::Gt,
            condition_value: "150".to_string(),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_alerts() {
        let (db, user_id) = setup().await;
        let repo = db.alerts();

        let active = repo.create_alert(new_alert(user_id, true)).await.unwrap();
        let inactive = repo.create_alert(new_alert(user_id, false)).await.unwrap();

        assert_eq!(repo.get_alert(active.id).await.unwrap(), Some(active.clone()));
        assert_eq!(repo.list_for_user(user_id).await.unwrap().len(), 2);
        let listed: Vec<Uuid> = repo.list_active().await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(listed, vec![active.id]);
        assert!(!listed.contains(&inactive.id));
        assert_eq!(
            repo.list_by_type(AlertType::PriceThreshold).await.unwrap().len(),
            2
        );
        assert!(repo
            .list_by_type(AlertType::SimulationOutcome)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_blank_alert_is_rejected_before_insert() {
        let (db, user_id) = setup().await;
        let repo = db.alerts();

        let err = repo
            .create_alert(NewAlert {
                condition_field: String::new(),
                condition_value: "  ".to_string(),
                ..new_alert(user_id, true)
            })
            .await
            .unwrap_err();

        match err {
            Error::Validation(errors) => {
                assert!(errors.has("condition_field"));
                assert!(errors.has("condition_value"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(repo.list_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_alert_for_unknown_user() {
        let (db, _) = setup().await;
        let err = db
            .alerts()
            .create_alert(new_alert(Uuid::new_v4(), true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_trigger_inactive_alert_writes_nothing() {
        let (db, user_id) = setup().await;
        let repo = db.alerts();
        let alert = repo.create_alert(new_alert(user_id, false)).await.unwrap();

        let result = repo
            .trigger(alert.id, Utc::now(), &NewNotification::for_alert(&alert))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(repo.get_alert(alert.id).await.unwrap().unwrap().triggered_at, None);
        assert!(repo.list_notifications(user_id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_rejects_invalid_notification_without_writing() {
        let (db, user_id) = setup().await;
        let repo = db.alerts();
        let alert = repo.create_alert(new_alert(user_id, true)).await.unwrap();
        let mut notification = NewNotification::for_alert(&alert);
        notification.title = String::new();

        let err = repo
            .trigger(alert.id, Utc::now(), &notification)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(repo.get_alert(alert.id).await.unwrap().unwrap().triggered_at, None);
        assert!(repo.list_notifications(user_id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_notification_and_status_filters() {
        let (db, user_id) = setup().await;
        let repo = db.alerts();

        let weekly = repo
            .create_notification(&NewNotification {
                user_id,
                alert_id: None,
                notification_type: NotificationType::WeeklySummary,
                title: "Weekly Summary".to_string(),
                message: "Your portfolio gained 2.1% this week".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(weekly.delivery_status, DeliveryStatus::Pending);
        assert_eq!(weekly.alert_id, None);

        let now = Utc::now();
        assert!(repo
            .complete_delivery(weekly.id, DeliveryStatus::Delivered, Some(now), now)
            .await
            .unwrap());
        assert!(!repo
            .complete_delivery(weekly.id, DeliveryStatus::Failed, None, now)
            .await
            .unwrap());

        let delivered = repo
            .list_notifications(user_id, Some(DeliveryStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].delivered_at, Some(now));
        assert!(repo
            .list_notifications(user_id, Some(DeliveryStatus::Pending))
            .await
            .unwrap()
            .is_empty());
        assert!(repo.list_pending(10).await.unwrap().is_empty());
        assert_eq!(
            repo.list_notifications_by_type(NotificationType::WeeklySummary)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
