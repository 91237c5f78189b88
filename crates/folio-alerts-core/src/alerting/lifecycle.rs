//! Alert triggering and the notification delivery state machine

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::evaluator::ConditionEvaluator;
use super::repository::AlertRepository;
use crate::error::{Error, Result};
use crate::models::{Alert, DeliveryOutcome, DeliveryStatus, NewNotification, Notification};

/// Result of evaluating one alert against a live value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TriggerResult {
    /// The alert is inactive and was not evaluated
    Skipped,
    /// The condition does not hold; nothing changed
    NotTriggered,
    /// The condition holds; the alert was marked and one notification created
    Triggered {
        /// The alert with its new `triggered_at`
        alert: Alert,
        /// The pending notification
        notification: Notification,
    },
}

impl TriggerResult {
    /// Whether a notification was created
    pub fn is_triggered(&self) -> bool {
        matches!(self, TriggerResult::Triggered { .. })
    }
}

/// Owns alert trigger writes and notification status transitions
#[derive(Clone)]
pub struct AlertLifecycle {
    repo: AlertRepository,
}

impl AlertLifecycle {
    /// Create a lifecycle manager over an alert repository
    pub fn new(repo: AlertRepository) -> Self {
        Self { repo }
    }

    /// Underlying repository
    pub fn repository(&self) -> &AlertRepository {
        &self.repo
    }

    /// Evaluate `alert` against `current_value` and trigger it if the condition holds.
    ///
    /// Inactive alerts are skipped without consulting the evaluator. A
    /// malformed stored condition fails with `InvalidCondition` and nothing is
    /// written.
    pub async fn evaluate_alert(&self, alert: &Alert, current_value: f64) -> Result<TriggerResult> {
        if !alert.is_active {
            debug!(alert_id = %alert.id, "Skipping inactive alert");
            return Ok(TriggerResult::Skipped);
        }

        let holds = ConditionEvaluator::evaluate_with(
            alert.condition_operator,
            &alert.condition_value,
            current_value,
        )?;

        debug!(
            alert_id = %alert.id,
            field = %alert.condition_field,
            operator = %alert.condition_operator,
            threshold = %alert.condition_value,
            value = current_value,
            holds,
            "Evaluated alert"
        );

        if !holds {
            return Ok(TriggerResult::NotTriggered);
        }

        let draft = NewNotification::for_alert(alert);
        let Some((alert, notification)) = self.repo.trigger(alert.id, Utc::now(), &draft).await?
        else {
            // Deactivated since the caller loaded it
            debug!(alert_id = %alert.id, "Alert no longer active, not triggering");
            return Ok(TriggerResult::Skipped);
        };

        info!(
            alert_id = %alert.id,
            notification_id = %notification.id,
            user_id = %alert.user_id,
            "Alert triggered"
        );

        Ok(TriggerResult::Triggered {
            alert,
            notification,
        })
    }

    /// Load an alert by ID and evaluate it
    pub async fn evaluate_alert_by_id(&self, alert_id: Uuid, current_value: f64) -> Result<TriggerResult> {
        let alert = self
            .repo
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| Error::not_found("Alert", alert_id))?;

        self.evaluate_alert(&alert, current_value).await
    }

    /// Apply a delivery outcome reported by the transport.
    ///
    /// Only `pending` notifications accept an outcome. A repeated or late
    /// report fails with `InvalidStateTransition` and changes nothing.
    pub async fn record_delivery_outcome(
        &self,
        notification_id: Uuid,
        outcome: DeliveryOutcome,
    ) -> Result<Notification> {
        let notification = self
            .repo
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| Error::not_found("Notification", notification_id))?;

        let to = notification.delivery_status.transition(outcome)?;
        let now = Utc::now();
        let delivered_at = (to == DeliveryStatus::Delivered).then_some(now);

        if !self
            .repo
            .complete_delivery(notification_id, to, delivered_at, now)
            .await?
        {
            // Another report won the race
            let from = self
                .repo
                .get_notification(notification_id)
                .await?
                .map_or(DeliveryStatus::Pending, |n| n.delivery_status);
            warn!(%notification_id, %from, %to, "Duplicate delivery outcome");
            return Err(Error::InvalidStateTransition { from, to });
        }

        info!(%notification_id, status = %to, "Delivery outcome recorded");

        Ok(Notification {
            delivery_status: to,
            delivered_at,
            updated_at: now,
            ..notification
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{AlertType, ConditionOperator, NewAlert, NewUser};
    use pretty_assertions::assert_eq;

    struct Fixture {
        db: Database,
        lifecycle: AlertLifecycle,
        user_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let user = db
            .users()
            .create(NewUser {
                external_user_id: "lifecycle".to_string(),
                email: "lifecycle@example.com".to_string(),
                notification_preferences: None,
            })
            .await
            .unwrap();
        let lifecycle = AlertLifecycle::new(db.alerts());
        Fixture {
            db,
            lifecycle,
            user_id: user.id,
        }
    }

    impl Fixture {
        async fn alert(&self, value: &str, is_active: bool) -> Alert {
            self.db
                .alerts()
                .create_alert(NewAlert {
                    user_id: self.user_id,
                    alert_type: AlertType::PriceThreshold,
                    condition_field: "price".to_string(),
                    condition_operator: ConditionOperator::Gt,
                    condition_value: value.to_string(),
                    is_active,
                })
                .await
                .unwrap()
        }

        async fn notifications(&self) -> Vec<Notification> {
            self.db
                .alerts()
                .list_notifications(self.user_id, None)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_trigger_creates_one_pending_notification() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;

        let result = f.lifecycle.evaluate_alert(&alert, 160.0).await.unwrap();

        let TriggerResult::Triggered {
            alert: triggered,
            notification,
        } = result
        else {
            panic!("expected trigger, got {result:?}");
        };
        assert!(triggered.triggered_at.is_some());
        assert_eq!(notification.delivery_status, DeliveryStatus::Pending);
        assert_eq!(notification.title, "Price Alert: price");
        assert_eq!(notification.message, "Alert triggered: price > 150");
        assert_eq!(notification.alert_id, Some(alert.id));
        assert_eq!(notification.user_id, f.user_id);
        assert_eq!(notification.delivered_at, None);

        let stored = f.notifications().await;
        assert_eq!(stored, vec![notification]);
        let reloaded = f.db.alerts().get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(reloaded.triggered_at, triggered.triggered_at);
    }

    #[tokio::test]
    async fn test_condition_not_met_changes_nothing() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;

        let result = f.lifecycle.evaluate_alert(&alert, 140.0).await.unwrap();

        assert_eq!(result, TriggerResult::NotTriggered);
        assert!(f.notifications().await.is_empty());
        let reloaded = f.db.alerts().get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(reloaded.triggered_at, None);
        assert_eq!(reloaded, alert);
    }

    #[tokio::test]
    async fn test_not_met_after_earlier_trigger_keeps_timestamp() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;
        f.lifecycle.evaluate_alert(&alert, 160.0).await.unwrap();
        let first = f.db.alerts().get_alert(alert.id).await.unwrap().unwrap();

        let result = f.lifecycle.evaluate_alert(&first, 140.0).await.unwrap();

        assert_eq!(result, TriggerResult::NotTriggered);
        let after = f.db.alerts().get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(after.triggered_at, first.triggered_at);
        assert_eq!(f.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_each_positive_evaluation_fires_once() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;

        assert!(f.lifecycle.evaluate_alert(&alert, 151.0).await.unwrap().is_triggered());
        assert!(f.lifecycle.evaluate_alert(&alert, 152.0).await.unwrap().is_triggered());

        assert_eq!(f.notifications().await.len(), 2);
    }

    #[tokio::test]
    async fn test_inactive_alert_is_never_evaluated() {
        let f = fixture().await;
        // An unparseable threshold would fail if the evaluator ran
        let alert = f.alert("not-a-number", false).await;

        let result = f.lifecycle.evaluate_alert(&alert, 1_000.0).await.unwrap();

        assert_eq!(result, TriggerResult::Skipped);
        assert!(f.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_condition_leaves_state_untouched() {
        let f = fixture().await;
        let alert = f.alert("one fifty", true).await;

        let err = f.lifecycle.evaluate_alert(&alert, 160.0).await.unwrap_err();

        assert!(matches!(err, Error::InvalidCondition(_)));
        assert!(f.notifications().await.is_empty());
        let reloaded = f.db.alerts().get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(reloaded.triggered_at, None);
        assert!(reloaded.is_active);
    }

    #[tokio::test]
    async fn test_stale_active_copy_of_deactivated_alert_is_skipped() {
        let f = fixture().await;
        let inactive = f.alert("150", false).await;
        let stale = Alert {
            is_active: true,
            ..inactive.clone()
        };

        let result = f.lifecycle.evaluate_alert(&stale, 160.0).await.unwrap();

        assert_eq!(result, TriggerResult::Skipped);
        assert!(f.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_for_deleted_alert_rolls_back() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;
        f.db.users().delete(f.user_id).await.unwrap();

        let err = f.lifecycle.evaluate_alert(&alert, 160.0).await.unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
            .fetch_one(f.db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_delivery_success_then_duplicate() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;
        let TriggerResult::Triggered { notification, .. } =
            f.lifecycle.evaluate_alert(&alert, 160.0).await.unwrap()
        else {
            panic!("expected trigger");
        };

        let delivered = f
            .lifecycle
            .record_delivery_outcome(notification.id, DeliveryOutcome::Success)
            .await
            .unwrap();
        assert_eq!(delivered.delivery_status, DeliveryStatus::Delivered);
        assert!(delivered.delivered_at.is_some());

        let stored = f
            .db
            .alerts()
            .get_notification(notification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, delivered);

        for outcome in [DeliveryOutcome::Success, DeliveryOutcome::Failure] {
            let err = f
                .lifecycle
                .record_delivery_outcome(notification.id, outcome)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidStateTransition {
                    from: DeliveryStatus::Delivered,
                    ..
                }
            ));
        }

        let unchanged = f
            .db
            .alerts()
            .get_notification(notification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged, delivered);
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_delivered_at_unset() {
        let f = fixture().await;
        let alert = f.alert("150", true).await;
        let TriggerResult::Triggered { notification, .. } =
            f.lifecycle.evaluate_alert(&alert, 160.0).await.unwrap()
        else {
            panic!("expected trigger");
        };

        let failed = f
            .lifecycle
            .record_delivery_outcome(notification.id, DeliveryOutcome::Failure)
            .await
            .unwrap();

        assert_eq!(failed.delivery_status, DeliveryStatus::Failed);
        assert_eq!(failed.delivered_at, None);

        let err = f
            .lifecycle
            .record_delivery_outcome(notification.id, DeliveryOutcome::Success)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                from: DeliveryStatus::Failed,
                to: DeliveryStatus::Delivered,
            }
        ));
    }

    #[tokio::test]
    async fn test_outcome_for_unknown_notification() {
        let f = fixture().await;
        let err = f
            .lifecycle
            .record_delivery_outcome(Uuid::new_v4(), DeliveryOutcome::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_evaluate_by_id() {
        let f = fixture().await;
        let alert = f.alert("10", true).await;

        assert!(f
            .lifecycle
            .evaluate_alert_by_id(alert.id, 11.0)
            .await
            .unwrap()
            .is_triggered());
        assert!(matches!(
            f.lifecycle.evaluate_alert_by_id(Uuid::new_v4(), 11.0).await,
            Err(Error::NotFound { .. })
        ));
    }
}
