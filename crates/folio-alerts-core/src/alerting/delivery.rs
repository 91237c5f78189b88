//! Notification delivery

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::lifecycle::AlertLifecycle;
use crate::config::DeliveryConfig;
use crate::error::{Error, Result};
use crate::models::{DeliveryOutcome, Notification};

/// Outbound transport (email, push, webhook) for notifications
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Attempt delivery once
    async fn send(&self, notification: &Notification) -> DeliveryOutcome;
}

/// Posts each notification as JSON to a fixed URL. Any 2xx is a success.
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    /// Create a webhook transport
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build from the `delivery` config section, if a webhook URL is set
    pub fn from_config(config: &DeliveryConfig) -> Result<Option<Self>> {
        config
            .webhook_url
            .as_deref()
            .map(|url| Self::new(url, config.timeout))
            .transpose()
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    notification_id: Uuid,
    user_id: Uuid,
    alert_id: Option<Uuid>,
    notification_type: &'a str,
    title: &'a str,
    message: &'a str,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    async fn send(&self, notification: &Notification) -> DeliveryOutcome {
        let payload = WebhookPayload {
            notification_id: notification.id,
            user_id: notification.user_id,
            alert_id: notification.alert_id,
            notification_type: notification.notification_type.as_str(),
            title: &notification.title,
            message: &notification.message,
            created_at: notification.created_at,
        };

        let response = match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(notification_id = %notification.id, error = %e, "Webhook request failed");
                return DeliveryOutcome::Failure;
            }
        };

        if response.status().is_success() {
            debug!(notification_id = %notification.id, url = %self.url, "Webhook notification sent");
            DeliveryOutcome::Success
        } else {
            warn!(
                notification_id = %notification.id,
                status = %response.status(),
                "Webhook rejected notification"
            );
            DeliveryOutcome::Failure
        }
    }
}

/// Counts from one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Notifications marked delivered
    pub delivered: usize,
    /// Notifications marked failed
    pub failed: usize,
    /// Outcomes that could not be recorded (already terminal, storage error)
    pub unrecorded: usize,
}

/// Sends pending notifications once each and records the transport's outcome.
///
/// Failed notifications stay failed; nothing is retried.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    lifecycle: AlertLifecycle,
    transport: Arc<dyn DeliveryTransport>,
    batch_size: i64,
}

impl DeliveryDispatcher {
    /// Create a dispatcher handling up to `batch_size` notifications per pass
    pub fn new(lifecycle: AlertLifecycle, transport: Arc<dyn DeliveryTransport>, batch_size: i64) -> Self {
        Self {
            lifecycle,
            transport,
            batch_size: batch_size.max(1),
        }
    }

    /// Start the dispatch loop
    pub async fn start(&self, every: Duration) {
        info!(interval = ?every, "Starting delivery dispatcher");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.dispatch_pending().await {
                Ok(report) => debug!(?report, "Dispatch finished"),
                Err(e) => error!(error = %e, "Error dispatching notifications"),
            }
        }
    }

    /// Send the oldest pending notifications once
    pub async fn dispatch_pending(&self) -> Result<DispatchReport> {
        let pending = self
            .lifecycle
            .repository()
            .list_pending(self.batch_size)
            .await?;

        let mut report = DispatchReport::default();

        for notification in pending {
            let outcome = self.transport.send(&notification).await;

            match self
                .lifecycle
                .record_delivery_outcome(notification.id, outcome)
                .await
            {
                Ok(_) => match outcome {
                    DeliveryOutcome::Success => report.delivered += 1,
                    DeliveryOutcome::Failure => report.failed += 1,
                },
                Err(e @ Error::InvalidStateTransition { .. }) => {
                    debug!(notification_id = %notification.id, error = %e, "Outcome already recorded");
                    report.unrecorded += 1;
                }
                Err(e) => {
                    error!(notification_id = %notification.id, error = %e, "Error recording outcome");
                    report.unrecorded += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{DeliveryStatus, NewNotification, NewUser, NotificationType};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn seeded(titles: &[&str]) -> (Database, Vec<Notification>) {
        let db = Database::in_memory().await.unwrap();
        let user = db
            .users()
            .create(NewUser {
                external_user_id: "delivery".to_string(),
                email: "delivery@example.com".to_string(),
                notification_preferences: None,
            })
            .await
            .unwrap();

        let mut created = Vec::new();
        for title in titles {
            let n = db
                .alerts()
                .create_notification(&NewNotification {
                    user_id: user.id,
                    alert_id: None,
                    notification_type: NotificationType::DailySummary,
                    title: (*title).to_string(),
                    message: "Daily portfolio summary".to_string(),
                })
                .await
                .unwrap();
            created.push(n);
        }
        (db, created)
    }

    #[tokio::test]
    async fn test_webhook_outcomes_are_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deliver"))
            .and(body_partial_json(serde_json::json!({"title": "ok"})))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/deliver"))
            .and(body_partial_json(serde_json::json!({"title": "bounce"})))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (db, created) = seeded(&["ok", "bounce"]).await;
        let transport =
            WebhookTransport::new(format!("{}/deliver", server.uri()), Duration::from_secs(5)).unwrap();
        let dispatcher = DeliveryDispatcher::new(AlertLifecycle::new(db.alerts()), Arc::new(transport), 10);

        let report = dispatcher.dispatch_pending().await.unwrap();

        assert_eq!(
            report,
            DispatchReport {
                delivered: 1,
                failed: 1,
                unrecorded: 0,
            }
        );

        let ok = db.alerts().get_notification(created[0].id).await.unwrap().unwrap();
        let bounced = db.alerts().get_notification(created[1].id).await.unwrap().unwrap();
        assert_eq!(ok.delivery_status, DeliveryStatus::Delivered);
        assert!(ok.delivered_at.is_some());
        assert_eq!(bounced.delivery_status, DeliveryStatus::Failed);
        assert_eq!(bounced.delivered_at, None);

        // Failed notifications are not picked up again
        let again = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(again, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_fails_delivery() {
        let (db, created) = seeded(&["lost"]).await;
        // Nothing listens on port 9 (discard)
        let transport = WebhookTransport::new("http://127.0.0.1:9/deliver", Duration::from_millis(500)).unwrap();

        let outcome = transport.send(&created[0]).await;

        assert_eq!(outcome, DeliveryOutcome::Failure);
        drop(db);
    }
}
