//! Periodic evaluation of every active alert

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::lifecycle::{AlertLifecycle, TriggerResult};
use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use crate::models::Alert;

/// Source of live metric values for alert evaluation
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Current value of `field` for `user_id`, or `None` when no data is available
    async fn current_value(&self, user_id: Uuid, field: &str) -> Result<Option<f64>>;
}

/// Metrics source backed by an HTTP price/portfolio service.
///
/// Reads `GET {base_url}/users/{user_id}/metrics/{field}` and expects
/// `{"value": <number>}`. A 404 means no data.
pub struct HttpMetricsSource {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct MetricResponse {
    value: f64,
}

impl HttpMetricsSource {
    /// Create a metrics source from configuration
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from the `metrics` config section, if a base URL is set
    pub fn from_config(config: &MetricsConfig) -> Result<Option<Self>> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, config.timeout))
            .transpose()
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn current_value(&self, user_id: Uuid, field: &str) -> Result<Option<f64>> {
        let url = format!("{}/users/{}/metrics/{}", self.base_url, user_id, field);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: MetricResponse = response.error_for_status()?.json().await?;
        Ok(Some(body.value))
    }
}

/// Counts from one sweep over the active alerts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Alerts whose condition was evaluated
    pub evaluated: usize,
    /// Alerts that fired a notification
    pub triggered: usize,
    /// Alerts with no metric value available
    pub no_data: usize,
    /// Alerts skipped because they were deactivated mid-sweep
    pub skipped: usize,
    /// Alerts that errored (invalid condition, metrics or storage failure)
    pub failed: usize,
}

enum Outcome {
    Evaluated { triggered: bool },
    NoData,
    Skipped,
    Failed,
}

/// Evaluates every active alert against live metrics
#[derive(Clone)]
pub struct AlertSweeper {
    lifecycle: AlertLifecycle,
    metrics: Arc<dyn MetricsSource>,
    concurrency: usize,
}

impl AlertSweeper {
    /// Create a sweeper evaluating up to `concurrency` alerts at a time
    pub fn new(lifecycle: AlertLifecycle, metrics: Arc<dyn MetricsSource>, concurrency: usize) -> Self {
        Self {
            lifecycle,
            metrics,
            concurrency: concurrency.max(1),
        }
    }

    /// Start the sweep loop
    pub async fn start(&self, every: Duration) {
        info!(interval = ?every, "Starting alert sweeper");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.sweep().await {
                Ok(report) => debug!(?report, "Sweep finished"),
                Err(e) => error!(error = %e, "Error sweeping alerts"),
            }
        }
    }

    /// Evaluate all active alerts once.
    ///
    /// Per-alert failures are logged and counted; they never stop the sweep.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let alerts = self.lifecycle.repository().list_active().await?;

        debug!(count = alerts.len(), "Sweeping active alerts");

        let outcomes: Vec<Outcome> = stream::iter(alerts)
            .map(|alert| {
                let this = self.clone();
                async move { this.sweep_one(&alert).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SweepReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Evaluated { triggered } => {
                    report.evaluated += 1;
                    if triggered {
                        report.triggered += 1;
                    }
                }
                Outcome::NoData => report.no_data += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        if report.triggered > 0 || report.failed > 0 {
            info!(
                evaluated = report.evaluated,
                triggered = report.triggered,
                failed = report.failed,
                "Alert sweep complete"
            );
        }

        Ok(report)
    }

    async fn sweep_one(&self, alert: &Alert) -> Outcome {
        let value = match self
            .metrics
            .current_value(alert.user_id, &alert.condition_field)
            .await
        {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(alert_id = %alert.id, field = %alert.condition_field, "No data for metric");
                return Outcome::NoData;
            }
            Err(e) => {
                error!(alert_id = %alert.id, error = %e, "Error reading metric");
                return Outcome::Failed;
            }
        };

        match self.lifecycle.evaluate_alert(alert, value).await {
            Ok(TriggerResult::Triggered { .. }) => Outcome::Evaluated { triggered: true },
            Ok(TriggerResult::NotTriggered) => Outcome::Evaluated { triggered: false },
            Ok(TriggerResult::Skipped) => Outcome::Skipped,
            Err(Error::InvalidCondition(reason)) => {
                warn!(alert_id = %alert.id, %reason, "Skipping alert with invalid condition");
                Outcome::Failed
            }
            Err(e) => {
                error!(alert_id = %alert.id, error = %e, "Error evaluating alert");
                Outcome::Failed
            }
        }
    }
}
