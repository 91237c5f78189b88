//! API handlers for the HTTP REST API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::alerting::{AlertLifecycle, TriggerResult};
use crate::db::{CascadeReport, Database};
use crate::error::Error;
use crate::models::{
    Alert, AlertInput, DeliveryOutcome, DeliveryStatus, Notification, NotificationInput,
    NotificationPreferences, PortfolioSummary, PreferenceMap, SummaryInput, SummaryType, User,
    UserInput,
};
use crate::validation::{self, FieldError, ValidationErrors};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub lifecycle: AlertLifecycle,
}

impl AppState {
    /// Build handler state over a database
    pub fn new(db: Database) -> Self {
        let lifecycle = AlertLifecycle::new(db.alerts());
        Self { db, lifecycle }
    }
}

/// Error returned by handlers, mapped onto an HTTP status
#[derive(Debug)]
pub struct ApiError(Error);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl ApiError {
    fn as_status_code(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::InvalidCondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self(Error::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let fields = match &self.0 {
            Error::Validation(errors) => errors.errors.clone(),
            _ => Vec::new(),
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            fields,
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            error!(error = %e, "Database health check failed");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn load_user(state: &AppState, user_id: Uuid) -> ApiResult<User> {
    state
        .db
        .users()
        .get(user_id)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id).into())
}

// Users

/// Register a user
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let new_user = validation::validate_user(&input)?;
    let user = state.db.users().create(new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(load_user(&state, user_id).await?))
}

/// Delete a user with everything they own
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<CascadeReport>> {
    Ok(Json(state.db.users().delete(user_id).await?))
}

/// Effective notification preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<NotificationPreferences>> {
    Ok(Json(load_user(&state, user_id).await?.preferences()))
}

/// Replace stored preference toggles
pub async fn update_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(prefs): Json<PreferenceMap>,
) -> ApiResult<Json<NotificationPreferences>> {
    let user = state.db.users().update_preferences(user_id, &prefs).await?;
    Ok(Json(user.preferences()))
}

// Alerts

/// Create an alert for a user
pub async fn create_alert(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<AlertInput>,
) -> ApiResult<(StatusCode, Json<Alert>)> {
    let new_alert = validation::validate_alert(user_id, &input)?;
    let alert = state.db.alerts().create_alert(new_alert).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// List a user's alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Alert>>> {
    load_user(&state, user_id).await?;
    Ok(Json(state.db.alerts().list_for_user(user_id).await?))
}

/// Get an alert by ID
pub async fn get_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> ApiResult<Json<Alert>> {
    let alert = state
        .db
        .alerts()
        .get_alert(alert_id)
        .await?
        .ok_or_else(|| Error::not_found("Alert", alert_id))?;
    Ok(Json(alert))
}

/// Live value to evaluate an alert against
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub current_value: f64,
}

/// Evaluate an alert against a live value, triggering it if the condition holds
pub async fn evaluate_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Json<TriggerResult>> {
    let result = state
        .lifecycle
        .evaluate_alert_by_id(alert_id, req.current_value)
        .await?;
    Ok(Json(result))
}

// Notifications

/// Record a notification with no originating alert (summaries)
pub async fn create_notification(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<NotificationInput>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    load_user(&state, user_id).await?;
    let new_notification = validation::validate_notification(user_id, None, &input)?;
    let notification = state.db.alerts().create_notification(&new_notification).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub status: Option<String>,
}

/// List a user's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<DeliveryStatus>)
        .transpose()
        .map_err(|_| ValidationErrors::single("status", "is not included in the list"))?;

    load_user(&state, user_id).await?;
    Ok(Json(state.db.alerts().list_notifications(user_id, status).await?))
}

/// Get a notification by ID
pub async fn get_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = state
        .db
        .alerts()
        .get_notification(notification_id)
        .await?
        .ok_or_else(|| Error::not_found("Notification", notification_id))?;
    Ok(Json(notification))
}

/// Delivery outcome reported by a transport
#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    pub outcome: DeliveryOutcome,
}

/// Record the outcome of a delivery attempt
pub async fn record_delivery(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Json(req): Json<DeliveryRequest>,
) -> ApiResult<Json<Notification>> {
    let notification = state
        .lifecycle
        .record_delivery_outcome(notification_id, req.outcome)
        .await?;
    Ok(Json(notification))
}

// Summaries

/// Record a portfolio summary for a user
pub async fn create_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<SummaryInput>,
) -> ApiResult<(StatusCode, Json<PortfolioSummary>)> {
    let new_summary = validation::validate_summary(user_id, &input)?;
    let summary = state.db.summaries().create(new_summary).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Query parameters for listing summaries
#[derive(Debug, Deserialize)]
pub struct ListSummariesQuery {
    #[serde(rename = "type")]
    pub summary_type: Option<String>,
}

/// List a user's summaries, most recent first
pub async fn list_summaries(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListSummariesQuery>,
) -> ApiResult<Json<Vec<PortfolioSummary>>> {
    let summary_type = query
        .summary_type
        .as_deref()
        .map(str::parse::<SummaryType>)
        .transpose()
        .map_err(|_| ValidationErrors::single("type", "is not included in the list"))?;

    load_user(&state, user_id).await?;
    Ok(Json(
        state.db.summaries().list_for_user(user_id, summary_type).await?,
    ))
}
