//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Users
        .route("/api/v1/users", post(handlers::create_user))
        .route(
            "/api/v1/users/:user_id",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route(
            "/api/v1/users/:user_id/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )

        // Alerts
        .route(
            "/api/v1/users/:user_id/alerts",
            post(handlers::create_alert).get(handlers::list_alerts),
        )
        .route("/api/v1/alerts/:alert_id", get(handlers::get_alert))
        .route("/api/v1/alerts/:alert_id/evaluate", post(handlers::evaluate_alert))

        // Notifications
        .route(
            "/api/v1/users/:user_id/notifications",
            post(handlers::create_notification).get(handlers::list_notifications),
        )
        .route("/api/v1/notifications/:notification_id", get(handlers::get_notification))
        .route(
            "/api/v1/notifications/:notification_id/delivery",
            post(handlers::record_delivery),
        )

        // Summaries
        .route(
            "/api/v1/users/:user_id/summaries",
            post(handlers::create_summary).get(handlers::list_summaries),
        )

        .with_state(state)
}
