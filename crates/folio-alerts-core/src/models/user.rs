//! User data models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored preference toggles, keyed by name
pub type PreferenceMap = BTreeMap<String, bool>;

/// Notification preferences with every toggle resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Deliver notifications by email
    pub email_enabled: bool,
    /// Price threshold alerts
    pub price_alerts: bool,
    /// Portfolio performance updates
    pub portfolio_updates: bool,
    /// Daily summary notifications
    pub daily_summaries: bool,
    /// Weekly summary notifications
    pub weekly_summaries: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_enabled: true,
            price_alerts: true,
            portfolio_updates: true,
            daily_summaries: false,
            weekly_summaries: true,
        }
    }
}

impl NotificationPreferences {
    /// Known toggle names
    pub const KEYS: [&'static str; 5] = [
        "email_enabled",
        "price_alerts",
        "portfolio_updates",
        "daily_summaries",
        "weekly_summaries",
    ];

    /// Stored toggles layered over the defaults. Unknown keys are ignored.
    pub fn merged(stored: &PreferenceMap) -> Self {
        let mut prefs = Self::default();
        for (key, value) in stored {
            match key.as_str() {
                "email_enabled" => prefs.email_enabled = *value,
                "price_alerts" => prefs.price_alerts = *value,
                "portfolio_updates" => prefs.portfolio_updates = *value,
                "daily_summaries" => prefs.daily_summaries = *value,
                "weekly_summaries" => prefs.weekly_summaries = *value,
                _ => {}
            }
        }
        prefs
    }
}

/// Identity anchor for alerts, notifications and summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,

    /// Identifier issued by the external auth provider (unique)
    pub external_user_id: String,

    /// Contact email
    pub email: String,

    /// Explicitly stored toggles; `None` means all defaults
    pub notification_preferences: Option<PreferenceMap>,

    /// When the user was created
    pub created_at: DateTime<Utc>,

    /// When the user was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Effective preferences. Reading never writes defaults back.
    pub fn preferences(&self) -> NotificationPreferences {
        self.notification_preferences
            .as_ref()
            .map(NotificationPreferences::merged)
            .unwrap_or_default()
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInput {
    /// Identifier issued by the external auth provider
    pub external_user_id: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Explicit toggles, if any
    pub notification_preferences: Option<PreferenceMap>,
}

/// A validated user ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// External identifier
    pub external_user_id: String,
    /// Contact email
    pub email: String,
    /// Explicit toggles, if any
    pub notification_preferences: Option<PreferenceMap>,
}
