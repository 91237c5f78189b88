//! Field validation run before any entity is persisted
//!
//! Every `validate_*` function checks the full input and reports all offending
//! fields at once, returning a typed, ready-to-insert value on success.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    AlertInput, AlertType, ConditionOperator, NewAlert, NewNotification, NewPortfolioSummary,
    NewUser, NotificationInput, NotificationType, SummaryInput, SummaryType, UserInput,
};

const BLANK: &str = "can't be blank";
const NOT_IN_LIST: &str = "is not included in the list";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

/// A single offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as stored
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

/// Every field that failed validation for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// Offending fields, in check order
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// A single-field error
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// Record an offending field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Whether no field failed
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the named field failed
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn required(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.add(field, BLANK);
                None
            }
        }
    }

    fn one_of<T: FromStr>(&mut self, field: &str, value: Option<&str>) -> Option<T> {
        let raw = self.required(field, value)?;
        if let Ok(parsed) = raw.parse() {
            Some(parsed)
        } else {
            self.add(field, NOT_IN_LIST);
            None
        }
    }

    fn number(&mut self, field: &str, value: Option<f64>) -> Option<f64> {
        match value {
            Some(v) if v.is_finite() => Some(v),
            Some(_) => {
                self.add(field, "is not a number");
                None
            }
            None => {
                self.add(field, BLANK);
                None
            }
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a new user
pub fn validate_user(input: &UserInput) -> Result<NewUser, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let external_user_id = errors.required("external_user_id", input.external_user_id.as_deref());
    let email = errors.required("email", input.email.as_deref());
    if let Some(email) = &email {
        if !EMAIL_RE.is_match(email) {
            errors.add("email", "is invalid");
        }
    }

    let (Some(external_user_id), Some(email)) = (external_user_id, email) else {
        return Err(errors);
    };
    errors.finish()?;

    Ok(NewUser {
        external_user_id,
        email,
        notification_preferences: input.notification_preferences.clone(),
    })
}

/// Validate a new alert for `user_id`
pub fn validate_alert(user_id: Uuid, input: &AlertInput) -> Result<NewAlert, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let alert_type = errors.one_of::<AlertType>("alert_type", input.alert_type.as_deref());
    let condition_field = errors.required("condition_field", input.condition_field.as_deref());
    let condition_operator =
        errors.one_of::<ConditionOperator>("condition_operator", input.condition_operator.as_deref());
    let condition_value = errors.required("condition_value", input.condition_value.as_deref());
    if input.is_active.is_none() {
        errors.add("is_active", NOT_IN_LIST);
    }

    let (
        Some(alert_type),
        Some(condition_field),
        Some(condition_operator),
        Some(condition_value),
        Some(is_active),
    ) = (
        alert_type,
        condition_field,
        condition_operator,
        condition_value,
        input.is_active,
    )
    else {
        return Err(errors);
    };

    Ok(NewAlert {
        user_id,
        alert_type,
        condition_field,
        condition_operator,
        condition_value,
        is_active,
    })
}

/// Validate a directly submitted notification
pub fn validate_notification(
    user_id: Uuid,
    alert_id: Option<Uuid>,
    input: &NotificationInput,
) -> Result<NewNotification, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let notification_type =
        errors.one_of::<NotificationType>("notification_type", input.notification_type.as_deref());
    let title = errors.required("title", input.title.as_deref());
    let message = errors.required("message", input.message.as_deref());

    let (Some(notification_type), Some(title), Some(message)) = (notification_type, title, message)
    else {
        return Err(errors);
    };

    let notification = NewNotification {
        user_id,
        alert_id,
        notification_type,
        title,
        message,
    };
    check_notification(&notification)?;
    Ok(notification)
}

/// Check an already-typed notification before insert
pub fn check_notification(notification: &NewNotification) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if notification.title.trim().is_empty() {
        errors.add("title", BLANK);
    }
    if notification.message.trim().is_empty() {
        errors.add("message", BLANK);
    }
    if notification.notification_type.is_summary() && notification.alert_id.is_some() {
        errors.add("alert_id", "must be empty for summary notifications");
    }
    errors.finish()
}

/// Check an already-typed user before insert
pub fn check_user(user: &NewUser) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if user.external_user_id.trim().is_empty() {
        errors.add("external_user_id", BLANK);
    }
    if user.email.trim().is_empty() {
        errors.add("email", BLANK);
    } else if !EMAIL_RE.is_match(&user.email) {
        errors.add("email", "is invalid");
    }
    errors.finish()
}

/// Check an already-typed alert before insert
pub fn check_alert(alert: &NewAlert) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if alert.condition_field.trim().is_empty() {
        errors.add("condition_field", BLANK);
    }
    if alert.condition_value.trim().is_empty() {
        errors.add("condition_value", BLANK);
    }
    errors.finish()
}

/// Check an already-typed summary before insert
pub fn check_summary(summary: &NewPortfolioSummary) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if !summary.total_value.is_finite() {
        errors.add("total_value", "is not a number");
    } else if summary.total_value < 0.0 {
        errors.add("total_value", "must be greater than or equal to 0");
    }
    if !summary.performance_percentage.is_finite() {
        errors.add("performance_percentage", "is not a number");
    }
    if summary.period_end < summary.period_start {
        errors.add("period_end", "must be on or after period_start");
    }
    errors.finish()
}

/// Validate a new portfolio summary for `user_id`
pub fn validate_summary(
    user_id: Uuid,
    input: &SummaryInput,
) -> Result<NewPortfolioSummary, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let summary_type = errors.one_of::<SummaryType>("summary_type", input.summary_type.as_deref());
    if input.period_start.is_none() {
        errors.add("period_start", BLANK);
    }
    if input.period_end.is_none() {
        errors.add("period_end", BLANK);
    }
    let total_value = errors.number("total_value", input.total_value);
    if matches!(total_value, Some(v) if v < 0.0) {
        errors.add("total_value", "must be greater than or equal to 0");
    }
    let performance_percentage =
        errors.number("performance_percentage", input.performance_percentage);
    if let (Some(start), Some(end)) = (input.period_start, input.period_end) {
        if end < start {
            errors.add("period_end", "must be on or after period_start");
        }
    }

    let (
        Some(summary_type),
        Some(period_start),
        Some(period_end),
        Some(total_value),
        Some(performance_percentage),
    ) = (
        summary_type,
        input.period_start,
        input.period_end,
        total_value,
        performance_percentage,
    )
    else {
        return Err(errors);
    };
    errors.finish()?;

    Ok(NewPortfolioSummary {
        user_id,
        summary_type,
        period_start,
        period_end,
        total_value,
        performance_percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn alert_input() -> AlertInput {
        AlertInput {
            alert_type: Some("price_threshold".to_string()),
            condition_field: Some("price".to_string()),
            condition_operator: Some(">".to_string()),
            condition_value: Some("150".to_string()),
            is_active: Some(true),
        }
    }

    #[test]
    fn test_valid_alert() {
        let user_id = Uuid::new_v4();
        let alert = validate_alert(user_id, &alert_input()).unwrap();

        assert_eq!(alert.user_id, user_id);
        assert_eq!(alert.alert_type, AlertType::PriceThreshold);
        assert_eq!(alert.condition_operator, ConditionOperator::Gt);
        assert_eq!(alert.condition_value, "150");
    }

    #[test]
    fn test_unknown_operator_names_the_field() {
        let input = AlertInput {
            condition_operator: Some("~=".to_string()),
            ..alert_input()
        };

        let errors = validate_alert(Uuid::new_v4(), &input).unwrap_err();

        assert_eq!(
            errors.errors,
            vec![FieldError {
                field: "condition_operator".to_string(),
                message: NOT_IN_LIST.to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_alert_fields_are_all_reported() {
        let errors = validate_alert(Uuid::new_v4(), &AlertInput::default()).unwrap_err();

        for field in [
            "alert_type",
            "condition_field",
            "condition_operator",
            "condition_value",
            "is_active",
        ] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_blank_condition_field(#[case] field: &str) {
        let input = AlertInput {
            condition_field: Some(field.to_string()),
            ..alert_input()
        };
        let errors = validate_alert(Uuid::new_v4(), &input).unwrap_err();
        assert!(errors.has("condition_field"));
    }

    #[rstest]
    #[case("user@example.com", true)]
    #[case("first.last+tag@sub.example.co.uk", true)]
    #[case("not-an-email", false)]
    #[case("missing@", false)]
    #[case("@example.com", false)]
    fn test_email_format(#[case] email: &str, #[case] ok: bool) {
        let input = UserInput {
            external_user_id: Some("ext-1".to_string()),
            email: Some(email.to_string()),
            notification_preferences: None,
        };
        assert_eq!(validate_user(&input).is_ok(), ok);
    }

    #[test]
    fn test_notification_requires_title_and_message() {
        let input = NotificationInput {
            notification_type: Some("weekly_summary".to_string()),
            title: None,
            message: Some(String::new()),
        };

        let errors = validate_notification(Uuid::new_v4(), None, &input).unwrap_err();

        assert!(errors.has("title"));
        assert!(errors.has("message"));
        assert!(!errors.has("notification_type"));
    }

    #[test]
    fn test_notification_type_outside_enum() {
        let input = NotificationInput {
            notification_type: Some("monthly_summary".to_string()),
            title: Some("t".to_string()),
            message: Some("m".to_string()),
        };
        let errors = validate_notification(Uuid::new_v4(), None, &input).unwrap_err();
        assert!(errors.has("notification_type"));
    }

    fn summary_input() -> SummaryInput {
        SummaryInput {
            summary_type: Some("weekly".to_string()),
            period_start: NaiveDate::from_ymd_opt(2025, 8, 11),
            period_end: NaiveDate::from_ymd_opt(2025, 8, 17),
            total_value: Some(52_340.12),
            performance_percentage: Some(-2.5),
        }
    }

    #[test]
    fn test_valid_summary_allows_negative_performance() {
        let summary = validate_summary(Uuid::new_v4(), &summary_input()).unwrap();
        assert_eq!(summary.summary_type, SummaryType::Weekly);
        assert!(summary.performance_percentage < 0.0);
    }

    #[rstest]
    #[case(Some(-0.01), true)]
    #[case(Some(f64::NAN), true)]
    #[case(None, true)]
    #[case(Some(0.0), false)]
    fn test_summary_total_value_bound(#[case] total_value: Option<f64>, #[case] rejected: bool) {
        let input = SummaryInput {
            total_value,
            ..summary_input()
        };
        let result = validate_summary(Uuid::new_v4(), &input);
        assert_eq!(
            result.err().is_some_and(|e| e.has("total_value")),
            rejected
        );
    }

    #[test]
    fn test_summary_period_order() {
        let input = SummaryInput {
            period_end: NaiveDate::from_ymd_opt(2025, 8, 1),
            ..summary_input()
        };
        let errors = validate_summary(Uuid::new_v4(), &input).unwrap_err();
        assert!(errors.has("period_end"));
    }

    #[test]
    fn test_display_joins_fields() {
        let mut errors = ValidationErrors::single("title", BLANK);
        errors.add("message", BLANK);
        assert_eq!(
            errors.to_string(),
            "title can't be blank, message can't be blank"
        );
    }
}
