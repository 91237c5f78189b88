//! Condition evaluation
//!
//! Decides whether an alert's stored `(operator, value)` condition holds for a
//! live metric value. Pure: no I/O, no state, same inputs give the same answer.
//!
//! `==` and `!=` compare exactly. Metrics that are the result of floating-point
//! arithmetic will rarely compare equal to a typed-in threshold.

use crate::error::{Error, Result};
use crate::models::ConditionOperator;

/// Stateless evaluator for alert conditions
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a condition given in its stored textual form.
    ///
    /// Applies `operator` as `current_value <op> condition_value`, so `>` means
    /// the live value is above the stored threshold.
    pub fn evaluate(operator: &str, condition_value: &str, current_value: f64) -> Result<bool> {
        let operator: ConditionOperator = operator
            .trim()
            .parse()
            .map_err(|e| Error::invalid_condition(format!("{e}")))?;
        Self::evaluate_with(operator, condition_value, current_value)
    }

    /// Evaluate with an already-parsed operator
    pub fn evaluate_with(
        operator: ConditionOperator,
        condition_value: &str,
        current_value: f64,
    ) -> Result<bool> {
        let threshold = Self::parse_threshold(condition_value)?;
        if !current_value.is_finite() {
            return Err(Error::invalid_condition(format!(
                "current value {current_value} is not a finite number"
            )));
        }

        Ok(operator.apply(current_value, threshold))
    }

    /// Parse a stored condition value as a finite number
    pub fn parse_threshold(condition_value: &str) -> Result<f64> {
        let trimmed = condition_value.trim();
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(Error::invalid_condition(format!(
                "condition value '{condition_value}' is not a number"
            ))),
        }
    }
}
