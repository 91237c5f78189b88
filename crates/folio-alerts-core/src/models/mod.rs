//! Data models for Folio Alerts

mod alert;
mod notification;
mod summary;
mod user;

pub use alert::*;
pub use notification::*;
pub use summary::*;
pub use user::*;

/// A stored or submitted string did not name a known enum variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
