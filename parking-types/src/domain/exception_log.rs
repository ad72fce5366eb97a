//! Client-side exception log.

use chrono::{DateTime, Utc};

use super::ids::{ExceptionLogId, UserId};

/// How many trailing client events are kept per log.
pub const MAX_LOG_EVENTS: usize = 40;

#[derive(Debug, Clone)]
pub struct ExceptionLog {
    pub id: ExceptionLogId,
    pub holder: UserId,
    pub log_message: String,
    pub created_at: DateTime<Utc>,
}

impl ExceptionLog {
    /// Builds a log from the last [`MAX_LOG_EVENTS`] events, one per line.
    pub fn from_events(holder: UserId, events: &[String]) -> Self {
        let start = events.len().saturating_sub(MAX_LOG_EVENTS);
        let log_message = events[start..].iter().fold(String::new(), |mut acc, e| {
            acc.push_str(e);
            acc.push('\n');
            acc
        });

        Self {
            id: ExceptionLogId::new(),
            holder,
            log_message,
            created_at: Utc::now(),
        }
    }
}
