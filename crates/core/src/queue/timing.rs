//! Next-fire computation for recurring triggers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use super::QueueError;

/// Parse a standard 5-field cron expression (6 and 7 field forms with
/// seconds are accepted as-is).
pub fn parse_schedule(expression: &str) -> Result<Schedule, QueueError> {
    let fields = expression.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {}", expression.trim())
    } else {
        expression.trim().to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| QueueError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// First fire time strictly after `after`.
pub fn next_fire(expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, QueueError> {
    parse_schedule(expression)?
        .after(&after)
        .next()
        .ok_or_else(|| QueueError::InvalidCron {
            expression: expression.to_string(),
            reason: "no upcoming fire time".to_string(),
        })
}
