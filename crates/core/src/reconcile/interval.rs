//! Schedule presets and their cron expressions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ReconcileError;

/// Named schedule preset stored on a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePreset {
    /// Scheduling disabled.
    Never,
    Minutely,
    Hourly,
    Daily,
    Weekly,
}

impl SchedulePreset {
    pub const ALL: [SchedulePreset; 5] = [
        SchedulePreset::Never,
        SchedulePreset::Minutely,
        SchedulePreset::Hourly,
        SchedulePreset::Daily,
        SchedulePreset::Weekly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulePreset::Never => "never",
            SchedulePreset::Minutely => "minutely",
            SchedulePreset::Hourly => "hourly",
            SchedulePreset::Daily => "daily",
            SchedulePreset::Weekly => "weekly",
        }
    }

    /// Standard 5-field cron expression, or `None` when scheduling is off.
    pub fn cron_expression(&self) -> Option<&'static str> {
        match self {
            SchedulePreset::Never => None,
            SchedulePreset::Minutely => Some("* * * * *"),
            SchedulePreset::Hourly => Some("0 * * * *"),
            SchedulePreset::Daily => Some("0 0 * * *"),
            SchedulePreset::Weekly => Some("0 0 * * Sun"),
        }
    }
}

impl fmt::Display for SchedulePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulePreset {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReconcileError::Configuration(format!("unknown schedule preset '{}'", s)))
    }
}

/// Resolve a stored preset name to its cron expression.
///
/// `Ok(None)` means scheduling is disabled for the title.
pub fn resolve(preset: &str) -> Result<Option<&'static str>, ReconcileError> {
    Ok(preset.parse::<SchedulePreset>()?.cron_expression())
}
