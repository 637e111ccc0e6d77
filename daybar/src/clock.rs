use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveDateTime, TimeZone, Timelike};

use crate::error::ClockError;

/// Popup text, e.g. `14:30 Sunday 18 October 2026`.
pub const POPUP_FORMAT: &str = "%H:%M %A %d %B %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl From<&NaiveDateTime> for TimeOfDay {
    fn from(t: &NaiveDateTime) -> Self {
        Self { hour: t.hour(), minute: t.minute() }
    }
}

/// Current wall-clock time in the local zone.
pub fn now() -> Result<NaiveDateTime, ClockError> {
    let since = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| ClockError::BeforeEpoch)?;
    let secs = since.as_secs();
    let stamp = i64::try_from(secs).map_err(|_| ClockError::OutOfRange(secs))?;
    Local
        .timestamp_opt(stamp, since.subsec_nanos())
        .single()
        .map(|t| t.naive_local())
        .ok_or(ClockError::OutOfRange(secs))
}

pub fn format_popup(t: &NaiveDateTime) -> String {
    t.format(POPUP_FORMAT).to_string()
}
