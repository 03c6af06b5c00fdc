use chrono::{DateTime, Duration, Utc};

/// Longest window accepted on the command line, about a century.
pub const MAX_DAYS: u32 = 36_500;

/// The closed interval `[end - days, end]` metrics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl Window {
    /// Trailing window of `days` days ending at `now`. A start before the
    /// earliest representable time clamps to it.
    pub fn trailing(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: now,
            days,
        }
    }

    /// Human-readable label, e.g. "Last 7 days".
    pub fn label(&self) -> String {
        if self.days == 1 {
            "Last 1 day".to_string()
        } else {
            format!("Last {} days", self.days)
        }
    }
}
