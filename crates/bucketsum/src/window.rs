//! Time window parsing and calendar-day iteration.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::types::{BucketSumError, BucketSumResult};

/// Wire format of range bounds: no offset, no sub-second part.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a `YYYY-MM-DDTHH:MM:SS` string as a UTC instant.
///
/// Whitespace anywhere in the input is rejected, including padding.
pub fn parse_timestamp(raw: &str) -> BucketSumResult<DateTime<Utc>> {
    if raw.chars().any(char::is_whitespace) {
        return Err(BucketSumError::InvalidRange(format!(
            "'{raw}' is not a YYYY-MM-DDTHH:MM:SS timestamp: contains whitespace"
        )));
    }
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        BucketSumError::InvalidRange(format!("'{raw}' is not a YYYY-MM-DDTHH:MM:SS timestamp: {e}"))
    })?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Render an instant in the wire format.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Midnight UTC of a calendar day.
pub fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// An inclusive `[from, to]` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Parse both bounds. Fails on the first malformed bound.
    pub fn parse(from: &str, to: &str) -> BucketSumResult<Self> {
        Ok(Self {
            from: parse_timestamp(from)?,
            to: parse_timestamp(to)?,
        })
    }

    /// `to` lies before `from`; such a window matches nothing.
    pub fn is_inverted(&self) -> bool {
        self.to < self.from
    }

    /// Inclusive on both ends.
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        *dt >= self.from && *dt <= self.to
    }

    /// Midnight of every calendar day from `from`'s date through `to`'s date.
    pub fn days(&self) -> impl Iterator<Item = DateTime<Utc>> {
        let last = self.to.date_naive();
        let mut next = if self.is_inverted() {
            None
        } else {
            Some(self.from.date_naive())
        };

        std::iter::from_fn(move || {
            let day = next.filter(|d| *d <= last)?;
            next = day.succ_opt();
            Some(midnight(day))
        })
    }

    pub fn day_count(&self) -> usize {
        self.days().count()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}]",
            format_timestamp(&self.from),
            format_timestamp(&self.to)
        )
    }
}

/// Serde adapter storing instants in [`TIMESTAMP_FORMAT`].
pub mod iso_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&dt.format(super::TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
