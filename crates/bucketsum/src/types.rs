//! Core data types for time-bucketed sums.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single persisted `{dt, value}` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    #[serde(with = "crate::window::iso_seconds")]
    pub dt: DateTime<Utc>,
    pub value: Magnitude,
}

impl TimeSeriesPoint {
    pub fn new(dt: DateTime<Utc>, value: impl Into<Magnitude>) -> Self {
        Self {
            dt,
            value: value.into(),
        }
    }

    /// The zero-valued marker inserted by gap-filling.
    pub fn zero(dt: DateTime<Utc>) -> Self {
        Self {
            dt,
            value: Magnitude::ZERO,
        }
    }
}

/// A numeric `value` or per-bucket sum.
///
/// Integers stay integers; anything fractional, and any integer sum that
/// would overflow `i64`, is carried as `f64`. Serializes as a bare JSON
/// number either way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Magnitude {
    Int(i64),
    Float(f64),
}

impl Magnitude {
    pub const ZERO: Magnitude = Magnitude::Int(0);

    pub fn as_f64(self) -> f64 {
        match self {
            Magnitude::Int(v) => v as f64,
            Magnitude::Float(v) => v,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

impl Default for Magnitude {
    fn default() -> Self {
        Magnitude::ZERO
    }
}

impl std::ops::Add for Magnitude {
    type Output = Magnitude;

    fn add(self, rhs: Magnitude) -> Magnitude {
        match (self, rhs) {
            (Magnitude::Int(a), Magnitude::Int(b)) => match a.checked_add(b) {
                Some(sum) => Magnitude::Int(sum),
                None => Magnitude::Float(a as f64 + b as f64),
            },
            (a, b) => Magnitude::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl std::ops::AddAssign for Magnitude {
    fn add_assign(&mut self, rhs: Magnitude) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Magnitude {
    fn sum<I: Iterator<Item = Magnitude>>(iter: I) -> Self {
        iter.fold(Magnitude::ZERO, |acc, v| acc + v)
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnitude::Int(v) => write!(f, "{v}"),
            Magnitude::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Magnitude {
    fn from(v: i64) -> Self {
        Magnitude::Int(v)
    }
}

impl From<i32> for Magnitude {
    fn from(v: i32) -> Self {
        Magnitude::Int(i64::from(v))
    }
}

impl From<f64> for Magnitude {
    fn from(v: f64) -> Self {
        Magnitude::Float(v)
    }
}

impl PartialEq<i64> for Magnitude {
    fn eq(&self, other: &i64) -> bool {
        matches!(self, Magnitude::Int(v) if v == other)
    }
}

impl PartialEq<i32> for Magnitude {
    fn eq(&self, other: &i32) -> bool {
        *self == i64::from(*other)
    }
}

impl PartialEq<f64> for Magnitude {
    fn eq(&self, other: &f64) -> bool {
        matches!(self, Magnitude::Float(v) if v == other)
    }
}

/// Granularity used to group points before summing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Hour,
    Day,
    Month,
}

impl Bucket {
    /// strftime pattern of the bucket-start label.
    ///
    /// Shared by the in-memory evaluator and the `$dateToString` stage, so
    /// both backends produce byte-identical labels. Every pattern is
    /// zero-padded and fixed width, which makes lexical order chronological.
    pub const fn label_format(self) -> &'static str {
        match self {
            Bucket::Hour => "%Y-%m-%dT%H:00:00",
            Bucket::Day => "%Y-%m-%dT00:00:00",
            Bucket::Month => "%Y-%m-01T00:00:00",
        }
    }

    /// Truncate an instant to the start of its bucket.
    pub fn label(self, dt: &DateTime<Utc>) -> String {
        dt.format(self.label_format()).to_string()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Bucket::Hour => "hour",
            Bucket::Day => "day",
            Bucket::Month => "month",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = BucketSumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Bucket::Hour),
            "day" => Ok(Bucket::Day),
            "month" => Ok(Bucket::Month),
            other => Err(BucketSumError::InvalidInput(format!(
                "Unsupported bucket: {other}. Use 'hour', 'day' or 'month'."
            ))),
        }
    }
}

/// Caller-facing granularity as received on the wire.
///
/// Anything that is not a known bucket is kept verbatim and degrades to
/// [`Bucket::Month`] on resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GroupType {
    Known(Bucket),
    Unknown(String),
}

impl GroupType {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Bucket>() {
            Ok(bucket) => GroupType::Known(bucket),
            Err(_) => GroupType::Unknown(raw.to_string()),
        }
    }

    /// Resolve to a bucket, logging a warning on fallback.
    pub fn resolve(&self) -> Bucket {
        match self {
            GroupType::Known(bucket) => *bucket,
            GroupType::Unknown(raw) => {
                tracing::warn!(group_type = %raw, "Unsupported group_type, falling back to month");
                Bucket::Month
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GroupType::Unknown(_))
    }

    /// Human-readable note describing the fallback, if one applies.
    pub fn warning(&self) -> Option<String> {
        match self {
            GroupType::Known(_) => None,
            GroupType::Unknown(raw) => Some(format!(
                "Unsupported group_type '{raw}', grouped by month instead"
            )),
        }
    }
}

impl Default for GroupType {
    fn default() -> Self {
        GroupType::Known(Bucket::Month)
    }
}

impl From<Bucket> for GroupType {
    fn from(bucket: Bucket) -> Self {
        GroupType::Known(bucket)
    }
}

impl From<String> for GroupType {
    fn from(raw: String) -> Self {
        GroupType::parse(&raw)
    }
}

impl From<GroupType> for String {
    fn from(group: GroupType) -> Self {
        match group {
            GroupType::Known(bucket) => bucket.as_str().to_string(),
            GroupType::Unknown(raw) => raw,
        }
    }
}

/// One grouped row produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketTotal {
    pub label: String,
    pub total: Magnitude,
}

/// Parallel label/value sequences, ascending by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub dataset: Vec<Magnitude>,
    pub labels: Vec<String>,
}

impl AggregationResult {
    /// Shape sorted pipeline rows into the two sequences.
    pub fn from_totals(totals: Vec<BucketTotal>) -> Self {
        let (labels, dataset): (Vec<String>, Vec<Magnitude>) =
            totals.into_iter().map(|t| (t.label, t.total)).unzip();
        Self { dataset, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate `(label, total)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Magnitude)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.dataset.iter().copied())
    }
}

/// Errors that can occur in the aggregation library.
#[derive(thiserror::Error, Debug)]
pub enum BucketSumError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Aggregation engine is not initialized")]
    NotInitialized,

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(String),

    #[cfg(feature = "mongo")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// Convenience result type.
pub type BucketSumResult<T> = Result<T, BucketSumError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_bucket_labels_truncate() {
        let dt = at(2022, 9, 15, 18, 42, 7);
        assert_eq!(Bucket::Hour.label(&dt), "2022-09-15T18:00:00");
        assert_eq!(Bucket::Day.label(&dt), "2022-09-15T00:00:00");
        assert_eq!(Bucket::Month.label(&dt), "2022-09-01T00:00:00");
    }

    #[test]
    fn test_labels_sort_chronologically() {
        let a = Bucket::Hour.label(&at(2022, 9, 9, 23, 0, 0));
        let b = Bucket::Hour.label(&at(2022, 9, 10, 1, 0, 0));
        let c = Bucket::Month.label(&at(2022, 10, 3, 0, 0, 0));
        assert!(a < b);
        assert!(Bucket::Month.label(&at(2022, 9, 30, 0, 0, 0)) < c);
    }

    #[test]
    fn test_group_type_parse() {
        assert_eq!(GroupType::parse("hour"), GroupType::Known(Bucket::Hour));
        assert_eq!(GroupType::parse("day"), GroupType::Known(Bucket::Day));
        assert_eq!(GroupType::parse("month"), GroupType::Known(Bucket::Month));
        assert_eq!(
            GroupType::parse("fortnight"),
            GroupType::Unknown("fortnight".to_string())
        );
    }

    #[test]
    fn test_unknown_group_type_falls_back_to_month() {
        let group = GroupType::parse("fortnight");
        assert!(group.is_fallback());
        assert_eq!(group.resolve(), Bucket::Month);
        assert!(group.warning().unwrap().contains("fortnight"));
        assert!(GroupType::parse("day").warning().is_none());
    }

    #[test]
    fn test_group_type_serde_is_plain_string() {
        let group: GroupType = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(group, GroupType::Unknown("week".to_string()));
        let json = serde_json::to_string(&GroupType::Known(Bucket::Day)).unwrap();
        assert_eq!(json, "\"day\"");
    }

    #[test]
    fn test_result_shape() {
        let result = AggregationResult::from_totals(vec![
            BucketTotal {
                label: "2022-09-01T00:00:00".to_string(),
                total: Magnitude::Int(5),
            },
            BucketTotal {
                label: "2022-10-01T00:00:00".to_string(),
                total: Magnitude::ZERO,
            },
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.dataset, vec![5, 0]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dataset": [5, 0],
                "labels": ["2022-09-01T00:00:00", "2022-10-01T00:00:00"]
            })
        );
    }

    #[test]
    fn test_magnitude_sums() {
        assert_eq!(Magnitude::Int(3) + Magnitude::Int(4), Magnitude::Int(7));
        assert_eq!(Magnitude::Int(3) + Magnitude::Float(4.5), Magnitude::Float(7.5));
        assert_eq!(
            Magnitude::Int(i64::MAX) + Magnitude::Int(1),
            Magnitude::Float(i64::MAX as f64 + 1.0)
        );
        let total: Magnitude = [1.5, 2.25].into_iter().map(Magnitude::from).sum();
        assert_eq!(total, 3.75);
        assert!(Magnitude::Float(0.0).is_zero());
    }

    #[test]
    fn test_magnitude_serde_keeps_integers() {
        let values: Vec<Magnitude> = serde_json::from_str("[7, 2.5, -3]").unwrap();
        assert_eq!(
            values,
            vec![Magnitude::Int(7), Magnitude::Float(2.5), Magnitude::Int(-3)]
        );
        assert_eq!(serde_json::to_string(&values).unwrap(), "[7,2.5,-3]");
    }

    #[test]
    fn test_point_serde_uses_dt_field() {
        let point = TimeSeriesPoint::new(at(2022, 9, 1, 0, 0, 0), 12);
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json, serde_json::json!({"dt": "2022-09-01T00:00:00", "value": 12}));
    }
}
