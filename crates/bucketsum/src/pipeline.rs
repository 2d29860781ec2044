//! The three-stage grouping pipeline: range match, bucket group-and-sum, sort.
//!
//! A [`Pipeline`] is backend-neutral. The in-memory store evaluates it
//! directly; the MongoDB store translates each [`Stage`] into an aggregation
//! stage document.

use std::collections::BTreeMap;

use crate::types::{Bucket, BucketTotal, Magnitude, TimeSeriesPoint};
use crate::window::TimeWindow;

/// One step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Keep points with `window.from <= dt <= window.to`.
    Match(TimeWindow),
    /// Group by bucket-start label and sum `value`.
    Group(Bucket),
    /// Order groups ascending by label.
    SortAscending,
}

/// Range match, then bucket and sum, then sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    pub window: TimeWindow,
    pub bucket: Bucket,
}

impl Pipeline {
    pub fn new(window: TimeWindow, bucket: Bucket) -> Self {
        Self { window, bucket }
    }

    pub fn stages(&self) -> [Stage; 3] {
        [
            Stage::Match(self.window),
            Stage::Group(self.bucket),
            Stage::SortAscending,
        ]
    }

    /// Run the pipeline over points held in process.
    pub fn evaluate<'a, I>(&self, points: I) -> Vec<BucketTotal>
    where
        I: IntoIterator<Item = &'a TimeSeriesPoint>,
    {
        let matched = points
            .into_iter()
            .filter(|p| self.window.contains(&p.dt));

        // BTreeMap keeps keys sorted, which covers the sort stage.
        let mut groups: BTreeMap<String, Magnitude> = BTreeMap::new();
        for point in matched {
            *groups.entry(self.bucket.label(&point.dt)).or_default() += point.value;
        }

        groups
            .into_iter()
            .map(|(label, total)| BucketTotal { label, total })
            .collect()
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "match {} -> group by {} -> sort", self.window, self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::parse_timestamp;

    fn point(dt: &str, value: impl Into<Magnitude>) -> TimeSeriesPoint {
        TimeSeriesPoint::new(parse_timestamp(dt).unwrap(), value)
    }

    fn window(from: &str, to: &str) -> TimeWindow {
        TimeWindow::parse(from, to).unwrap()
    }

    #[test]
    fn test_stage_order() {
        let w = window("2022-09-01T00:00:00", "2022-09-30T23:59:00");
        let pipeline = Pipeline::new(w, Bucket::Day);
        assert_eq!(
            pipeline.stages(),
            [
                Stage::Match(w),
                Stage::Group(Bucket::Day),
                Stage::SortAscending
            ]
        );
    }

    #[test]
    fn test_same_bucket_points_sum() {
        let points = vec![
            point("2022-09-15T05:00:00", 3),
            point("2022-09-15T18:00:00", 4),
        ];
        let pipeline = Pipeline::new(
            window("2022-09-15T00:00:00", "2022-09-15T23:59:59"),
            Bucket::Day,
        );
        let totals = pipeline.evaluate(&points);
        assert_eq!(
            totals,
            vec![BucketTotal {
                label: "2022-09-15T00:00:00".to_string(),
                total: Magnitude::Int(7)
            }]
        );
    }

    #[test]
    fn test_fractional_values_sum() {
        let points = vec![
            point("2022-09-15T05:00:00", 1.5),
            point("2022-09-15T18:00:00", 2.25),
            point("2022-09-15T19:00:00", 1),
        ];
        let pipeline = Pipeline::new(
            window("2022-09-15T00:00:00", "2022-09-15T23:59:59"),
            Bucket::Day,
        );
        let totals = pipeline.evaluate(&points);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total, 4.75);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let points = vec![
            point("2022-08-31T23:59:59", 100),
            point("2022-09-01T00:00:00", 1),
            point("2022-09-01T12:00:00", 2),
            point("2022-09-02T00:00:00", 4),
            point("2022-09-02T00:00:01", 100),
        ];
        let pipeline = Pipeline::new(
            window("2022-09-01T00:00:00", "2022-09-02T00:00:00"),
            Bucket::Month,
        );
        let totals = pipeline.evaluate(&points);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total, 7);
    }

    #[test]
    fn test_groups_sorted_regardless_of_input_order() {
        let points = vec![
            point("2022-12-05T00:00:00", 1),
            point("2022-10-05T00:00:00", 2),
            point("2022-11-05T00:00:00", 3),
        ];
        let pipeline = Pipeline::new(
            window("2022-09-01T00:00:00", "2022-12-31T23:59:00"),
            Bucket::Month,
        );
        let labels: Vec<_> = pipeline
            .evaluate(&points)
            .into_iter()
            .map(|t| t.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "2022-10-01T00:00:00",
                "2022-11-01T00:00:00",
                "2022-12-01T00:00:00"
            ]
        );
    }

    #[test]
    fn test_hour_buckets() {
        let points = vec![
            point("2022-02-01T00:10:00", 1),
            point("2022-02-01T00:50:00", 1),
            point("2022-02-01T02:00:00", 5),
        ];
        let pipeline = Pipeline::new(
            window("2022-02-01T00:00:00", "2022-02-02T00:00:00"),
            Bucket::Hour,
        );
        let totals = pipeline.evaluate(&points);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].label, "2022-02-01T00:00:00");
        assert_eq!(totals[0].total, 2);
        assert_eq!(totals[1].label, "2022-02-01T02:00:00");
        assert_eq!(totals[1].total, 5);
    }

    #[test]
    fn test_no_points_no_groups() {
        let pipeline = Pipeline::new(
            window("2022-09-01T00:00:00", "2022-09-30T23:59:00"),
            Bucket::Day,
        );
        assert!(pipeline.evaluate(&Vec::<TimeSeriesPoint>::new()).is_empty());
    }
}
