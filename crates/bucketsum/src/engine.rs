//! Aggregation engine: gap-fill, then bucketed sums.
//!
//! # Writes during reads
//!
//! [`AggregationEngine::get_aggregated_data`] looks like a read but inserts
//! zero-valued points for every calendar day in the window that has no point
//! at its exact midnight. Callers that must not mutate the store call
//! [`AggregationEngine::aggregate`] directly and schedule
//! [`AggregationEngine::ensure_no_gaps`] on their own terms.
//!
//! Gap-fill works at day resolution only, whatever bucket is requested. An
//! `hour` query over a filled window is still only guaranteed one point per
//! day, not per hour.
//!
//! Two concurrent fills of the same missing day can both observe zero
//! documents and both insert, doubling that day's zero marker. Zero markers
//! do not change sums, but the count of stored documents grows. No lock is
//! taken to prevent this.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::pipeline::Pipeline;
use crate::request::AggregationRequest;
use crate::store::PointCollection;
use crate::types::{
    AggregationResult, Bucket, BucketSumError, BucketSumResult, GroupType, TimeSeriesPoint,
};
use crate::window::{format_timestamp, TimeWindow};

/// Outcome of a gap-fill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GapFillReport {
    /// Calendar days visited.
    pub days: usize,
    /// Zero-valued points inserted.
    pub inserted: usize,
}

/// Produces gap-free, time-bucketed sums from a point collection.
pub struct AggregationEngine<P> {
    collection: Option<P>,
    detached: AtomicBool,
}

impl<P: PointCollection> AggregationEngine<P> {
    /// Build an engine over a resolved collection.
    pub fn new(collection: P) -> Self {
        Self {
            collection: Some(collection),
            detached: AtomicBool::new(false),
        }
    }

    /// An engine whose store setup failed. Every operation returns
    /// [`BucketSumError::NotInitialized`].
    pub fn uninitialized() -> Self {
        Self {
            collection: None,
            detached: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.collection.is_some() && !self.detached.load(Ordering::Acquire)
    }

    /// Stop serving the collection. Later operations return
    /// [`BucketSumError::NotInitialized`]; there is no way back.
    pub fn detach(&self) {
        if !self.detached.swap(true, Ordering::AcqRel) && self.collection.is_some() {
            tracing::debug!("Aggregation engine detached from its collection");
        }
    }

    pub fn collection(&self) -> BucketSumResult<&P> {
        if self.detached.load(Ordering::Acquire) {
            return Err(BucketSumError::NotInitialized);
        }
        self.collection.as_ref().ok_or(BucketSumError::NotInitialized)
    }

    /// Insert `{dt: midnight, value: 0}` for each day of the window with no
    /// point at exactly midnight. Idempotent.
    pub async fn ensure_no_gaps(&self, window: &TimeWindow) -> BucketSumResult<GapFillReport> {
        let collection = self.collection()?;
        let mut report = GapFillReport::default();

        for midnight in window.days() {
            report.days += 1;
            if collection.count_at(midnight).await? == 0 {
                collection.insert_point(&TimeSeriesPoint::zero(midnight)).await?;
                report.inserted += 1;
                tracing::debug!(
                    "Filled gap at {} in {}",
                    format_timestamp(&midnight),
                    collection.namespace()
                );
            }
        }

        if report.inserted > 0 {
            tracing::info!(
                "Gap-fill over {window}: {} of {} days filled",
                report.inserted,
                report.days
            );
        }

        Ok(report)
    }

    /// Run range match, bucket-and-sum and sort. Read-only.
    pub async fn aggregate(
        &self,
        window: &TimeWindow,
        bucket: Bucket,
    ) -> BucketSumResult<AggregationResult> {
        let collection = self.collection()?;
        let pipeline = Pipeline::new(*window, bucket);
        tracing::debug!("Executing pipeline on {}: {pipeline}", collection.namespace());

        let totals = collection.aggregate(&pipeline).await?;
        Ok(AggregationResult::from_totals(totals))
    }

    /// Parse the bounds, fill gaps, then aggregate.
    ///
    /// Malformed bounds fail with [`BucketSumError::InvalidRange`] before
    /// anything is written.
    pub async fn get_aggregated_data(
        &self,
        dt_from: &str,
        dt_upto: &str,
        group_type: &GroupType,
    ) -> BucketSumResult<AggregationResult> {
        self.collection()?;
        let window = TimeWindow::parse(dt_from, dt_upto)?;
        let bucket = group_type.resolve();

        self.ensure_no_gaps(&window).await?;
        let result = self.aggregate(&window, bucket).await?;

        tracing::info!(
            "Aggregated {window} by {bucket}: {} buckets",
            result.len()
        );
        Ok(result)
    }

    /// [`Self::get_aggregated_data`] for a parsed request.
    pub async fn run(&self, request: &AggregationRequest) -> BucketSumResult<AggregationResult> {
        self.get_aggregated_data(&request.dt_from, &request.dt_upto, &request.group_type)
            .await
    }
}
