//! In-process document store.
//!
//! Holds databases of collections of points behind a shared lock. Clones
//! share the same data, so a seeded store can be handed to the adapter and
//! still be inspected afterwards.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::pipeline::Pipeline;
use crate::types::{BucketSumError, BucketSumResult, BucketTotal, TimeSeriesPoint};

use super::{PointCollection, StoreConnection};

type Databases = BTreeMap<String, BTreeMap<String, Vec<TimeSeriesPoint>>>;

/// Shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    databases: Arc<RwLock<Databases>>,
    closed: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection, and its database if needed.
    pub fn create_collection(&self, database: &str, collection: &str) -> BucketSumResult<()> {
        self.write()?
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    /// Append points, creating the collection if needed.
    pub fn insert_many(
        &self,
        database: &str,
        collection: &str,
        points: impl IntoIterator<Item = TimeSeriesPoint>,
    ) -> BucketSumResult<usize> {
        let mut databases = self.write()?;
        let target = databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        let before = target.len();
        target.extend(points);
        Ok(target.len() - before)
    }

    /// Load a JSON array of `{dt, value}` documents into a collection.
    pub fn seed_from_file(
        &self,
        database: &str,
        collection: &str,
        path: &Path,
    ) -> BucketSumResult<usize> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BucketSumError::Store(format!("Failed to read seed file {}: {e}", path.display()))
        })?;
        let points: Vec<TimeSeriesPoint> = serde_json::from_str(&raw).map_err(|e| {
            BucketSumError::Store(format!("Invalid seed file {}: {e}", path.display()))
        })?;
        let inserted = self.insert_many(database, collection, points)?;
        tracing::info!(
            "Seeded {inserted} points into {database}.{collection} from {}",
            path.display()
        );
        Ok(inserted)
    }

    /// Snapshot of a collection's points in insertion order.
    pub fn points(&self, database: &str, collection: &str) -> BucketSumResult<Vec<TimeSeriesPoint>> {
        let databases = self.read()?;
        lookup(&databases, database, collection).map(|points| points.to_vec())
    }

    pub fn count(&self, database: &str, collection: &str) -> BucketSumResult<usize> {
        let databases = self.read()?;
        lookup(&databases, database, collection).map(|points| points.len())
    }

    /// Whether [`StoreConnection::close`] has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn read(&self) -> BucketSumResult<RwLockReadGuard<'_, Databases>> {
        self.databases
            .read()
            .map_err(|_| BucketSumError::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> BucketSumResult<RwLockWriteGuard<'_, Databases>> {
        self.databases
            .write()
            .map_err(|_| BucketSumError::Store("memory store lock poisoned".to_string()))
    }
}

fn lookup<'a>(
    databases: &'a Databases,
    database: &str,
    collection: &str,
) -> BucketSumResult<&'a Vec<TimeSeriesPoint>> {
    databases
        .get(database)
        .and_then(|collections| collections.get(collection))
        .ok_or_else(|| BucketSumError::NotFound(format!("{database}.{collection}")))
}

impl StoreConnection for MemoryStore {
    type Collection = MemoryCollection;

    fn endpoint(&self) -> String {
        "memory".to_string()
    }

    async fn list_database_names(&self) -> BucketSumResult<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn list_collection_names(&self, database: &str) -> BucketSumResult<Vec<String>> {
        Ok(self
            .read()?
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn collection(&self, database: &str, collection: &str) -> MemoryCollection {
        MemoryCollection {
            store: self.clone(),
            database: database.to_string(),
            name: collection.to_string(),
        }
    }

    async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!("Memory store closed");
    }
}

/// Handle to one collection of a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    store: MemoryStore,
    database: String,
    name: String,
}

impl PointCollection for MemoryCollection {
    fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    async fn count_at(&self, dt: DateTime<Utc>) -> BucketSumResult<u64> {
        let databases = self.store.read()?;
        let points = lookup(&databases, &self.database, &self.name)?;
        Ok(points.iter().filter(|p| p.dt == dt).count() as u64)
    }

    async fn insert_point(&self, point: &TimeSeriesPoint) -> BucketSumResult<()> {
        let mut databases = self.store.write()?;
        databases
            .get_mut(&self.database)
            .and_then(|collections| collections.get_mut(&self.name))
            .ok_or_else(|| BucketSumError::NotFound(self.namespace()))?
            .push(point.clone());
        Ok(())
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> BucketSumResult<Vec<BucketTotal>> {
        let databases = self.store.read()?;
        let points = lookup(&databases, &self.database, &self.name)?;
        Ok(pipeline.evaluate(points))
    }
}
