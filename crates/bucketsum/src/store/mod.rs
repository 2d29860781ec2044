//! Store adapter: connectivity, name resolution and the collection seam.
//!
//! A [`StoreConnection`] lists databases and collections and hands out
//! [`PointCollection`] handles. [`StoreAdapter::open`] resolves the target
//! database and collection by name and fails fast when either is missing,
//! closing the connection before the error propagates.

pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

use chrono::{DateTime, Utc};

use crate::pipeline::Pipeline;
use crate::types::{BucketSumError, BucketSumResult, BucketTotal, TimeSeriesPoint};

pub use memory::{MemoryCollection, MemoryStore};
#[cfg(feature = "mongo")]
pub use mongo::{MongoCollection, MongoStore};

/// An open connection to a document store.
#[allow(async_fn_in_trait)]
pub trait StoreConnection {
    type Collection: PointCollection;

    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;

    async fn list_database_names(&self) -> BucketSumResult<Vec<String>>;

    async fn list_collection_names(&self, database: &str) -> BucketSumResult<Vec<String>>;

    /// Build a handle without checking existence.
    fn collection(&self, database: &str, collection: &str) -> Self::Collection;

    /// Release the connection.
    async fn close(self);
}

/// A collection of `{dt, value}` documents.
#[allow(async_fn_in_trait)]
pub trait PointCollection {
    /// `database.collection`, for logs.
    fn namespace(&self) -> String;

    /// Count documents whose `dt` equals `dt` exactly.
    async fn count_at(&self, dt: DateTime<Utc>) -> BucketSumResult<u64>;

    async fn insert_point(&self, point: &TimeSeriesPoint) -> BucketSumResult<()>;

    /// Execute the pipeline; rows come back sorted ascending by label.
    async fn aggregate(&self, pipeline: &Pipeline) -> BucketSumResult<Vec<BucketTotal>>;
}

/// A database confirmed to exist on a connection.
pub struct DatabaseHandle<'a, C> {
    connection: &'a C,
    name: String,
}

impl<'a, C: StoreConnection> DatabaseHandle<'a, C> {
    /// Resolve `name` against the connection's databases.
    pub async fn resolve(connection: &'a C, name: &str) -> BucketSumResult<Self> {
        let databases = connection.list_database_names().await?;
        if !databases.iter().any(|db| db == name) {
            return Err(BucketSumError::NotFound(format!(
                "couldn't find {name} database"
            )));
        }
        Ok(Self {
            connection,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `name` against this database's collections.
    pub async fn resolve_collection(&self, name: &str) -> BucketSumResult<C::Collection> {
        let collections = self.connection.list_collection_names(&self.name).await?;
        if !collections.iter().any(|c| c == name) {
            return Err(BucketSumError::NotFound(format!(
                "couldn't find {name} collection in {}",
                self.name
            )));
        }
        Ok(self.connection.collection(&self.name, name))
    }
}

/// A connection together with its resolved target collection.
pub struct StoreAdapter<C: StoreConnection> {
    connection: C,
    collection: C::Collection,
}

impl<C: StoreConnection> StoreAdapter<C> {
    /// Resolve `database`/`collection` on an open connection.
    ///
    /// On failure the connection is closed before the error is returned.
    pub async fn open(connection: C, database: &str, collection: &str) -> BucketSumResult<Self> {
        let resolved = match DatabaseHandle::resolve(&connection, database).await {
            Ok(db) => db.resolve_collection(collection).await,
            Err(e) => Err(e),
        };

        match resolved {
            Ok(collection) => {
                tracing::info!(
                    endpoint = %connection.endpoint(),
                    namespace = %collection.namespace(),
                    "Store adapter ready"
                );
                Ok(Self {
                    connection,
                    collection,
                })
            }
            Err(e) => {
                tracing::error!(endpoint = %connection.endpoint(), "Store setup failed: {e}");
                connection.close().await;
                Err(e)
            }
        }
    }

    pub fn collection(&self) -> &C::Collection {
        &self.collection
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Split into the connection and the collection handle.
    pub fn into_parts(self) -> (C, C::Collection) {
        (self.connection, self.collection)
    }

    pub async fn close(self) {
        self.connection.close().await;
    }
}

/// Any supported backend's collection, for callers that pick one at runtime.
#[derive(Clone)]
pub enum StoreCollection {
    Memory(MemoryCollection),
    #[cfg(feature = "mongo")]
    Mongo(MongoCollection),
}

impl From<MemoryCollection> for StoreCollection {
    fn from(collection: MemoryCollection) -> Self {
        StoreCollection::Memory(collection)
    }
}

#[cfg(feature = "mongo")]
impl From<MongoCollection> for StoreCollection {
    fn from(collection: MongoCollection) -> Self {
        StoreCollection::Mongo(collection)
    }
}

impl PointCollection for StoreCollection {
    fn namespace(&self) -> String {
        match self {
            StoreCollection::Memory(c) => c.namespace(),
            #[cfg(feature = "mongo")]
            StoreCollection::Mongo(c) => c.namespace(),
        }
    }

    async fn count_at(&self, dt: DateTime<Utc>) -> BucketSumResult<u64> {
        match self {
            StoreCollection::Memory(c) => c.count_at(dt).await,
            #[cfg(feature = "mongo")]
            StoreCollection::Mongo(c) => c.count_at(dt).await,
        }
    }

    async fn insert_point(&self, point: &TimeSeriesPoint) -> BucketSumResult<()> {
        match self {
            StoreCollection::Memory(c) => c.insert_point(point).await,
            #[cfg(feature = "mongo")]
            StoreCollection::Mongo(c) => c.insert_point(point).await,
        }
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> BucketSumResult<Vec<BucketTotal>> {
        match self {
            StoreCollection::Memory(c) => c.aggregate(pipeline).await,
            #[cfg(feature = "mongo")]
            StoreCollection::Mongo(c) => c.aggregate(pipeline).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection("db", "sample_collection").unwrap();
        store
    }

    #[tokio::test]
    async fn test_open_resolves_existing_collection() {
        let store = seeded();
        let adapter = StoreAdapter::open(store.clone(), "db", "sample_collection")
            .await
            .unwrap();
        assert_eq!(adapter.collection().namespace(), "db.sample_collection");
        assert!(!store.is_closed());
    }

    #[tokio::test]
    async fn test_missing_database_is_not_found_and_closes() {
        let store = seeded();
        let err = StoreAdapter::open(store.clone(), "nope", "sample_collection")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BucketSumError::NotFound(ref m) if m.contains("nope database")));
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found_and_closes() {
        let store = seeded();
        let err = StoreAdapter::open(store.clone(), "db", "salaries")
            .await
            .err()
            .unwrap();
        assert!(
            matches!(err, BucketSumError::NotFound(ref m) if m.contains("salaries collection in db"))
        );
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_database_handle_resolution() {
        let store = seeded();
        let db = DatabaseHandle::resolve(&store, "db").await.unwrap();
        assert_eq!(db.name(), "db");
        assert!(db.resolve_collection("sample_collection").await.is_ok());
        assert!(matches!(
            db.resolve_collection("other").await,
            Err(BucketSumError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_store_collection_delegates() {
        let store = seeded();
        let adapter = StoreAdapter::open(store.clone(), "db", "sample_collection")
            .await
            .unwrap();
        let (_, collection) = adapter.into_parts();
        let any: StoreCollection = collection.into();
        let dt = crate::window::parse_timestamp("2022-09-01T00:00:00").unwrap();
        any.insert_point(&TimeSeriesPoint::zero(dt)).await.unwrap();
        assert_eq!(any.count_at(dt).await.unwrap(), 1);
        assert_eq!(store.count("db", "sample_collection").unwrap(), 1);
    }
}
