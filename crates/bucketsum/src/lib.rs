//! bucketsum: gap-free, time-bucketed sums over a document store.

pub mod engine;
pub mod pipeline;
pub mod request;
pub mod store;
pub mod types;
pub mod window;

pub use engine::{AggregationEngine, GapFillReport};
pub use pipeline::{Pipeline, Stage};
pub use request::AggregationRequest;
pub use store::{
    DatabaseHandle, MemoryCollection, MemoryStore, PointCollection, StoreAdapter,
    StoreCollection, StoreConnection,
};
#[cfg(feature = "mongo")]
pub use store::{MongoCollection, MongoStore};
pub use types::*;
pub use window::{parse_timestamp, TimeWindow};
