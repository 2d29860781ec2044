//! Session management for the aggregation engine.

pub mod manager;

pub use manager::{AggregationSession, SessionStatus};
