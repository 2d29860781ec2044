//! Store connection lifecycle and the engine it feeds.

use serde::Serialize;
use tokio::sync::Mutex;

use bucketsum::{AggregationEngine, MemoryStore, StoreAdapter, StoreCollection, StoreConnection};
#[cfg(feature = "mongo")]
use bucketsum::MongoStore;

use crate::config::ServerConfig;
use crate::types::{McpError, McpResult};

/// The connection kept open for the engine's lifetime.
enum Backend {
    Memory(MemoryStore),
    #[cfg(feature = "mongo")]
    Mongo(MongoStore),
}

impl Backend {
    async fn close(self) {
        match self {
            Backend::Memory(store) => store.close().await,
            #[cfg(feature = "mongo")]
            Backend::Mongo(store) => store.close().await,
        }
    }
}

/// Snapshot of what the session is connected to.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owns the aggregation engine and the connection behind it.
///
/// A session whose store setup failed still exists: its engine is detached
/// and every call reports `NotInitialized`, so a long-running front-end
/// keeps answering instead of dying at startup.
pub struct AggregationSession {
    engine: AggregationEngine<StoreCollection>,
    config: ServerConfig,
    backend: Mutex<Option<Backend>>,
    endpoint: Option<String>,
    setup_error: Option<String>,
}

impl AggregationSession {
    /// Connect to the configured MongoDB collection, or come up detached.
    pub async fn connect(config: ServerConfig) -> Self {
        match Self::try_connect(config.clone()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Store setup failed: {e}");
                Self::detached(config, e.to_string())
            }
        }
    }

    /// Connect to the configured MongoDB collection.
    #[cfg(feature = "mongo")]
    pub async fn try_connect(config: ServerConfig) -> McpResult<Self> {
        let store = MongoStore::connect(
            &config.mongo_host,
            config.mongo_port,
            config.connect_timeout(),
        )
        .await?;
        let endpoint = store.endpoint();
        let adapter =
            StoreAdapter::open(store, &config.database_name, &config.collection_name).await?;
        let (store, collection) = adapter.into_parts();

        tracing::info!("Aggregating over {} at {endpoint}", config.namespace());

        Ok(Self {
            engine: AggregationEngine::new(StoreCollection::from(collection)),
            config,
            backend: Mutex::new(Some(Backend::Mongo(store))),
            endpoint: Some(endpoint),
            setup_error: None,
        })
    }

    #[cfg(not(feature = "mongo"))]
    pub async fn try_connect(_config: ServerConfig) -> McpResult<Self> {
        Err(McpError::StoreConnection(
            "built without MongoDB support; run with --memory".to_string(),
        ))
    }

    /// Serve the configured collection out of an in-process store.
    pub async fn open_memory(store: MemoryStore, config: ServerConfig) -> McpResult<Self> {
        let endpoint = store.endpoint();
        let adapter =
            StoreAdapter::open(store, &config.database_name, &config.collection_name).await?;
        let (store, collection) = adapter.into_parts();

        tracing::info!("Aggregating over in-memory {}", config.namespace());

        Ok(Self {
            engine: AggregationEngine::new(StoreCollection::from(collection)),
            config,
            backend: Mutex::new(Some(Backend::Memory(store))),
            endpoint: Some(endpoint),
            setup_error: None,
        })
    }

    /// A session with no store behind it.
    pub fn detached(config: ServerConfig, reason: impl Into<String>) -> Self {
        Self {
            engine: AggregationEngine::uninitialized(),
            config,
            backend: Mutex::new(None),
            endpoint: None,
            setup_error: Some(reason.into()),
        }
    }

    pub fn engine(&self) -> &AggregationEngine<StoreCollection> {
        &self.engine
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            initialized: self.engine.is_initialized(),
            endpoint: self.endpoint.clone(),
            namespace: self.config.namespace(),
            error: self.setup_error.clone(),
        }
    }

    /// Detach the engine and release the connection. Every later call
    /// reports `NotInitialized`. Closing twice is [`McpError::SessionClosed`].
    pub async fn close(&self) -> McpResult<()> {
        self.engine.detach();
        let backend = self.backend.lock().await.take();
        match backend {
            Some(backend) => {
                backend.close().await;
                tracing::info!("Store connection released");
                Ok(())
            }
            None if self.endpoint.is_some() => Err(McpError::SessionClosed),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> ServerConfig {
        ServerConfig {
            database_name: "db".to_string(),
            collection_name: "points".to_string(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = MemoryStore::new();
        store.create_collection("db", "points").unwrap();

        let session = AggregationSession::open_memory(store.clone(), memory_config())
            .await
            .unwrap();
        let status = session.status();
        assert!(status.initialized);
        assert_eq!(status.endpoint.as_deref(), Some("memory"));
        assert_eq!(status.namespace, "db.points");

        session.close().await.unwrap();
        assert!(store.is_closed());
        assert!(matches!(session.close().await, Err(McpError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_close_detaches_engine() {
        let store = MemoryStore::new();
        store.create_collection("db", "points").unwrap();
        let session = AggregationSession::open_memory(store.clone(), memory_config())
            .await
            .unwrap();

        session.close().await.unwrap();
        assert!(!session.engine().is_initialized());
        assert!(!session.status().initialized);
        let err = session
            .engine()
            .get_aggregated_data(
                "2022-09-01T00:00:00",
                "2022-09-30T23:59:59",
                &bucketsum::GroupType::parse("day"),
            )
            .await
            .unwrap_err();
        assert!(matches!(McpError::from(err), McpError::NotInitialized));
        assert_eq!(store.count("db", "points").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_memory_missing_collection() {
        let store = MemoryStore::new();
        store.create_collection("db", "other").unwrap();

        let err = AggregationSession::open_memory(store.clone(), memory_config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::StoreNotFound(_)));
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_detached_reports_reason() {
        let session = AggregationSession::detached(memory_config(), "mongo down");
        let status = session.status();
        assert!(!status.initialized);
        assert_eq!(status.error.as_deref(), Some("mongo down"));
        assert!(session.close().await.is_ok());
    }
}
