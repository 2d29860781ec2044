//! MongoDB backend.
//!
//! Documents are stored as `{dt: <date>, value: <number>}`; both field names
//! are read and written here and nowhere else.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::{ClientOptions, ServerAddress};
use mongodb::{Client, Collection};

use crate::pipeline::{Pipeline, Stage};
use crate::types::{BucketSumError, BucketSumResult, BucketTotal, Magnitude, TimeSeriesPoint};

use super::{PointCollection, StoreConnection};

const TIMESTAMP_FIELD: &str = "dt";
const VALUE_FIELD: &str = "value";
const TIMESTAMP_REF: &str = "$dt";
const VALUE_REF: &str = "$value";

/// Output field holding the per-bucket sum.
const TOTAL_FIELD: &str = "total";

/// A verified connection to a MongoDB deployment.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    host: String,
    port: u16,
}

impl MongoStore {
    /// Connect and prove the endpoint answers within `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> BucketSumResult<Self> {
        let options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: host.to_string(),
                port: Some(port),
            }])
            .app_name("bucketsum".to_string())
            .connect_timeout(timeout)
            .server_selection_timeout(timeout)
            .build();

        let client = Client::with_options(options).map_err(|e| {
            BucketSumError::Connection(format!("failed to connect to ({host}:{port}): {e}"))
        })?;

        if let Err(e) = client.database("admin").run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(BucketSumError::Connection(format!(
                "failed to connect to ({host}:{port}): {e}"
            )));
        }

        tracing::info!("Connected to MongoDB at {host}:{port}");

        Ok(Self {
            client,
            host: host.to_string(),
            port,
        })
    }
}

impl StoreConnection for MongoStore {
    type Collection = MongoCollection;

    fn endpoint(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }

    async fn list_database_names(&self) -> BucketSumResult<Vec<String>> {
        Ok(self.client.list_database_names().await?)
    }

    async fn list_collection_names(&self, database: &str) -> BucketSumResult<Vec<String>> {
        Ok(self.client.database(database).list_collection_names().await?)
    }

    fn collection(&self, database: &str, collection: &str) -> MongoCollection {
        MongoCollection {
            inner: self.client.database(database).collection::<Document>(collection),
            namespace: format!("{database}.{collection}"),
        }
    }

    async fn close(self) {
        self.client.shutdown().await;
        tracing::debug!("MongoDB connection to {}:{} closed", self.host, self.port);
    }
}

/// Handle to a MongoDB collection of points.
#[derive(Clone)]
pub struct MongoCollection {
    inner: Collection<Document>,
    namespace: String,
}

impl PointCollection for MongoCollection {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn count_at(&self, dt: DateTime<Utc>) -> BucketSumResult<u64> {
        let mut filter = Document::new();
        filter.insert(TIMESTAMP_FIELD, to_bson_datetime(&dt));
        Ok(self.inner.count_documents(filter).await?)
    }

    async fn insert_point(&self, point: &TimeSeriesPoint) -> BucketSumResult<()> {
        let mut document = Document::new();
        document.insert(TIMESTAMP_FIELD, to_bson_datetime(&point.dt));
        let value = match point.value {
            Magnitude::Int(v) => Bson::Int64(v),
            Magnitude::Float(v) => Bson::Double(v),
        };
        document.insert(VALUE_FIELD, value);
        self.inner.insert_one(document).await?;
        Ok(())
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> BucketSumResult<Vec<BucketTotal>> {
        let stages: Vec<Document> = pipeline.stages().iter().map(stage_document).collect();
        let mut cursor = self.inner.aggregate(stages).await?;

        let mut totals = Vec::new();
        while cursor.advance().await? {
            let row = cursor.deserialize_current()?;
            totals.push(parse_row(&row)?);
        }
        Ok(totals)
    }
}

fn to_bson_datetime(dt: &DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Translate one pipeline stage into its aggregation document.
fn stage_document(stage: &Stage) -> Document {
    match stage {
        Stage::Match(window) => {
            let mut range = Document::new();
            range.insert("$gte", to_bson_datetime(&window.from));
            range.insert("$lte", to_bson_datetime(&window.to));
            let mut filter = Document::new();
            filter.insert(TIMESTAMP_FIELD, range);
            doc! { "$match": filter }
        }
        Stage::Group(bucket) => {
            let mut group = doc! {
                "_id": {
                    "$dateToString": {
                        "format": bucket.label_format(),
                        "date": TIMESTAMP_REF
                    }
                }
            };
            group.insert(TOTAL_FIELD, doc! { "$sum": VALUE_REF });
            doc! { "$group": group }
        }
        Stage::SortAscending => doc! { "$sort": { "_id": 1 } },
    }
}

fn parse_row(row: &Document) -> BucketSumResult<BucketTotal> {
    let label = row
        .get_str("_id")
        .map_err(|e| BucketSumError::Store(format!("Unexpected group key in {row}: {e}")))?
        .to_string();

    let total = match row.get(TOTAL_FIELD) {
        Some(Bson::Int32(v)) => Magnitude::from(*v),
        Some(Bson::Int64(v)) => Magnitude::from(*v),
        Some(Bson::Double(v)) => Magnitude::from(*v),
        other => {
            return Err(BucketSumError::Store(format!(
                "Unexpected sum for bucket {label}: {other:?}"
            )));
        }
    };

    Ok(BucketTotal { label, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bucket;
    use crate::window::TimeWindow;

    #[test]
    fn test_stage_documents() {
        let window = TimeWindow::parse("2022-09-01T00:00:00", "2022-12-31T23:59:00").unwrap();
        let stages: Vec<Document> = Pipeline::new(window, Bucket::Month)
            .stages()
            .iter()
            .map(stage_document)
            .collect();

        assert_eq!(stages.len(), 3);

        let range = stages[0]
            .get_document("$match")
            .unwrap()
            .get_document("dt")
            .unwrap();
        assert_eq!(
            range.get_datetime("$gte").unwrap().timestamp_millis(),
            window.from.timestamp_millis()
        );
        assert_eq!(
            range.get_datetime("$lte").unwrap().timestamp_millis(),
            window.to.timestamp_millis()
        );

        let group = stages[1].get_document("$group").unwrap();
        let key = group
            .get_document("_id")
            .unwrap()
            .get_document("$dateToString")
            .unwrap();
        assert_eq!(key.get_str("format").unwrap(), "%Y-%m-01T00:00:00");
        assert_eq!(key.get_str("date").unwrap(), "$dt");
        assert_eq!(
            group.get_document("total").unwrap().get_str("$sum").unwrap(),
            "$value"
        );

        assert_eq!(
            stages[2].get_document("$sort").unwrap().get_i32("_id").unwrap(),
            1
        );
    }

    #[test]
    fn test_parse_row_numeric_kinds() {
        for total in [Bson::Int32(7), Bson::Int64(7)] {
            let row = doc! { "_id": "2022-09-15T00:00:00", "total": total };
            let parsed = parse_row(&row).unwrap();
            assert_eq!(parsed.label, "2022-09-15T00:00:00");
            assert_eq!(parsed.total, 7);
        }
    }

    #[test]
    fn test_parse_row_keeps_fractional_sums() {
        let row = doc! { "_id": "2022-09-15T00:00:00", "total": 7.5 };
        assert_eq!(parse_row(&row).unwrap().total, 7.5);

        let row = doc! { "_id": "2022-09-15T00:00:00", "total": 7.0 };
        assert_eq!(parse_row(&row).unwrap().total, Magnitude::Float(7.0));
    }

    #[test]
    fn test_parse_row_rejects_garbage() {
        assert!(parse_row(&doc! { "_id": 1, "total": 2 }).is_err());
        assert!(parse_row(&doc! { "_id": "x", "total": "two" }).is_err());
    }
}
