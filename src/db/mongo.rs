//! MongoDB client and collection wrapper
//!
//! Thin layer over the driver: connect and ping, inspect and create
//! collections, apply an index catalog, and a typed collection handle that
//! validates documents before they are written.

use std::fmt;
use std::time::Duration;

use bson::{doc, oid::ObjectId, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::ErrorKind,
    options::{ClientOptions, ValidationAction, ValidationLevel},
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::config::redact_uri;
use crate::db::indexes::IndexCatalog;
use crate::db::schemas::{CollectionSchema, Timestamped};
use crate::types::error::server_code;
use crate::types::{RentalsError, Result};

/// Server code returned when a collection already exists
const NAMESPACE_EXISTS: i32 = 48;

/// Fail fast on unreachable servers instead of the driver's 30s default
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Parse a connection string into driver options
///
/// Timeouts the URI leaves unset get the 3s default; ones it sets are kept.
pub async fn client_options(uri: &str) -> Result<ClientOptions> {
    let mut options = ClientOptions::parse(uri).await.map_err(|e| {
        if matches!(e.kind.as_ref(), ErrorKind::InvalidArgument { .. }) {
            RentalsError::Config(format!("Invalid MONGODB_URI '{}': {}", redact_uri(uri), e))
        } else {
            RentalsError::Connection(format!("Failed to resolve MongoDB URI: {}", e))
        }
    })?;
    apply_default_timeouts(&mut options);
    Ok(options)
}

fn apply_default_timeouts(options: &mut ClientOptions) {
    options.server_selection_timeout.get_or_insert(DEFAULT_TIMEOUT);
    options.connect_timeout.get_or_insert(DEFAULT_TIMEOUT);
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the server answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", redact_uri(uri));
        let options = client_options(uri).await?;
        Self::with_options(options, db_name).await
    }

    /// Connect with already parsed options
    pub async fn with_options(options: ClientOptions, db_name: &str) -> Result<Self> {
        let client = Client::with_options(options)
            .map_err(|e| RentalsError::Connection(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| RentalsError::Connection(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    pub fn database(&self) -> Database {
        self.client.database(&self.db_name)
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        let names = self
            .database()
            .list_collection_names()
            .filter(doc! { "name": name })
            .await?;
        Ok(names.iter().any(|n| n == name))
    }

    /// Create a collection guarded by a `$jsonSchema` validator
    ///
    /// Returns `false` if the collection already existed, which happens when
    /// another migration created it first.
    pub async fn create_collection_with_validator(
        &self,
        name: &str,
        validator: Document,
    ) -> Result<bool> {
        let created = self
            .database()
            .create_collection(name)
            .validator(validator)
            .validation_level(ValidationLevel::Strict)
            .validation_action(ValidationAction::Error)
            .await;

        match created {
            Ok(()) => Ok(true),
            Err(e) if server_code(&e) == Some(NAMESPACE_EXISTS) => {
                debug!("Collection '{}' appeared concurrently", name);
                Ok(false)
            }
            Err(e) => Err(creation_failure(name, RentalsError::from(e))),
        }
    }

    /// Apply every index in the catalog, highest priority first
    ///
    /// Each index is its own createIndexes command keyed by name: an existing
    /// identical index is left alone, and an existing name with different
    /// options stops the run with an IndexConflict. Indexes applied before
    /// the failure stay in place.
    pub async fn apply_indexes(&self, name: &str, catalog: &IndexCatalog) -> Result<Vec<String>> {
        let collection = self.database().collection::<Document>(name);
        let mut applied = Vec::with_capacity(catalog.len());

        for spec in catalog.by_priority() {
            match collection.create_index(spec.to_index_model()).await {
                Ok(result) => {
                    debug!("Applied index '{}' to '{}'", result.index_name, name);
                    applied.push(result.index_name);
                }
                Err(e) => {
                    warn!(
                        "Stopped at index '{}' on '{}'; already applied: {:?}",
                        spec.name, name, applied
                    );
                    return Err(index_failure(spec.name, RentalsError::from(e)));
                }
            }
        }

        Ok(applied)
    }

    /// Indexes currently present on a collection
    pub async fn list_indexes(&self, name: &str) -> Result<Vec<IndexSummary>> {
        let models: Vec<IndexModel> = self
            .database()
            .collection::<Document>(name)
            .list_indexes()
            .await?
            .try_collect()
            .await?;

        Ok(models.into_iter().map(IndexSummary::from).collect())
    }

    /// Typed handle for a schema's collection
    pub fn collection<T>(&self) -> MongoCollection<T>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + CollectionSchema + Timestamped,
    {
        MongoCollection {
            inner: self.database().collection::<T>(T::COLLECTION),
        }
    }

    /// Close all connections
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        info!("Disconnected from database");
    }
}

/// A failed createCollection is a validator rejection unless it was
/// already classified as something more specific
fn creation_failure(collection: &str, err: RentalsError) -> RentalsError {
    match err {
        RentalsError::Database(message) => RentalsError::ValidatorRejected(format!(
            "Creating '{}' failed: {}",
            collection, message
        )),
        other => other,
    }
}

/// Name the index a conflict happened on
fn index_failure(index: &str, err: RentalsError) -> RentalsError {
    match err {
        RentalsError::IndexConflict(message) => {
            RentalsError::IndexConflict(format!("index '{}': {}", index, message))
        }
        RentalsError::Database(message) => {
            RentalsError::Database(format!("Creating index '{}' failed: {}", index, message))
        }
        other => other,
    }
}

/// Name and key pattern of an index that exists on the server
#[derive(Clone, Debug, PartialEq)]
pub struct IndexSummary {
    pub name: String,
    pub keys: Document,
    pub unique: bool,
    pub sparse: bool,
}

impl From<IndexModel> for IndexSummary {
    fn from(model: IndexModel) -> Self {
        let options = model.options.unwrap_or_default();
        Self {
            name: options.name.unwrap_or_default(),
            keys: model.keys,
            unique: options.unique.unwrap_or(false),
            sparse: options.sparse.unwrap_or(false),
        }
    }
}

impl fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = serde_json::to_string(&self.keys).map_err(|_| fmt::Error)?;
        write!(f, " - {}: {}", self.name, keys)
    }
}

/// Typed MongoDB collection
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + CollectionSchema + Timestamped,
{
    /// Validate, stamp timestamps and insert a document
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        item.validate()?;
        item.touch();

        let result = self.inner.insert_one(item).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| RentalsError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document, applying the schema's default projection
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let mut find = self.inner.find_one(filter);
        if let Some(projection) = T::default_projection() {
            find = find.projection(projection);
        }
        Ok(find.await?)
    }

    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<T>> {
        self.find_one(doc! { "_id": id }).await
    }

    /// Find many documents, applying the schema's default projection
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let mut find = self.inner.find(filter);
        if let Some(projection) = T::default_projection() {
            find = find.projection(projection);
        }
        Ok(find.await?.try_collect().await?)
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        Ok(self.inner.count_documents(filter).await?)
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::options::IndexOptions;

    #[tokio::test]
    async fn test_client_options_keeps_timeouts_set_in_uri() {
        let options = client_options("mongodb://localhost:27017/rentals?connectTimeoutMS=10000")
            .await
            .unwrap();
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.server_selection_timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(options.default_database.as_deref(), Some("rentals"));

        let options = client_options("mongodb://localhost:27017/?serverSelectionTimeoutMS=5000")
            .await
            .unwrap();
        assert_eq!(options.server_selection_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(options.connect_timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(options.default_database, None);
    }

    #[tokio::test]
    async fn test_client_options_defaults_timeouts() {
        let options = client_options("mongodb://localhost:27017").await.unwrap();
        assert_eq!(options.connect_timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(options.server_selection_timeout, Some(DEFAULT_TIMEOUT));
    }

    #[tokio::test]
    async fn test_client_options_rejects_malformed_uri() {
        let err = client_options("mongodb://localhost:27017/?connectTimeoutMS=soon")
            .await
            .unwrap_err();
        assert!(matches!(err, RentalsError::Config(_)), "{}", err);
    }

    #[test]
    fn test_creation_failure_maps_to_validator_rejected() {
        let rejected = RentalsError::Database("$jsonSchema keyword 'foo' is not supported".into());
        let err = creation_failure("users", rejected);
        match err {
            RentalsError::ValidatorRejected(message) => {
                assert!(message.starts_with("Creating 'users' failed"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = creation_failure("users", RentalsError::Connection("timed out".into()));
        assert!(matches!(err, RentalsError::Connection(_)));
    }

    #[test]
    fn test_index_failure_names_the_index() {
        let conflict = RentalsError::IndexConflict("different options".into());
        let err = index_failure("phone_unique", conflict);
        assert_eq!(err.to_string(), "Index conflict: index 'phone_unique': different options");
        assert!(matches!(
            index_failure("geo_index", RentalsError::Connection("reset".into())),
            RentalsError::Connection(_)
        ));
    }

    #[test]
    fn test_index_summary_display() {
        let model = IndexModel::builder()
            .keys(doc! { "status": 1, "createdAt": -1 })
            .options(Some(
                IndexOptions::builder()
                    .name("status_created".to_string())
                    .build(),
            ))
            .build();
        let summary = IndexSummary::from(model);
        assert_eq!(summary.name, "status_created");
        assert!(!summary.unique);
        assert_eq!(summary.to_string(), r#" - status_created: {"status":1,"createdAt":-1}"#);
    }
}
