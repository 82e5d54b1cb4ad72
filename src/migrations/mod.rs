//! Collection migrations
//!
//! A migration converges one collection to its declared shape: create it
//! with a `$jsonSchema` validator if it is missing, then apply the schema's
//! index catalog. Running it again only re-applies the catalog, which the
//! server treats as a no-op for indexes that already match.

use std::fmt;

use bson::Document;
use tracing::{error, info};

use crate::config::{redact_uri, Args};
use crate::db::indexes::{IndexCatalog, IntoIndexes};
use crate::db::mongo::{client_options, IndexSummary, MongoClient};
use crate::db::schemas::{CollectionSchema, PropertyDoc, UserDoc};
use crate::types::Result;

/// What a run did to the collection itself
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Collection was missing and has been created with its validator
    Created,
    /// Collection already existed; only indexes were applied
    Updated,
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Result of applying a migration
#[derive(Clone, Debug)]
pub struct MigrationReport {
    pub collection: String,
    pub outcome: MigrationOutcome,
    /// Index names created or confirmed, in application order
    pub applied: Vec<String>,
    /// Indexes on the collection after the run, including `_id_`
    pub present: Vec<IndexSummary>,
}

impl MigrationReport {
    /// Catalog entries that are not on the collection
    pub fn missing_from<'a>(&self, catalog: &'a IndexCatalog) -> Vec<&'a str> {
        catalog
            .iter()
            .map(|spec| spec.name)
            .filter(|name| !self.present.iter().any(|idx| idx.name == *name))
            .collect()
    }

    pub fn present_names(&self) -> Vec<&str> {
        self.present.iter().map(|idx| idx.name.as_str()).collect()
    }
}

/// Create the collection with its validator if absent, then apply the catalog
pub async fn apply_collection(
    client: &MongoClient,
    name: &str,
    validator: &Document,
    catalog: &IndexCatalog,
) -> Result<MigrationReport> {
    let outcome = if client.collection_exists(name).await? {
        info!("Collection '{}' already exists", name);
        MigrationOutcome::Updated
    } else if client
        .create_collection_with_validator(name, validator.clone())
        .await?
    {
        info!("Collection '{}' created with validator", name);
        MigrationOutcome::Created
    } else {
        MigrationOutcome::Updated
    };

    let applied = client.apply_indexes(name, catalog).await?;
    match outcome {
        MigrationOutcome::Created => info!("Indexes created"),
        MigrationOutcome::Updated => info!("Indexes verified/updated"),
    }

    let present = client.list_indexes(name).await?;
    info!("Current indexes on '{}':", name);
    for index in &present {
        info!("{}", index);
    }

    Ok(MigrationReport {
        collection: name.to_string(),
        outcome,
        applied,
        present,
    })
}

/// One collection's validator and index catalog, built once at start-up
#[derive(Clone, Debug)]
pub struct Migration {
    pub id: &'static str,
    pub collection: &'static str,
    pub validator: Document,
    pub catalog: IndexCatalog,
}

impl Migration {
    pub fn for_schema<T: CollectionSchema + IntoIndexes>(id: &'static str) -> Self {
        Self {
            id,
            collection: T::COLLECTION,
            validator: T::json_schema(),
            catalog: T::index_catalog(),
        }
    }

    pub fn users() -> Self {
        Self::for_schema::<UserDoc>("001_create_users_collection")
    }

    pub fn properties() -> Self {
        Self::for_schema::<PropertyDoc>("002_create_properties_collection")
    }

    pub async fn run(&self, client: &MongoClient) -> Result<MigrationReport> {
        info!("Running migration {}", self.id);
        apply_collection(client, self.collection, &self.validator, &self.catalog).await
    }
}

/// Connect, run one migration and always disconnect
pub async fn run_standalone(migration: &Migration, args: &Args) -> Result<MigrationReport> {
    args.validate()?;

    info!("Connecting to MongoDB at {}", redact_uri(&args.mongodb_uri));
    let options = client_options(&args.mongodb_uri).await?;
    let db_name = args.db_name(options.default_database.as_deref());
    let client = MongoClient::with_options(options, &db_name).await?;
    let result = migration.run(&client).await;
    client.shutdown().await;

    match &result {
        Ok(report) => info!(
            "Migration {} completed successfully ({}, {} indexes present)",
            migration.id,
            report.outcome,
            report.present.len()
        ),
        Err(e) => error!("Migration {} failed: {}", migration.id, e),
    }

    result
}
