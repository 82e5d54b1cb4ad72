//! Database layer
//!
//! MongoDB client, index catalogs and the user/property schemas.

pub mod decimal128;
pub mod indexes;
pub mod mongo;
pub mod schemas;

pub use indexes::{IndexCatalog, IndexPriority, IndexSpec, IntoIndexes};
pub use mongo::{client_options, IndexSummary, MongoClient, MongoCollection};
pub use schemas::{CollectionSchema, PropertyDoc, Timestamped, UserDoc};
