//! rentals-db - data model and collection migrations for the rentals platform
//!
//! Two MongoDB collections back the platform:
//!
//! - **users**: account holders (clients, landlords, admins)
//! - **properties**: rental and sale listings with GeoJSON locations
//!
//! Each collection has a typed schema with application-level validation and
//! derived accessors, an index catalog, and a storage-level `$jsonSchema`
//! validator. The migration binaries apply validator and catalog to a live
//! database idempotently.

pub mod config;
pub mod db;
pub mod logging;
pub mod migrations;
pub mod types;

pub use config::Args;
pub use migrations::{apply_collection, run_standalone, Migration, MigrationOutcome, MigrationReport};
pub use types::{RentalsError, Result};
