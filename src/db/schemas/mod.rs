//! Database schemas for the rentals platform
//!
//! Defines the MongoDB document structures for users and properties, their
//! index catalogs and their storage-level validators.

mod property;
mod timestamps;
mod user;

use bson::Document;

use crate::db::indexes::IntoIndexes;
use crate::types::Result;

pub use property::{
    group_thousands, Address, Area, AreaUnit, ContactChannel, Feature, GeoPoint, GeoType,
    LeaseTerms, PropertyDoc, PropertyImage, PropertyStatus, PropertyType, PropertyVideo, Stay,
    StayUnit, Utility, VideoPlatform, DEFAULT_PROPERTY_IMAGE, PRICE_CURRENCY, PROPERTY_COLLECTION,
};
pub use timestamps::Timestamped;
pub use user::{
    is_valid_email, is_valid_phone_number, normalize_email, AccountStatus, UserDoc, UserRole,
    EMAIL_PATTERN, PASSWORD_HASH_LEN, USER_COLLECTION,
};

/// A document type bound to one collection
pub trait CollectionSchema: IntoIndexes {
    const COLLECTION: &'static str;

    /// `{ "$jsonSchema": ... }` validator attached when the collection is
    /// created. Intentionally looser than `validate`.
    fn json_schema() -> Document;

    /// Application-level checks run before a document is persisted
    fn validate(&self) -> Result<()>;

    /// Projection applied to reads unless the caller asks otherwise
    fn default_projection() -> Option<Document> {
        None
    }
}
