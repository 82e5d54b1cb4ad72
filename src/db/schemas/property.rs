//! Property document schema
//!
//! Rental and sale listings owned by a landlord. Prices are stored as BSON
//! Decimal128 and locations as GeoJSON points so the `2dsphere` index can
//! serve proximity queries.

use std::collections::HashSet;
use std::hash::Hash;

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::db::indexes::{IndexCatalog, IndexPriority, IndexSpec, IntoIndexes};
use crate::db::schemas::{CollectionSchema, Timestamped};
use crate::types::{RentalsError, Result};

/// Collection name for properties
pub const PROPERTY_COLLECTION: &str = "properties";

/// Shown when a listing has no images
pub const DEFAULT_PROPERTY_IMAGE: &str = "/images/default-property.jpg";

pub const PRICE_CURRENCY: &str = "KES";

const TITLE_MIN: usize = 5;
const TITLE_MAX: usize = 200;
const DESCRIPTION_MIN: usize = 20;
const DESCRIPTION_MAX: usize = 5000;
const AREA_MIN: f64 = 1.0;
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Studio,
    Villa,
    Commercial,
    Land,
}

/// Listing status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    #[default]
    Draft,
    Published,
    Rented,
    Archived,
    Pending,
    Unavailable,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AreaUnit {
    #[default]
    Sqm,
    Sqft,
    Acre,
}

/// Amenity vocabulary
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    #[serde(rename = "furnished")]
    Furnished,
    #[serde(rename = "unfurnished")]
    Unfurnished,
    #[serde(rename = "semi-furnished")]
    SemiFurnished,
    #[serde(rename = "parking")]
    Parking,
    #[serde(rename = "security")]
    Security,
    #[serde(rename = "elevator")]
    Elevator,
    #[serde(rename = "pool")]
    Pool,
    #[serde(rename = "gym")]
    Gym,
    #[serde(rename = "garden")]
    Garden,
    #[serde(rename = "balcony")]
    Balcony,
    #[serde(rename = "terrace")]
    Terrace,
    #[serde(rename = "airConditioning")]
    AirConditioning,
    #[serde(rename = "heating")]
    Heating,
    #[serde(rename = "wifi")]
    Wifi,
    #[serde(rename = "petsAllowed")]
    PetsAllowed,
    #[serde(rename = "childrenAllowed")]
    ChildrenAllowed,
    #[serde(rename = "smokingAllowed")]
    SmokingAllowed,
}

/// Utility vocabulary
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Utility {
    Water,
    Electricity,
    Gas,
    Internet,
    Trash,
    Maintenance,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VideoPlatform {
    Youtube,
    Vimeo,
    Custom,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StayUnit {
    Days,
    #[default]
    Months,
    Years,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LeaseTerms {
    #[serde(rename = "month-to-month")]
    MonthToMonth,
    #[serde(rename = "6-months")]
    SixMonths,
    #[default]
    #[serde(rename = "1-year")]
    OneYear,
    #[serde(rename = "2-years")]
    TwoYears,
    #[serde(rename = "negotiable")]
    Negotiable,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactChannel {
    #[serde(rename = "phone")]
    Phone,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "whatsapp")]
    Whatsapp,
    #[serde(rename = "in-app")]
    InApp,
}

/// GeoJSON geometry type; only points are stored
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeoType {
    #[default]
    Point,
}

/// GeoJSON point, `[longitude, latitude]`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub kind: GeoType,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeoType::Point,
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    /// Both numbers finite, longitude in [-180, 180], latitude in [-90, 90]
    pub fn is_valid(&self) -> bool {
        let (lng, lat) = (self.longitude(), self.latitude());
        lng.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lng)
            && (-90.0..=90.0).contains(&lat)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub county: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Full address string for display, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub landmarks: Vec<String>,
}

impl Address {
    pub fn new(county: &str, city: &str) -> Self {
        Self {
            county: county.trim().to_string(),
            city: city.trim().to_string(),
            ..Default::default()
        }
    }
}

/// Floor area; `value` may only be absent for land
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Area {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: AreaUnit,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImage {
    pub url: String,
    /// Cloud storage reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default = "DateTime::now")]
    pub uploaded_at: DateTime,
}

impl PropertyImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            public_id: None,
            is_primary: false,
            caption: None,
            uploaded_at: DateTime::now(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PropertyVideo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<VideoPlatform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Minimum or maximum stay
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Stay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<StayUnit>,
}

impl Stay {
    /// A minimum stay; unit defaults to months
    pub fn minimum(value: f64, unit: Option<StayUnit>) -> Self {
        Self {
            value: Some(value),
            unit: Some(unit.unwrap_or_default()),
        }
    }

    pub fn maximum(value: f64, unit: StayUnit) -> Self {
        Self {
            value: Some(value),
            unit: Some(unit),
        }
    }
}

/// Property document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Owning user (a landlord)
    pub landlord: ObjectId,

    pub title: String,

    pub description: String,

    #[serde(with = "crate::db::decimal128")]
    pub price: Decimal,

    pub location: GeoPoint,

    pub address: Address,

    pub property_type: PropertyType,

    #[serde(default)]
    pub bedrooms: u32,

    #[serde(default)]
    pub bathrooms: u32,

    #[serde(default)]
    pub area: Area,

    #[serde(default)]
    pub features: Vec<Feature>,

    #[serde(default)]
    pub utilities_included: Vec<Utility>,

    /// Display order; the first `isPrimary` image is the cover
    #[serde(default)]
    pub images: Vec<PropertyImage>,

    #[serde(default)]
    pub videos: Vec<PropertyVideo>,

    /// URL to a 3D tour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_tour: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_stay: Option<Stay>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_stay: Option<Stay>,

    #[serde(default)]
    pub status: PropertyStatus,

    #[serde(default = "default_true")]
    pub deposit_required: bool,

    #[serde(
        default,
        with = "crate::db::decimal128::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deposit_amount: Option<Decimal>,

    #[serde(default)]
    pub lease_terms: LeaseTerms,

    #[serde(default = "default_contact_preference")]
    pub contact_preference: Vec<ContactChannel>,

    #[serde(default)]
    pub views: u32,

    #[serde(default)]
    pub inquiries: u32,

    #[serde(default)]
    pub favorites: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_inquiry_at: Option<DateTime>,

    /// Free-form extension fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

fn default_true() -> bool {
    true
}

fn default_contact_preference() -> Vec<ContactChannel> {
    vec![ContactChannel::InApp]
}

impl PropertyDoc {
    /// Create a new draft listing with default terms
    pub fn new(
        landlord: ObjectId,
        title: &str,
        description: &str,
        price: Decimal,
        location: GeoPoint,
        address: Address,
        property_type: PropertyType,
    ) -> Self {
        Self {
            id: None,
            landlord,
            title: title.trim().to_string(),
            description: description.to_string(),
            price,
            location,
            address,
            property_type,
            bedrooms: 0,
            bathrooms: 0,
            area: Area::default(),
            features: Vec::new(),
            utilities_included: Vec::new(),
            images: Vec::new(),
            videos: Vec::new(),
            virtual_tour: None,
            available_from: None,
            minimum_stay: None,
            maximum_stay: None,
            status: PropertyStatus::Draft,
            deposit_required: true,
            deposit_amount: None,
            lease_terms: LeaseTerms::default(),
            contact_preference: default_contact_preference(),
            views: 0,
            inquiries: 0,
            favorites: 0,
            published_at: None,
            last_viewed_at: None,
            last_inquiry_at: None,
            metadata: None,
            deleted_at: None,
            deleted_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Published and, if a start date is set, already available at `now`
    pub fn is_available_at(&self, now: chrono::DateTime<Utc>) -> bool {
        self.status == PropertyStatus::Published
            && self
                .available_from
                .map_or(true, |from| from.to_chrono() <= now)
    }

    pub fn is_available(&self) -> bool {
        self.is_available_at(Utc::now())
    }

    /// Monthly price, whole shillings, e.g. `KES 45,000/month`
    pub fn formatted_price(&self) -> String {
        let whole = self.price.trunc().to_i128().unwrap_or_default();
        format!("{} {}/month", PRICE_CURRENCY, group_thousands(whole))
    }

    /// Street, neighborhood, city, county and postal code, skipping blanks
    pub fn full_address(&self) -> String {
        let address = &self.address;
        [
            address.street.as_deref(),
            address.neighborhood.as_deref(),
            Some(address.city.as_str()),
            Some(address.county.as_str()),
            address.postal_code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// First image flagged primary, else the first image, else the placeholder
    pub fn primary_image(&self) -> &str {
        self.images
            .iter()
            .find(|image| image.is_primary)
            .or_else(|| self.images.first())
            .map_or(DEFAULT_PROPERTY_IMAGE, |image| image.url.as_str())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// None when there are no bedrooms to divide by
    pub fn price_per_bedroom(&self) -> Option<Decimal> {
        if self.bedrooms == 0 {
            return None;
        }
        self.price.checked_div(Decimal::from(self.bedrooms))
    }

    /// Whole days since `publishedAt`; None if never published
    pub fn days_on_market_at(&self, now: chrono::DateTime<Utc>) -> Option<i64> {
        self.published_at.map(|published| {
            (now - published.to_chrono())
                .num_milliseconds()
                .div_euclid(MILLIS_PER_DAY)
        })
    }

    pub fn days_on_market(&self) -> Option<i64> {
        self.days_on_market_at(Utc::now())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Set the soft-delete markers
    pub fn mark_deleted(&mut self, by: ObjectId) {
        self.deleted_at = Some(DateTime::now());
        self.deleted_by = Some(by);
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min {
        return Err(RentalsError::invalid(
            field,
            format!("must be at least {} characters", min),
        ));
    }
    if len > max {
        return Err(RentalsError::invalid(
            field,
            format!("cannot exceed {} characters", max),
        ));
    }
    Ok(())
}

fn check_unique<T: Eq + Hash + std::fmt::Debug>(field: &str, values: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(values.len());
    for value in values {
        if !seen.insert(value) {
            return Err(RentalsError::invalid(field, format!("duplicate entry {:?}", value)));
        }
    }
    Ok(())
}

impl CollectionSchema for PropertyDoc {
    const COLLECTION: &'static str = PROPERTY_COLLECTION;

    fn json_schema() -> Document {
        let (title_min, title_max) = (TITLE_MIN as i32, TITLE_MAX as i32);
        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["landlord", "title", "description", "price", "location", "propertyType"],
                "properties": {
                    "title": {
                        "bsonType": "string",
                        "minLength": title_min,
                        "maxLength": title_max,
                        "description": "must be a string between 5-200 chars",
                    },
                    "price": {
                        "bsonType": "decimal",
                        "minimum": 0,
                        "description": "must be a positive decimal",
                    },
                },
            }
        }
    }

    fn validate(&self) -> Result<()> {
        check_length("title", self.title.trim(), TITLE_MIN, TITLE_MAX)?;
        check_length("description", &self.description, DESCRIPTION_MIN, DESCRIPTION_MAX)?;

        if self.price <= Decimal::ZERO {
            return Err(RentalsError::invalid("price", "must be greater than 0"));
        }

        if !self.location.is_valid() {
            return Err(RentalsError::invalid(
                "location.coordinates",
                "must be [longitude, latitude] with valid ranges",
            ));
        }

        if self.address.county.trim().is_empty() {
            return Err(RentalsError::invalid("address.county", "county is required"));
        }
        if self.address.city.trim().is_empty() {
            return Err(RentalsError::invalid("address.city", "city is required"));
        }

        match self.area.value {
            None if self.property_type != PropertyType::Land => {
                return Err(RentalsError::invalid(
                    "area.value",
                    "required for every property type except land",
                ));
            }
            Some(value) if !value.is_finite() || value < AREA_MIN => {
                return Err(RentalsError::invalid("area.value", "must be at least 1"));
            }
            _ => {}
        }

        check_unique("features", &self.features)?;
        check_unique("utilitiesIncluded", &self.utilities_included)?;
        check_unique("contactPreference", &self.contact_preference)?;

        if let Some(index) = self.images.iter().position(|i| i.url.trim().is_empty()) {
            return Err(RentalsError::invalid(
                &format!("images.{}.url", index),
                "image URL is required",
            ));
        }

        if let Some(deposit) = self.deposit_amount {
            if deposit <= Decimal::ZERO {
                return Err(RentalsError::invalid("depositAmount", "must be positive"));
            }
        }

        for (field, stay) in [
            ("minimumStay", &self.minimum_stay),
            ("maximumStay", &self.maximum_stay),
        ] {
            if let Some(value) = stay.and_then(|s| s.value) {
                if !value.is_finite() || value < 0.0 {
                    return Err(RentalsError::invalid(field, "cannot be negative"));
                }
            }
        }

        Ok(())
    }
}

impl IntoIndexes for PropertyDoc {
    fn index_catalog() -> IndexCatalog {
        IndexCatalog::new(vec![
            IndexSpec::new("geo_index", doc! { "location": "2dsphere" })
                .purpose("Find properties near a location")
                .queries(&["findNearby", "searchByLocation"])
                .priority(IndexPriority::Critical),
            IndexSpec::new(
                "city_status_price",
                doc! { "status": 1, "address.city": 1, "price": 1 },
            )
            .purpose("Filter published properties by city and price")
            .queries(&["searchProperties", "filterByCity"])
            .priority(IndexPriority::High),
            IndexSpec::new(
                "type_status_price",
                doc! { "status": 1, "propertyType": 1, "price": 1 },
            )
            .purpose("Filter by property type and price range")
            .queries(&["searchByType"])
            .priority(IndexPriority::High),
            IndexSpec::new(
                "landlord_properties",
                doc! { "landlord": 1, "status": 1, "createdAt": -1 },
            )
            .purpose("Show landlord's properties sorted by date")
            .queries(&["getLandlordProperties"])
            .priority(IndexPriority::High),
            IndexSpec::new(
                "rooms_filter",
                doc! { "status": 1, "bedrooms": 1, "bathrooms": 1 },
            )
            .purpose("Filter by number of bedrooms/bathrooms")
            .queries(&["filterByRooms"])
            .priority(IndexPriority::Medium),
            IndexSpec::new(
                "latest_listings",
                doc! { "status": 1, "price": 1, "createdAt": -1 },
            )
            .purpose("Get newest properties with price filter")
            .queries(&["latestListings"])
            .priority(IndexPriority::Medium),
            IndexSpec::new(
                "property_text_search",
                doc! {
                    "title": "text",
                    "description": "text",
                    "address.city": "text",
                    "address.county": "text",
                    "address.neighborhood": "text",
                },
            )
            .options(
                IndexOptions::builder()
                    .weights(doc! {
                        "title": 10,
                        "description": 5,
                        "address.city": 8,
                        "address.county": 7,
                        "address.neighborhood": 6,
                    })
                    .build(),
            )
            .purpose("Full-text search across property details")
            .queries(&["searchProperties"])
            .priority(IndexPriority::High),
            IndexSpec::new("availability", doc! { "availableFrom": 1, "status": 1 })
                .purpose("Find properties available from a certain date")
                .queries(&["findAvailable"])
                .priority(IndexPriority::Medium),
            IndexSpec::new("popular_properties", doc! { "views": -1, "createdAt": -1 })
                .purpose("Get most viewed properties")
                .queries(&["popularProperties"])
                .priority(IndexPriority::Low),
            IndexSpec::new(
                "admin_reporting",
                doc! { "status": 1, "address.county": 1, "propertyType": 1, "createdAt": -1 },
            )
            .purpose("Admin reporting and analytics")
            .queries(&["adminReports"])
            .priority(IndexPriority::Medium),
        ])
    }
}

impl Timestamped for PropertyDoc {
    fn created_at_mut(&mut self) -> &mut Option<DateTime> {
        &mut self.created_at
    }

    fn updated_at_mut(&mut self) -> &mut Option<DateTime> {
        &mut self.updated_at
    }
}
