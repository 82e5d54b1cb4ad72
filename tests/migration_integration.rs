//! Migration integration tests
//!
//! These need a running MongoDB. Point MONGODB_URI at it and run:
//!   cargo test --test migration_integration -- --ignored
//!
//! Each test works in its own throwaway database.

use bson::{doc, oid::ObjectId, Document};
use mongodb::{options::IndexOptions, IndexModel};
use rust_decimal::Decimal;

use rentals_db::db::schemas::{Address, GeoPoint, PropertyDoc, PropertyType, UserDoc, UserRole};
use rentals_db::db::{CollectionSchema, IntoIndexes, MongoClient};
use rentals_db::{Migration, MigrationOutcome, RentalsError};

async fn fresh_client() -> MongoClient {
    let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = format!("rentals_test_{}", ObjectId::new().to_hex());
    MongoClient::new(&uri, &db_name).await.expect("MongoDB reachable")
}

async fn drop_database(client: MongoClient) {
    client.database().drop().await.expect("drop test database");
    client.shutdown().await;
}

fn hash() -> String {
    format!("$2b$10${}", "x".repeat(53))
}

fn listing(landlord: ObjectId) -> PropertyDoc {
    let mut property = PropertyDoc::new(
        landlord,
        "Bedsitter near Juja campus",
        "Secure bedsitter with water all day, five minutes to the gate.",
        Decimal::from(8_500),
        GeoPoint::new(37.0144, -1.1018),
        Address::new("Kiambu", "Juja"),
        PropertyType::Studio,
    );
    property.area.value = Some(20.0);
    property
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_users_migration_creates_exactly_declared_indexes() {
    let client = fresh_client().await;
    let migration = Migration::users();

    let report = migration.run(&client).await.unwrap();
    assert_eq!(report.outcome, MigrationOutcome::Created);
    assert!(report.missing_from(&migration.catalog).is_empty());

    let mut names = report.present_names();
    names.retain(|n| *n != "_id_");
    names.sort_unstable();
    let mut expected = UserDoc::index_catalog().names();
    expected.sort_unstable();
    assert_eq!(names, expected);

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_properties_migration_includes_geo_index() {
    let client = fresh_client().await;
    let report = Migration::properties().run(&client).await.unwrap();

    assert_eq!(report.present.len(), 11);
    let geo = report.present.iter().find(|i| i.name == "geo_index").unwrap();
    assert_eq!(geo.keys.get_str("location").unwrap(), "2dsphere");

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_rerun_is_idempotent_and_keeps_documents() {
    let client = fresh_client().await;
    let migration = Migration::users();
    let first = migration.run(&client).await.unwrap();

    let users = client.collection::<UserDoc>();
    users
        .insert_one(UserDoc::new("Achieng Otieno", "achieng@example.com", hash(), UserRole::Landlord))
        .await
        .unwrap();

    let second = migration.run(&client).await.unwrap();
    assert_eq!(second.outcome, MigrationOutcome::Updated);
    assert_eq!(second.present, first.present);
    assert_eq!(users.count(doc! {}).await.unwrap(), 1);

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_email_unique_regardless_of_case() {
    let client = fresh_client().await;
    Migration::users().run(&client).await.unwrap();
    let users = client.collection::<UserDoc>();

    users
        .insert_one(UserDoc::new("Brian Mwangi", "brian@example.com", hash(), UserRole::Client))
        .await
        .unwrap();
    let err = users
        .insert_one(UserDoc::new("Brian M", "BRIAN@Example.com", hash(), UserRole::Client))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key(), "{}", err);

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_phone_uniqueness_only_among_present_values() {
    let client = fresh_client().await;
    Migration::users().run(&client).await.unwrap();
    let users = client.collection::<UserDoc>();

    for email in ["a@example.com", "b@example.com"] {
        users
            .insert_one(UserDoc::new("No Phone", email, hash(), UserRole::Client))
            .await
            .unwrap();
    }

    let first = UserDoc::new("Has Phone", "c@example.com", hash(), UserRole::Client)
        .with_phone_number("0712345678");
    users.insert_one(first).await.unwrap();
    let second = UserDoc::new("Same Phone", "d@example.com", hash(), UserRole::Client)
        .with_phone_number("0712345678");
    let err = users.insert_one(second).await.unwrap_err();
    assert!(err.is_duplicate_key());

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_invalid_property_rejected_before_persistence() {
    let client = fresh_client().await;
    Migration::properties().run(&client).await.unwrap();
    let properties = client.collection::<PropertyDoc>();

    let mut bad_location = listing(ObjectId::new());
    bad_location.location = GeoPoint::new(200.0, 0.0);
    assert!(matches!(
        properties.insert_one(bad_location).await,
        Err(RentalsError::Validation(_))
    ));

    let mut free = listing(ObjectId::new());
    free.price = Decimal::ZERO;
    assert!(properties.insert_one(free).await.is_err());
    assert_eq!(properties.count(doc! {}).await.unwrap(), 0);

    let id = properties.insert_one(listing(ObjectId::new())).await.unwrap();
    let stored = properties.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.price, Decimal::from(8_500));
    assert!(stored.created_at.is_some());

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_storage_validator_rejects_missing_required_fields() {
    let client = fresh_client().await;
    Migration::properties().run(&client).await.unwrap();

    let raw = client.database().collection::<Document>(PropertyDoc::COLLECTION);
    let result = raw.insert_one(doc! { "title": "No price or landlord" }).await;
    assert!(matches!(
        result.map_err(RentalsError::from),
        Err(RentalsError::Validation(_))
    ));

    drop_database(client).await;
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn test_conflicting_index_stops_run_but_keeps_earlier_indexes() {
    let client = fresh_client().await;
    let migration = Migration::users();
    client
        .create_collection_with_validator(migration.collection, migration.validator.clone())
        .await
        .unwrap();

    // Older deployments built phone_unique as a sparse index
    let legacy = IndexModel::builder()
        .keys(doc! { "phoneNumber": 1 })
        .options(Some(
            IndexOptions::builder()
                .name("phone_unique".to_string())
                .unique(true)
                .sparse(true)
                .build(),
        ))
        .build();
    client
        .database()
        .collection::<Document>(migration.collection)
        .create_index(legacy)
        .await
        .unwrap();

    let err = migration.run(&client).await.unwrap_err();
    assert!(matches!(err, RentalsError::IndexConflict(_)), "{}", err);
    assert!(err.to_string().contains("phone_unique"));

    let present: Vec<String> = client
        .list_indexes(migration.collection)
        .await
        .unwrap()
        .into_iter()
        .map(|idx| idx.name)
        .collect();
    for applied in ["email_unique", "role_status", "status_created", "verified_status"] {
        assert!(present.iter().any(|n| n == applied), "{} missing", applied);
    }
    assert!(!present.iter().any(|n| n == "locked_accounts"));

    drop_database(client).await;
}
