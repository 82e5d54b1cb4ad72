//! User document schema
//!
//! Account holders: clients, landlords and admins.

use std::sync::LazyLock;

use bson::{doc, oid::ObjectId, DateTime, Document};
use chrono::Utc;
use mongodb::options::IndexOptions;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::db::indexes::{IndexCatalog, IndexSpec, IntoIndexes};
use crate::db::schemas::{CollectionSchema, Timestamped};
use crate::types::{RentalsError, Result};

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Email shape accepted by both the application and the storage validator
pub const EMAIL_PATTERN: &str = r"^\w+([\.-]?\w+)*@\w+([\.-]?\w+)*(\.\w{2,3})+$";

/// bcrypt hashes are always this long
pub const PASSWORD_HASH_LEN: usize = 60;

const FULL_NAME_MIN: usize = 2;
const FULL_NAME_MAX: usize = 100;
const PHONE_DIGITS_MIN: usize = 10;
const PHONE_DIGITS_MAX: usize = 15;

// ASCII \w, as the storage engine reads the same pattern
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(EMAIL_PATTERN)
        .unicode(false)
        .build()
        .expect("EMAIL_PATTERN is a valid regex")
});

/// Account role
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserRole {
    Client,
    Landlord,
    Admin,
}

/// Account lifecycle status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
    #[default]
    Pending,
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub full_name: String,

    /// Always stored lowercase
    pub email: String,

    /// bcrypt hash, never the password itself
    pub password_hash: String,

    pub role: UserRole,

    /// Unique among users that have one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(default)]
    pub account_status: AccountStatus,

    #[serde(default)]
    pub is_verified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime>,

    // Secret-bearing fields, left out of the default projection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verification_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verification_expires: Option<DateTime>,

    #[serde(default)]
    pub login_attempts: u32,

    /// Account is locked while this lies in the future
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl UserDoc {
    /// Create a new pending, unverified user. Name is trimmed and email is
    /// trimmed and lowercased.
    pub fn new(full_name: &str, email: &str, password_hash: String, role: UserRole) -> Self {
        Self {
            id: None,
            full_name: full_name.trim().to_string(),
            email: normalize_email(email),
            password_hash,
            role,
            phone_number: None,
            account_status: AccountStatus::Pending,
            is_verified: false,
            last_login_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            email_verification_token: None,
            email_verification_expires: None,
            login_attempts: 0,
            lock_until: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active
    }

    /// Whether `lockUntil` is set and later than `now`
    pub fn is_locked_at(&self, now: chrono::DateTime<Utc>) -> bool {
        self.lock_until
            .map(|until| until.to_chrono() > now)
            .unwrap_or(false)
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Utc::now())
    }

    /// Percentage (0-100) of email, phone, verification and name present
    pub fn profile_completion(&self) -> u8 {
        let checks = [
            !self.email.is_empty(),
            self.phone_number.as_deref().is_some_and(|p| !p.is_empty()),
            self.is_verified,
            !self.full_name.is_empty(),
        ];
        let score = checks.iter().filter(|present| **present).count();
        ((score as f64 / checks.len() as f64) * 100.0).round() as u8
    }
}

/// Trim and lowercase an address so uniqueness is case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// 10 to 15 digits once separators are stripped
pub fn is_valid_phone_number(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (PHONE_DIGITS_MIN..=PHONE_DIGITS_MAX).contains(&digits)
}

impl CollectionSchema for UserDoc {
    const COLLECTION: &'static str = USER_COLLECTION;

    fn json_schema() -> Document {
        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["fullName", "email", "passwordHash", "role", "accountStatus"],
                "properties": {
                    "fullName": {
                        "bsonType": "string",
                        "description": "must be a string and is required",
                    },
                    "email": {
                        "bsonType": "string",
                        "pattern": EMAIL_PATTERN,
                        "description": "must be a valid email and is required",
                    },
                },
            }
        }
    }

    /// Hides reset and verification secrets
    fn default_projection() -> Option<Document> {
        Some(doc! {
            "passwordResetToken": 0,
            "passwordResetExpires": 0,
            "emailVerificationToken": 0,
            "emailVerificationExpires": 0,
        })
    }

    fn validate(&self) -> Result<()> {
        let name_len = self.full_name.trim().chars().count();
        if name_len < FULL_NAME_MIN {
            return Err(RentalsError::invalid(
                "fullName",
                format!("must be at least {} characters", FULL_NAME_MIN),
            ));
        }
        if name_len > FULL_NAME_MAX {
            return Err(RentalsError::invalid(
                "fullName",
                format!("cannot exceed {} characters", FULL_NAME_MAX),
            ));
        }

        if self.email != normalize_email(&self.email) {
            return Err(RentalsError::invalid("email", "must be trimmed and lowercase"));
        }
        if !is_valid_email(&self.email) {
            return Err(RentalsError::invalid("email", "please provide a valid email address"));
        }

        if self.password_hash.chars().count() != PASSWORD_HASH_LEN {
            return Err(RentalsError::invalid("passwordHash", "invalid password hash"));
        }

        if let Some(phone) = &self.phone_number {
            if !is_valid_phone_number(phone) {
                return Err(RentalsError::invalid(
                    "phoneNumber",
                    format!(
                        "{} is not a valid phone number, must have {}-{} digits",
                        phone, PHONE_DIGITS_MIN, PHONE_DIGITS_MAX
                    ),
                ));
            }
        }

        Ok(())
    }
}

impl IntoIndexes for UserDoc {
    fn index_catalog() -> IndexCatalog {
        IndexCatalog::new(vec![
            IndexSpec::new("email_unique", doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .purpose("Fast user lookup by email (authentication)")
                .queries(&["findByEmail", "login"]),
            IndexSpec::new("role_status", doc! { "role": 1, "accountStatus": 1 })
                .purpose("Filter users by role and account status")
                .queries(&["getActiveLandlords", "getPendingAdmins"]),
            IndexSpec::new("status_created", doc! { "accountStatus": 1, "createdAt": -1 })
                .purpose("Get recently registered users by status")
                .queries(&["getRecentUsers", "adminDashboard"]),
            IndexSpec::new("verified_status", doc! { "isVerified": 1, "accountStatus": 1 })
                .purpose("Find unverified users for reminders")
                .queries(&["getUnverifiedUsers"]),
            // Partial rather than sparse: explicit nulls stay out of the index too
            IndexSpec::new("phone_unique", doc! { "phoneNumber": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "phoneNumber": { "$type": "string" } })
                        .build(),
                )
                .purpose("Find user by phone number")
                .queries(&["findByPhone"]),
            IndexSpec::new("locked_accounts", doc! { "lockUntil": 1 })
                .options(IndexOptions::builder().sparse(true).build())
                .purpose("Find locked accounts")
                .queries(&["cleanupLockedAccounts"]),
            IndexSpec::new("user_text_search", doc! { "fullName": "text" })
                .options(IndexOptions::builder().weights(doc! { "fullName": 1 }).build())
                .purpose("Search users by name")
                .queries(&["searchUsers"]),
        ])
    }
}

impl Timestamped for UserDoc {
    fn created_at_mut(&mut self) -> &mut Option<DateTime> {
        &mut self.created_at
    }

    fn updated_at_mut(&mut self) -> &mut Option<DateTime> {
        &mut self.updated_at
    }
}
