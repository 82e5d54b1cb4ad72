//! Shared types for rentals-db

pub mod error;

pub use error::{RentalsError, Result};
