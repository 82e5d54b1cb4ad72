//! Migration 001 - create the users collection
//!
//! Creates `users` with its validator if it does not exist and applies the
//! user index catalog. Safe to run repeatedly.
//!
//! Usage:
//!   create-users-collection
//!
//! Environment variables:
//!   MONGODB_URI - MongoDB connection string (required)
//!   MONGODB_DB - Database name (default: database in the URI, else "rentals")
//!   LOG_LEVEL - Log level (default: info)

use clap::Parser;

use rentals_db::{config::Args, logging, run_standalone, Migration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level);

    run_standalone(&Migration::users(), &args).await?;
    Ok(())
}
