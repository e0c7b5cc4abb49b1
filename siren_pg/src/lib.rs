//! # Siren postgres store

#![deny(missing_docs)]

/// Database migrations for the siren_pg schema
pub mod migrations;

/// The alert state store implementation for postgres
pub mod state_store;

pub use migrations::{AppliedMigration, Migration, MigrationError, Migrator};
pub use state_store::*;
