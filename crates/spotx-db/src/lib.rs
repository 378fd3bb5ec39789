pub mod connection;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

pub use connection::{Database, DatabaseConfig};
pub use error::{DbError, Result};
pub use migrations::{create_database_if_not_exists, get_migration_status, run_migrations};
pub use models::*;
