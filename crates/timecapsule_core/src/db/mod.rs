//! Capsule store database: connection bootstrap and schema.
//!
//! A connection handed out by this module is configured, at the current
//! capsule schema version, and free of orphaned content rows.

mod open;
mod schema;

pub use open::{open_db, open_db_in_memory, DbError, DbResult};
pub use schema::schema_version;
