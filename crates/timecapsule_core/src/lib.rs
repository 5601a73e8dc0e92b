//! Core domain logic for the time capsule store.
//! This crate is the single source of truth for capsule invariants.

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use context::{CallContext, Clock, ManualClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::capsule::{Capsule, CapsuleValidationError, Principal, Timestamp};
pub use model::id::{CapsuleId, MalformedCapsuleId, OsRandomSource, SecureRandomSource};
pub use repo::capsule_repo::{CapsuleRepository, RepoError, RepoResult, SqliteCapsuleRepository};
pub use service::capsule_service::{CapsuleError, CapsuleResult, CapsuleService};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
