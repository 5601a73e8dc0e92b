//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract of the capsule store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Capsule::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateId`) in
//!   addition to DB transport errors.

pub mod capsule_repo;
