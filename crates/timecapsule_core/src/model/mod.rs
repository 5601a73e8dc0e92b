//! Domain model for time capsules.
//!
//! # Responsibility
//! - Define the canonical capsule record and its identifier type.
//! - Own record-level validation shared by write and read paths.
//!
//! # Invariants
//! - Every capsule is identified by a `CapsuleId` of fixed hex shape.
//! - Capsules are never deleted; `is_opened` is the only mutable field.

pub mod capsule;
pub mod id;
