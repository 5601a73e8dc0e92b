//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the capsule store operations.
//! - Keep API/CLI layers decoupled from storage details.

pub mod capsule_service;
