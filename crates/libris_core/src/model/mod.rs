//! Domain model for borrow/return persistence.
//!
//! # Responsibility
//! - Define the canonical lend-record structures used across the crate.
//! - Keep lifecycle invariants checkable before any SQL runs.
//!
//! # Invariants
//! - Every stored row is identified by an integer surrogate key.
//! - Removal is explicit batch deletion, never tombstoning.

pub mod lend;
