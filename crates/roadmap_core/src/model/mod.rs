//! Domain model for organisation administration.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep validation next to the data it protects.
//!
//! # Invariants
//! - An organisation owns its identifiers; at most one per scheme.

pub mod identifier;
pub mod org;
pub mod user;
