//! Organisation search entry points.
//!
//! # Responsibility
//! - Expose org picker search over local storage and an optional
//!   external registry.
//! - Keep search result shaping inside core.

pub mod org_search;
