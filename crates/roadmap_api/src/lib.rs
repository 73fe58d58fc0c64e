//! Controller layer for organisation administration, discovery and search.
//!
//! # Responsibility
//! - Expose use-case level actions to an HTTP front end.
//! - Keep error semantics simple: every action returns a `Response`.

pub mod orgs;
pub mod response;

pub use orgs::OrgsController;
pub use response::{Flash, Response, View};

use roadmap_core::config::AppConfig;
use roadmap_core::logging::init_from_config;

/// Initializes core logging from `config`.
///
/// Returns an empty string on success (or when logging is not configured)
/// and the error message on failure.
pub fn init_logging(config: &AppConfig) -> String {
    match init_from_config(&config.logging) {
        Ok(_) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Exposes the core crate version.
pub fn core_version() -> String {
    roadmap_core::core_version().to_owned()
}
