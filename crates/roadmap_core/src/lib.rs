//! Core domain logic for Roadmap organisation administration.
//! This crate is the single source of truth for organisation and
//! identifier invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod reconcile;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::identifier::{Identifier, IdentifierAttributes, IdentifierScheme};
pub use model::org::{NewOrg, Org, OrgId, OrgLinks, OrgTypes, OrgValidationError};
pub use model::user::{Role, User};
pub use policy::{Authorizer, OrgAction, OrgPolicy};
pub use reconcile::{plan, reconcile, reconcile_all, IdentifierAction, IdentifierChangeSet};
pub use repo::org_repo::{OrgRepository, SavedOrg, SqliteOrgRepository};
pub use repo::{RepoError, RepoResult};
pub use search::org_search::{search_orgs, SearchError, SearchHit, SearchMode, SearchQuery};
pub use service::org_service::{OrgService, OrgServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
