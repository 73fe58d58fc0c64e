//! Organisation controller actions.
//!
//! # Responsibility
//! - Map organisation use-cases onto redirects, rendered views and JSON.
//! - Own flash wording and route paths.
//!
//! # Invariants
//! - Actions never panic; every failure becomes a `Response`.
//! - Failed updates redirect back to the tab the form was submitted from.

use crate::response::{Response, View};
use log::{error, warn};
use roadmap_core::config::{AppConfig, SessionConfig};
use roadmap_core::db::{open_db, DbError};
use roadmap_core::model::org::OrgId;
use roadmap_core::model::user::User;
use roadmap_core::policy::OrgPolicy;
use roadmap_core::repo::identifier_repo::SqliteIdentifierRepository;
use roadmap_core::repo::org_repo::SqliteOrgRepository;
use roadmap_core::repo::session_repo::SqliteSessionStore;
use roadmap_core::repo::RepoError;
use roadmap_core::search::org_search::{
    search_orgs, ExternalOrgRegistry, NoExternalRegistry, SearchQuery,
};
use roadmap_core::service::org_form::OrgForm;
use roadmap_core::service::org_service::{admin_edit_path, OrgService, OrgServiceError};
use roadmap_core::service::shibboleth_service::{Discovery, Passthru, ShibbolethService};
use rusqlite::Connection;

pub const ROOT_PATH: &str = "/";
pub const SHIBBOLETH_DS_PATH: &str = "/orgs/shibboleth";
pub const SHIBBOLETH_AUTHORIZE_PATH: &str = "/users/auth/shibboleth";
/// Session key remembering the organisation chosen on the discovery page.
pub const SESSION_ORG_KEY: &str = "org_id";

const SAVED_NOTICE: &str = "Successfully saved your organisation.";
const SAVE_FAILED_PREFIX: &str = "Unable to save your organisation";
const NO_ORGS_ALERT: &str = "No organisations are currently registered.";
const CHOOSE_ORG_NOTICE: &str = "Please choose an organisation";
const NOT_CONFIGURED_ALERT: &str = "Your organisation does not seem to be properly configured.";

pub struct OrgsController {
    conn: Connection,
    config: AppConfig,
    registry: Box<dyn ExternalOrgRegistry>,
}

impl OrgsController {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        Self {
            conn,
            config,
            registry: Box::new(NoExternalRegistry),
        }
    }

    /// Opens the configured database and builds a controller over it.
    pub fn open(config: AppConfig) -> Result<Self, DbError> {
        let conn = open_db(&config.database.path)?;
        Ok(Self::new(conn, config))
    }

    /// Replaces the external registry used by combined and external search.
    pub fn with_registry(mut self, registry: Box<dyn ExternalOrgRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Cookie name and SameSite policy for the session carrying the discovery choice.
    pub fn session_cookie(&self) -> &SessionConfig {
        &self.config.session
    }

    /// `GET /org/admin/:id/admin_edit`
    pub fn admin_edit(&mut self, current_user: &User, org_id: OrgId) -> Response {
        let service = self.org_service();
        match service.admin_edit(current_user, org_id) {
            Ok(view) => Response::Render(View::AdminEdit(view)),
            Err(err) => service_failure("admin_edit", err),
        }
    }

    /// `PUT /org/admin/:id/admin_update`
    pub fn admin_update(&mut self, current_user: &User, org_id: OrgId, form: OrgForm) -> Response {
        let tab = form.tab();
        let location = format!("{}#{}", admin_edit_path(org_id), tab.as_str());

        let mut service = self.org_service();
        match service.admin_update(current_user, org_id, form) {
            Ok(_) => Response::redirect_with_notice(location, SAVED_NOTICE),
            Err(OrgServiceError::Validation(err)) => {
                Response::redirect_with_alert(location, format!("{SAVE_FAILED_PREFIX}: {err}"))
            }
            Err(OrgServiceError::Repo(err @ RepoError::DuplicateIdentifier { .. })) => {
                Response::redirect_with_alert(location, format!("{SAVE_FAILED_PREFIX}: {err}"))
            }
            Err(err) => service_failure("admin_update", err),
        }
    }

    /// `GET /orgs/shibboleth`
    pub fn shibboleth_ds(&self, current_user: Option<&User>) -> Response {
        match self.shibboleth_service().discovery(current_user.is_some()) {
            Ok(Discovery::SignedIn) => Response::redirect(ROOT_PATH),
            Ok(Discovery::Empty) => {
                Response::redirect_with_alert(SHIBBOLETH_AUTHORIZE_PATH, NO_ORGS_ALERT)
            }
            Ok(Discovery::Choose(orgs)) => Response::Render(View::ShibbolethDs { orgs }),
            Err(err) => internal_error("shibboleth_ds", &err),
        }
    }

    /// `POST /orgs/shibboleth`
    ///
    /// `base_url` is the scheme and authority of the incoming request.
    pub fn shibboleth_ds_passthru(
        &self,
        session_id: &str,
        org_id: Option<&str>,
        org_name: Option<&str>,
        base_url: &str,
    ) -> Response {
        let outcome = match self
            .shibboleth_service()
            .passthru(org_id, org_name, base_url)
        {
            Ok(outcome) => outcome,
            Err(err) => return internal_error("shibboleth_ds_passthru", &err),
        };

        if outcome == Passthru::NoSelection {
            return Response::redirect_with_notice(SHIBBOLETH_DS_PATH, CHOOSE_ORG_NOTICE);
        }
        if let Err(message) = self.remember_org(session_id, org_name.unwrap_or_default()) {
            return internal_error("shibboleth_ds_passthru", &message);
        }

        match outcome {
            Passthru::Login { url } => Response::redirect(url),
            Passthru::NotConfigured | Passthru::NoSelection => {
                Response::redirect_with_alert(SHIBBOLETH_DS_PATH, NOT_CONFIGURED_ALERT)
            }
        }
    }

    /// `POST /orgs/search`
    pub fn search(
        &self,
        name: Option<&str>,
        kind: Option<&str>,
        funder_only: Option<&str>,
    ) -> Response {
        let query = SearchQuery::from_params(name, kind, funder_only);
        let hits = match search_orgs(&self.conn, self.registry.as_ref(), &query) {
            Ok(hits) => hits,
            Err(err) => return internal_error("search", &err),
        };
        match serde_json::to_value(hits) {
            Ok(json) => Response::Json(json),
            Err(err) => internal_error("search", &err),
        }
    }

    fn org_service(&mut self) -> OrgService<SqliteOrgRepository<'_>, OrgPolicy> {
        OrgService::new(
            SqliteOrgRepository::new(&mut self.conn),
            OrgPolicy,
            self.config.shibboleth.clone(),
        )
    }

    fn shibboleth_service(&self) -> ShibbolethService<SqliteIdentifierRepository<'_>> {
        ShibbolethService::new(
            SqliteIdentifierRepository::new(&self.conn),
            self.config.shibboleth.clone(),
        )
    }

    fn remember_org(&self, session_id: &str, org_name: &str) -> Result<(), String> {
        let store = SqliteSessionStore::new(&self.conn);
        let mut data = store
            .load(session_id)
            .map_err(|err| err.to_string())?
            .unwrap_or_default();
        data.insert(SESSION_ORG_KEY, org_name.trim());
        store.save(session_id, &data).map_err(|err| err.to_string())
    }
}

fn service_failure(action: &str, err: OrgServiceError) -> Response {
    match err {
        OrgServiceError::OrgNotFound(id) => Response::status(404, format!("org not found: {id}")),
        OrgServiceError::Forbidden { .. } => {
            warn!("event={action} module=api status=forbidden");
            Response::status(403, "You are not authorized to perform this action.")
        }
        other => internal_error(action, &other),
    }
}

fn internal_error(action: &str, err: &dyn std::fmt::Display) -> Response {
    error!("event={action} module=api status=error error={err}");
    Response::status(500, format!("{action} failed: {err}"))
}
