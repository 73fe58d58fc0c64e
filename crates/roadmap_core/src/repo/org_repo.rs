//! Organisation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/save APIs for the organisation aggregate.
//! - Persist profile fields and reconciled identifiers in one transaction.
//!
//! # Invariants
//! - `save_org` validates the aggregate before touching storage.
//! - Identifier reconciliation is re-planned against rows read inside the
//!   write transaction, so concurrent writers cannot interleave between the
//!   check and the write.
//! - Removed identifier rows are deleted before new rows are inserted.

use crate::model::identifier::{Identifier, IdentifierScheme, SchemeId};
use crate::model::org::{Language, NewOrg, Org, OrgId, OrgLinks, OrgTypes, OrgValidationError};
use crate::reconcile::{reconcile_all, IdentifierAction, IdentifierChangeSet};
use crate::repo::identifier_repo::{
    load_identifiers, IdentifierRepository, SchemeHolder, SqliteIdentifierRepository,
};
use crate::repo::{bool_to_int, int_to_bool, is_unique_violation, RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const ORG_SELECT_SQL: &str = "SELECT
    id,
    name,
    abbreviation,
    contact_email,
    contact_name,
    logo,
    links,
    org_type,
    managed,
    feedback_enabled,
    feedback_msg,
    tracker_code,
    language_id
FROM orgs";

/// Result of one aggregate save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedOrg {
    /// Organisation as read back after commit.
    pub org: Org,
    /// One action per submitted candidate, in submission order.
    pub actions: Vec<IdentifierAction>,
    /// Rows actually deleted and inserted.
    pub changes: IdentifierChangeSet,
}

/// Repository interface for the organisation aggregate.
pub trait OrgRepository {
    /// Registers a new organisation and returns its id.
    fn create_org(&self, org: &NewOrg) -> RepoResult<OrgId>;
    /// Loads one organisation with its identifiers.
    fn get_org(&self, id: OrgId) -> RepoResult<Option<Org>>;
    /// Saves profile fields and reconciles `candidates` in one transaction.
    ///
    /// `org.identifiers` is ignored; stored identifiers are the baseline.
    fn save_org(&mut self, org: &Org, candidates: &[Identifier]) -> RepoResult<SavedOrg>;
    /// Lists interface languages ordered by name.
    fn list_languages(&self) -> RepoResult<Vec<Language>>;
}

/// SQLite-backed organisation repository.
pub struct SqliteOrgRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteOrgRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl OrgRepository for SqliteOrgRepository<'_> {
    fn create_org(&self, org: &NewOrg) -> RepoResult<OrgId> {
        if org.name.trim().is_empty() {
            return Err(RepoError::Validation(OrgValidationError::BlankName));
        }

        self.conn.execute(
            "INSERT INTO orgs (name, abbreviation, org_type, managed, links)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                org.name.trim(),
                org.abbreviation.as_deref(),
                i64::from(org.org_type.bits()),
                bool_to_int(org.managed),
                OrgLinks::default().to_json(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_org(&self, id: OrgId) -> RepoResult<Option<Org>> {
        load_org(self.conn, id)
    }

    fn save_org(&mut self, org: &Org, candidates: &[Identifier]) -> RepoResult<SavedOrg> {
        let mut profile = org.clone();
        profile.identifiers.clear();
        profile.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE orgs
             SET
                name = ?2,
                abbreviation = ?3,
                contact_email = ?4,
                contact_name = ?5,
                logo = ?6,
                links = ?7,
                org_type = ?8,
                managed = ?9,
                feedback_enabled = ?10,
                feedback_msg = ?11,
                tracker_code = ?12,
                language_id = ?13,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                org.id,
                org.name.trim(),
                org.abbreviation.as_deref(),
                org.contact_email.as_deref(),
                org.contact_name.as_deref(),
                org.logo.as_deref(),
                org.links.to_json(),
                i64::from(org.org_type.bits()),
                bool_to_int(org.managed),
                bool_to_int(org.feedback_enabled),
                org.feedback_msg.as_deref(),
                org.tracker_code.as_deref(),
                org.language_id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::OrgNotFound(org.id));
        }

        let stored = load_identifiers(&tx, org.id)?;
        profile.identifiers = stored.clone();
        let (reconciled, actions) = reconcile_all(profile, candidates);
        reconciled.validate()?;
        let changes = IdentifierChangeSet::between(&stored, &reconciled.identifiers);

        for id in &changes.removed {
            tx.execute(
                "DELETE FROM identifiers WHERE id = ?1 AND org_id = ?2;",
                params![id, org.id],
            )?;
        }
        for identifier in &changes.added {
            tx.execute(
                "INSERT INTO identifiers (org_id, identifier_scheme_id, value)
                 VALUES (?1, ?2, ?3);",
                params![org.id, identifier.scheme_id, identifier.value.as_str()],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    RepoError::DuplicateIdentifier {
                        org_id: org.id,
                        scheme_id: identifier.scheme_id,
                    }
                } else {
                    RepoError::from(err)
                }
            })?;
        }

        tx.commit()?;

        for action in actions.iter().filter(|action| !action.is_noop()) {
            info!(
                "event=identifier_reconcile module=repo status=ok org_id={} action={}",
                org.id,
                action.label()
            );
        }

        let saved = load_org(self.conn, org.id)?.ok_or(RepoError::OrgNotFound(org.id))?;
        Ok(SavedOrg {
            org: saved,
            actions,
            changes,
        })
    }

    fn list_languages(&self) -> RepoResult<Vec<Language>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, abbreviation, name
             FROM languages
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut languages = Vec::new();
        while let Some(row) = rows.next()? {
            languages.push(Language {
                id: row.get("id")?,
                abbreviation: row.get("abbreviation")?,
                name: row.get("name")?,
            });
        }
        Ok(languages)
    }
}

impl IdentifierRepository for SqliteOrgRepository<'_> {
    fn list_schemes(&self) -> RepoResult<Vec<IdentifierScheme>> {
        SqliteIdentifierRepository::new(self.conn).list_schemes()
    }

    fn scheme_by_name(&self, name: &str) -> RepoResult<Option<IdentifierScheme>> {
        SqliteIdentifierRepository::new(self.conn).scheme_by_name(name)
    }

    fn find_or_build(
        &self,
        org_id: OrgId,
        scheme_id: SchemeId,
        value: &str,
    ) -> RepoResult<Identifier> {
        SqliteIdentifierRepository::new(self.conn).find_or_build(org_id, scheme_id, value)
    }

    fn holders_of_scheme(&self, scheme_name: &str) -> RepoResult<Vec<SchemeHolder>> {
        SqliteIdentifierRepository::new(self.conn).holders_of_scheme(scheme_name)
    }
}

/// Loads one organisation and its identifiers from any connection or transaction.
pub fn load_org(conn: &Connection, id: OrgId) -> RepoResult<Option<Org>> {
    let org = conn
        .query_row(
            &format!("{ORG_SELECT_SQL} WHERE id = ?1;"),
            [id],
            |row| Ok(parse_org_row(row)),
        )
        .optional()?;

    match org {
        Some(parsed) => {
            let mut org = parsed?;
            org.identifiers = load_identifiers(conn, id)?;
            Ok(Some(org))
        }
        None => Ok(None),
    }
}

fn parse_org_row(row: &Row<'_>) -> RepoResult<Org> {
    let links_text: String = row.get("links")?;
    let links = OrgLinks::from_json(&links_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid links document `{links_text}` in orgs.links"))
    })?;

    let org_type_bits: i64 = row.get("org_type")?;
    let org_type = OrgTypes::from_bits(org_type_bits).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid org type `{org_type_bits}` in orgs.org_type"))
    })?;

    Ok(Org {
        id: row.get("id")?,
        name: row.get("name")?,
        abbreviation: row.get("abbreviation")?,
        contact_email: row.get("contact_email")?,
        contact_name: row.get("contact_name")?,
        logo: row.get("logo")?,
        links,
        org_type,
        managed: int_to_bool(row.get("managed")?, "orgs.managed")?,
        feedback_enabled: int_to_bool(row.get("feedback_enabled")?, "orgs.feedback_enabled")?,
        feedback_msg: row.get("feedback_msg")?,
        tracker_code: row.get("tracker_code")?,
        language_id: row.get("language_id")?,
        identifiers: Vec::new(),
    })
}
