//! Identifier and identifier-scheme queries.
//!
//! # Responsibility
//! - Read scheme reference data.
//! - Resolve submitted identifier values to stored rows (find-or-build).
//! - List organisations holding an identifier for a named scheme.
//!
//! # Invariants
//! - Writes to `identifiers` go through `OrgRepository::save_org` only.

use crate::model::identifier::{Identifier, IdentifierId, IdentifierScheme, SchemeId};
use crate::model::org::OrgId;
use crate::repo::{int_to_bool, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// An organisation paired with the identifier it holds for one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeHolder {
    pub org_id: OrgId,
    pub org_name: String,
    pub identifier: Identifier,
}

/// Repository interface for identifier lookups.
pub trait IdentifierRepository {
    /// Lists active schemes ordered by name.
    fn list_schemes(&self) -> RepoResult<Vec<IdentifierScheme>>;
    /// Finds one scheme by exact name.
    fn scheme_by_name(&self, name: &str) -> RepoResult<Option<IdentifierScheme>>;
    /// Returns the stored row matching `(org, scheme, value)` or a new proposal.
    fn find_or_build(
        &self,
        org_id: OrgId,
        scheme_id: SchemeId,
        value: &str,
    ) -> RepoResult<Identifier>;
    /// Lists organisations holding an identifier for `scheme_name`.
    fn holders_of_scheme(&self, scheme_name: &str) -> RepoResult<Vec<SchemeHolder>>;
}

/// SQLite-backed identifier repository.
pub struct SqliteIdentifierRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIdentifierRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl IdentifierRepository for SqliteIdentifierRepository<'_> {
    fn list_schemes(&self) -> RepoResult<Vec<IdentifierScheme>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, active
             FROM identifier_schemes
             WHERE active = 1
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut schemes = Vec::new();
        while let Some(row) = rows.next()? {
            schemes.push(IdentifierScheme {
                id: row.get("id")?,
                name: row.get("name")?,
                description: row.get("description")?,
                active: int_to_bool(row.get("active")?, "identifier_schemes.active")?,
            });
        }
        Ok(schemes)
    }

    fn scheme_by_name(&self, name: &str) -> RepoResult<Option<IdentifierScheme>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, active
                 FROM identifier_schemes
                 WHERE name = ?1;",
                [name],
                |row| {
                    Ok((
                        row.get::<_, SchemeId>("id")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, Option<String>>("description")?,
                        row.get::<_, i64>("active")?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, name, description, active)) => Ok(Some(IdentifierScheme {
                id,
                name,
                description,
                active: int_to_bool(active, "identifier_schemes.active")?,
            })),
            None => Ok(None),
        }
    }

    fn find_or_build(
        &self,
        org_id: OrgId,
        scheme_id: SchemeId,
        value: &str,
    ) -> RepoResult<Identifier> {
        let value = value.trim();
        let existing = self
            .conn
            .query_row(
                "SELECT id
                 FROM identifiers
                 WHERE org_id = ?1
                   AND identifier_scheme_id = ?2
                   AND value = ?3;",
                params![org_id, scheme_id, value],
                |row| row.get::<_, IdentifierId>(0),
            )
            .optional()?;

        Ok(match existing {
            Some(id) => Identifier::persisted(id, scheme_id, value),
            None => Identifier::proposed(scheme_id, value),
        })
    }

    fn holders_of_scheme(&self, scheme_name: &str) -> RepoResult<Vec<SchemeHolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                i.id AS id,
                i.identifier_scheme_id AS scheme_id,
                i.value AS value,
                o.id AS org_id,
                o.name AS org_name
             FROM identifiers i
             INNER JOIN identifier_schemes s ON s.id = i.identifier_scheme_id
             INNER JOIN orgs o ON o.id = i.org_id
             WHERE s.name = ?1
             ORDER BY o.name COLLATE NOCASE ASC, o.id ASC;",
        )?;
        let mut rows = stmt.query([scheme_name])?;
        let mut holders = Vec::new();
        while let Some(row) = rows.next()? {
            holders.push(SchemeHolder {
                org_id: row.get("org_id")?,
                org_name: row.get("org_name")?,
                identifier: Identifier::persisted(
                    row.get("id")?,
                    row.get("scheme_id")?,
                    row.get::<_, String>("value")?,
                ),
            });
        }
        Ok(holders)
    }
}

/// Loads identifiers owned by one organisation, ordered by scheme.
pub fn load_identifiers(conn: &Connection, org_id: OrgId) -> RepoResult<Vec<Identifier>> {
    let mut stmt = conn.prepare(
        "SELECT id, identifier_scheme_id, value
         FROM identifiers
         WHERE org_id = ?1
         ORDER BY identifier_scheme_id ASC, id ASC;",
    )?;
    let mut rows = stmt.query([org_id])?;
    let mut identifiers = Vec::new();
    while let Some(row) = rows.next()? {
        identifiers.push(Identifier::persisted(
            row.get("id")?,
            row.get("identifier_scheme_id")?,
            row.get::<_, String>("value")?,
        ));
    }
    Ok(identifiers)
}
