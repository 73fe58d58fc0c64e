//! Organisation lookup search.
//!
//! # Responsibility
//! - Match organisation names and abbreviations typed into the org picker.
//! - Optionally merge hits from an external organisation registry.
//!
//! # Invariants
//! - Terms of two characters or fewer return no hits.
//! - Ordering is deterministic: prefix matches first, then by name.
//! - In combined mode a local hit wins over an external hit with the same
//!   normalized name.

use crate::db::DbError;
use crate::model::identifier::{SCHEME_FUNDREF, SCHEME_ROR};
use crate::model::org::OrgId;
use log::debug;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Shortest term that triggers a search.
pub const MIN_TERM_CHARS: usize = 3;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug)]
pub enum SearchError {
    Db(DbError),
    /// External registry lookup failed.
    External(String),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::External(message) => write!(f, "external registry failed: {message}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Where hits come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    #[default]
    Local,
    External,
    Combined,
}

impl SearchMode {
    /// Unknown values fall back to `Local`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "external" => Self::External,
            "combined" => Self::Combined,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub mode: SearchMode,
    /// Keep only hits carrying a funder registry ID.
    pub funder_only: bool,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            mode: SearchMode::Local,
            funder_only: false,
        }
    }

    /// Builds a query from raw request parameters.
    pub fn from_params(name: Option<&str>, mode: Option<&str>, funder_only: Option<&str>) -> Self {
        Self {
            term: name.unwrap_or_default().to_string(),
            mode: mode.map(SearchMode::parse).unwrap_or_default(),
            funder_only: funder_only
                .is_some_and(|value| matches!(value.trim(), "true" | "1")),
        }
    }
}

/// One org picker entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Local organisation id; `None` for external hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrgId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ror: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundref: Option<String>,
}

/// Source of organisations not registered locally.
pub trait ExternalOrgRegistry {
    fn search(&self, term: &str) -> SearchResult<Vec<SearchHit>>;
}

/// Registry used when no external source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalRegistry;

impl ExternalOrgRegistry for NoExternalRegistry {
    fn search(&self, _term: &str) -> SearchResult<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

/// Runs one org picker search.
pub fn search_orgs(
    conn: &Connection,
    registry: &dyn ExternalOrgRegistry,
    query: &SearchQuery,
) -> SearchResult<Vec<SearchHit>> {
    let term = query.term.trim();
    if term.chars().count() < MIN_TERM_CHARS {
        return Ok(Vec::new());
    }

    let mut hits = match query.mode {
        SearchMode::Local => search_locally(conn, term)?,
        SearchMode::External => registry.search(term)?,
        SearchMode::Combined => {
            let local = search_locally(conn, term)?;
            let external = registry.search(term)?;
            merge_hits(local, external)
        }
    };

    if query.funder_only {
        hits.retain(|hit| {
            hit.fundref
                .as_deref()
                .is_some_and(|value| !value.trim().is_empty())
        });
    }

    sort_hits(&mut hits, term);
    debug!(
        "event=org_search module=search status=ok mode={:?} funder_only={} hits={}",
        query.mode,
        query.funder_only,
        hits.len()
    );
    Ok(hits)
}

fn search_locally(conn: &Connection, term: &str) -> SearchResult<Vec<SearchHit>> {
    let pattern = format!("%{}%", escape_like(term));
    let mut stmt = conn.prepare(
        "SELECT
            o.id AS id,
            o.name AS name,
            o.abbreviation AS abbreviation,
            (SELECT i.value
               FROM identifiers i
               INNER JOIN identifier_schemes s ON s.id = i.identifier_scheme_id
              WHERE i.org_id = o.id AND s.name = ?2) AS ror,
            (SELECT i.value
               FROM identifiers i
               INNER JOIN identifier_schemes s ON s.id = i.identifier_scheme_id
              WHERE i.org_id = o.id AND s.name = ?3) AS fundref
         FROM orgs o
         WHERE o.name LIKE ?1 ESCAPE '\\'
            OR o.abbreviation LIKE ?1 ESCAPE '\\'
         ORDER BY o.name COLLATE NOCASE ASC, o.id ASC;",
    )?;
    let mut rows = stmt.query(params![pattern, SCHEME_ROR, SCHEME_FUNDREF])?;
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        hits.push(parse_local_hit(row)?);
    }
    Ok(hits)
}

fn parse_local_hit(row: &Row<'_>) -> SearchResult<SearchHit> {
    let name: String = row.get("name")?;
    if name.trim().is_empty() {
        return Err(SearchError::InvalidData("blank organisation name".to_string()));
    }
    Ok(SearchHit {
        id: Some(row.get("id")?),
        name,
        abbreviation: row.get("abbreviation")?,
        ror: row.get("ror")?,
        fundref: row.get("fundref")?,
    })
}

fn merge_hits(local: Vec<SearchHit>, external: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = local
        .iter()
        .map(|hit| normalize_name(&hit.name))
        .collect::<HashSet<_>>();
    let mut merged = local;
    for hit in external {
        if seen.insert(normalize_name(&hit.name)) {
            merged.push(hit);
        }
    }
    merged
}

fn sort_hits(hits: &mut [SearchHit], term: &str) {
    let term = term.to_lowercase();
    hits.sort_by_cached_key(|hit| {
        let name = hit.name.to_lowercase();
        (!name.starts_with(&term), name)
    });
}

/// Lowercases and keeps only alphanumeric words.
fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{escape_like, merge_hits, normalize_name, sort_hits, SearchHit, SearchMode, SearchQuery};

    fn hit(id: Option<i64>, name: &str) -> SearchHit {
        SearchHit {
            id,
            name: name.to_string(),
            abbreviation: None,
            ror: None,
            fundref: None,
        }
    }

    #[test]
    fn mode_parsing_defaults_to_local() {
        assert_eq!(SearchMode::parse("Combined"), SearchMode::Combined);
        assert_eq!(SearchMode::parse("external"), SearchMode::External);
        assert_eq!(SearchMode::parse("anything"), SearchMode::Local);
    }

    #[test]
    fn funder_only_flag_is_parsed_from_text() {
        assert!(SearchQuery::from_params(Some("abc"), None, Some("true")).funder_only);
        assert!(!SearchQuery::from_params(Some("abc"), None, Some("false")).funder_only);
        assert!(!SearchQuery::from_params(Some("abc"), None, None).funder_only);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn prefix_matches_sort_first() {
        let mut hits = vec![
            hit(None, "Royal Example College"),
            hit(None, "Example University"),
            hit(None, "Alpha Example"),
        ];
        sort_hits(&mut hits, "exam");
        let names = hits.iter().map(|hit| hit.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["Example University", "Alpha Example", "Royal Example College"]
        );
    }

    #[test]
    fn combined_merge_prefers_local_hits() {
        let merged = merge_hits(
            vec![hit(Some(1), "Example University")],
            vec![hit(None, "example  university"), hit(None, "Other Org")],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, Some(1));
        assert_eq!(normalize_name("Example, University"), "example university");
    }
}
