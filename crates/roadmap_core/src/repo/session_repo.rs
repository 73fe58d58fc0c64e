//! Database-backed HTTP session store.
//!
//! # Responsibility
//! - Persist per-visitor session payloads keyed by session id.
//! - Generate fresh session ids.
//!
//! # Invariants
//! - Session ids are non-blank and at most 255 characters.
//! - Payloads are JSON objects.

use crate::db::DbError;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Column limit for `sessions.session_id`.
pub const SESSION_ID_MAX_CHARS: usize = 255;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
pub enum SessionError {
    BlankSessionId,
    SessionIdTooLong { length: usize },
    Db(DbError),
    InvalidData(String),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankSessionId => write!(f, "session id can't be blank"),
            Self::SessionIdTooLong { length } => write!(
                f,
                "session id has {length} characters; at most {SESSION_ID_MAX_CHARS} are allowed"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid session payload: {message}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key/value payload stored for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData(Map<String, Value>);

impl SessionData {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// SQLite-backed session store (one row per session id).
pub struct SqliteSessionStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Returns a new random session id. Nothing is stored until `save`.
    pub fn generate_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn load(&self, session_id: &str) -> SessionResult<Option<SessionData>> {
        validate_session_id(session_id)?;
        let raw = self
            .conn
            .query_row(
                "SELECT data FROM sessions WHERE session_id = ?1;",
                [session_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Ok(Some(SessionData(map))),
                Ok(_) => Err(SessionError::InvalidData(
                    "sessions.data is not a JSON object".to_string(),
                )),
                Err(err) => Err(SessionError::InvalidData(err.to_string())),
            },
            None => Ok(None),
        }
    }

    /// Inserts or replaces the payload for `session_id`.
    pub fn save(&self, session_id: &str, data: &SessionData) -> SessionResult<()> {
        validate_session_id(session_id)?;
        let payload = Value::Object(data.0.clone()).to_string();
        self.conn.execute(
            "INSERT INTO sessions (session_id, data) VALUES (?1, ?2)
             ON CONFLICT(session_id) DO UPDATE SET
                data = excluded.data,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![session_id, payload],
        )?;
        debug!("event=session_save module=repo status=ok");
        Ok(())
    }

    pub fn destroy(&self, session_id: &str) -> SessionResult<bool> {
        validate_session_id(session_id)?;
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE session_id = ?1;", [session_id])?;
        Ok(changed > 0)
    }
}

fn validate_session_id(session_id: &str) -> SessionResult<()> {
    if session_id.trim().is_empty() {
        return Err(SessionError::BlankSessionId);
    }
    let length = session_id.chars().count();
    if length > SESSION_ID_MAX_CHARS {
        return Err(SessionError::SessionIdTooLong { length });
    }
    Ok(())
}
