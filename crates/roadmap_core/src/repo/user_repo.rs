//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and read user accounts for authorization decisions.
//! - Link federated identities (`provider`, `uid`) to accounts.

use crate::model::user::{NewUser, OmniauthIdentity, Role, User, UserId};
use crate::repo::{RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT id, email, org_id, role, provider, uid FROM users";

pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Finds the account linked to a federated identity.
    fn find_by_identity(&self, identity: &OmniauthIdentity) -> RepoResult<Option<User>>;
    /// Links (or relinks) a federated identity to an account.
    fn link_identity(&self, id: UserId, identity: &OmniauthIdentity) -> RepoResult<()>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (email, org_id, role) VALUES (?1, ?2, ?3);",
            params![user.email.trim(), user.org_id, user.role.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let parsed = self
            .conn
            .query_row(&format!("{USER_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_user_row(row))
            })
            .optional()?;
        parsed.transpose()
    }

    fn find_by_identity(&self, identity: &OmniauthIdentity) -> RepoResult<Option<User>> {
        let parsed = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE provider = ?1 AND uid = ?2 ORDER BY id LIMIT 1;"),
                params![identity.provider.as_str(), identity.uid.as_str()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?;
        parsed.transpose()
    }

    fn link_identity(&self, id: UserId, identity: &OmniauthIdentity) -> RepoResult<()> {
        identity.validate()?;
        let changed = self.conn.execute(
            "UPDATE users SET provider = ?2, uid = ?3 WHERE id = ?1;",
            params![id, identity.provider.as_str(), identity.uid.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::UserNotFound(id));
        }
        info!(
            "event=user_link_identity module=repo status=ok user_id={} provider={}",
            id, identity.provider
        );
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid role `{role_text}` in users.role")))?;

    let provider: Option<String> = row.get("provider")?;
    let uid: Option<String> = row.get("uid")?;
    let identity = match (provider, uid) {
        (Some(provider), Some(uid)) => Some(OmniauthIdentity { provider, uid }),
        _ => None,
    };

    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        org_id: row.get("org_id")?,
        role,
        identity,
    })
}
