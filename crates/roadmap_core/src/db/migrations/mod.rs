//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//! - Revert applied migrations down to a target version atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - A rollback either reaches the target version or leaves the schema untouched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    up: &'static str,
    down: Option<&'static str>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        up: include_str!("0001_init.sql"),
        down: Some(include_str!("0001_init.down.sql")),
    },
    Migration {
        version: 2,
        name: "add_provider_to_users",
        up: include_str!("0002_add_provider_to_users.sql"),
        down: Some(include_str!("0002_add_provider_to_users.down.sql")),
    },
    Migration {
        version: 3,
        name: "add_uid_to_users",
        up: include_str!("0003_add_uid_to_users.sql"),
        down: Some(include_str!("0003_add_uid_to_users.down.sql")),
    },
    Migration {
        version: 4,
        name: "change_sessions_session_id_limit",
        up: include_str!("0004_change_sessions_session_id_limit.sql"),
        down: Some(include_str!("0004_change_sessions_session_id_limit.down.sql")),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Returns the schema version currently recorded on the connection.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current = current_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        tx.execute_batch(migration.up)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=migration_apply module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

/// Reverts applied migrations until the schema reaches `target_version`.
///
/// Going below version 4 deletes sessions whose id is longer than 64
/// characters, since the older column cannot hold them.
///
/// # Errors
/// - `InvalidRollbackTarget` when `target_version` is above the current version.
/// - `IrreversibleMigration` when a migration in range has no down script.
pub fn rollback_migrations(conn: &mut Connection, target_version: u32) -> DbResult<()> {
    let current = current_version(conn)?;
    if target_version > current {
        return Err(DbError::InvalidRollbackTarget {
            db_version: current,
            target_version,
        });
    }
    if target_version == current {
        return Ok(());
    }

    let pending = MIGRATIONS
        .iter()
        .rev()
        .filter(|migration| migration.version > target_version && migration.version <= current)
        .collect::<Vec<_>>();

    if let Some(missing) = pending.iter().find(|migration| migration.down.is_none()) {
        return Err(DbError::IrreversibleMigration {
            version: missing.version,
        });
    }

    let tx = conn.transaction()?;
    for migration in pending {
        if let Some(down) = migration.down {
            tx.execute_batch(down)?;
        }
        tx.execute_batch(&format!(
            "PRAGMA user_version = {};",
            migration.version - 1
        ))?;
        info!(
            "event=migration_rollback module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}
