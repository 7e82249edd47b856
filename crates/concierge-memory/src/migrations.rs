//! Schema migrations for the SQLite profile store.
//!
//! Each entry in [`MIGRATIONS`] is applied once, in order, inside its own
//! transaction, and recorded in `schema_migrations`.

use rusqlite::Connection;
use tracing::info;

use concierge_core::ConciergeError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "profiles",
    sql: "CREATE TABLE IF NOT EXISTS profiles (
              client_id   TEXT PRIMARY KEY NOT NULL,
              data        BLOB NOT NULL,
              updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
          );
          CREATE INDEX IF NOT EXISTS idx_profiles_updated_at
              ON profiles (updated_at DESC);",
}];

fn storage_err(context: &str, e: rusqlite::Error) -> ConciergeError {
    ConciergeError::Storage(format!("{}: {}", context, e))
}

/// Apply every migration newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), ConciergeError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| storage_err("Failed to create migrations table", e))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| storage_err("Failed to read schema version", e))?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let sql = format!(
            "BEGIN;
             {}
             INSERT INTO schema_migrations (version, name) VALUES ({}, '{}');
             COMMIT;",
            migration.sql, migration.version, migration.name
        );
        if let Err(e) = conn.execute_batch(&sql) {
            let _ = conn.execute_batch("ROLLBACK;");
            return Err(storage_err(
                &format!("Migration v{} ({}) failed", migration.version, migration.name),
                e,
            ));
        }
        info!(version = migration.version, name = migration.name, "Applied migration");
    }

    Ok(())
}
