use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

/// Foreign keys are declared so SQLite checks them when `PRAGMA foreign_keys`
/// is on. Nothing here cascades or enforces uniqueness; those rules belong to
/// `IntegrityPolicy`.
pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                username    TEXT NOT NULL
            );

            CREATE INDEX idx_users_username ON users(username);

            CREATE TABLE acronyms (
                id          TEXT PRIMARY KEY,
                short       TEXT NOT NULL,
                long        TEXT NOT NULL,
                creator_id  TEXT NOT NULL REFERENCES users(id)
            );

            CREATE INDEX idx_acronyms_creator ON acronyms(creator_id);

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL
            );

            CREATE TABLE acronym_category_pivot (
                id          TEXT PRIMARY KEY,
                acronym_id  TEXT NOT NULL REFERENCES acronyms(id),
                category_id TEXT NOT NULL REFERENCES categories(id)
            );

            CREATE INDEX idx_pivot_acronym ON acronym_category_pivot(acronym_id);
            CREATE INDEX idx_pivot_category ON acronym_category_pivot(category_id);

            CREATE TABLE tokens (
                id          TEXT PRIMARY KEY,
                token       TEXT NOT NULL,
                user_id     TEXT NOT NULL REFERENCES users(id)
            );

            CREATE INDEX idx_tokens_user ON tokens(user_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
