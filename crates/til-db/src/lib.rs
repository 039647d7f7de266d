pub mod error;
pub mod migrations;
pub mod models;
pub mod policy;
pub mod queries;

pub use error::{DbError, DbResult};
pub use models::Entity;
pub use policy::{IntegrityPolicy, ReferentialIntegrity};

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Handle to the acronym store. Constructed once and shared by reference
/// (or through an `Arc`) with everything that needs data access.
pub struct Database {
    conn: Mutex<Connection>,
    policy: IntegrityPolicy,
}

impl Database {
    pub fn open(path: &Path, policy: IntegrityPolicy) -> DbResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn, policy)?;
        info!("Database opened at {} ({})", path.display(), policy);
        Ok(db)
    }

    pub fn open_in_memory(policy: IntegrityPolicy) -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?, policy)
    }

    fn init(conn: Connection, policy: IntegrityPolicy) -> DbResult<Self> {
        conn.pragma_update(None, "foreign_keys", policy.referential.enforces_foreign_keys())?;
        register_functions(&conn)?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            policy,
        })
    }

    pub fn policy(&self) -> IntegrityPolicy {
        self.policy
    }

    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }
}

/// `til_fold(text)` lowercases with full Unicode case mapping. SQLite's own
/// `lower()` and `LIKE` only fold ASCII letters.
fn register_functions(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        "til_fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
    )?;
    Ok(())
}
