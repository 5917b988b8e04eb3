pub mod error;
pub mod follows;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod password;
pub mod users;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use error::{DbError, Result};
pub use models::{Message, ProfileUpdate, User};

/// Handle to the Warbler store. One connection, serialized behind a mutex;
/// every public operation commits before it returns.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private, throwaway store. Each call yields an isolated database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopening_a_file_reruns_migrations_without_losing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warbler.db");

        {
            let db = Database::open(&path).unwrap();
            db.signup("testuser", "test@test.com", "HASHED_PASSWORD", None)
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let user = db.get_user_by_username("testuser").unwrap();
        assert!(user.is_some());
    }

    #[test]
    fn in_memory_databases_are_isolated() {
        let a = Database::open_in_memory().unwrap();
        let b = Database::open_in_memory().unwrap();

        a.signup("testuser", "test@test.com", "HASHED_PASSWORD", None)
            .unwrap();

        assert!(b.get_user_by_username("testuser").unwrap().is_none());
    }
}
