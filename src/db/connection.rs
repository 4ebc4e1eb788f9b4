use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use rusqlite::Connection;
use tracing::info;

/// Folder name used beneath the user's home directory for application data.
pub const DATA_DIR_NAME: &str = ".library-manager";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "library.sqlite";

/// Open (creating if needed) the store at `path` and run the idempotent
/// schema setup. Foreign keys are switched on so inventory rows cannot point
/// at books that no longer exist.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    init_schema(&conn)?;
    info!(path = %path.display(), "opened library database");
    Ok(conn)
}

/// Create tables and search indexes if they do not exist yet.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_number INTEGER NOT NULL UNIQUE,
            title TEXT NOT NULL UNIQUE,
            author TEXT NOT NULL,
            translator TEXT NOT NULL DEFAULT '',
            pub_date TEXT NOT NULL DEFAULT '',
            isbn TEXT NOT NULL DEFAULT '',
            language TEXT NOT NULL DEFAULT '',
            genre TEXT NOT NULL DEFAULT '',
            edition TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'Available'
        )",
        [],
    )
    .context("failed to create books table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS inventory (
            book_id INTEGER PRIMARY KEY,
            available INTEGER NOT NULL DEFAULT 0,
            lent INTEGER NOT NULL DEFAULT 0,
            missing INTEGER NOT NULL DEFAULT 0,
            damaged INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create inventory table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL DEFAULT '',
            membership_type TEXT NOT NULL DEFAULT 'Regular',
            status TEXT NOT NULL DEFAULT 'Active'
        )",
        [],
    )
    .context("failed to create users table")?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);
         CREATE INDEX IF NOT EXISTS idx_books_author ON books(author);
         CREATE INDEX IF NOT EXISTS idx_books_number ON books(book_number);
         CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);
         CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);",
    )
    .context("failed to create search indexes")?;

    Ok(())
}

/// Application data directory inside the user's home.
pub fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

/// Resolve the absolute path to the SQLite database inside the user's home.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('books', 'inventory', 'users')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn open_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.sqlite");
        open_database(&path).unwrap();
        assert!(path.exists());
    }
}
