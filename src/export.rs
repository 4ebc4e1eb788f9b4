//! One-shot spreadsheet export of the catalog joined with inventory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};

const EXPORT_STEM: &str = "books_export";

/// How the export file is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportNaming {
    /// Always `books_export.csv`, overwriting the previous export.
    Fixed,
    /// `books_export_YYYYMMDD_HHMMSS.csv`.
    #[default]
    Timestamped,
}

impl ExportNaming {
    pub fn file_name(&self, now: DateTime<Local>) -> String {
        match self {
            ExportNaming::Fixed => format!("{EXPORT_STEM}.csv"),
            ExportNaming::Timestamped => {
                format!("{EXPORT_STEM}_{}.csv", now.format("%Y%m%d_%H%M%S"))
            }
        }
    }
}

/// Column titles, in `ExportRow` field order.
const HEADERS: [&str; 15] = [
    "ID",
    "Book Number",
    "Title",
    "Author",
    "Translator",
    "Publication Date",
    "ISBN",
    "Language",
    "Genre",
    "Edition",
    "Status",
    "Available",
    "Lent",
    "Missing",
    "Damaged",
];

/// One spreadsheet row. Counter cells stay empty for books that never got an
/// inventory row.
#[derive(Debug, Serialize)]
struct ExportRow {
    id: i64,
    book_number: i64,
    title: String,
    author: String,
    translator: String,
    pub_date: String,
    isbn: String,
    language: String,
    genre: String,
    edition: String,
    status: String,
    available: Option<i64>,
    lent: Option<i64>,
    missing: Option<i64>,
    damaged: Option<i64>,
}

fn load_rows(conn: &Connection) -> StoreResult<Vec<ExportRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.book_number, b.title, b.author, b.translator, b.pub_date, b.isbn,
                b.language, b.genre, b.edition, b.status,
                i.available, i.lent, i.missing, i.damaged
         FROM books b
         LEFT JOIN inventory i ON i.book_id = b.id
         ORDER BY b.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ExportRow {
                id: row.get(0)?,
                book_number: row.get(1)?,
                title: row.get(2)?,
                author: row.get(3)?,
                translator: row.get(4)?,
                pub_date: row.get(5)?,
                isbn: row.get(6)?,
                language: row.get(7)?,
                genre: row.get(8)?,
                edition: row.get(9)?,
                status: row.get(10)?,
                available: row.get(11)?,
                lent: row.get(12)?,
                missing: row.get(13)?,
                damaged: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Write every book to a CSV file inside `dir` and return its path.
pub fn export_catalog(
    conn: &Connection,
    dir: &Path,
    naming: ExportNaming,
) -> StoreResult<PathBuf> {
    let rows = load_rows(conn)?;
    let path = dir.join(naming.file_name(Local::now()));

    write_rows(&path, &rows).inspect_err(|err| warn!(%err, "catalog export failed"))?;
    info!(path = %path.display(), rows = rows.len(), "exported catalog");
    Ok(path)
}

fn write_rows(path: &Path, rows: &[ExportRow]) -> StoreResult<()> {
    let export_error = |reason: String| StoreError::Export {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| export_error(err.to_string()))?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| export_error(err.to_string()))?;
    writer
        .write_record(HEADERS)
        .map_err(|err| export_error(err.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| export_error(err.to_string()))?;
    }
    writer.flush().map_err(|err| export_error(err.to_string()))?;
    Ok(())
}
