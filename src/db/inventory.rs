use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult, ValidationError};
use crate::models::{CopySummary, InventoryUpdate};

/// Counters for one book plus their total. A book without an inventory row
/// reads as all zeros; no row is created here.
pub fn get_copy_summary(conn: &Connection, book_id: i64) -> StoreResult<CopySummary> {
    let summary = conn
        .query_row(
            "SELECT available, lent, missing, damaged FROM inventory WHERE book_id = ?1",
            params![book_id],
            |row| {
                Ok(CopySummary::new(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                ))
            },
        )
        .optional()?
        .unwrap_or_default();
    debug!(book_id, total = summary.total, "loaded copy summary");
    Ok(summary)
}

/// Apply a partial counter update, creating a zeroed row first when the book
/// has none. Counters absent from `update` keep their stored values.
pub fn update_inventory(
    conn: &Connection,
    book_id: i64,
    update: &InventoryUpdate,
) -> StoreResult<CopySummary> {
    let assignments = update.assignments();
    if let Some((column, value)) = assignments.iter().find(|(_, value)| *value < 0) {
        warn!(book_id, column, value, "rejected negative inventory counter");
        return Err(ValidationError::new(vec![*column]).into());
    }

    let tx = conn.unchecked_transaction()?;
    let book_exists: Option<i64> = tx
        .query_row("SELECT id FROM books WHERE id = ?1", params![book_id], |row| {
            row.get(0)
        })
        .optional()?;
    if book_exists.is_none() {
        return Err(StoreError::NotFound {
            entity: "Book",
            id: book_id,
        });
    }

    let current = get_copy_summary(&tx, book_id)?;
    if update.checked_total(&current).is_none() {
        let columns: Vec<&'static str> = assignments.iter().map(|(column, _)| *column).collect();
        warn!(book_id, ?columns, "rejected inventory update overflowing the total");
        return Err(ValidationError::new(columns).into());
    }

    tx.execute(
        "INSERT OR IGNORE INTO inventory (book_id, available, lent, missing, damaged)
         VALUES (?1, 0, 0, 0, 0)",
        params![book_id],
    )?;

    for (column, value) in &assignments {
        // Column names come from a fixed list, never from input.
        let sql = format!("UPDATE inventory SET {column} = ?1 WHERE book_id = ?2");
        tx.execute(&sql, params![value, book_id])?;
    }
    tx.commit()?;

    info!(book_id, changed = assignments.len(), "updated inventory");
    get_copy_summary(conn, book_id)
}
