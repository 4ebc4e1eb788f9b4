//! Persistence module split across logical submodules.

mod books;
mod connection;
mod inventory;
mod users;

use rusqlite::{Error as SqlError, ErrorCode};

use crate::error::{StoreError, UniqueField};

pub use books::{
    count_books, delete_book, fetch_all_books, fetch_book, fetch_books_page, find_book_by_title,
    insert_book, search_books, update_book,
};
pub use connection::{data_dir, default_db_path, init_schema, open_database, DATA_DIR_NAME};
pub use inventory::{get_copy_summary, update_inventory};
pub use users::{
    count_users, delete_user, fetch_all_users, fetch_user, fetch_users_page, insert_user,
    search_users, update_user,
};

/// Coerce SQLite unique-constraint failures into a duplicate error naming the
/// offending field. Anything else passes through untouched.
pub(crate) fn map_unique_constraint(err: SqlError) -> StoreError {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        if let SqlError::SqliteFailure(_, Some(detail)) = &err {
            if let Some(field) = UniqueField::from_constraint_message(detail) {
                let message = match field {
                    UniqueField::BookNumber => "Book number must be unique.",
                    UniqueField::Title => "A book with this title already exists.",
                    UniqueField::Email => "A user with this email already exists.",
                };
                return StoreError::Duplicate {
                    field,
                    message: message.to_string(),
                };
            }
        }
    }
    err.into()
}

/// `LIMIT`/`OFFSET` for a 1-based page, or `None` when the request cannot
/// match any rows.
pub(crate) fn page_bounds(page: usize, page_size: usize) -> Option<(i64, i64)> {
    if page == 0 || page_size == 0 {
        return None;
    }
    let offset = (page - 1).checked_mul(page_size)?;
    Some((page_size as i64, i64::try_from(offset).ok()?))
}

/// Normalized search needle: trimmed and lower-cased. Blank terms mean "no
/// filter" and yield `None`.
pub(crate) fn search_pattern(term: &str) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
pub(crate) fn test_connection() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().expect("in-memory database");
    init_schema(&conn).expect("schema");
    conn
}

#[cfg(test)]
pub(crate) fn test_draft(book_number: i64, title: &str) -> crate::models::BookDraft {
    crate::models::BookDraft {
        book_number,
        title: title.to_string(),
        author: "Test Author".to_string(),
        translator: String::new(),
        pub_date: String::new(),
        isbn: String::new(),
        language: String::new(),
        genre: String::new(),
        edition: String::new(),
        status: crate::models::BookStatus::Available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_are_one_based() {
        assert_eq!(page_bounds(1, 50), Some((50, 0)));
        assert_eq!(page_bounds(3, 100), Some((100, 200)));
        assert_eq!(page_bounds(0, 100), None);
        assert_eq!(page_bounds(1, 0), None);
    }

    #[test]
    fn search_pattern_trims_and_lowers() {
        assert_eq!(search_pattern("  Alice "), Some("alice".to_string()));
        assert_eq!(search_pattern(" \t "), None);
    }
}
