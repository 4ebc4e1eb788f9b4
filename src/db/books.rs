use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult, UniqueField};
use crate::models::{Book, BookDraft};

use super::{map_unique_constraint, page_bounds, search_pattern};

const BOOK_COLUMNS: &str = "id, book_number, title, author, translator, pub_date, isbn, \
                            language, genre, edition, status";

/// Hydrate a `Book` from a row selected with `BOOK_COLUMNS`.
pub(crate) fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let status: String = row.get(10)?;
    Ok(Book {
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
        status: status.parse().map_err(|err: String| {
            rusqlite::Error::FromSqlConversionFailure(10, Type::Text, err.into())
        })?,
    })
}

fn collect_books(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StoreResult<Vec<Book>> {
    let mut stmt = conn.prepare(sql)?;
    let books = stmt
        .query_map(params, book_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

/// Reject a title that already belongs to another book. The store enforces
/// the same constraint, but checking first lets the message name the book
/// that owns the title.
fn ensure_title_free(conn: &Connection, title: &str, own_id: Option<i64>) -> StoreResult<()> {
    if let Some(existing) = find_book_by_title(conn, title)? {
        if Some(existing.id) != own_id {
            return Err(StoreError::Duplicate {
                field: UniqueField::Title,
                message: format!(
                    "A book with this title already exists (Book Number: {}).",
                    existing.book_number
                ),
            });
        }
    }
    Ok(())
}

/// Insert a book together with its zeroed inventory row. Both writes commit
/// atomically.
pub fn insert_book(conn: &Connection, draft: &BookDraft) -> StoreResult<Book> {
    ensure_title_free(conn, &draft.title, None)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO books (
            book_number, title, author, translator, pub_date, isbn,
            language, genre, edition, status
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            draft.book_number,
            draft.title,
            draft.author,
            draft.translator,
            draft.pub_date,
            draft.isbn,
            draft.language,
            draft.genre,
            draft.edition,
            draft.status.as_str(),
        ],
    )
    .map_err(map_unique_constraint)?;

    let id = tx.last_insert_rowid();
    tx.execute("INSERT INTO inventory (book_id) VALUES (?1)", params![id])?;
    tx.commit()?;

    info!(id, book_number = draft.book_number, "inserted book");
    Ok(Book {
        id,
        book_number: draft.book_number,
        title: draft.title.clone(),
        author: draft.author.clone(),
        translator: draft.translator.clone(),
        pub_date: draft.pub_date.clone(),
        isbn: draft.isbn.clone(),
        language: draft.language.clone(),
        genre: draft.genre.clone(),
        edition: draft.edition.clone(),
        status: draft.status,
    })
}

/// Overwrite every editable column of an existing book.
pub fn update_book(conn: &Connection, id: i64, draft: &BookDraft) -> StoreResult<()> {
    ensure_title_free(conn, &draft.title, Some(id))?;

    let updated = conn
        .execute(
            "UPDATE books SET
                book_number = ?1, title = ?2, author = ?3, translator = ?4, pub_date = ?5,
                isbn = ?6, language = ?7, genre = ?8, edition = ?9, status = ?10
             WHERE id = ?11",
            params![
                draft.book_number,
                draft.title,
                draft.author,
                draft.translator,
                draft.pub_date,
                draft.isbn,
                draft.language,
                draft.genre,
                draft.edition,
                draft.status.as_str(),
                id,
            ],
        )
        .map_err(map_unique_constraint)?;

    if updated == 0 {
        return Err(StoreError::NotFound { entity: "Book", id });
    }
    info!(id, "updated book");
    Ok(())
}

/// Remove a book and its inventory row in one transaction.
pub fn delete_book(conn: &Connection, id: i64) -> StoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM inventory WHERE book_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM books WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(StoreError::NotFound { entity: "Book", id });
    }
    tx.commit()?;

    info!(id, "deleted book");
    Ok(())
}

pub fn fetch_book(conn: &Connection, id: i64) -> StoreResult<Option<Book>> {
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], book_from_row).optional()?)
}

/// Exact, case-sensitive title lookup, matching the store's constraint.
pub fn find_book_by_title(conn: &Connection, title: &str) -> StoreResult<Option<Book>> {
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE title = ?1");
    Ok(conn.query_row(&sql, params![title], book_from_row).optional()?)
}

pub fn count_books(conn: &Connection) -> StoreResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// One 1-based page of books ordered by id. Pages outside the stored range
/// come back empty.
pub fn fetch_books_page(
    conn: &Connection,
    page: usize,
    page_size: usize,
) -> StoreResult<Vec<Book>> {
    let Some((limit, offset)) = page_bounds(page, page_size) else {
        return Ok(Vec::new());
    };
    debug!(page, page_size, "loading book page");
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id LIMIT ?1 OFFSET ?2");
    collect_books(conn, &sql, params![limit, offset])
}

pub fn fetch_all_books(conn: &Connection) -> StoreResult<Vec<Book>> {
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id");
    collect_books(conn, &sql, [])
}

/// Match the term against book number, title and author. Substring mode is
/// case-insensitive; exact mode compares the lower-cased column to the
/// lower-cased term. A blank term returns the whole catalog.
pub fn search_books(conn: &Connection, term: &str, exact: bool) -> StoreResult<Vec<Book>> {
    let Some(needle) = search_pattern(term) else {
        return fetch_all_books(conn);
    };
    debug!(term = %needle, exact, "searching books");

    let predicate = if exact {
        "CAST(book_number AS TEXT) = ?1 OR LOWER(title) = ?1 OR LOWER(author) = ?1"
    } else {
        "instr(CAST(book_number AS TEXT), ?1) > 0
         OR instr(LOWER(title), ?1) > 0
         OR instr(LOWER(author), ?1) > 0"
    };
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE {predicate} ORDER BY id");
    collect_books(conn, &sql, params![needle])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection as test_conn;
    use crate::models::BookStatus;

    fn draft(book_number: i64, title: &str, author: &str) -> BookDraft {
        BookDraft {
            book_number,
            title: title.to_string(),
            author: author.to_string(),
            translator: String::new(),
            pub_date: "1865".to_string(),
            isbn: String::new(),
            language: "English".to_string(),
            genre: "Fiction".to_string(),
            edition: "1st".to_string(),
            status: BookStatus::Available,
        }
    }

    #[test]
    fn insert_creates_book_and_inventory() {
        let conn = test_conn();
        let book = insert_book(&conn, &draft(1, "Alice in Wonderland", "Lewis Carroll")).unwrap();

        let stored = fetch_book(&conn, book.id).unwrap().unwrap();
        assert_eq!(stored, book);

        let inventory_rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM inventory WHERE book_id = ?1",
                [book.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(inventory_rows, 1);
    }

    #[test]
    fn duplicate_book_number_is_rejected() {
        let conn = test_conn();
        insert_book(&conn, &draft(7, "First", "A")).unwrap();
        let err = insert_book(&conn, &draft(7, "Second", "B")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate {
                field: UniqueField::BookNumber,
                ..
            }
        ));
        assert_eq!(count_books(&conn).unwrap(), 1);
        let inventory_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM inventory", [], |row| row.get(0))
            .unwrap();
        assert_eq!(inventory_rows, 1);
    }

    #[test]
    fn duplicate_title_names_the_existing_book() {
        let conn = test_conn();
        insert_book(&conn, &draft(10, "Dune", "Frank Herbert")).unwrap();
        let err = insert_book(&conn, &draft(11, "Dune", "Someone Else")).unwrap_err();
        match err {
            StoreError::Duplicate { field, message } => {
                assert_eq!(field, UniqueField::Title);
                assert!(message.contains("Book Number: 10"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count_books(&conn).unwrap(), 1);
    }

    #[test]
    fn update_to_own_keys_is_not_a_collision() {
        let conn = test_conn();
        let book = insert_book(&conn, &draft(3, "Emma", "Jane Austen")).unwrap();
        let mut changed = draft(3, "Emma", "Jane Austen");
        changed.edition = "2nd".to_string();
        update_book(&conn, book.id, &changed).unwrap();
        assert_eq!(fetch_book(&conn, book.id).unwrap().unwrap().edition, "2nd");
    }

    #[test]
    fn update_into_another_books_number_fails() {
        let conn = test_conn();
        insert_book(&conn, &draft(1, "One", "A")).unwrap();
        let second = insert_book(&conn, &draft(2, "Two", "B")).unwrap();
        let err = update_book(&conn, second.id, &draft(1, "Two", "B")).unwrap_err();
        assert_eq!(err.highlight_fields(), vec!["book_number"]);
    }

    #[test]
    fn update_and_delete_missing_rows_report_not_found() {
        let conn = test_conn();
        assert!(matches!(
            update_book(&conn, 99, &draft(1, "X", "Y")),
            Err(StoreError::NotFound { id: 99, .. })
        ));
        assert!(matches!(
            delete_book(&conn, 99),
            Err(StoreError::NotFound { id: 99, .. })
        ));
    }

    #[test]
    fn pages_cover_every_book_once_in_id_order() {
        let conn = test_conn();
        for n in 0..7 {
            insert_book(&conn, &draft(100 + n, &format!("Title {n}"), "Author")).unwrap();
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            seen.extend(fetch_books_page(&conn, page, 3).unwrap());
        }
        let all = fetch_all_books(&conn).unwrap();
        assert_eq!(seen, all);
        assert!(seen.windows(2).all(|pair| pair[0].id < pair[1].id));

        assert!(fetch_books_page(&conn, 4, 3).unwrap().is_empty());
        assert!(fetch_books_page(&conn, 0, 3).unwrap().is_empty());
    }

    #[test]
    fn substring_and_exact_search() {
        let conn = test_conn();
        insert_book(&conn, &draft(1, "Alice in Wonderland", "Lewis Carroll")).unwrap();
        insert_book(&conn, &draft(2, "Moby Dick", "Herman Melville")).unwrap();

        let hits = search_books(&conn, "ali", false).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Alice in Wonderland");

        assert!(search_books(&conn, "ali", true).unwrap().is_empty());
        assert_eq!(search_books(&conn, "Alice In Wonderland", true).unwrap().len(), 1);
        assert_eq!(search_books(&conn, "melville", false).unwrap().len(), 1);
        assert_eq!(search_books(&conn, "2", true).unwrap()[0].title, "Moby Dick");
        assert_eq!(search_books(&conn, "   ", false).unwrap().len(), 2);
    }

    #[test]
    fn wildcard_characters_are_literal() {
        let conn = test_conn();
        insert_book(&conn, &draft(1, "100% Cotton", "A")).unwrap();
        insert_book(&conn, &draft(2, "Plain", "B")).unwrap();
        assert_eq!(search_books(&conn, "%", false).unwrap().len(), 1);
        assert!(search_books(&conn, "_", false).unwrap().is_empty());
    }
}
