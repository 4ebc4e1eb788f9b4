//! Per-panel session state: pager, loaded rows, cached search results, and
//! the row currently being edited. Handlers mutate the session explicitly
//! instead of closing over shared variables.

use rusqlite::Connection;
use tracing::debug;

use crate::db::{
    count_books, count_users, fetch_books_page, fetch_users_page, search_books, search_pattern,
    search_users,
};
use crate::error::StoreResult;
use crate::models::{Book, User};
use crate::pagination::Pager;

/// Store access a panel needs to list and filter its entity.
pub trait Listing {
    type Row: Clone;

    fn count(conn: &Connection) -> StoreResult<usize>;
    fn page(conn: &Connection, page: usize, page_size: usize) -> StoreResult<Vec<Self::Row>>;
    fn search(conn: &Connection, term: &str, exact: bool) -> StoreResult<Vec<Self::Row>>;
    fn row_id(row: &Self::Row) -> i64;
}

pub struct BookListing;

impl Listing for BookListing {
    type Row = Book;

    fn count(conn: &Connection) -> StoreResult<usize> {
        count_books(conn)
    }

    fn page(conn: &Connection, page: usize, page_size: usize) -> StoreResult<Vec<Book>> {
        fetch_books_page(conn, page, page_size)
    }

    fn search(conn: &Connection, term: &str, exact: bool) -> StoreResult<Vec<Book>> {
        search_books(conn, term, exact)
    }

    fn row_id(row: &Book) -> i64 {
        row.id
    }
}

pub struct UserListing;

impl Listing for UserListing {
    type Row = User;

    fn count(conn: &Connection) -> StoreResult<usize> {
        count_users(conn)
    }

    fn page(conn: &Connection, page: usize, page_size: usize) -> StoreResult<Vec<User>> {
        fetch_users_page(conn, page, page_size)
    }

    fn search(conn: &Connection, term: &str, exact: bool) -> StoreResult<Vec<User>> {
        search_users(conn, term, exact)
    }

    fn row_id(row: &User) -> i64 {
        row.id
    }
}

/// Search bar contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub exact: bool,
}

impl SearchQuery {
    pub fn is_active(&self) -> bool {
        search_pattern(&self.term).is_some()
    }
}

pub struct PanelSession<L: Listing> {
    pager: Pager,
    rows: Vec<L::Row>,
    /// Full match set of the active search. `None` while unfiltered.
    filtered: Option<Vec<L::Row>>,
    query: SearchQuery,
    selected: usize,
    editing: Option<i64>,
}

impl<L: Listing> PanelSession<L> {
    pub fn new(page_size: usize) -> Self {
        Self {
            pager: Pager::new(page_size),
            rows: Vec::new(),
            filtered: None,
            query: SearchQuery::default(),
            selected: 0,
            editing: None,
        }
    }

    /// Recount, clamp the page, and load the visible window. The count comes
    /// from the cached match set while a search is active and from the store
    /// otherwise.
    pub fn refresh(&mut self, conn: &Connection) -> StoreResult<()> {
        match &self.filtered {
            Some(matches) => {
                self.pager.set_total(matches.len());
                self.rows = matches[self.pager.window(matches.len())].to_vec();
            }
            None => {
                self.pager.set_total(L::count(conn)?);
                self.rows = L::page(conn, self.pager.page(), self.pager.page_size())?;
            }
        }
        self.ensure_in_bounds();
        Ok(())
    }

    /// Run a search and show its first page. A blank term clears the filter.
    /// On failure the previous query and match set are left in place.
    pub fn apply_search(&mut self, conn: &Connection, term: &str, exact: bool) -> StoreResult<()> {
        let query = SearchQuery {
            term: term.to_string(),
            exact,
        };
        let filtered = if query.is_active() {
            let matches = L::search(conn, term, exact)?;
            debug!(matches = matches.len(), exact, "search applied");
            Some(matches)
        } else {
            None
        };
        self.query = query;
        self.filtered = filtered;
        self.pager.reset();
        self.selected = 0;
        self.refresh(conn)
    }

    pub fn clear_search(&mut self, conn: &Connection) -> StoreResult<()> {
        self.apply_search(conn, "", self.query.exact)
    }

    /// Flip exact matching. An active search is re-run with the new mode;
    /// otherwise the flag is only remembered for the next search.
    pub fn toggle_exact(&mut self, conn: &Connection) -> StoreResult<bool> {
        let exact = !self.query.exact;
        if self.query.is_active() {
            let term = self.query.term.clone();
            self.apply_search(conn, &term, exact)?;
        } else {
            self.query.exact = exact;
        }
        Ok(exact)
    }

    /// Reload after a write. An active search is re-run so the cached set
    /// reflects inserts, edits and deletes; the page is clamped, not reset.
    pub fn resync(&mut self, conn: &Connection) -> StoreResult<()> {
        if self.filtered.is_some() {
            self.filtered = Some(L::search(conn, &self.query.term, self.query.exact)?);
        }
        self.refresh(conn)
    }

    pub fn set_page_size(&mut self, conn: &Connection, page_size: usize) -> StoreResult<()> {
        self.pager.set_page_size(page_size);
        self.selected = 0;
        self.refresh(conn)
    }

    pub fn cycle_page_size(&mut self, conn: &Connection) -> StoreResult<usize> {
        let size = self.pager.cycle_page_size();
        self.selected = 0;
        self.refresh(conn)?;
        Ok(size)
    }

    /// Returns whether the page changed; invalid input is silently ignored.
    pub fn go_to_page(&mut self, conn: &Connection, input: &str) -> StoreResult<bool> {
        if !self.pager.go_to(input) {
            return Ok(false);
        }
        self.selected = 0;
        self.refresh(conn)?;
        Ok(true)
    }

    pub fn next_page(&mut self, conn: &Connection) -> StoreResult<bool> {
        if !self.pager.next() {
            return Ok(false);
        }
        self.selected = 0;
        self.refresh(conn)?;
        Ok(true)
    }

    pub fn previous_page(&mut self, conn: &Connection) -> StoreResult<bool> {
        if !self.pager.previous() {
            return Ok(false);
        }
        self.selected = 0;
        self.refresh(conn)?;
        Ok(true)
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn rows(&self) -> &[L::Row] {
        &self.rows
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn current_row(&self) -> Option<&L::Row> {
        self.rows.get(self.selected)
    }

    pub fn current_id(&self) -> Option<i64> {
        self.current_row().map(L::row_id)
    }

    pub fn editing(&self) -> Option<i64> {
        self.editing
    }

    pub fn set_editing(&mut self, id: Option<i64>) {
        self.editing = id;
    }

    pub fn move_selection(&mut self, offset: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }

    fn ensure_in_bounds(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{delete_book, insert_book, test_connection, test_draft};

    fn seeded(count: i64) -> Connection {
        let conn = test_connection();
        for n in 0..count {
            insert_book(&conn, &test_draft(1000 + n, &format!("Book {n}"))).unwrap();
        }
        conn
    }

    #[test]
    fn unfiltered_total_comes_from_the_store() {
        let conn = seeded(12);
        let mut session = PanelSession::<BookListing>::new(5);
        session.refresh(&conn).unwrap();
        assert_eq!(session.pager().total(), 12);
        assert_eq!(session.pager().total_pages(), 3);
        assert_eq!(session.rows().len(), 5);
        assert_eq!(session.pager().label(), "Page 1 of 3 | Total: 12");
    }

    #[test]
    fn search_pages_through_the_cached_matches() {
        let conn = seeded(12);
        let mut session = PanelSession::<BookListing>::new(5);
        session.refresh(&conn).unwrap();
        session.go_to_page(&conn, "3").unwrap();

        // "book 1" matches Book 1, Book 10, Book 11.
        session.apply_search(&conn, "  BOOK 1 ", false).unwrap();
        assert!(session.is_filtered());
        assert_eq!(session.pager().page(), 1);
        assert_eq!(session.pager().total(), 3);
        assert_eq!(session.pager().total_pages(), 1);
        assert_eq!(session.rows().len(), 3);

        session.set_page_size(&conn, 2).unwrap();
        assert!(session.next_page(&conn).unwrap());
        assert_eq!(session.rows().len(), 1);
        assert_eq!(session.rows()[0].title, "Book 11");
    }

    #[test]
    fn blank_search_falls_back_to_full_listing() {
        let conn = seeded(4);
        let mut session = PanelSession::<BookListing>::new(100);
        session.apply_search(&conn, "Book 2", true).unwrap();
        assert_eq!(session.pager().total(), 1);
        session.apply_search(&conn, "   ", true).unwrap();
        assert!(!session.is_filtered());
        assert_eq!(session.pager().total(), 4);
    }

    #[test]
    fn deleting_the_last_row_on_the_last_page_clamps() {
        let conn = seeded(6);
        let mut session = PanelSession::<BookListing>::new(5);
        session.refresh(&conn).unwrap();
        assert!(session.go_to_page(&conn, "2").unwrap());
        let id = session.current_id().unwrap();

        delete_book(&conn, id).unwrap();
        session.resync(&conn).unwrap();
        assert_eq!(session.pager().page(), 1);
        assert_eq!(session.pager().total_pages(), 1);
        assert_eq!(session.rows().len(), 5);
    }

    #[test]
    fn resync_refreshes_an_active_search() {
        let conn = seeded(3);
        let mut session = PanelSession::<BookListing>::new(100);
        session.apply_search(&conn, "book", false).unwrap();
        let id = session.current_id().unwrap();
        delete_book(&conn, id).unwrap();
        session.resync(&conn).unwrap();
        assert_eq!(session.pager().total(), 2);
        assert!(session.rows().iter().all(|book| book.id != id));
    }

    #[test]
    fn toggling_exact_reruns_an_active_search() {
        let conn = seeded(3);
        let mut session = PanelSession::<BookListing>::new(100);
        session.refresh(&conn).unwrap();
        assert!(session.toggle_exact(&conn).unwrap());
        assert!(!session.is_filtered());

        session.apply_search(&conn, "book", true).unwrap();
        assert_eq!(session.pager().total(), 0);
        assert!(!session.toggle_exact(&conn).unwrap());
        assert_eq!(session.pager().total(), 3);
    }

    #[test]
    fn failed_search_keeps_the_previous_query() {
        let conn = seeded(3);
        let mut session = PanelSession::<BookListing>::new(100);
        session.apply_search(&conn, "book 1", false).unwrap();
        let before = session.query().clone();

        conn.execute_batch("DROP TABLE inventory; DROP TABLE books;")
            .unwrap();
        assert!(session.apply_search(&conn, "book 2", true).is_err());
        assert_eq!(session.query(), &before);
        assert!(session.is_filtered());
        assert_eq!(session.rows()[0].title, "Book 1");

        assert!(session.toggle_exact(&conn).is_err());
        assert!(!session.query().exact);
    }

    #[test]
    fn invalid_page_requests_are_ignored() {
        let conn = seeded(3);
        let mut session = PanelSession::<BookListing>::new(100);
        session.refresh(&conn).unwrap();
        assert!(!session.go_to_page(&conn, "two").unwrap());
        assert!(!session.go_to_page(&conn, "2").unwrap());
        assert!(!session.next_page(&conn).unwrap());
        assert_eq!(session.pager().page(), 1);
    }

    #[test]
    fn selection_stays_within_rows() {
        let conn = seeded(3);
        let mut session = PanelSession::<BookListing>::new(100);
        session.refresh(&conn).unwrap();
        session.move_selection(10);
        assert_eq!(session.selected_index(), 2);
        session.move_selection(-10);
        assert_eq!(session.selected_index(), 0);
    }
}
