//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI. These types stay light-weight data holders so the persistence layer can
//! hydrate them straight from rows and the UI can render them without extra
//! lookups.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::validation::Validation;

/// Lifecycle label stored on each catalog entry. The value is independent of
/// the inventory counters; the two are allowed to disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookStatus {
    #[default]
    Available,
    NotAvailable,
    Missing,
    Damaged,
}

impl BookStatus {
    /// Labels in the order the form cycles through them.
    pub const LABELS: &'static [&'static str] =
        &["Available", "Not Available", "Missing", "Damaged"];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "Available",
            BookStatus::NotAvailable => "Not Available",
            BookStatus::Missing => "Missing",
            BookStatus::Damaged => "Damaged",
        }
    }
}

impl FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Available" => Ok(BookStatus::Available),
            "Not Available" => Ok(BookStatus::NotAvailable),
            "Missing" => Ok(BookStatus::Missing),
            "Damaged" => Ok(BookStatus::Damaged),
            other => Err(format!("unknown book status '{other}'")),
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every editable column of a book. Used for both inserts and full-row
/// updates; the surrogate id never appears here because it is not editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    /// Human-assigned catalog number. Unique across the catalog.
    pub book_number: i64,
    /// Unique across the catalog as well.
    pub title: String,
    pub author: String,
    pub translator: String,
    /// Free text; no date parsing is attempted.
    pub pub_date: String,
    pub isbn: String,
    pub language: String,
    pub genre: String,
    pub edition: String,
    pub status: BookStatus,
}

impl BookDraft {
    /// Convert a clean validation pass over `BOOK_FIELDS` into a typed draft.
    /// Any recorded error short-circuits so nothing reaches the store.
    pub fn from_validation(validation: &Validation) -> Result<Self, ValidationError> {
        validation.ensure_valid()?;
        let cleaned = &validation.cleaned;
        let book_number = cleaned
            .integer("book_number")
            .ok_or_else(|| ValidationError::new(vec!["book_number"]))?;
        let status = cleaned
            .text("status")
            .parse()
            .map_err(|_| ValidationError::new(vec!["status"]))?;

        Ok(Self {
            book_number,
            title: cleaned.text("title").to_string(),
            author: cleaned.text("author").to_string(),
            translator: cleaned.text("translator").to_string(),
            pub_date: cleaned.text("pub_date").to_string(),
            isbn: cleaned.text("isbn").to_string(),
            language: cleaned.text("language").to_string(),
            genre: cleaned.text("genre").to_string(),
            edition: cleaned.text("edition").to_string(),
            status,
        })
    }
}

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    /// Primary key from the database. Edit/delete/summary flows bubble it back
    /// to the persistence layer.
    pub id: i64,
    pub book_number: i64,
    pub title: String,
    pub author: String,
    pub translator: String,
    pub pub_date: String,
    pub isbn: String,
    pub language: String,
    pub genre: String,
    pub edition: String,
    pub status: BookStatus,
}

impl Book {
    /// Raw text values in `BOOK_FIELDS` order, used to seed the edit form.
    pub fn form_values(&self) -> Vec<String> {
        vec![
            self.book_number.to_string(),
            self.title.clone(),
            self.author.clone(),
            self.translator.clone(),
            self.pub_date.clone(),
            self.isbn.clone(),
            self.language.clone(),
            self.genre.clone(),
            self.edition.clone(),
            self.status.as_str().to_string(),
        ]
    }
}

/// Four-counter breakdown of the physical copies of one book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopySummary {
    pub available: i64,
    pub lent: i64,
    pub missing: i64,
    pub damaged: i64,
    pub total: i64,
}

impl CopySummary {
    /// The total saturates at `i64::MAX` for rows written outside this crate.
    pub fn new(available: i64, lent: i64, missing: i64, damaged: i64) -> Self {
        Self {
            available,
            lent,
            missing,
            damaged,
            total: available
                .saturating_add(lent)
                .saturating_add(missing)
                .saturating_add(damaged),
        }
    }
}

/// Partial inventory change. Counters left as `None` keep their stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventoryUpdate {
    pub available: Option<i64>,
    pub lent: Option<i64>,
    pub missing: Option<i64>,
    pub damaged: Option<i64>,
}

impl InventoryUpdate {
    /// Column/value pairs for every counter present in the update.
    pub(crate) fn assignments(&self) -> Vec<(&'static str, i64)> {
        [
            ("available", self.available),
            ("lent", self.lent),
            ("missing", self.missing),
            ("damaged", self.damaged),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    /// Total copies once this update is laid over `current`, or `None` when
    /// the sum does not fit in an `i64`.
    pub(crate) fn checked_total(&self, current: &CopySummary) -> Option<i64> {
        [
            self.available.unwrap_or(current.available),
            self.lent.unwrap_or(current.lent),
            self.missing.unwrap_or(current.missing),
            self.damaged.unwrap_or(current.damaged),
        ]
        .into_iter()
        .try_fold(0i64, i64::checked_add)
    }
}

/// Membership tier of a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MembershipType {
    #[default]
    Regular,
    Premium,
    Student,
    Staff,
}

impl MembershipType {
    pub const LABELS: &'static [&'static str] = &["Regular", "Premium", "Student", "Staff"];

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipType::Regular => "Regular",
            MembershipType::Premium => "Premium",
            MembershipType::Student => "Student",
            MembershipType::Staff => "Staff",
        }
    }
}

impl FromStr for MembershipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Regular" => Ok(MembershipType::Regular),
            "Premium" => Ok(MembershipType::Premium),
            "Student" => Ok(MembershipType::Student),
            "Staff" => Ok(MembershipType::Staff),
            other => Err(format!("unknown membership type '{other}'")),
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub const LABELS: &'static [&'static str] = &["Active", "Inactive", "Suspended"];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Inactive => "Inactive",
            UserStatus::Suspended => "Suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(UserStatus::Active),
            "Inactive" => Ok(UserStatus::Inactive),
            "Suspended" => Ok(UserStatus::Suspended),
            other => Err(format!("unknown user status '{other}'")),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable columns of a roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub name: String,
    /// Unique across the roster.
    pub email: String,
    pub phone: String,
    pub membership_type: MembershipType,
    pub status: UserStatus,
}

impl UserDraft {
    pub fn from_validation(validation: &Validation) -> Result<Self, ValidationError> {
        validation.ensure_valid()?;
        let cleaned = &validation.cleaned;
        let membership_type = cleaned
            .text("membership_type")
            .parse()
            .map_err(|_| ValidationError::new(vec!["membership_type"]))?;
        let status = cleaned
            .text("status")
            .parse()
            .map_err(|_| ValidationError::new(vec!["status"]))?;

        Ok(Self {
            name: cleaned.text("name").to_string(),
            email: cleaned.text("email").to_string(),
            phone: cleaned.text("phone").to_string(),
            membership_type,
            status,
        })
    }
}

/// A persisted roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub membership_type: MembershipType,
    pub status: UserStatus,
}

impl User {
    /// Raw text values in `USER_FIELDS` order.
    pub fn form_values(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.membership_type.as_str().to_string(),
            self.status.as_str().to_string(),
        ]
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
