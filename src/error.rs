//! Error types shared by the persistence gateway, the validation step, and the
//! export utility. The UI and binary wrap these in `anyhow` and only reach for
//! the typed variants when a failure needs a field highlight.

use std::path::PathBuf;

use thiserror::Error;

/// Natural keys the store enforces uniqueness on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    BookNumber,
    Title,
    Email,
}

impl UniqueField {
    /// Form field name to highlight when this key collides.
    pub fn field_name(&self) -> &'static str {
        match self {
            UniqueField::BookNumber => "book_number",
            UniqueField::Title => "title",
            UniqueField::Email => "email",
        }
    }

    /// Map a `table.column` fragment from a SQLite constraint message.
    pub(crate) fn from_constraint_message(message: &str) -> Option<Self> {
        if message.contains("books.book_number") {
            Some(UniqueField::BookNumber)
        } else if message.contains("books.title") {
            Some(UniqueField::Title)
        } else if message.contains("users.email") {
            Some(UniqueField::Email)
        } else {
            None
        }
    }
}

/// One or more form fields failed validation. Fields are kept in form order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Please check required or invalid fields ({}).", .fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<&'static str>,
}

impl ValidationError {
    pub fn new(fields: Vec<&'static str>) -> Self {
        Self { fields }
    }
}

/// Failures raised at the service boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Duplicate { field: UniqueField, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("failed to write export to {path}: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Form field the caller should highlight, if the failure points at one.
    pub fn highlight_fields(&self) -> Vec<&'static str> {
        match self {
            StoreError::Validation(err) => err.fields.clone(),
            StoreError::Duplicate { field, .. } => vec![field.field_name()],
            _ => Vec::new(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
