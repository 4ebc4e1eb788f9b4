//! Library catalog, per-copy inventory and member roster kept in SQLite and
//! driven from a terminal UI.
//!
//! The binary only wires configuration, logging and the database together;
//! everything it needs is re-exported here so a headless caller can reuse the
//! same services.
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod session;
pub mod ui;
pub mod validation;

pub use config::{AppConfig, ConfigError, LoggingConfig};
pub use db::{data_dir, default_db_path, open_database};
pub use error::{StoreError, StoreResult, UniqueField, ValidationError};
pub use export::{export_catalog, ExportNaming};

/// The domain types every layer passes around.
pub use models::{
    Book, BookDraft, BookStatus, CopySummary, InventoryUpdate, MembershipType, User, UserDraft,
    UserStatus,
};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
