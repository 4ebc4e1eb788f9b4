//! Terminal front end: two tabbed panels over the catalog and the roster.

mod app;
mod forms;
mod helpers;
mod terminal;

pub use app::App;
pub use terminal::run_app;
