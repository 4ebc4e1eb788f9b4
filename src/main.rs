//! Binary entry point: resolve configuration, start logging, open the store,
//! then either run a headless export or drive the terminal UI until exit.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use library_manager::{
    data_dir, default_db_path, export_catalog, open_database, run_app, App, AppConfig,
    ExportNaming,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configured one
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write the catalog to a CSV file and print its path
    Export {
        /// Destination directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Use books_export.csv instead of a timestamped name
        #[arg(long)]
        fixed_name: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = data_dir()?;

    let config = AppConfig::discover(cli.config.as_deref(), &data_dir)
        .context("failed to load configuration")?;
    config.logging.init(&data_dir)?;

    let db_path = match cli.db.or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => default_db_path()?,
    };
    let conn = open_database(&db_path)?;

    match cli.command {
        Some(Command::Export { out, fixed_name }) => {
            let dir = out.unwrap_or_else(|| config.export_dir.clone());
            let naming = if fixed_name {
                ExportNaming::Fixed
            } else {
                config.export_naming
            };
            let path = export_catalog(&conn, &dir, naming)?;
            println!("{}", path.display());
            Ok(())
        }
        None => {
            let mut app = App::new(conn, &config)?;
            run_app(&mut app)
        }
    }
}
