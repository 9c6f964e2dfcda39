use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use yamdb_api::config::DatabaseConfig;
use yamdb_api::db::run_migrations;
use yamdb_api::loader::{self, EntityKind, LoadError, PgStore};

#[derive(Parser, Debug)]
#[command(name = "manage", about = "YaMDb management commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load rows from a CSV file into the table of one model.
    ///
    /// Models reference each other, so load them in this order:
    /// User, Category, Genre, Title, Review, Comment, GenreTitle.
    #[command(name = "load_data")]
    LoadData {
        /// Model name, e.g. `Review` (case insensitive).
        model: String,

        /// Path to the CSV file.
        file_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::LoadData { model, file_path } => match load_data(&model, &file_path).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                log::error!("{err}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn load_data(model: &str, file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // Reject unknown models before opening the file or the database.
    if EntityKind::from_name(model).is_none() {
        return Err(LoadError::UnknownEntityType(model.to_string()).into());
    }

    let config = DatabaseConfig::from_env()?;
    let pool = config.connect().await?;
    run_migrations(&pool).await?;

    let store = PgStore::new(pool);
    let report = loader::load_data(&store, model, file_path).await?;

    println!(
        "{}: {} rows read, {} inserted, {} skipped",
        report.kind,
        report.rows,
        report.inserted,
        report.skipped()
    );

    store.pool().close().await;
    Ok(())
}
