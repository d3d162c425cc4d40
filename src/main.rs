//! botkit-storage command-line entry point.
//!
//! Bootstraps the database and reads or writes records from the shell.
//! Output is JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use botkit_storage_postgres::{ClientDefaults, Collection, ConfigInput, Storage};

#[derive(Debug, Parser)]
#[command(name = "botkit-storage", version, about = "Inspect and manage botkit PostgreSQL storage")]
struct Cli {
    /// Connection string; falls back to BOTKIT_STORAGE_POSTGRES_* variables.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Reported to the server as application_name.
    #[arg(long, global = true, default_value = "botkit-storage")]
    application_name: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database and tables if they do not exist.
    Init,
    /// Print one record.
    Get {
        /// teams, channels or users.
        collection: Collection,
        /// Record id.
        id: String,
    },
    /// Store a record given as JSON (must contain a string "id").
    Save {
        /// teams, channels or users.
        collection: Collection,
        /// Record as a JSON object.
        json: String,
    },
    /// Print every record in a collection as a JSON array.
    All {
        /// teams, channels or users.
        collection: Collection,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let input = cli.url.map_or(ConfigInput::Environment, ConfigInput::ConnectionString);
    let defaults = ClientDefaults {
        application_name: Some(cli.application_name),
        ..ClientDefaults::default()
    };
    let storage = Storage::connect(input, defaults).await?;
    tracing::debug!(config = ?storage.config(), "storage ready");

    let outcome = run(&storage, cli.command).await;
    storage.end().await?;
    outcome
}

async fn run(storage: &Storage, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            println!(
                "{}",
                serde_json::json!({
                    "database": storage.config().database,
                    "tables": Collection::ALL.map(Collection::table_name),
                })
            );
        }
        Command::Get { collection, id } => {
            let record: serde_json::Value = storage.collection(collection).get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Save { collection, json } => {
            let record: serde_json::Value = serde_json::from_str(&json)?;
            storage.collection(collection).save(&record).await?;
            tracing::info!(%collection, "record saved");
        }
        Command::All { collection } => {
            let records: Vec<serde_json::Value> = storage.collection(collection).all().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
