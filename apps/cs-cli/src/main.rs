mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use cs_schema::Schema;
use tree_store::PageRequest;

use crate::config::{AppConfig, CliOverrides};

/// Common Sense - schema-driven storage of nested documents in SQLite
#[derive(Parser)]
#[command(name = "common-sense")]
#[command(about = "Common Sense - schema-driven storage of nested documents in SQLite")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file or DSN (overrides config)
    #[arg(long)]
    database: Option<String>,

    /// YAML or JSON schema file (overrides config)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tables of the schema
    Create,
    /// Insert a JSON or YAML document ("-" reads stdin)
    Insert { file: PathBuf },
    /// Print an object by id as JSON
    Get { id: i64 },
    /// List main-table rows
    List {
        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Maximum rows to return (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: u64,
    },
    /// Print the table definitions without touching the database
    Schema,
    /// Verify that the database layout matches the schema
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        bail!("config file does not exist: {}", path.display());
    }

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (COMMON_SENSE__*) -> 4) CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        database: cli.database,
        schema: cli.schema,
        verbose: cli.verbose,
    });

    logging::init(&config.logging);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("no command given, see --help");
    };

    let schema = commands::load_schema(&config)?;
    let command = match command {
        Commands::Schema => return commands::print_schema(&schema),
        Commands::Create => StoreCommand::Create,
        Commands::Insert { file } => StoreCommand::Insert(file),
        Commands::Get { id } => StoreCommand::Get(id),
        Commands::List { offset, limit } => StoreCommand::List(PageRequest::new(offset, limit)),
        Commands::Check => StoreCommand::Check,
    };
    run_with_store(command, &config, schema).await
}

/// Commands that need an open store.
enum StoreCommand {
    Create,
    Insert(PathBuf),
    Get(i64),
    List(PageRequest),
    Check,
}

async fn run_with_store(command: StoreCommand, config: &AppConfig, schema: Schema) -> Result<()> {
    let store = commands::open_store(config, schema).await?;
    tracing::debug!(dsn = %config.database.dsn, "store opened");

    let result = match command {
        StoreCommand::Create => commands::create(&store).await,
        StoreCommand::Insert(file) => commands::insert(&store, &file).await,
        StoreCommand::Get(id) => commands::get(&store, id).await,
        StoreCommand::List(page) => commands::list(&store, page).await,
        StoreCommand::Check => commands::check(&store).await,
    };

    store.close().await;
    result
}
