//! listkeep CLI - keep a personal list of named items in the cloud.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use listkeep_config::{init_logging, Config, Paths};
use tracing::debug;

/// listkeep CLI - Sign in and manage your item list.
#[derive(Parser)]
#[command(name = "listkeep")]
#[command(about = "listkeep CLI for authentication and item management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account with email and password
    Register,

    /// Login with email and password
    Login,

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Manage your items
    Items {
        #[command(subcommand)]
        command: ItemCommands,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// List items
    List,
    /// Add an item
    Add {
        /// Item name
        name: String,
        /// Item description
        description: String,
    },
    /// Replace an item's name and description
    Edit {
        /// Item ID
        id: String,
        /// New name
        name: String,
        /// New description
        description: String,
    },
    /// Remove an item
    Remove {
        /// Item ID
        id: String,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging("cli", level, &paths, false);
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    let format = &cli.format;
    match cli.command {
        Commands::Register => commands::register(&paths, &config, format).await,
        Commands::Login => commands::login(&paths, &config, format).await,
        Commands::Logout => commands::logout(&paths, &config, format).await,
        Commands::Status => commands::status(&paths, &config, format).await,
        Commands::Items { command } => match command {
            ItemCommands::List => commands::items_list(&paths, &config, format).await,
            ItemCommands::Add { name, description } => {
                commands::items_add(&paths, &config, &name, &description, format).await
            }
            ItemCommands::Edit {
                id,
                name,
                description,
            } => commands::items_edit(&paths, &config, &id, &name, &description, format).await,
            ItemCommands::Remove { id } => {
                commands::items_remove(&paths, &config, &id, format).await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
