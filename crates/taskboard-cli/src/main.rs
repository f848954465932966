//! Taskboard terminal client
//!
//! Sign up, log in and manage tasks against a Taskboard backend:
//! - `taskboard signup` / `taskboard login` / `taskboard logout`
//! - `taskboard tasks list --status pending --category work`
//! - `taskboard tasks add "Write report" --category work --due 2024-05-01`
//! - `taskboard tasks toggle <id>` / `taskboard tasks delete <id>`

mod commands;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commands::{App, TaskCommand};
use std::path::PathBuf;
use std::sync::Arc;
use taskboard_client::{ApiClient, ClientConfig, FileTokenStore, Session};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend URL, overriding configuration and TASKBOARD_API_URL
    #[arg(short, long)]
    api_url: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "TASKBOARD_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Signup {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        /// Agree to the terms and conditions without prompting
        #[arg(long)]
        accept_terms: bool,
    },
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Log out and forget the stored token
    Logout,
    /// Show the logged in user
    Whoami,
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match cli.log_format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_with(path),
        None => ClientConfig::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
        config.validate().context("Invalid --api-url")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli)?;

    let config = load_config(&cli)?;
    debug!("Using backend at {}", config.api_url);

    let token_path = config.token_path().context("No location for the token file")?;
    let tokens = Arc::new(FileTokenStore::new(token_path));
    let api = ApiClient::from_config(&config, tokens).context("Failed to create HTTP client")?;

    let session = Session::new(api);
    session.bootstrap().await;
    let app = App::new(config, session);

    match cli.command {
        Commands::Signup {
            name,
            email,
            age,
            accept_terms,
        } => commands::signup(&app, name, email, age, accept_terms).await,
        Commands::Login { email } => commands::login(&app, email).await,
        Commands::Logout => commands::logout(&app).await,
        Commands::Whoami => commands::whoami(&app).await,
        Commands::Tasks(command) => commands::tasks(&app, command).await,
    }
}
