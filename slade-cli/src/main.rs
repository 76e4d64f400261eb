//! Slade CLI
//!
//! Command-line interface for checking Slade 360 server client credentials.
//!
//! # Usage
//!
//! ```bash
//! # Validate the configured credentials without any network call
//! slade check-config
//!
//! # Log in and print an access token
//! slade token --format json
//!
//! # Print the auth server profile of the configured user
//! slade me
//!
//! # Ask the auth server whether a token is valid
//! slade introspect <TOKEN>
//! ```

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use serde::Serialize;
use slade_core::config::INTROSPECTION_URL_ENV_VAR;
use slade_core::{
    ClientConfig, ServerClient, check_preconditions, fetch_user_profile,
    get_env_var, is_debug, validate_access_token,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "slade")]
#[command(about = "Slade 360 server client credentials tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log every API request as a curl command (credentials redacted)
    #[arg(long, global = true)]
    debug: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print an access token
    Token {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the auth server profile of the configured user
    Me,

    /// Check an access token against the auth server
    Introspect {
        /// Access token to check
        token: String,

        /// Introspection endpoint (defaults to AUTH_SERVER_INTROSPECTION_URL)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Validate the configured credentials without contacting the server
    CheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct TokenOutput {
    access_token: String,
    token_type: String,
    scope: String,
    expires_in: i64,
    refresh_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(cli.config.as_deref(), default_config_path().as_deref())?;
    let debug = cli.debug || is_debug();

    match cli.command {
        Commands::Token { format } => print_token(config, debug, format).await,
        Commands::Me => print_profile(config, debug).await,
        Commands::Introspect { token, url } => introspect(config, debug, &token, url).await,
        Commands::CheckConfig => check_config(&config),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "slade360", "slade").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Pick the configuration source: an explicit file, the default file, or the environment.
fn resolve_config(explicit: Option<&Path>, default: Option<&Path>) -> Result<ClientConfig> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading configuration file");
        return ClientConfig::load_from_path(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }

    if let Some(path) = default.filter(|p| p.exists()) {
        debug!(path = %path.display(), "loading default configuration file");
        return ClientConfig::load_from_path(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }

    debug!("reading configuration from the environment");
    ClientConfig::from_env().context("failed to read configuration from the environment")
}

async fn connect(config: ClientConfig, debug: bool) -> Result<ServerClient> {
    let client = ServerClient::new(config)?;
    client.set_debug(debug);
    client
        .initialize()
        .await
        .context("failed to initialize the server client")?;
    info!(username = %client.username(), "logged in");
    Ok(client)
}

async fn print_token(config: ClientConfig, debug: bool, format: OutputFormat) -> Result<()> {
    let client = connect(config, debug).await?;
    let Some(state) = client.token_state() else {
        bail!("no token state after initialization");
    };

    match format {
        OutputFormat::Text => println!("{}", state.access_token.expose()),
        OutputFormat::Json => {
            let output = TokenOutput {
                access_token: state.access_token.expose().to_string(),
                token_type: state.token_type.clone(),
                scope: state.access_scope.clone(),
                expires_in: state.expires_in,
                refresh_at: state.refresh_at,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

async fn print_profile(config: ClientConfig, debug: bool) -> Result<()> {
    let client = connect(config, debug).await?;
    let profile = fetch_user_profile(&client)
        .await
        .context("failed to fetch the user profile")?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

async fn introspect(
    config: ClientConfig,
    debug: bool,
    token: &str,
    url: Option<String>,
) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => get_env_var(INTROSPECTION_URL_ENV_VAR)
            .context("no introspection URL given")?,
    };

    let client = connect(config, debug).await?;
    validate_access_token(&client, &url, token).await?;
    println!("token is valid");
    Ok(())
}

fn check_config(config: &ClientConfig) -> Result<()> {
    check_preconditions(config).context("configuration is not valid")?;
    println!("configuration is valid for {}", config.username);
    Ok(())
}
