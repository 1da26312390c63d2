#![deny(unsafe_code)]

//! vartunnel CLI — read and write tunnel variables from shell scripts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use vartunnel_config::AppConfig;
use vartunnel_core::{TUNNEL_URL_ENV, TunnelClient, TunnelServer, ValueFormat};

/// vartunnel — pass structured variables between a parent process and its
/// children over a private loopback URL.
#[derive(Parser)]
#[command(name = "vartunnel", version, about, long_about = None)]
struct Cli {
    /// URL of the tunnel server, usually $VARIABLE_TUNNEL_URL.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Return everything in JSON format.
    #[arg(long, global = true)]
    json: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, default_value = "vartunnel.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve data from the variable tunnel.
    Get {
        /// Dot-notation field to retrieve.
        field: String,
    },

    /// Write data to the variable tunnel (reads STDIN when no value is given).
    Set {
        /// Dot-notation field to write to.
        field: String,

        /// Value to set.
        value: Option<String>,

        /// Coerce the value: string, integer, float, boolean, or json.
        #[arg(long, default_value = "string")]
        format: ValueFormat,
    },

    /// Start a tunnel and print its URL as a shell export. Runs until Ctrl-C.
    Serve {
        /// Reject writes to keys that already exist.
        #[arg(long)]
        immutable: bool,

        /// JSON file with the initial variables (must hold an object).
        #[arg(long)]
        data: Option<PathBuf>,

        /// How long to wait for a request body, in milliseconds.
        #[arg(long)]
        request_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config).await {
        Ok(config) => config,
        Err(e) => return report_error(cli.json, &e),
    };

    init_tracing(cli.verbose, &config.logging.level);

    match run(&cli, &config).await {
        Ok(Some(output)) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => report_error(cli.json, &e),
    }
}

fn init_tracing(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr; stdout carries values.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<Option<String>> {
    match &cli.command {
        Commands::Get { field } => {
            let value = client(cli, config)?.get(field).await?;
            Ok(Some(render(&value, cli.json)?))
        }
        Commands::Set {
            field,
            value,
            format,
        } => {
            cmd_set(client(cli, config)?, field, value.as_deref(), *format).await?;
            Ok(None)
        }
        Commands::Serve {
            immutable,
            data,
            request_timeout,
        } => {
            cmd_serve(config, *immutable, data.as_deref(), *request_timeout, cli.json).await?;
            Ok(None)
        }
    }
}

fn client(cli: &Cli, config: &AppConfig) -> Result<TunnelClient> {
    let timeout = match cli.timeout {
        Some(0) => bail!("--timeout must be non-zero"),
        Some(ms) => std::time::Duration::from_millis(ms),
        None => config.client.timeout(),
    };
    Ok(TunnelClient::from_url_or_env(cli.server.clone()).with_timeout(timeout))
}

async fn cmd_set(
    client: TunnelClient,
    field: &str,
    literal: Option<&str>,
    format: ValueFormat,
) -> Result<()> {
    let input = match literal.filter(|v| !v.is_empty()) {
        Some(v) => v.to_string(),
        None => read_stdin().await?,
    };
    let value = format.coerce(&input)?;
    debug!(field, %format, "Setting value");
    client.set(field, value).await?;
    Ok(())
}

async fn cmd_serve(
    config: &AppConfig,
    immutable: bool,
    data: Option<&Path>,
    request_timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut server_config = config.server.clone();
    server_config.immutable |= immutable;
    if let Some(ms) = request_timeout {
        if ms == 0 {
            bail!("--request-timeout must be non-zero");
        }
        server_config.request_timeout_ms = ms;
    }

    let initial = match data {
        Some(path) => load_initial_data(path).await?,
        None => Map::new(),
    };

    let running = TunnelServer::with_data(initial, &server_config)?
        .start()
        .await?;

    if json {
        println!("{}", serde_json::to_string(running.url())?);
    } else {
        println!("export {TUNNEL_URL_ENV}={}", running.url());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, stopping tunnel");
    running.stop().await?;
    Ok(())
}

async fn load_initial_data(path: &Path) -> Result<Map<String, Value>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    match serde_json::from_str(&content)
        .map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("initial data in {} must be a JSON object", path.display()),
    }
}

/// Read all of standard input, dropping one trailing line ending.
async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .map_err(|e| anyhow!("failed to read STDIN: {e}"))?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    Ok(input)
}

fn render(value: &Value, json: bool) -> Result<String> {
    Ok(match value {
        Value::String(s) if !json => s.clone(),
        other => serde_json::to_string(other)?,
    })
}

fn report_error(json: bool, err: &anyhow::Error) -> ExitCode {
    let message = err.to_string();
    if json {
        println!(
            "{}",
            serde_json::to_string(&message).unwrap_or_else(|_| format!("{message:?}"))
        );
    } else {
        eprintln!("{message}");
    }
    ExitCode::FAILURE
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
            .await
            .map_err(|e| anyhow!("invalid config file {}: {e}", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}
