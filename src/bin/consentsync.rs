//! consentsync - consent record client
//!
//! Usage:
//!   consentsync status                     → fetch and show the consent record
//!   consentsync accept --main --userdata   → accept terms, then reload
//!   consentsync revoke                     → revoke every acceptance, then reload
//!   consentsync config                     → print the effective config as TOML

use anyhow::Context;
use clap::{Parser, Subcommand};
use consentsync::{init_tracing, ConsoleObserver, ConsoleSurface};
use consentsync_client::{ConsentClient, ObserverBridge, ObserverSlot};
use consentsync_core::{ClientConfig, ConsentDraft, LoadState};
use consentsync_transport::HttpTransport;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "consentsync",
    about = "Keep a user's consent decision in sync with the testbed server",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL (or set CONSENTSYNC_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Consent resource path, e.g. /terms_conditions/accept
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Do not forward the outcome to the host observer
    #[arg(long, default_value_t = false, global = true)]
    no_observer: bool,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and show the current consent record
    Status,
    /// Submit accepted terms. Flags not given are stored as not accepted.
    Accept {
        /// Accept the main terms
        #[arg(long)]
        main: bool,
        /// Accept user data processing
        #[arg(long)]
        userdata: bool,
    },
    /// Revoke every acceptance
    Revoke,
    /// Print the effective configuration
    Config,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref()).context("failed to set up logging")?;

    if let Commands::Version = cli.command {
        println!("consentsync v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Version => Ok(()),
        Commands::Config => {
            print!("{}", config.to_toml());
            Ok(())
        }
        Commands::Status => run(&config, Action::Status).await,
        Commands::Accept { main, userdata } => {
            let draft = ConsentDraft::new().accept_main(main).accept_userdata(userdata);
            run(&config, Action::Submit(draft)).await
        }
        Commands::Revoke => run(&config, Action::Revoke).await,
    }
}

enum Action {
    Status,
    Submit(ConsentDraft),
    Revoke,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path),
        None => ClientConfig::default(),
    }
    .with_env();

    if let Some(url) = &cli.base_url {
        config.server.base_url = url.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.server.endpoint = endpoint.clone();
    }
    if cli.no_observer {
        config.observer.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: &ClientConfig, action: Action) -> anyhow::Result<()> {
    let transport = HttpTransport::from_config(&config.server)?;
    tracing::info!("Server {} endpoint {}", transport.base_url(), config.server.endpoint);

    let slot = ObserverSlot::new();
    let client = ConsentClient::builder(Arc::new(transport))
        .endpoint(config.server.endpoint.clone())
        .surface(Arc::new(ConsoleSurface::stdout()))
        .bridge(ObserverBridge::new(&slot))
        .build();

    // The CLI plays the host: bind before arming so the watch resolves at once
    let observer = Arc::new(ConsoleObserver::stdout());
    if config.observer.enabled {
        slot.bind(&observer)?;
        if let Some(armed) = client.bridge().arm() {
            armed.await?;
        }
    }

    match action {
        Action::Status => {
            client.load().await;
        }
        Action::Submit(draft) => client.submit(draft).await,
        Action::Revoke => client.revoke_all().await,
    }

    match client.state() {
        LoadState::Failed(err) => Err(anyhow::anyhow!(err)),
        _ => Ok(()),
    }
}
