//! flightrec - multi-channel flight recorder
//!
//! ## Commands
//!
//! - `serve`: record JSON-lines envelopes from stdin and answer control requests
//! - `dump`: ask a running recorder to export its buffers
//! - `status`: show what a running recorder holds
//! - `check-config`: validate a config file and print the resolved channels

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn, Level};

use flightrec_core::{
    pump_envelopes, send_request, serve_control, spawn_subscriber, ControlRequest, DumpRequest,
    JsonlSinkFactory, ObservedChannels, Recorder, RecorderConfig,
};

const DEFAULT_ADDR: &str = "127.0.0.1:7447";

#[derive(Parser)]
#[command(name = "flightrec")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bounded-memory multi-channel flight recorder", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record envelopes from stdin and serve control requests
    Serve {
        /// Path to the recorder config (TOML)
        #[arg(short, long, env = "FLIGHTREC_CONFIG")]
        config: PathBuf,

        /// Control address (overrides `control_addr` from the config)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Export buffered messages from a running recorder
    Dump {
        /// Export name, optionally under a subdirectory (default: current local date and time)
        #[arg(short, long, default_value = "")]
        name: String,

        /// Channels to export, repeatable or space-separated (default: all)
        #[arg(short, long = "channel")]
        channels: Vec<String>,

        /// Trailing seconds to export (0 = everything retained)
        #[arg(short, long, default_value = "0")]
        duration: f64,

        /// Recorder control address
        #[arg(long, env = "FLIGHTREC_ADDR", default_value = DEFAULT_ADDR)]
        addr: SocketAddr,
    },

    /// Show per-channel subscription state and buffered history
    Status {
        /// Recorder control address
        #[arg(long, env = "FLIGHTREC_ADDR", default_value = DEFAULT_ADDR)]
        addr: SocketAddr,
    },

    /// Validate a config file and print the resolved channel list
    CheckConfig {
        /// Path to the recorder config (TOML)
        #[arg(short, long, env = "FLIGHTREC_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    flightrec_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Serve { config, addr } => cmd_serve(&config, addr).await,
        Commands::Dump {
            name,
            channels,
            duration,
            addr,
        } => {
            let mut request = DumpRequest::new(name, duration);
            let selected = split_channels(&channels);
            if !selected.is_empty() {
                request = request.with_channels(selected);
            }
            cmd_control(addr, &ControlRequest::Dump(request)).await
        }
        Commands::Status { addr } => cmd_control(addr, &ControlRequest::Status).await,
        Commands::CheckConfig { config } => cmd_check_config(&config),
    }
}

fn split_channels(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split_whitespace())
        .map(str::to_string)
        .collect()
}

fn load_config(path: &Path) -> Result<RecorderConfig> {
    let config = RecorderConfig::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    config.validate().context("Invalid recorder config")?;
    Ok(config)
}

async fn cmd_serve(config_path: &Path, addr: Option<SocketAddr>) -> Result<()> {
    let config = load_config(config_path)?;
    let addr = match addr {
        Some(addr) => addr,
        None => config.control_socket_addr()?,
    };

    let recorder = Arc::new(
        Recorder::from_config(&config, Arc::new(JsonlSinkFactory::new()))
            .context("Failed to initialise recorder")?,
    );
    info!(
        channels = recorder.channels().len(),
        output_dir = %recorder.output_dir().display(),
        "recorder configured"
    );

    let observed = Arc::new(ObservedChannels::new());
    let (_subscriber, mut readiness) =
        spawn_subscriber(Arc::clone(&recorder), observed.clone(), config.backoff());

    let pump = {
        let recorder = Arc::clone(&recorder);
        let observed = Arc::clone(&observed);
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            pump_envelopes(stdin, &recorder, &observed).await
        })
    };

    if readiness.wait().await {
        info!(pending = ?recorder.pending_channels(), "recorder initialised");
    } else {
        warn!("no channels configured; nothing will be recorded");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control address {addr}"))?;
    let server = tokio::spawn(serve_control(listener, Arc::clone(&recorder)));

    tokio::select! {
        res = server => {
            res.context("Control server task panicked")?
                .context("Control server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    if pump.is_finished() {
        match pump.await {
            Ok(Ok(stats)) => info!(?stats, "input stream closed"),
            Ok(Err(err)) => warn!(error = %err, "input stream failed"),
            Err(err) => warn!(error = %err, "input task panicked"),
        }
    } else {
        pump.abort();
    }
    flightrec_core::METRICS.flush();
    Ok(())
}

async fn cmd_control(addr: SocketAddr, request: &ControlRequest) -> Result<()> {
    let response = send_request(addr, request)
        .await
        .with_context(|| format!("Failed to reach recorder at {addr}"))?;
    println!("{}", response.status_text);
    if !response.ok {
        bail!("recorder rejected the request");
    }
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let output_dir = config
        .ensure_output_dir()
        .context("Output directory is not usable")?;

    println!("output_dir: {}", output_dir.display());
    println!("control_addr: {}", config.control_addr);
    for channel in config.resolved_channels() {
        println!(
            "  {} (retention {}s)",
            channel.name,
            channel.retention.as_secs_f64()
        );
    }
    Ok(())
}
