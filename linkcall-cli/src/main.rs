use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use linkcall_core::{IceServerConfig, JoinLink, StartupRole};
use linkcall_engine::{
    CallState, MemorySignalingChannel, NegotiatorConfig, NegotiatorHandle, TransportConfig,
    WebRtcTransportFactory,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkcall")]
#[command(about = "Negotiate peer-to-peer calls over a shared session store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a caller and a callee in this process and connect them.
    Demo {
        #[arg(long, default_value = "http://localhost:5173")]
        origin: String,

        /// STUN server url; repeat for more. Host candidates only when omitted.
        #[arg(long)]
        stun: Vec<String>,

        #[arg(long, default_value_t = 20)]
        timeout_secs: u64,

        /// JSON file with `NegotiatorConfig` fields; flags still win.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show what a process opened with this url would do.
    Link { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            origin,
            stun,
            timeout_secs,
            config,
        } => run_demo(origin, stun, timeout_secs, config).await,
        Commands::Link { url } => inspect_link(&url),
    }
}

async fn run_demo(
    origin: String,
    stun: Vec<String>,
    timeout_secs: u64,
    config_path: Option<PathBuf>,
) -> Result<()> {
    println!("{}", "📞 Starting linkcall demo...".green().bold());

    let mut config = match config_path {
        Some(path) => load_config(&path)?,
        None => NegotiatorConfig::default(),
    };
    config.origin = origin;
    config.negotiation_timeout_ms = Some(timeout_secs * 1000);

    let transport_config = if stun.is_empty() {
        TransportConfig::local_only()
    } else {
        TransportConfig {
            ice_servers: vec![IceServerConfig::stun(stun)],
            include_loopback: true,
            ..TransportConfig::default()
        }
    };

    debug!(?transport_config, "Demo transport settings");

    let signaling = Arc::new(MemorySignalingChannel::new());
    let transports = Arc::new(WebRtcTransportFactory::new(transport_config));

    let caller = NegotiatorHandle::spawn(config.clone(), signaling.clone(), transports.clone());
    let callee = NegotiatorHandle::spawn(config, signaling, transports);

    let link = caller
        .start_call()
        .await
        .context("Caller could not start the call")?;
    println!("🔗 Join link: {}", link.to_string().cyan());

    let role = StartupRole::from_url(&link.to_string())?;
    callee
        .launch(role)
        .await
        .context("Callee could not join the call")?;

    let timeout = Duration::from_secs(timeout_secs);
    let (caller_up, callee_up) = tokio::join!(
        caller.wait_for_state(CallState::Connected, timeout),
        callee.wait_for_state(CallState::Connected, timeout),
    );

    let result = if caller_up && callee_up {
        info!(session_id = %link.session_id(), "Demo peers connected");
        println!("{}", "✨ Peers connected!".green().bold());
        Ok(())
    } else {
        warn!(caller = ?caller.state(), callee = ?callee.state(), "Demo peers did not connect");
        Err(anyhow::anyhow!(
            "Peers did not connect (caller: {:?}, callee: {:?})",
            caller.state(),
            callee.state()
        ))
    };

    caller.hangup().await?;
    callee.hangup().await?;
    caller.shutdown().await;
    callee.shutdown().await;
    println!("{}", "👋 Call ended".cyan());

    result
}

fn load_config(path: &PathBuf) -> Result<NegotiatorConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    info!(path = %path.display(), "Loading negotiator config");
    serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
}

fn inspect_link(url: &str) -> Result<()> {
    match StartupRole::from_url(url).context("Not a valid url")? {
        StartupRole::Callee(session_id) => {
            let link: JoinLink = url.parse()?;
            println!("{} {}", "Role:".bold(), "callee".green());
            println!("   Session: {}", session_id);
            println!("   Origin:  {}", link.origin());
        }
        StartupRole::AwaitCaller => {
            println!("{} {}", "Role:".bold(), "caller".yellow());
            println!("   No join token, waiting for the user to start a call");
        }
    }
    Ok(())
}
