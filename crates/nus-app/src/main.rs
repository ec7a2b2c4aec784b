//! nus-shell: expose a login shell to a peer over a notify/write
//! characteristic pair.

mod config;
mod transport;
mod wire;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use nus_bridge::{
    register_with_fallback, run_bridge, BridgeError, BridgePump, StopReason, TransportLink,
};
use nus_pty::PtySession;

use crate::config::{BridgeConfig, ConfigError};
use crate::transport::TcpTransport;

#[derive(Parser, Debug)]
#[command(
    name = "nus-shell",
    version,
    about = "Bridge an interactive shell to a notify/write characteristic pair"
)]
struct Args {
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on for the peer.
    #[arg(long)]
    listen: Option<String>,

    /// Address tried once if `--listen` cannot be bound.
    #[arg(long)]
    fallback_listen: Option<String>,

    /// Shell program (defaults to $SHELL).
    #[arg(long)]
    shell: Option<String>,

    /// Pump period in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Largest notify frame in bytes.
    #[arg(long)]
    max_chunk: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(fallback) = &self.fallback_listen {
            config.fallback_listen = fallback.clone();
        }
        if let Some(shell) = &self.shell {
            config.shell.program = Some(shell.clone());
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(max_chunk) = self.max_chunk {
            config.max_chunk = max_chunk;
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args).await {
        Ok(reason) => {
            log::info!("exiting: {reason:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<StopReason, AppError> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let shell = PtySession::spawn(&config.shell).map_err(BridgeError::from)?;

    let mut transport = TcpTransport::new(&config);
    let (link, registration) = register_with_fallback(&mut transport)?;
    if let Some(addr) = transport.local_addr() {
        log::info!(
            "{} ready on {addr} ({registration}, {}-byte frames, {}ms tick)",
            config.local_name,
            config.max_chunk,
            config.tick_ms
        );
    }

    let TransportLink { mut events, sink } = link;
    let mut pump = BridgePump::new(shell, sink, config.max_chunk);
    Ok(run_bridge(&mut pump, &mut events, config.tick(), shutdown_signal()).await)
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
