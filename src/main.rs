//! panelsync - keeps Wi-Fi, Bluetooth and audio panels in sync with the system

#![forbid(unsafe_code)]

mod config;
mod console;
mod constants;
mod context;
mod dispatch;
mod error;
mod event_handler;
mod logbook;
mod parsers;
mod presenter;
mod reconcile;
mod runner;
mod scheduler;
mod tools;
mod types;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use console::UserCommand;
use context::{Context, LoopEvent};
use event_handler::{Flow, handle_event};
use presenter::{ConsolePresenter, Presenter};
use tools::NetworkReport;
use types::Subsystem;

#[derive(Debug, Parser)]
#[command(version, about = "Terminal control panel for Wi-Fi, Bluetooth and audio")]
struct Cli {
    /// Config file (default: ~/.config/panelsync/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Panel to show at startup: wifi, bluetooth or audio
    #[arg(long)]
    panel: Option<Subsystem>,

    /// trace, debug, info, warn or error; overrides LOG_LEVEL and the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query one subsystem once and print the result as JSON
    Snapshot { panel: Subsystem },
}

fn trace_level(name: &str) -> TraceLevel {
    match name.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&path)?;

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());

    // stdout belongs to the panels and to snapshot JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level(&log_level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;

    config.validate();
    info!(path = %path.display(), "Configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command {
        Some(Command::Snapshot { panel }) => runtime.block_on(snapshot(&config, panel)),
        None => {
            Config::write_template(&path);
            let panel = cli.panel.unwrap_or(config.initial_panel);
            runtime.block_on(run(config, panel))
        }
    }
}

/// One-shot query for scripts
async fn snapshot(config: &Config, panel: Subsystem) -> Result<()> {
    let timeouts = config.timeouts;
    let value = match panel {
        Subsystem::Network => {
            let status = tools::network::status(timeouts).await?;
            let networks = match tools::network::scan(timeouts).await? {
                NetworkReport::Scan { networks, .. } => networks,
                _ => Vec::new(),
            };
            json!({ "status": status, "networks": networks })
        }
        Subsystem::Bluetooth => {
            let adapter = tools::bluetooth::adapter(timeouts).await?;
            let devices = if adapter.powered { tools::bluetooth::known_devices(timeouts).await? } else { Vec::new() };
            json!({ "adapter": adapter, "devices": devices })
        }
        Subsystem::Audio => serde_json::to_value(tools::audio::load(timeouts).await?)?,
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run(config: Config, panel: Subsystem) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<LoopEvent>();
    console::spawn_reader(tx.clone())?;
    spawn_signal_listener(tx.clone())?;

    let mut ctx = Context::new(config, tx);
    let mut presenter = ConsolePresenter::stdout();
    presenter.notice(console::HELP);
    handle_event(&mut ctx, &mut presenter, LoopEvent::Command(UserCommand::ShowPanel(panel)));

    // The context holds senders, so the queue only ends through Flow::Quit
    while let Some(event) = rx.recv().await {
        if handle_event(&mut ctx, &mut presenter, event) == Flow::Quit {
            break;
        }
    }

    ctx.shutdown();
    info!("Shut down");
    Ok(())
}

#[cfg(unix)]
fn spawn_signal_listener(tx: UnboundedSender<LoopEvent>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Received signal, shutting down");
                let _ = tx.send(LoopEvent::Shutdown);
            }
        })
        .context("Failed to spawn signal listener thread")?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_listener(_tx: UnboundedSender<LoopEvent>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_level_falls_back_to_info() {
        assert_eq!(trace_level("DEBUG"), TraceLevel::DEBUG);
        assert_eq!(trace_level("verbose"), TraceLevel::INFO);
    }

    #[test]
    fn test_cli_parses_snapshot_subcommand() {
        let cli = Cli::try_parse_from(["panelsync", "--log-level", "debug", "snapshot", "bt"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Command::Snapshot { panel: Subsystem::Bluetooth })));
    }

    #[test]
    fn test_cli_initial_panel() {
        let cli = Cli::try_parse_from(["panelsync", "--panel", "audio"]).unwrap();
        assert_eq!(cli.panel, Some(Subsystem::Audio));
        assert!(Cli::try_parse_from(["panelsync", "--panel", "radio"]).is_err());
    }
}
