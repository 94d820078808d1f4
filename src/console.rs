//! Line-oriented command input from stdin
//!
//! A background thread reads stdin, parses each line into a [`UserCommand`]
//! and forwards it to the consuming loop. Which subsystem a command such as
//! `scan` or `connect` applies to depends on the panel that is shown.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::constants::audio::MAX_VOLUME_PERCENT;
use crate::types::{Direction, Subsystem};

/// A mixer row: a device, or an application stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerTarget {
    Device { direction: Direction, identifier: String },
    App(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    ShowPanel(Subsystem),
    Refresh,
    Scan,
    /// Wi-Fi radio or Bluetooth adapter power, depending on the panel
    TogglePower,
    Connect { target: String, password: Option<String> },
    Disconnect { target: String },
    Forget { target: String },
    Pair { target: String },
    Trust { target: String },
    Speedtest,
    SetVolume { target: MixerTarget, percent: u8 },
    SetMute { target: MixerTarget, muted: bool },
    SetDefault { direction: Direction, identifier: String },
    /// Mark a row as being edited; polls leave it alone until released
    Edit { target: MixerTarget, editing: bool },
    ShowLog,
    Help,
    Quit,
}

impl UserCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            UserCommand::ShowPanel(_) => "panel",
            UserCommand::Refresh => "refresh",
            UserCommand::Scan => "scan",
            UserCommand::TogglePower => "power",
            UserCommand::Connect { .. } => "connect",
            UserCommand::Disconnect { .. } => "disconnect",
            UserCommand::Forget { .. } => "forget",
            UserCommand::Pair { .. } => "pair",
            UserCommand::Trust { .. } => "trust",
            UserCommand::Speedtest => "speedtest",
            UserCommand::SetVolume { .. } => "volume",
            UserCommand::SetMute { .. } => "mute",
            UserCommand::SetDefault { .. } => "default",
            UserCommand::Edit { .. } => "edit",
            UserCommand::ShowLog => "log",
            UserCommand::Help => "help",
            UserCommand::Quit => "quit",
        }
    }
}

pub const HELP: &str = "\
Commands:
  panel <wifi|bluetooth|audio>       switch panel (or just: wifi, bluetooth, audio)
  refresh | scan | log | help | quit
  power                              toggle Wi-Fi radio / Bluetooth adapter
  connect <ssid|mac> [password]      quote SSIDs with spaces: connect \"My Net\" pw
  disconnect <name|uuid|mac>
  forget <name|uuid|mac>
  pair <mac> | trust <mac>
  speedtest
  volume <sink|source|app> <id> <0-150>
  mute|unmute <sink|source|app> <id>
  default <sink|source> <name>
  edit <sink|source|app> <id> <on|off>";

/// Whitespace-separated words; double quotes group words
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    if has_word {
        words.push(current);
    }
    Ok(words)
}

fn mixer_target(kind: &str, id: &str) -> Result<MixerTarget, String> {
    if kind == "app" {
        let index = id.parse().map_err(|_| format!("'{id}' is not an app index"))?;
        return Ok(MixerTarget::App(index));
    }
    Ok(MixerTarget::Device { direction: kind.parse()?, identifier: id.to_string() })
}

fn percent(value: &str) -> Result<u8, String> {
    let value = value.trim_end_matches('%');
    let parsed: u16 = value.parse().map_err(|_| format!("'{value}' is not a volume"))?;
    Ok(parsed.min(u16::from(MAX_VOLUME_PERCENT)) as u8)
}

fn on_off(value: &str) -> Result<bool, String> {
    match value {
        "on" | "yes" | "1" | "true" => Ok(true),
        "off" | "no" | "0" | "false" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

/// Parse one input line; Ok(None) for a blank line
pub fn parse_command(line: &str) -> Result<Option<UserCommand>, String> {
    let words = tokenize(line)?;
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let usage = |form: &str| Err(format!("usage: {form}"));

    let command = match words.as_slice() {
        [] => return Ok(None),
        ["panel", name] => UserCommand::ShowPanel(name.parse()?),
        [name @ ("wifi" | "network" | "bluetooth" | "bt" | "audio")] => UserCommand::ShowPanel(name.parse()?),
        ["refresh"] => UserCommand::Refresh,
        ["scan"] => UserCommand::Scan,
        ["power" | "radio" | "toggle"] => UserCommand::TogglePower,
        ["connect", target] => UserCommand::Connect { target: target.to_string(), password: None },
        ["connect", target, password] => {
            UserCommand::Connect { target: target.to_string(), password: Some(password.to_string()) }
        }
        ["connect", ..] => return usage("connect <ssid|mac> [password]"),
        ["disconnect", target] => UserCommand::Disconnect { target: target.to_string() },
        ["forget" | "remove", target] => UserCommand::Forget { target: target.to_string() },
        ["pair", target] => UserCommand::Pair { target: target.to_string() },
        ["trust", target] => UserCommand::Trust { target: target.to_string() },
        ["speedtest"] => UserCommand::Speedtest,
        ["volume", kind, id, value] => UserCommand::SetVolume { target: mixer_target(kind, id)?, percent: percent(value)? },
        ["volume", ..] => return usage("volume <sink|source|app> <id> <0-150>"),
        [verb @ ("mute" | "unmute"), kind, id] => {
            UserCommand::SetMute { target: mixer_target(kind, id)?, muted: *verb == "mute" }
        }
        ["default", kind, identifier] => {
            UserCommand::SetDefault { direction: kind.parse()?, identifier: identifier.to_string() }
        }
        ["edit", kind, id, state] => UserCommand::Edit { target: mixer_target(kind, id)?, editing: on_off(state)? },
        ["edit", ..] => return usage("edit <sink|source|app> <id> <on|off>"),
        ["log"] => UserCommand::ShowLog,
        ["help" | "?"] => UserCommand::Help,
        ["quit" | "exit" | "q"] => UserCommand::Quit,
        [verb, ..] => return Err(format!("unknown command '{verb}' (try 'help')")),
    };
    Ok(Some(command))
}

/// Spawn the stdin reader thread. It stops on EOF or after `quit`.
pub fn spawn_reader<E>(sender: UnboundedSender<E>) -> Result<thread::JoinHandle<()>>
where
    E: From<UserCommand> + Send + 'static,
{
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            info!("Console input started");
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!(error = %e, "Failed to read console input");
                        break;
                    }
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        debug!(command = ?command, "Console command");
                        let quit = command == UserCommand::Quit;
                        if sender.send(E::from(command)).is_err() || quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => eprintln!("{message}"),
                }
            }
            info!("Console input closed");
        })
        .context("Failed to spawn console reader thread")
}
