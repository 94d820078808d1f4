//! BlueZ (`bluetoothctl`) workers
//!
//! `bluetoothctl` is an interactive shell, so every call pipes a short
//! script to its stdin. Its exit status says little; results are judged
//! from the text it prints.

use anyhow::{Result, bail};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::ActionOutcome;
use crate::config::Timeouts;
use crate::constants::bluetooth as markers;
use crate::constants::tools::BLUETOOTHCTL;
use crate::error::ToolError;
use crate::parsers::bluetooth as parse;
use crate::runner::{self, ExternalCommandResult, Invocation};
use crate::types::{AdapterStatus, BluetoothDevice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BluetoothReport {
    /// Periodic poll; devices are listed only while the adapter is powered
    Status { adapter: AdapterStatus, devices: Option<Vec<BluetoothDevice>> },
    /// Discovery finished; a complete device list
    Scan(Vec<BluetoothDevice>),
    /// A user action finished; followed by a rescan
    Action(ActionOutcome),
}

/// Per-device commands, named as bluetoothctl names them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    Pair,
    Connect,
    Trust,
    Remove,
    Disconnect,
}

impl DeviceAction {
    pub fn command(&self) -> &'static str {
        match self {
            DeviceAction::Pair => "pair",
            DeviceAction::Connect => "connect",
            DeviceAction::Trust => "trust",
            DeviceAction::Remove => "remove",
            DeviceAction::Disconnect => "disconnect",
        }
    }

    /// Interpret the shell's output for `name`
    pub fn judge(&self, name: &str, result: &ExternalCommandResult) -> ActionOutcome {
        let stdout = result.stdout.as_str();
        let reason = result.diagnostic();
        match self {
            DeviceAction::Pair => {
                if stdout.contains(markers::PAIRING_SUCCESSFUL) {
                    ActionOutcome::ok(format!("Successfully paired with {name}."))
                } else if stdout.contains(markers::ALREADY_PAIRED) {
                    ActionOutcome::ok(format!("{name} is already paired."))
                } else {
                    ActionOutcome::failed(format!("Pairing failed. Error: {reason}"))
                }
            }
            DeviceAction::Connect => {
                if result.success() && stdout.contains(markers::SUCCESSFUL) {
                    ActionOutcome::ok(format!("Successfully connected to {name}."))
                } else {
                    ActionOutcome::failed(format!("Connection failed. Error: {reason}"))
                }
            }
            DeviceAction::Trust => {
                if stdout.contains(markers::SET_PROPERTY_FAILED) || !result.stderr.trim().is_empty() {
                    ActionOutcome::failed("Failed to trust. Pair first if necessary.")
                } else {
                    ActionOutcome::ok(format!("Successfully trusted {name}. It should now auto-connect."))
                }
            }
            DeviceAction::Remove => {
                if stdout.contains(markers::DEVICE_REMOVED) || stdout.contains(markers::SUCCESSFUL) {
                    ActionOutcome::ok(format!("Successfully forgotten {name}."))
                } else if stdout.contains(markers::NOT_AVAILABLE) {
                    ActionOutcome::ok(format!("Device {name} was not found or already removed."))
                } else {
                    ActionOutcome::failed(format!("Failed to forget. Error: {reason}"))
                }
            }
            DeviceAction::Disconnect => {
                if result.success() && stdout.contains(markers::SUCCESSFUL) {
                    ActionOutcome::ok(format!("Successfully disconnected from {name}."))
                } else {
                    ActionOutcome::failed(format!("Disconnect failed. Error: {reason}"))
                }
            }
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Pipe `lines` to the shell, closing with `exit` when asked
async fn run_script(lines: &[&str], exit: bool, timeout: Duration) -> Result<ExternalCommandResult, ToolError> {
    let mut script = lines.join("\n");
    script.push('\n');
    if exit {
        script.push_str("exit\n");
    }
    runner::invoke(&Invocation::new([BLUETOOTHCTL], timeout).with_stdin(script)).await
}

pub async fn adapter(timeouts: Timeouts) -> Result<AdapterStatus> {
    let output = run_script(&["show"], true, timeouts.bluetoothctl()).await?;
    Ok(parse::parse_adapter(&output.stdout))
}

pub async fn device_info(timeouts: Timeouts, mac: &str) -> Result<BluetoothDevice> {
    let output = run_script(&[&format!("info {mac}")], true, timeouts.bluetoothctl()).await?;
    Ok(parse::parse_device_info(mac, &output.stdout))
}

/// Every device bluetoothctl knows, with per-device details
pub async fn known_devices(timeouts: Timeouts) -> Result<Vec<BluetoothDevice>> {
    let output = run_script(&["devices"], true, timeouts.bluetoothctl()).await?;
    let mut devices = Vec::new();
    for mac in parse::parse_device_addresses(&output.stdout) {
        devices.push(device_info(timeouts, &mac).await?);
    }
    Ok(devices)
}

pub async fn status(timeouts: Timeouts) -> Result<BluetoothReport> {
    let adapter = adapter(timeouts).await?;
    let devices = if adapter.powered { Some(known_devices(timeouts).await?) } else { None };
    Ok(BluetoothReport::Status { adapter, devices })
}

/// Run discovery for `scan_for`, then list everything found.
/// `known_adapter` is an address seen on an earlier poll; without one the
/// adapter is looked up first.
pub async fn scan(timeouts: Timeouts, scan_for: Duration, known_adapter: Option<String>) -> Result<Vec<BluetoothDevice>> {
    let address = match known_adapter {
        Some(address) => Some(address),
        None => adapter(timeouts).await?.address,
    };
    let Some(address) = address else {
        bail!("No Bluetooth adapter found.");
    };

    info!(adapter = %address, seconds = scan_for.as_secs(), "Starting discovery");
    run_script(&["scan on"], false, timeouts.bluetoothctl()).await?;
    tokio::time::sleep(scan_for).await;
    run_script(&["scan off"], false, timeouts.bluetoothctl()).await?;

    let devices = known_devices(timeouts).await?;
    debug!(count = devices.len(), "Discovery finished");
    Ok(devices)
}

/// `power off` on some controllers prints a harmless complaint on stderr
fn power_failure(stderr: &str) -> Option<&str> {
    let stderr = stderr.trim();
    (!stderr.is_empty() && !stderr.contains(markers::PRIMARY_CONTROLLER_ONLY)).then_some(stderr)
}

pub async fn toggle_power(timeouts: Timeouts) -> Result<ActionOutcome> {
    let adapter = adapter(timeouts).await?;
    if adapter.address.is_none() {
        return Ok(ActionOutcome::failed("No Bluetooth adapter found."));
    }

    let (command, state) = if adapter.powered { ("power off", "OFF") } else { ("power on", "ON") };
    let result = run_script(&[command], true, timeouts.bluetoothctl()).await?;
    Ok(match power_failure(&result.stderr) {
        Some(reason) => ActionOutcome::failed(format!("Failed to toggle: {reason}")),
        None => ActionOutcome::ok(format!("Adapter turned {state}.")),
    })
}

pub async fn device_action(timeouts: Timeouts, action: DeviceAction, mac: String, name: String) -> Result<ActionOutcome> {
    if !parse::is_address(&mac) {
        bail!("'{mac}' is not a Bluetooth address");
    }
    let result = run_script(&[&format!("{} {mac}", action.command())], true, timeouts.bluetoothctl()).await?;
    let outcome = action.judge(&name, &result);
    debug!(action = %action, mac = %mac, succeeded = outcome.succeeded, "Device action finished");
    Ok(outcome)
}
