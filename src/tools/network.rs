//! NetworkManager (`nmcli`) and `speedtest-cli` workers

use anyhow::{Result, bail};
use std::time::Duration;
use tracing::debug;

use super::ActionOutcome;
use crate::config::Timeouts;
use crate::constants::tools::{NMCLI, SPEEDTEST};
use crate::parsers::network as parse;
use crate::runner::{self, Invocation};
use crate::types::{NetworkConnection, NetworkStatus, WifiNetwork};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkReport {
    Status(NetworkStatus),
    Scan { radio_enabled: bool, networks: Vec<WifiNetwork> },
    /// A user action finished; status and scan results are stale afterwards
    Action(ActionOutcome),
    /// `speedtest-cli --simple` output
    Speedtest(String),
}

fn nmcli(args: &[&str], timeout: Duration) -> Invocation {
    Invocation::new(std::iter::once(NMCLI).chain(args.iter().copied()), timeout)
}

/// Device summary, radio state and active connections, queried concurrently
pub async fn status(timeouts: Timeouts) -> Result<NetworkStatus> {
    let query = timeouts.nmcli_query();
    let devices = nmcli(&["-t", "-f", "DEVICE,TYPE,STATE,CONNECTION", "device"], query);
    let radio = nmcli(&["radio", "wifi"], query);
    let active = nmcli(&["-t", "-f", "TYPE,DEVICE,NAME,UUID", "connection", "show", "--active"], query);

    let (devices, radio, active) = tokio::join!(
        runner::invoke_checked(&devices),
        runner::invoke_checked(&radio),
        runner::invoke_checked(&active),
    );

    Ok(NetworkStatus {
        radio_enabled: parse::parse_radio_enabled(&radio?.stdout),
        devices: parse::parse_device_status(&devices?.stdout),
        active: parse::parse_connections(&active?.stdout),
    })
}

pub async fn radio_enabled(timeouts: Timeouts) -> Result<bool> {
    let output = runner::invoke_checked(&nmcli(&["radio", "wifi"], timeouts.nmcli_query())).await?;
    Ok(parse::parse_radio_enabled(&output.stdout))
}

pub async fn wifi_list(timeouts: Timeouts) -> Result<Vec<WifiNetwork>> {
    let output = runner::invoke_checked(&nmcli(
        &["-t", "-f", "SSID,SIGNAL", "device", "wifi", "list"],
        timeouts.nmcli_change(),
    ))
    .await?;
    let networks = parse::parse_wifi_scan(&output.stdout);
    debug!(count = networks.len(), "Wi-Fi scan finished");
    Ok(networks)
}

/// Visible networks; empty without a scan while the radio is off
pub async fn scan(timeouts: Timeouts) -> Result<NetworkReport> {
    let radio_enabled = radio_enabled(timeouts).await?;
    let networks = if radio_enabled { wifi_list(timeouts).await? } else { Vec::new() };
    Ok(NetworkReport::Scan { radio_enabled, networks })
}

pub async fn toggle_radio(timeouts: Timeouts) -> Result<ActionOutcome> {
    let enabled = radio_enabled(timeouts).await?;
    let (action, state) = if enabled { ("off", "DISABLED") } else { ("on", "ENABLED") };

    let result = runner::invoke(&nmcli(&["radio", "wifi", action], timeouts.nmcli_change())).await?;
    Ok(if result.success() {
        ActionOutcome::ok(format!("Wi-Fi radio successfully set to {state}."))
    } else {
        ActionOutcome::failed(format!("Failed to toggle Wi-Fi: {}", result.diagnostic()))
    })
}

/// `nmcli connection add` arguments for a fresh profile named after the SSID
fn profile_args(iface: &str, ssid: &str, password: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = ["connection", "add", "type", "wifi", "ifname", iface, "con-name", ssid, "ssid", ssid]
        .into_iter()
        .map(String::from)
        .collect();
    if let Some(psk) = password.filter(|psk| !psk.is_empty()) {
        args.extend(["wifi-sec.key-mgmt", "wpa-psk", "wifi-sec.psk", psk].map(String::from));
    }
    args
}

/// Replace any saved profile for `ssid` with a new one and bring it up
pub async fn connect(timeouts: Timeouts, ssid: String, password: Option<String>) -> Result<ActionOutcome> {
    let devices = runner::invoke_checked(&nmcli(&["-t", "-f", "DEVICE,TYPE", "device"], timeouts.nmcli_query())).await?;
    let Some(iface) = parse::find_wifi_interface(&devices.stdout) else {
        return Ok(ActionOutcome::failed("No Wi-Fi interface found."));
    };

    // Fails harmlessly when there is no stale profile
    let stale = runner::invoke(&nmcli(&["connection", "delete", &ssid], timeouts.nmcli_change())).await?;
    debug!(ssid = %ssid, exit_code = stale.exit_code, "Removed stale profile");

    let args = profile_args(&iface, &ssid, password.as_deref());
    let create = Invocation::new(std::iter::once(NMCLI.to_string()).chain(args), timeouts.nmcli_change());
    let created = runner::invoke(&create.sensitive()).await?;
    if !created.success() {
        return Ok(ActionOutcome::failed(format!("Failed to create profile: {}", created.diagnostic())));
    }

    let up = runner::invoke(&nmcli(&["connection", "up", &ssid], timeouts.nmcli_connect())).await?;
    Ok(if up.success() {
        ActionOutcome::ok(format!("Successfully connected to {ssid}"))
    } else {
        ActionOutcome::failed(format!("Failed to connect: {}", up.diagnostic()))
    })
}

pub async fn disconnect(timeouts: Timeouts, connection: NetworkConnection) -> Result<ActionOutcome> {
    let result = runner::invoke(&nmcli(&["connection", "down", &connection.uuid], timeouts.nmcli_change())).await?;
    Ok(if result.success() {
        ActionOutcome::ok(format!("Disconnected from {}", connection.name))
    } else {
        ActionOutcome::failed(format!("Failed to disconnect: {}", result.diagnostic()))
    })
}

/// Take the connection down, then delete its profile
pub async fn forget(timeouts: Timeouts, connection: NetworkConnection) -> Result<ActionOutcome> {
    let down = disconnect(timeouts, connection.clone()).await?;
    debug!(name = %connection.name, succeeded = down.succeeded, "Brought connection down before delete");

    let result = runner::invoke(&nmcli(&["connection", "delete", &connection.uuid], timeouts.nmcli_change())).await?;
    Ok(if result.success() {
        ActionOutcome::ok(format!("Forgotten network profile: {}", connection.name))
    } else {
        ActionOutcome::failed(format!("Failed to forget: {}", result.diagnostic()))
    })
}

pub async fn speedtest(timeouts: Timeouts) -> Result<String> {
    let result = runner::invoke(&Invocation::new([SPEEDTEST, "--simple"], timeouts.speedtest())).await?;
    if result.success() {
        return Ok(result.stdout.trim().to_string());
    }
    match result.diagnostic() {
        "" => bail!("Speedtest failed (unknown error)"),
        reason => bail!("Speedtest failed (check connection): {reason}"),
    }
}
