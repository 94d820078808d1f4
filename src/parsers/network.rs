//! `nmcli -t` terse output

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::constants::labels;
use crate::types::{DeviceStatus, NetworkConnection, WifiNetwork};

/// Signal percentage at the very end of a scan line
static TRAILING_SIGNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)$").expect("valid regex"));

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(|line| line.trim_end_matches('\r')).filter(|line| !line.is_empty())
}

/// `TYPE:DEVICE:NAME:UUID` lines; lines with fewer than four fields are dropped
pub fn parse_connections(text: &str) -> Vec<NetworkConnection> {
    lines(text)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() < 4 {
                return None;
            }
            Some(NetworkConnection {
                kind: parts[0].to_string(),
                device: parts[1].to_string(),
                name: parts[2].to_string(),
                uuid: parts[3].to_string(),
            })
        })
        .collect()
}

/// `DEVICE:TYPE:STATE:CONNECTION` lines; missing trailing fields become empty
pub fn parse_device_status(text: &str) -> Vec<DeviceStatus> {
    lines(text)
        .map(|line| {
            let mut parts = line.split(':');
            let mut next = || parts.next().unwrap_or("").to_string();
            DeviceStatus {
                device: next(),
                kind: next(),
                state: next(),
                connection: next(),
            }
        })
        .collect()
}

/// `nmcli radio wifi` prints `enabled` or `disabled`
pub fn parse_radio_enabled(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("enabled")
}

/// `SSID:SIGNAL` lines.
///
/// The signal is located by a trailing `:<digits>` search, so SSIDs that
/// contain colons survive intact. Repeated SSIDs keep their first entry.
pub fn parse_wifi_scan(text: &str) -> Vec<WifiNetwork> {
    let mut seen = HashSet::new();
    let mut networks = Vec::new();

    for line in lines(text) {
        let Some(captures) = TRAILING_SIGNAL.captures(line) else {
            continue;
        };
        let (Some(whole), Some(digits)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let signal_percent = digits.as_str().parse::<u32>().map(|v| v.min(100) as u8).unwrap_or(0);
        let ssid = line[..whole.start()].trim();
        let ssid = if ssid.is_empty() { labels::HIDDEN_NETWORK } else { ssid };

        if seen.insert(ssid.to_string()) {
            networks.push(WifiNetwork { ssid: ssid.to_string(), signal_percent });
        }
    }

    networks
}

/// First device of type `wifi` in `DEVICE:TYPE` lines
pub fn find_wifi_interface(text: &str) -> Option<String> {
    parse_device_status(text)
        .into_iter()
        .find(|status| status.kind == "wifi")
        .map(|status| status.device)
}
