//! `bluetoothctl` interactive-shell output

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::{AdapterStatus, BluetoothDevice};

static CONTROLLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Controller\s+([0-9A-F]{2}(?::[0-9A-F]{2}){5})(?:\s|$)").expect("valid regex")
});

static DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Device\s+([0-9A-F]{2}(?::[0-9A-F]{2}){5})(?:\s|$)").expect("valid regex")
});

static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9A-F]{2}(?::[0-9A-F]{2}){5}$").expect("valid regex"));

static POWERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Powered:\s*(yes|no)").expect("valid regex"));

static ALIAS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Alias:\s*(.+)").expect("valid regex"));

/// True for exactly six colon-separated hex octets, any case
pub fn is_address(candidate: &str) -> bool {
    ADDRESS.is_match(candidate)
}

/// Adapter address and power state from `show`
pub fn parse_adapter(text: &str) -> AdapterStatus {
    let address = CONTROLLER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let powered = POWERED
        .captures(text)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("yes"));
    AdapterStatus { address, powered }
}

/// Distinct device addresses from `devices`, in first-seen order
pub fn parse_device_addresses(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .filter_map(|line| DEVICE.captures(line).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
        .filter(|mac| seen.insert(mac.to_ascii_uppercase()))
        .collect()
}

fn flag(text: &str, key: &str) -> bool {
    text.lines().any(|line| {
        line.trim()
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
            .is_some_and(super::yes_no)
    })
}

/// One `info <mac>` block.
///
/// `Alias` names the device; without it the address doubles as the name.
/// Flags that are missing or unreadable read as `false`.
pub fn parse_device_info(mac: &str, text: &str) -> BluetoothDevice {
    let name = ALIAS
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|alias| !alias.is_empty())
        .unwrap_or(mac)
        .to_string();

    BluetoothDevice {
        mac: mac.to_string(),
        name,
        connected: flag(text, "Connected"),
        paired: flag(text, "Paired"),
        trusted: flag(text, "Trusted"),
    }
}
