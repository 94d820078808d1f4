//! Typed records produced by the parsers
//!
//! Every record is a plain immutable value. Snapshots built from them are
//! replaced wholesale on each poll, never edited in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::tools;

/// A controllable subsystem; each one backs exactly one panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    #[serde(alias = "wifi")]
    Network,
    #[serde(alias = "bt")]
    Bluetooth,
    Audio,
}

impl Subsystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Network => "network",
            Subsystem::Bluetooth => "bluetooth",
            Subsystem::Audio => "audio",
        }
    }

    /// The command-line tool every poll for this panel depends on
    pub fn tool(&self) -> &'static str {
        match self {
            Subsystem::Network => tools::NMCLI,
            Subsystem::Bluetooth => tools::BLUETOOTHCTL,
            Subsystem::Audio => tools::PACTL,
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "network" | "wifi" => Ok(Subsystem::Network),
            "bluetooth" | "bt" => Ok(Subsystem::Bluetooth),
            "audio" => Ok(Subsystem::Audio),
            other => Err(format!("unknown panel '{other}' (expected wifi, bluetooth or audio)")),
        }
    }
}

/// One line of `nmcli connection show --active`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConnection {
    #[serde(rename = "type")]
    pub kind: String,
    pub device: String,
    pub name: String,
    pub uuid: String,
}

impl NetworkConnection {
    /// "Wifi: Home" style label (type capitalized)
    pub fn display_label(&self) -> String {
        let mut chars = self.kind.chars();
        let kind = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
            None => String::new(),
        };
        format!("{kind}: {}", self.name)
    }
}

/// One line of `nmcli device`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub device: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
    pub connection: String,
}

impl DeviceStatus {
    pub fn is_connected(&self) -> bool {
        self.state.eq_ignore_ascii_case("connected")
    }

    /// Human-readable status line, or None for devices not worth reporting
    pub fn summary(&self) -> Option<String> {
        if self.is_connected() {
            Some(format!("✅ {} ({}) connected to {}", self.device, self.kind, self.connection))
        } else if self.kind == "wifi" || self.kind == "ethernet" {
            Some(format!("❌ {} ({}) not connected (State: {})", self.device, self.kind, self.state))
        } else {
            None
        }
    }
}

/// One entry of a Wi-Fi scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiNetwork {
    pub ssid: String,
    pub signal_percent: u8,
}

impl WifiNetwork {
    pub fn display_label(&self) -> String {
        format!("{} ({}%)", self.ssid, self.signal_percent)
    }
}

/// Aggregated network panel state for one poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NetworkStatus {
    pub radio_enabled: bool,
    pub devices: Vec<DeviceStatus>,
    pub active: Vec<NetworkConnection>,
}

impl NetworkStatus {
    pub fn summary_lines(&self) -> Vec<String> {
        self.devices.iter().filter_map(DeviceStatus::summary).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BluetoothDevice {
    pub mac: String,
    pub name: String,
    pub connected: bool,
    pub paired: bool,
    pub trusted: bool,
}

impl BluetoothDevice {
    /// Device named after its address, all flags cleared
    #[cfg(test)]
    pub fn unknown(mac: &str) -> Self {
        Self {
            mac: mac.to_string(),
            name: mac.to_string(),
            connected: false,
            paired: false,
            trusted: false,
        }
    }

    pub fn display_label(&self) -> String {
        let status = if self.connected {
            " [Connected]"
        } else if self.trusted {
            " [Trusted]"
        } else if self.paired {
            " [Paired]"
        } else {
            ""
        };
        format!("{}{} ({})", self.name, status, self.mac)
    }
}

/// Adapter state reported by `bluetoothctl show`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AdapterStatus {
    pub address: Option<String>,
    pub powered: bool,
}

/// A sink (output) or source (input)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDevice {
    pub identifier: String,
    pub volume_percent: u8,
    pub muted: bool,
    pub is_output: bool,
}

impl AudioDevice {
    /// Last dotted component, capitalized ("alsa_output.pci.analog-stereo" → "Analog-stereo")
    pub fn display_name(&self) -> String {
        let tail = self.identifier.rsplit('.').next().unwrap_or(&self.identifier);
        let mut chars = tail.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
            None => String::new(),
        }
    }
}

/// A running application stream (sink input)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioApp {
    pub index: u32,
    pub name: String,
    pub volume_percent: u8,
}

/// Which side of the mixer a device belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Output,
    Input,
}

impl Direction {
    pub fn is_output(&self) -> bool {
        matches!(self, Direction::Output)
    }

    /// pactl noun: "sink" or "source"
    pub fn noun(&self) -> &'static str {
        match self {
            Direction::Output => "sink",
            Direction::Input => "source",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sink" | "output" | "out" => Ok(Direction::Output),
            "source" | "input" | "in" => Ok(Direction::Input),
            other => Err(format!("unknown direction '{other}' (expected sink or source)")),
        }
    }
}

/// Mixer defaults reported by `get-default-sink` / `get-default-source`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AudioDefaults {
    pub output: Option<String>,
    pub input: Option<String>,
}

impl AudioDefaults {
    pub fn is_default(&self, device: &AudioDevice) -> bool {
        let current = if device.is_output { &self.output } else { &self.input };
        current.as_deref() == Some(device.identifier.as_str())
    }
}

/// Full audio panel snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AudioSnapshot {
    pub outputs: Vec<AudioDevice>,
    pub inputs: Vec<AudioDevice>,
    pub apps: Vec<AudioApp>,
    pub defaults: AudioDefaults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_from_str_accepts_panel_aliases() {
        assert_eq!("wifi".parse::<Subsystem>(), Ok(Subsystem::Network));
        assert_eq!("Bluetooth".parse::<Subsystem>(), Ok(Subsystem::Bluetooth));
        assert_eq!("audio".parse::<Subsystem>(), Ok(Subsystem::Audio));
        assert!("wallpaper".parse::<Subsystem>().is_err());
    }

    #[test]
    fn test_connection_label_capitalizes_type() {
        let conn = NetworkConnection {
            kind: "802-11-wireless".to_string(),
            device: "wlan0".to_string(),
            name: "Home".to_string(),
            uuid: "u".to_string(),
        };
        assert_eq!(conn.display_label(), "802-11-wireless: Home");

        let conn = NetworkConnection { kind: "wifi".to_string(), ..conn };
        assert_eq!(conn.display_label(), "Wifi: Home");
    }

    #[test]
    fn test_device_summary_skips_unmanaged_kinds() {
        let loopback = DeviceStatus {
            device: "lo".to_string(),
            kind: "loopback".to_string(),
            state: "unmanaged".to_string(),
            connection: String::new(),
        };
        assert_eq!(loopback.summary(), None);

        let wifi = DeviceStatus {
            device: "wlan0".to_string(),
            kind: "wifi".to_string(),
            state: "disconnected".to_string(),
            connection: String::new(),
        };
        assert_eq!(wifi.summary().unwrap(), "❌ wlan0 (wifi) not connected (State: disconnected)");
    }

    #[test]
    fn test_bluetooth_label_prefers_connected_flag() {
        let device = BluetoothDevice {
            mac: "AA:BB:CC:DD:EE:FF".to_string(),
            name: "Headphones".to_string(),
            connected: true,
            paired: true,
            trusted: true,
        };
        assert_eq!(device.display_label(), "Headphones [Connected] (AA:BB:CC:DD:EE:FF)");
    }

    #[test]
    fn test_audio_device_display_name() {
        let device = AudioDevice {
            identifier: "alsa_output.pci-0000_00_1f.3.analog-stereo".to_string(),
            volume_percent: 40,
            muted: false,
            is_output: true,
        };
        assert_eq!(device.display_name(), "Analog-stereo");
    }

    #[test]
    fn test_defaults_match_by_direction() {
        let defaults = AudioDefaults {
            output: Some("speakers".to_string()),
            input: Some("mic".to_string()),
        };
        let sink = AudioDevice {
            identifier: "speakers".to_string(),
            volume_percent: 0,
            muted: false,
            is_output: true,
        };
        let source_named_like_sink = AudioDevice { is_output: false, ..sink.clone() };
        assert!(defaults.is_default(&sink));
        assert!(!defaults.is_default(&source_named_like_sink));
    }
}
