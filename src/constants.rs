//! Application-wide constants
//!
//! Tool names, subcommand vocabulary, output markers and labels used by the
//! parsers and workers, kept in one place so the text contracts with the
//! external tools are easy to audit.

/// External executables
pub mod tools {
    pub const NMCLI: &str = "nmcli";
    pub const BLUETOOTHCTL: &str = "bluetoothctl";
    pub const PACTL: &str = "pactl";
    pub const SPEEDTEST: &str = "speedtest-cli";
}

/// Remediation hints appended when an executable is missing
pub mod hints {
    pub const NMCLI: &str = "Is NetworkManager installed?";
    pub const BLUETOOTHCTL: &str = "Is bluez-utils installed?";
    pub const PACTL: &str = "Is PulseAudio/PipeWire installed?";
    pub const SPEEDTEST: &str = "Install it (e.g., 'pip install speedtest-cli').";

    /// Hint for a program name, if we know one
    pub fn for_program(program: &str) -> Option<&'static str> {
        match program {
            super::tools::NMCLI => Some(NMCLI),
            super::tools::BLUETOOTHCTL => Some(BLUETOOTHCTL),
            super::tools::PACTL => Some(PACTL),
            super::tools::SPEEDTEST => Some(SPEEDTEST),
            _ => None,
        }
    }
}

/// Scheduler job keys, also used as single-flight task names
pub mod jobs {
    pub const NETWORK_STATUS: &str = "network_status";
    pub const NETWORK_STATUS_RESUME: &str = "network_status_resume";
    pub const BLUETOOTH_STATUS: &str = "bluetooth_status";
    pub const AUDIO_LEVELS: &str = "audio_levels";
    pub const AUDIO_APPS: &str = "audio_apps";

    // Named tasks that are never timer-driven
    pub const WIFI_SCAN: &str = "wifi_scan";
    pub const SPEEDTEST: &str = "speedtest";
    pub const BLUETOOTH_SCAN: &str = "bluetooth_scan";
    pub const AUDIO_LOAD: &str = "audio_load";
}

/// Labels substituted when tool output lacks a usable value
pub mod labels {
    /// Shown in place of an empty SSID
    pub const HIDDEN_NETWORK: &str = "<Hidden Network>";

    /// Prefix for applications without a name or binary
    pub const APP_PREFIX: &str = "App #";

    pub const NO_NETWORK_INFO: &str = "No network information available.";
    pub const RADIO_OFF: &str = "Wi-Fi radio is OFF. Toggle ON to scan.";
    pub const NO_WIFI: &str = "No WiFi networks found.";
    pub const NO_CONNECTIONS: &str = "No active connections.";
    pub const NO_BLUETOOTH: &str = "No Bluetooth devices found/known.";
    pub const NO_APPS: &str = "No applications playing audio";
    pub const PAUSE_EXPIRED: &str = "Speedtest results expired. Resuming status updates.";
}

/// Markers in `bluetoothctl` output
pub mod bluetooth {
    pub const PAIRING_SUCCESSFUL: &str = "Pairing successful";
    pub const ALREADY_PAIRED: &str = "Already Paired";
    pub const SUCCESSFUL: &str = "successful";
    pub const DEVICE_REMOVED: &str = "Device has been removed";
    pub const NOT_AVAILABLE: &str = "not available";
    pub const SET_PROPERTY_FAILED: &str = "Failed to set property";

    /// Benign stderr emitted by `power on|off` on secondary controllers
    pub const PRIMARY_CONTROLLER_ONLY: &str =
        "Changing power is only allowed when on a primary controller";
}

/// Audio value bounds
pub mod audio {
    /// Highest volume the mixer accepts, in percent
    pub const MAX_VOLUME_PERCENT: u8 = 150;
}

/// Per-subsystem log sink defaults
pub mod logbook {
    pub const DEFAULT_CAPACITY: usize = 50;
}

/// Configuration file location
pub mod config {
    pub const APP_DIR: &str = "panelsync";
    pub const FILENAME: &str = "config.json";
}
