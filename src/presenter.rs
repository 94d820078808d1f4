//! Presentation seam
//!
//! The consuming loop pushes every view change through [`Presenter`]. The
//! only production implementation prints to a terminal; tests record calls.

use std::io::{self, Write};
use tracing::debug;

use crate::constants::labels;
use crate::logbook::LogEntry;
use crate::reconcile::Delta;
use crate::types::{
    AdapterStatus, AudioApp, AudioDefaults, AudioDevice, BluetoothDevice, NetworkStatus, Subsystem, WifiNetwork,
};

pub trait Presenter {
    fn panel_shown(&mut self, panel: Subsystem);

    fn network_status(&mut self, status: &NetworkStatus);
    fn wifi_networks(&mut self, radio_enabled: bool, networks: &[WifiNetwork]);
    /// Speedtest progress or results; status polling is paused meanwhile
    fn diagnostic(&mut self, text: &str);

    fn bluetooth_adapter(&mut self, adapter: &AdapterStatus);
    /// The whole device list was rebuilt
    fn bluetooth_devices(&mut self, devices: &[BluetoothDevice]);
    fn bluetooth_delta(&mut self, delta: &Delta<BluetoothDevice>);

    fn audio_devices(&mut self, outputs: &[AudioDevice], inputs: &[AudioDevice], defaults: &AudioDefaults);
    fn audio_levels(&mut self, delta: &Delta<AudioDevice>, defaults: &AudioDefaults);
    /// `shown` is how many apps remain listed after the delta
    fn audio_apps(&mut self, delta: &Delta<AudioApp>, shown: usize);

    fn log_line(&mut self, subsystem: Subsystem, entry: &LogEntry);
    /// Feedback that is not a log entry (usage errors, help)
    fn notice(&mut self, text: &str);
}

pub struct ConsolePresenter<W: Write> {
    out: W,
}

impl ConsolePresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsolePresenter<W> {
    #[cfg(test)]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        if let Err(e) = writeln!(self.out, "{}", text.as_ref()) {
            debug!(error = %e, "Failed to write to console");
        }
    }

    fn device_row(&mut self, device: &AudioDevice, defaults: &AudioDefaults) {
        let mut row = format!("  {} {}%", device.display_name(), device.volume_percent);
        if device.muted {
            row.push_str(" [muted]");
        }
        if defaults.is_default(device) {
            row.push_str(" [default]");
        }
        row.push_str(&format!("  ({})", device.identifier));
        self.line(row);
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn panel_title(panel: Subsystem) -> &'static str {
    match panel {
        Subsystem::Network => "Wi-Fi",
        Subsystem::Bluetooth => "Bluetooth",
        Subsystem::Audio => "Audio",
    }
}

impl<W: Write> Presenter for ConsolePresenter<W> {
    fn panel_shown(&mut self, panel: Subsystem) {
        self.line(format!("== {} ==", panel_title(panel)));
    }

    fn network_status(&mut self, status: &NetworkStatus) {
        let summary = status.summary_lines();
        if summary.is_empty() {
            self.line(labels::NO_NETWORK_INFO);
        }
        for line in summary {
            self.line(line);
        }
        self.line(format!("Wi-Fi radio: {}", if status.radio_enabled { "ON" } else { "OFF" }));
        if status.active.is_empty() {
            self.line(labels::NO_CONNECTIONS);
        }
        for connection in &status.active {
            self.line(format!("  * {}", connection.display_label()));
        }
    }

    fn wifi_networks(&mut self, radio_enabled: bool, networks: &[WifiNetwork]) {
        if !radio_enabled {
            self.line(labels::RADIO_OFF);
            return;
        }
        if networks.is_empty() {
            self.line(labels::NO_WIFI);
        }
        for network in networks {
            self.line(format!("  {}", network.display_label()));
        }
    }

    fn diagnostic(&mut self, text: &str) {
        self.line(text);
    }

    fn bluetooth_adapter(&mut self, adapter: &AdapterStatus) {
        let state = if adapter.powered { "ON" } else { "OFF" };
        match &adapter.address {
            Some(address) => self.line(format!("Adapter Status: {state} ({address})")),
            None => self.line(format!("Adapter Status: {state}")),
        }
    }

    fn bluetooth_devices(&mut self, devices: &[BluetoothDevice]) {
        if devices.is_empty() {
            self.line(labels::NO_BLUETOOTH);
        }
        for device in devices {
            self.line(format!("  {}", device.display_label()));
        }
    }

    fn bluetooth_delta(&mut self, delta: &Delta<BluetoothDevice>) {
        for device in &delta.added {
            self.line(format!("+ {}", device.display_label()));
        }
        for device in &delta.updated {
            self.line(format!("~ {}", device.display_label()));
        }
        for mac in &delta.removed {
            self.line(format!("- {mac}"));
        }
    }

    fn audio_devices(&mut self, outputs: &[AudioDevice], inputs: &[AudioDevice], defaults: &AudioDefaults) {
        self.line("Outputs:");
        for device in outputs {
            self.device_row(device, defaults);
        }
        self.line("Inputs:");
        for device in inputs {
            self.device_row(device, defaults);
        }
    }

    fn audio_levels(&mut self, delta: &Delta<AudioDevice>, defaults: &AudioDefaults) {
        for device in &delta.updated {
            self.device_row(device, defaults);
        }
    }

    fn audio_apps(&mut self, delta: &Delta<AudioApp>, shown: usize) {
        for app in &delta.added {
            self.line(format!("+ {} {}% (#{})", app.name, app.volume_percent, app.index));
        }
        for app in &delta.updated {
            self.line(format!("~ {} {}% (#{})", app.name, app.volume_percent, app.index));
        }
        for index in &delta.removed {
            self.line(format!("- app #{index}"));
        }
        if shown == 0 {
            self.line(labels::NO_APPS);
        }
    }

    fn log_line(&mut self, subsystem: Subsystem, entry: &LogEntry) {
        let marker = if entry.is_error() { "error" } else { "info" };
        self.line(format!("[{subsystem}] {marker}: {}", entry.message));
    }

    fn notice(&mut self, text: &str) {
        self.line(text);
    }
}
