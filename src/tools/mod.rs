//! Worker bodies: one async function per poll or user action
//!
//! Each function invokes its tool through the runner, parses the output and
//! returns an immutable report. None of them touch loop-owned state; the
//! loop passes in whatever they need by value.

pub mod audio;
pub mod bluetooth;
pub mod network;

pub use audio::AudioReport;
pub use bluetooth::BluetoothReport;
pub use network::NetworkReport;

/// What a finished worker hands back to the consuming loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Network(NetworkReport),
    Bluetooth(BluetoothReport),
    Audio(AudioReport),
}

impl From<NetworkReport> for Report {
    fn from(report: NetworkReport) -> Self {
        Report::Network(report)
    }
}

impl From<BluetoothReport> for Report {
    fn from(report: BluetoothReport) -> Self {
        Report::Bluetooth(report)
    }
}

impl From<AudioReport> for Report {
    fn from(report: AudioReport) -> Self {
        Report::Audio(report)
    }
}

/// Result of a user action, judged from the tool's own output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub succeeded: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { succeeded: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { succeeded: false, message: message.into() }
    }
}
