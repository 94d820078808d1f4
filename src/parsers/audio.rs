//! `pactl list` and `pactl get-*` output

use regex::Regex;
use std::sync::LazyLock;

use super::{field_value, yes_no};
use crate::constants::{audio::MAX_VOLUME_PERCENT, labels};
use crate::types::{AudioApp, AudioDevice, Direction};

static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\s*(\d+)%").expect("valid regex"));

/// First `/ <n>%` on a volume line, clamped to the mixer range; 0 when absent
pub fn parse_volume(line: &str) -> u8 {
    PERCENT
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|v| v.min(u32::from(MAX_VOLUME_PERCENT)) as u8)
        .unwrap_or(0)
}

/// Like [`parse_volume`] but None when the text has no percentage at all
pub fn parse_volume_opt(text: &str) -> Option<u8> {
    PERCENT.is_match(text).then(|| parse_volume(text))
}

/// `get-sink-mute` prints `Mute: yes`; a bare `yes` is accepted too
pub fn parse_mute(text: &str) -> bool {
    let text = text.trim();
    match text.strip_prefix("Mute:") {
        Some(value) => yes_no(value),
        None => yes_no(text),
    }
}

/// `get-default-sink` / `get-default-source`
pub fn parse_default(text: &str) -> Option<String> {
    let name = text.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Default)]
struct PendingDevice {
    identifier: Option<String>,
    volume_percent: u8,
    muted: bool,
}

/// `pactl list sinks` (outputs) or `pactl list sources` (inputs).
///
/// A record begins at each `Sink #` / `Source #` header and is kept only if
/// it carried a `Name:` line.
pub fn parse_devices(text: &str, direction: Direction) -> Vec<AudioDevice> {
    let header = match direction {
        Direction::Output => "Sink #",
        Direction::Input => "Source #",
    };

    let mut devices = Vec::new();
    let mut current: Option<PendingDevice> = None;

    let finish = |pending: Option<PendingDevice>, devices: &mut Vec<AudioDevice>| {
        if let Some(PendingDevice { identifier: Some(identifier), volume_percent, muted }) = pending {
            devices.push(AudioDevice {
                identifier,
                volume_percent,
                muted,
                is_output: direction.is_output(),
            });
        }
    };

    for line in text.lines().map(str::trim) {
        if line.starts_with(header) {
            finish(current.take(), &mut devices);
            current = Some(PendingDevice::default());
            continue;
        }
        let Some(pending) = current.as_mut() else {
            continue;
        };
        if line.starts_with("Name:") {
            pending.identifier = Some(field_value(line).to_string());
        } else if line.starts_with("Volume:") {
            pending.volume_percent = parse_volume(line);
        } else if line.starts_with("Mute:") {
            pending.muted = yes_no(field_value(line));
        }
    }
    finish(current.take(), &mut devices);

    devices
}

struct PendingApp {
    index: u32,
    app_name: Option<String>,
    binary: Option<String>,
    volume_percent: u8,
}

impl PendingApp {
    fn finish(self) -> AudioApp {
        let name = self
            .app_name
            .or(self.binary)
            .unwrap_or_else(|| format!("{}{}", labels::APP_PREFIX, self.index));
        AudioApp { index: self.index, name, volume_percent: self.volume_percent }
    }
}

/// Value of a `key = "value"` property line, unquoted
fn property_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.trim_start();
    let value = rest.strip_prefix('=')?.trim();
    let value = value.trim_matches('"');
    (!value.is_empty()).then_some(value)
}

/// `pactl list sink-inputs`.
///
/// The display name prefers `application.name`, then the base name of
/// `application.process.binary`, then `App #<index>`. Headers whose index
/// does not parse start no record.
pub fn parse_apps(text: &str) -> Vec<AudioApp> {
    let mut apps = Vec::new();
    let mut current: Option<PendingApp> = None;

    for line in text.lines().map(str::trim) {
        if let Some(index) = line.strip_prefix("Sink Input #") {
            if let Some(pending) = current.take() {
                apps.push(pending.finish());
            }
            current = index.trim().parse::<u32>().ok().map(|index| PendingApp {
                index,
                app_name: None,
                binary: None,
                volume_percent: 0,
            });
            continue;
        }
        let Some(pending) = current.as_mut() else {
            continue;
        };
        if line.starts_with("Volume:") {
            pending.volume_percent = parse_volume(line);
        } else if let Some(name) = property_value(line, "application.name") {
            pending.app_name.get_or_insert_with(|| name.to_string());
        } else if let Some(path) = property_value(line, "application.process.binary") {
            let base = path.rsplit('/').next().unwrap_or(path);
            pending.binary.get_or_insert_with(|| base.to_string());
        }
    }
    if let Some(pending) = current.take() {
        apps.push(pending.finish());
    }

    apps
}
