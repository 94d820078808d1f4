//! PulseAudio / PipeWire (`pactl`) workers

use anyhow::Result;
use std::time::Duration;
use tracing::debug;

use super::ActionOutcome;
use crate::config::Timeouts;
use crate::constants::audio::MAX_VOLUME_PERCENT;
use crate::constants::tools::PACTL;
use crate::error::ToolError;
use crate::parsers::audio as parse;
use crate::runner::{self, Invocation};
use crate::types::{AudioApp, AudioDefaults, AudioDevice, AudioSnapshot, Direction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioReport {
    /// Every device, app and default; the device rows are rebuilt from it
    Full(AudioSnapshot),
    /// Fresh volume and mute for devices already shown
    Levels { devices: Vec<AudioDevice>, defaults: AudioDefaults },
    Apps(Vec<AudioApp>),
    /// A mixer change finished; `reload` asks for a full rebuild
    Action { outcome: ActionOutcome, reload: bool },
}

fn pactl<S: AsRef<str>>(args: &[S], timeout: Duration) -> Invocation {
    Invocation::new(std::iter::once(PACTL).chain(args.iter().map(|arg| arg.as_ref())), timeout)
}

/// Stdout of a successful call; None when the object is gone or the call
/// failed. Only a missing executable is an error.
async fn sample(invocation: Invocation) -> Result<Option<String>, ToolError> {
    match runner::invoke(&invocation).await {
        Ok(result) if result.success() => Ok(Some(result.stdout)),
        Ok(result) => {
            debug!(args = ?invocation.argv(), exit_code = result.exit_code, "pactl sample failed");
            Ok(None)
        }
        Err(e) if e.is_not_found() => Err(e),
        Err(e) => {
            debug!(args = ?invocation.argv(), error = %e, "pactl sample failed");
            Ok(None)
        }
    }
}

pub async fn defaults(timeouts: Timeouts) -> Result<AudioDefaults> {
    let (output, input) = tokio::join!(
        sample(pactl(&["get-default-sink"], timeouts.pactl())),
        sample(pactl(&["get-default-source"], timeouts.pactl())),
    );
    Ok(AudioDefaults {
        output: output?.as_deref().and_then(parse::parse_default),
        input: input?.as_deref().and_then(parse::parse_default),
    })
}

pub async fn apps(timeouts: Timeouts) -> Result<Vec<AudioApp>> {
    let output = runner::invoke_checked(&pactl(&["list", "sink-inputs"], timeouts.pactl())).await?;
    Ok(parse::parse_apps(&output.stdout))
}

pub async fn load(timeouts: Timeouts) -> Result<AudioSnapshot> {
    let list_sinks = pactl(&["list", "sinks"], timeouts.pactl());
    let list_sources = pactl(&["list", "sources"], timeouts.pactl());
    let (sinks, sources, apps, defaults) = tokio::join!(
        runner::invoke_checked(&list_sinks),
        runner::invoke_checked(&list_sources),
        apps(timeouts),
        defaults(timeouts),
    );
    Ok(AudioSnapshot {
        outputs: parse::parse_devices(&sinks?.stdout, Direction::Output),
        inputs: parse::parse_devices(&sources?.stdout, Direction::Input),
        apps: apps?,
        defaults: defaults?,
    })
}

/// Sample volume and mute for each `(identifier, direction)`.
///
/// Devices that do not answer, or answer without a percentage, are left
/// out; the next full reload drops them for good.
pub async fn levels(timeouts: Timeouts, devices: Vec<(String, Direction)>) -> Result<AudioReport> {
    let mut sampled = Vec::with_capacity(devices.len());
    for (identifier, direction) in devices {
        let noun = direction.noun();
        let volume = sample(pactl(&[&format!("get-{noun}-volume"), &identifier], timeouts.pactl())).await?;
        let mute = sample(pactl(&[&format!("get-{noun}-mute"), &identifier], timeouts.pactl())).await?;

        let Some(volume_percent) = volume.as_deref().and_then(parse::parse_volume_opt) else {
            continue;
        };
        sampled.push(AudioDevice {
            identifier,
            volume_percent,
            muted: mute.as_deref().is_some_and(parse::parse_mute),
            is_output: direction.is_output(),
        });
    }
    Ok(AudioReport::Levels { devices: sampled, defaults: defaults(timeouts).await? })
}

async fn change(timeouts: Timeouts, args: Vec<String>, done: String) -> Result<ActionOutcome> {
    let result = runner::invoke(&pactl(&args[..], timeouts.pactl())).await?;
    Ok(if result.success() {
        ActionOutcome::ok(done)
    } else {
        ActionOutcome::failed(format!("pactl {} failed: {}", args.join(" "), result.diagnostic()))
    })
}

fn percent_arg(percent: u8) -> String {
    format!("{}%", percent.min(MAX_VOLUME_PERCENT))
}

fn flag_arg(on: bool) -> String {
    let flag = if on { "1" } else { "0" };
    flag.to_string()
}

pub async fn set_volume(timeouts: Timeouts, direction: Direction, identifier: String, percent: u8) -> Result<ActionOutcome> {
    let noun = direction.noun();
    let args = vec![format!("set-{noun}-volume"), identifier.clone(), percent_arg(percent)];
    change(timeouts, args, format!("Set {noun} {identifier} to {}", percent_arg(percent))).await
}

pub async fn set_mute(timeouts: Timeouts, direction: Direction, identifier: String, muted: bool) -> Result<ActionOutcome> {
    let noun = direction.noun();
    let args = vec![format!("set-{noun}-mute"), identifier.clone(), flag_arg(muted)];
    let state = if muted { "Muted" } else { "Unmuted" };
    change(timeouts, args, format!("{state} {noun} {identifier}")).await
}

pub async fn set_default(timeouts: Timeouts, direction: Direction, identifier: String) -> Result<ActionOutcome> {
    let noun = direction.noun();
    let args = vec![format!("set-default-{noun}"), identifier.clone()];
    change(timeouts, args, format!("Default {noun} is now {identifier}")).await
}

pub async fn set_app_volume(timeouts: Timeouts, index: u32, percent: u8) -> Result<ActionOutcome> {
    let args = vec!["set-sink-input-volume".to_string(), index.to_string(), percent_arg(percent)];
    change(timeouts, args, format!("Set app #{index} to {}", percent_arg(percent))).await
}

pub async fn set_app_mute(timeouts: Timeouts, index: u32, muted: bool) -> Result<ActionOutcome> {
    let args = vec!["set-sink-input-mute".to_string(), index.to_string(), flag_arg(muted)];
    let state = if muted { "Muted" } else { "Unmuted" };
    change(timeouts, args, format!("{state} app #{index}")).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_arg_clamps() {
        assert_eq!(percent_arg(40), "40%");
        assert_eq!(percent_arg(200), "150%");
    }

    #[test]
    fn test_pactl_invocation_shape() {
        let inv = pactl(&["get-sink-volume", "alsa_output.usb"], Duration::from_secs(3));
        assert_eq!(inv.argv(), ["pactl", "get-sink-volume", "alsa_output.usb"]);
    }

    #[tokio::test]
    async fn test_levels_with_no_devices_still_reads_defaults() {
        // Without pactl installed this is a NotFound error, with it an empty sample
        match levels(Timeouts::default(), Vec::new()).await {
            Ok(AudioReport::Levels { devices, .. }) => assert!(devices.is_empty()),
            Ok(other) => panic!("unexpected report {other:?}"),
            Err(e) => assert!(crate::error::Fault::from(e).headline().contains("pactl")),
        }
    }
}
