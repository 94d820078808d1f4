use std::future::Future;
use tracing::debug;

use crate::console::{HELP, MixerTarget, UserCommand};
use crate::constants::{jobs, labels};
use crate::context::{Context, JobAction, LoopEvent};
use crate::dispatch::Completion;
use crate::logbook::Severity;
use crate::parsers::bluetooth::is_address;
use crate::presenter::Presenter;
use crate::tools::bluetooth::DeviceAction;
use crate::tools::{self, ActionOutcome, AudioReport, BluetoothReport, NetworkReport, Report};
use crate::types::{NetworkConnection, Subsystem};

/// Whether the loop keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub fn handle_event<P: Presenter>(ctx: &mut Context, presenter: &mut P, event: LoopEvent) -> Flow {
    match event {
        LoopEvent::Fired(fired) => {
            if let Some(action) = ctx.claim(fired) {
                on_job(ctx, presenter, action);
            }
        }
        LoopEvent::Completed(completion) => on_completion(ctx, presenter, completion),
        LoopEvent::Command(command) => return on_command(ctx, presenter, command),
        LoopEvent::Shutdown => {
            ctx.shutdown();
            return Flow::Quit;
        }
    }
    Flow::Continue
}

/// Append to a subsystem's log; only the shown panel's log is printed
fn log<P: Presenter>(ctx: &mut Context, presenter: &mut P, subsystem: Subsystem, severity: Severity, message: impl Into<String>) {
    let shown = ctx.is_active(subsystem);
    let entry = ctx.logbook.append(subsystem, severity, message);
    if shown {
        presenter.log_line(subsystem, entry);
    }
}

fn on_job<P: Presenter>(ctx: &mut Context, presenter: &mut P, action: JobAction) {
    if !ctx.is_active(action.subsystem()) {
        return;
    }
    match action {
        JobAction::ResumeNetworkStatus => {
            log(ctx, presenter, Subsystem::Network, Severity::Info, labels::PAUSE_EXPIRED);
            ctx.start_network_status();
        }
        action => ctx.run_job(action),
    }
}

fn action_outcome(report: &Report) -> Option<&ActionOutcome> {
    match report {
        Report::Network(NetworkReport::Action(outcome))
        | Report::Bluetooth(BluetoothReport::Action(outcome))
        | Report::Audio(AudioReport::Action { outcome, .. }) => Some(outcome),
        _ => None,
    }
}

fn on_completion<P: Presenter>(ctx: &mut Context, presenter: &mut P, completion: Completion<Report>) {
    let Completion { origin, outcome } = completion;
    let subsystem = origin.subsystem;
    ctx.finish(&origin);

    let speedtest = origin.job.as_deref() == Some(jobs::SPEEDTEST);
    if speedtest && ctx.is_active(Subsystem::Network) {
        ctx.pause_network_status();
    }

    let report = match outcome {
        Ok(report) => report,
        Err(fault) => {
            let headline = fault.headline();
            if speedtest && ctx.is_active(Subsystem::Network) {
                presenter.diagnostic(&headline);
            }
            // Without its tool a panel cannot poll; workers already running report it again
            if fault.missing_program() == Some(subsystem.tool()) {
                ctx.stop_polling(subsystem);
                if ctx.logbook.last(subsystem).is_some_and(|last| last.message == headline) {
                    debug!(subsystem = %subsystem, job = ?origin.job, "Missing tool already logged");
                    return;
                }
            }
            log(ctx, presenter, subsystem, Severity::Error, headline);
            return;
        }
    };

    // Outcomes are logged for every panel, views only touched for the shown one
    if let Some(outcome) = action_outcome(&report) {
        let severity = if outcome.succeeded { Severity::Info } else { Severity::Error };
        let message = outcome.message.clone();
        log(ctx, presenter, subsystem, severity, message);
    }
    if !ctx.is_active(subsystem) {
        debug!(subsystem = %subsystem, job = ?origin.job, "Dropping result for hidden panel");
        return;
    }

    match report {
        Report::Network(report) => apply_network(ctx, presenter, report),
        Report::Bluetooth(report) => apply_bluetooth(ctx, presenter, report),
        Report::Audio(report) => apply_audio(ctx, presenter, report),
    }
}

fn apply_network<P: Presenter>(ctx: &mut Context, presenter: &mut P, report: NetworkReport) {
    match report {
        NetworkReport::Status(status) => {
            // A poll that started before the speedtest finished
            if ctx.network_paused() {
                debug!("Status poll landed during diagnostic pause, dropping");
                return;
            }
            presenter.network_status(&status);
            ctx.snapshots.network = status;
        }
        NetworkReport::Scan { radio_enabled, networks } => {
            presenter.wifi_networks(radio_enabled, &networks);
            ctx.snapshots.network.radio_enabled = radio_enabled;
            ctx.snapshots.wifi = networks;
        }
        NetworkReport::Action(_) => {
            if !ctx.network_paused() {
                ctx.run_job(JobAction::NetworkStatus);
            }
            ctx.scan_wifi();
        }
        NetworkReport::Speedtest(results) => presenter.diagnostic(&format!("Speedtest Results:\n\n{results}")),
    }
}

fn apply_bluetooth<P: Presenter>(ctx: &mut Context, presenter: &mut P, report: BluetoothReport) {
    match report {
        BluetoothReport::Status { adapter, devices } => {
            if let Some(address) = &adapter.address
                && ctx.remember_adapter(address)
            {
                log(ctx, presenter, Subsystem::Bluetooth, Severity::Info, format!("Using adapter {address}."));
            }
            if adapter != ctx.snapshots.adapter {
                presenter.bluetooth_adapter(&adapter);
            }
            let powered = adapter.powered;
            ctx.snapshots.adapter = adapter;

            if let Some(devices) = devices {
                let delta = ctx.snapshots.bluetooth.apply(devices);
                if !delta.is_empty() {
                    presenter.bluetooth_delta(&delta);
                }
            }
            if powered && ctx.snapshots.bluetooth.is_empty() && ctx.scan_bluetooth() {
                log(ctx, presenter, Subsystem::Bluetooth, Severity::Info, "Scanning for devices...");
            }
        }
        BluetoothReport::Scan(devices) => {
            let rows = ctx.snapshots.bluetooth.rebuild(devices);
            presenter.bluetooth_devices(&rows);
            log(ctx, presenter, Subsystem::Bluetooth, Severity::Info, "Scan complete.");
        }
        BluetoothReport::Action(_) => {
            ctx.scan_bluetooth();
        }
    }
}

fn apply_audio<P: Presenter>(ctx: &mut Context, presenter: &mut P, report: AudioReport) {
    let snapshots = &mut ctx.snapshots;
    match report {
        AudioReport::Full(snapshot) => {
            let outputs = snapshots.outputs.rebuild(snapshot.outputs);
            let inputs = snapshots.inputs.rebuild(snapshot.inputs);
            presenter.audio_devices(&outputs, &inputs, &snapshot.defaults);
            snapshots.defaults = snapshot.defaults;

            let delta = snapshots.apps.apply(snapshot.apps);
            presenter.audio_apps(&delta, snapshots.apps.len());
        }
        AudioReport::Levels { devices, defaults } => {
            let (outputs, inputs): (Vec<_>, Vec<_>) = devices.into_iter().partition(|device| device.is_output);
            let mut delta = snapshots.outputs.update_existing(outputs);
            delta.updated.extend(snapshots.inputs.update_existing(inputs).updated);

            if defaults != snapshots.defaults {
                snapshots.defaults = defaults;
                let outputs: Vec<_> = snapshots.outputs.shown().values().cloned().collect();
                let inputs: Vec<_> = snapshots.inputs.shown().values().cloned().collect();
                presenter.audio_devices(&outputs, &inputs, &snapshots.defaults);
            } else if !delta.is_empty() {
                presenter.audio_levels(&delta, &snapshots.defaults);
            }
        }
        AudioReport::Apps(apps) => {
            let delta = snapshots.apps.apply(apps);
            if !delta.is_empty() {
                presenter.audio_apps(&delta, snapshots.apps.len());
            }
        }
        AudioReport::Action { reload, .. } => {
            if reload {
                ctx.load_audio();
            }
        }
    }
}

fn on_command<P: Presenter>(ctx: &mut Context, presenter: &mut P, command: UserCommand) -> Flow {
    let panel = match command {
        UserCommand::ShowPanel(panel) => {
            presenter.panel_shown(panel);
            ctx.show_panel(panel);
            return Flow::Continue;
        }
        UserCommand::Help => {
            presenter.notice(HELP);
            return Flow::Continue;
        }
        UserCommand::Quit => {
            ctx.shutdown();
            return Flow::Quit;
        }
        _ => match ctx.active() {
            Some(panel) => panel,
            None => {
                presenter.notice("No panel is shown.");
                return Flow::Continue;
            }
        },
    };

    if command == UserCommand::ShowLog {
        for entry in ctx.logbook.entries(panel) {
            presenter.log_line(panel, entry);
        }
        return Flow::Continue;
    }

    match panel {
        Subsystem::Network => network_command(ctx, presenter, command),
        Subsystem::Bluetooth => bluetooth_command(ctx, presenter, command),
        Subsystem::Audio => audio_command(ctx, presenter, command),
    }
    Flow::Continue
}

fn unsupported<P: Presenter>(presenter: &mut P, command: &UserCommand, panel: Subsystem) {
    presenter.notice(&format!("'{}' is not available on the {panel} panel.", command.verb()));
}

fn network_action<F>(ctx: &mut Context, task: F)
where
    F: Future<Output = anyhow::Result<ActionOutcome>> + Send + 'static,
{
    ctx.spawn_action(Subsystem::Network, async move { task.await.map(NetworkReport::Action) });
}

fn bluetooth_action<F>(ctx: &mut Context, task: F)
where
    F: Future<Output = anyhow::Result<ActionOutcome>> + Send + 'static,
{
    ctx.spawn_action(Subsystem::Bluetooth, async move { task.await.map(BluetoothReport::Action) });
}

fn audio_action<F>(ctx: &mut Context, task: F, reload: bool)
where
    F: Future<Output = anyhow::Result<ActionOutcome>> + Send + 'static,
{
    ctx.spawn_action(Subsystem::Audio, async move {
        task.await.map(|outcome| AudioReport::Action { outcome, reload })
    });
}

/// Active connection matching a name or UUID
fn find_connection(ctx: &Context, target: &str) -> Option<NetworkConnection> {
    ctx.snapshots
        .network
        .active
        .iter()
        .find(|connection| connection.name == target || connection.uuid == target)
        .cloned()
}

fn network_command<P: Presenter>(ctx: &mut Context, presenter: &mut P, command: UserCommand) {
    let timeouts = ctx.config.timeouts;
    match command {
        UserCommand::Refresh => {
            if !ctx.network_paused() {
                ctx.run_job(JobAction::NetworkStatus);
            }
            ctx.scan_wifi();
        }
        UserCommand::Scan => {
            if !ctx.scan_wifi() {
                presenter.notice("A Wi-Fi scan is already running.");
            }
        }
        UserCommand::TogglePower => network_action(ctx, tools::network::toggle_radio(timeouts)),
        UserCommand::Connect { target, password } => {
            log(ctx, presenter, Subsystem::Network, Severity::Info, format!("Connecting to {target}..."));
            network_action(ctx, tools::network::connect(timeouts, target, password));
        }
        UserCommand::Disconnect { target } => match find_connection(ctx, &target) {
            Some(connection) => network_action(ctx, tools::network::disconnect(timeouts, connection)),
            None => presenter.notice(&format!("No active connection named '{target}'.")),
        },
        UserCommand::Forget { target } => match find_connection(ctx, &target) {
            Some(connection) => network_action(ctx, tools::network::forget(timeouts, connection)),
            None => presenter.notice(&format!("No active connection named '{target}'.")),
        },
        UserCommand::Speedtest => {
            if ctx.run_speedtest() {
                presenter.diagnostic("Running speedtest... This may take a minute.");
            } else {
                presenter.notice("A speedtest is already running.");
            }
        }
        other => unsupported(presenter, &other, Subsystem::Network),
    }
}

fn device_command<P: Presenter>(ctx: &mut Context, presenter: &mut P, action: DeviceAction, target: String) {
    let mac = target.to_ascii_uppercase();
    if !is_address(&mac) {
        presenter.notice(&format!("'{target}' is not a Bluetooth address."));
        return;
    }
    let name = ctx.snapshots.bluetooth.get(&mac).map_or_else(|| mac.clone(), |device| device.name.clone());
    log(ctx, presenter, Subsystem::Bluetooth, Severity::Info, format!("Attempting {action} with {name}..."));
    let timeouts = ctx.config.timeouts;
    bluetooth_action(ctx, tools::bluetooth::device_action(timeouts, action, mac, name));
}

fn bluetooth_command<P: Presenter>(ctx: &mut Context, presenter: &mut P, command: UserCommand) {
    match command {
        UserCommand::Refresh | UserCommand::Scan => {
            if ctx.scan_bluetooth() {
                log(ctx, presenter, Subsystem::Bluetooth, Severity::Info, "Scanning for devices...");
            } else {
                presenter.notice("A Bluetooth scan is already running.");
            }
        }
        UserCommand::TogglePower => {
            let timeouts = ctx.config.timeouts;
            bluetooth_action(ctx, tools::bluetooth::toggle_power(timeouts));
        }
        UserCommand::Connect { target, .. } => device_command(ctx, presenter, DeviceAction::Connect, target),
        UserCommand::Disconnect { target } => device_command(ctx, presenter, DeviceAction::Disconnect, target),
        UserCommand::Forget { target } => device_command(ctx, presenter, DeviceAction::Remove, target),
        UserCommand::Pair { target } => device_command(ctx, presenter, DeviceAction::Pair, target),
        UserCommand::Trust { target } => device_command(ctx, presenter, DeviceAction::Trust, target),
        other => unsupported(presenter, &other, Subsystem::Bluetooth),
    }
}

fn audio_command<P: Presenter>(ctx: &mut Context, presenter: &mut P, command: UserCommand) {
    let timeouts = ctx.config.timeouts;
    match command {
        UserCommand::Refresh => {
            ctx.load_audio();
        }
        UserCommand::SetVolume { target: MixerTarget::Device { direction, identifier }, percent } => {
            ctx.snapshots.devices(direction).edit_shown(&identifier, |device| device.volume_percent = percent);
            audio_action(ctx, tools::audio::set_volume(timeouts, direction, identifier, percent), false);
        }
        UserCommand::SetVolume { target: MixerTarget::App(index), percent } => {
            ctx.snapshots.apps.edit_shown(&index, |app| app.volume_percent = percent);
            audio_action(ctx, tools::audio::set_app_volume(timeouts, index, percent), false);
        }
        UserCommand::SetMute { target: MixerTarget::Device { direction, identifier }, muted } => {
            ctx.snapshots.devices(direction).edit_shown(&identifier, |device| device.muted = muted);
            audio_action(ctx, tools::audio::set_mute(timeouts, direction, identifier, muted), false);
        }
        UserCommand::SetMute { target: MixerTarget::App(index), muted } => {
            audio_action(ctx, tools::audio::set_app_mute(timeouts, index, muted), false);
        }
        UserCommand::SetDefault { direction, identifier } => {
            audio_action(ctx, tools::audio::set_default(timeouts, direction, identifier), true);
        }
        UserCommand::Edit { target, editing } => {
            match (target, editing) {
                (MixerTarget::Device { direction, identifier }, true) => ctx.snapshots.devices(direction).suppress(identifier),
                (MixerTarget::Device { direction, identifier }, false) => {
                    ctx.snapshots.devices(direction).release(&identifier);
                }
                (MixerTarget::App(index), true) => ctx.snapshots.apps.suppress(index),
                (MixerTarget::App(index), false) => {
                    ctx.snapshots.apps.release(&index);
                }
            }
            debug!(editing, "Mixer edit state changed");
        }
        other => unsupported(presenter, &other, Subsystem::Audio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatch::Origin;
    use crate::error::{Fault, ToolError};
    use crate::logbook::LogEntry;
    use crate::reconcile::Delta;
    use crate::types::{
        AdapterStatus, AudioApp, AudioDefaults, AudioDevice, AudioSnapshot, BluetoothDevice, NetworkStatus,
        WifiNetwork,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        notices: Vec<String>,
    }

    impl Presenter for Recorder {
        fn panel_shown(&mut self, panel: Subsystem) {
            self.calls.push(format!("panel {panel}"));
        }
        fn network_status(&mut self, status: &NetworkStatus) {
            self.calls.push(format!("status radio={}", status.radio_enabled));
        }
        fn wifi_networks(&mut self, radio_enabled: bool, networks: &[WifiNetwork]) {
            self.calls.push(format!("wifi radio={radio_enabled} n={}", networks.len()));
        }
        fn diagnostic(&mut self, text: &str) {
            self.calls.push(format!("diagnostic {text}"));
        }
        fn bluetooth_adapter(&mut self, adapter: &AdapterStatus) {
            self.calls.push(format!("adapter powered={}", adapter.powered));
        }
        fn bluetooth_devices(&mut self, devices: &[BluetoothDevice]) {
            self.calls.push(format!("bt rebuilt n={}", devices.len()));
        }
        fn bluetooth_delta(&mut self, delta: &Delta<BluetoothDevice>) {
            self.calls.push(format!("bt +{:?} -{:?} ~{:?}", delta.added_keys(), delta.removed, delta.updated_keys()));
        }
        fn audio_devices(&mut self, outputs: &[AudioDevice], inputs: &[AudioDevice], _defaults: &AudioDefaults) {
            self.calls.push(format!("devices out={} in={}", outputs.len(), inputs.len()));
        }
        fn audio_levels(&mut self, delta: &Delta<AudioDevice>, _defaults: &AudioDefaults) {
            self.calls.push(format!("levels ~{:?}", delta.updated_keys()));
        }
        fn audio_apps(&mut self, delta: &Delta<AudioApp>, shown: usize) {
            self.calls.push(format!(
                "apps +{:?} -{:?} ~{:?} shown={shown}",
                delta.added_keys(),
                delta.removed,
                delta.updated_keys()
            ));
        }
        fn log_line(&mut self, subsystem: Subsystem, entry: &LogEntry) {
            self.calls.push(format!("log {subsystem} {}", entry.message));
        }
        fn notice(&mut self, text: &str) {
            self.notices.push(text.to_string());
        }
    }

    fn context() -> (Context, mpsc::UnboundedReceiver<LoopEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Context::new(Config::default(), tx), rx)
    }

    fn completed(origin: Origin, outcome: Result<Report, Fault>) -> LoopEvent {
        LoopEvent::Completed(Completion { origin, outcome })
    }

    fn apps_poll(apps: &[(u32, u8)]) -> LoopEvent {
        let apps = apps
            .iter()
            .map(|&(index, volume_percent)| AudioApp { index, name: format!("app{index}"), volume_percent })
            .collect();
        completed(Origin::job(Subsystem::Audio, jobs::AUDIO_APPS), Ok(AudioReport::Apps(apps).into()))
    }

    fn sink(identifier: &str, volume_percent: u8) -> AudioDevice {
        AudioDevice { identifier: identifier.to_string(), volume_percent, muted: false, is_output: true }
    }

    fn full_load(outputs: Vec<AudioDevice>) -> LoopEvent {
        let snapshot = AudioSnapshot { outputs, ..AudioSnapshot::default() };
        completed(Origin::job(Subsystem::Audio, jobs::AUDIO_LOAD), Ok(AudioReport::Full(snapshot).into()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_logs_once_and_polling_continues() {
        let (mut ctx, mut rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Network);
        ctx.scheduler.schedule(jobs::NETWORK_STATUS, Duration::from_secs(5), JobAction::NetworkStatus);

        ctx.dispatcher.run::<Report, _>(Origin::job(Subsystem::Network, jobs::NETWORK_STATUS), async {
            if true {
                panic!("unexpected nmcli output");
            }
            Ok::<_, anyhow::Error>(Report::from(NetworkReport::Status(NetworkStatus::default())))
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, LoopEvent::Completed(_)));
        assert_eq!(handle_event(&mut ctx, &mut presenter, event), Flow::Continue);

        let entries: Vec<_> = ctx.logbook.entries(Subsystem::Network).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_error());
        assert!(entries[0].message.contains("unexpected nmcli output"));

        let LoopEvent::Fired(fired) = rx.recv().await.unwrap() else {
            panic!("expected the next status tick");
        };
        assert_eq!(ctx.claim(fired), Some(JobAction::NetworkStatus));
    }

    #[tokio::test]
    async fn test_result_for_hidden_panel_is_dropped() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);
        ctx.spawn_named(Subsystem::Network, jobs::NETWORK_STATUS, std::future::pending::<anyhow::Result<NetworkReport>>());

        let status = NetworkStatus { radio_enabled: true, ..NetworkStatus::default() };
        let event = completed(
            Origin::job(Subsystem::Network, jobs::NETWORK_STATUS),
            Ok(NetworkReport::Status(status).into()),
        );
        handle_event(&mut ctx, &mut presenter, event);

        assert!(presenter.calls.is_empty());
        assert_eq!(ctx.snapshots.network, NetworkStatus::default());
        assert!(!ctx.is_running(jobs::NETWORK_STATUS));
    }

    #[tokio::test]
    async fn test_action_outcome_logged_for_hidden_panel() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);

        let outcome = ActionOutcome::failed("Pairing failed. Error: timeout");
        let event = completed(Origin::action(Subsystem::Bluetooth), Ok(BluetoothReport::Action(outcome).into()));
        handle_event(&mut ctx, &mut presenter, event);

        let entries: Vec<_> = ctx.logbook.entries(Subsystem::Bluetooth).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_error());
        assert!(presenter.calls.is_empty());
        assert!(!ctx.is_running(jobs::BLUETOOTH_SCAN));
    }

    #[tokio::test]
    async fn test_missing_tool_logs_hint() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Bluetooth);

        let fault = Fault::from(ToolError::NotFound { program: "bluetoothctl".to_string() });
        handle_event(&mut ctx, &mut presenter, completed(Origin::job(Subsystem::Bluetooth, jobs::BLUETOOTH_STATUS), Err(fault)));

        assert_eq!(presenter.calls, ["log bluetooth bluetoothctl command not found. Is bluez-utils installed?"]);
        assert_eq!(ctx.logbook.len(Subsystem::Bluetooth), 1);
    }

    #[tokio::test]
    async fn test_missing_pactl_stops_audio_polling_and_logs_once() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);
        ctx.scheduler.schedule(jobs::AUDIO_LEVELS, Duration::from_secs(1), JobAction::AudioLevels);
        ctx.scheduler.schedule(jobs::AUDIO_APPS, Duration::from_secs(3), JobAction::AudioApps);

        let missing = || Fault::from(ToolError::NotFound { program: "pactl".to_string() });
        for job in [jobs::AUDIO_LOAD, jobs::AUDIO_LEVELS, jobs::AUDIO_APPS] {
            handle_event(&mut ctx, &mut presenter, completed(Origin::job(Subsystem::Audio, job), Err(missing())));
        }

        assert!(ctx.scheduler.is_empty());
        assert_eq!(ctx.logbook.len(Subsystem::Audio), 1);
        assert_eq!(presenter.calls, ["log audio pactl command not found. Is PulseAudio/PipeWire installed?"]);

        // Only a repeat of the newest entry is collapsed
        ctx.logbook.append(Subsystem::Audio, Severity::Info, "Volume set.");
        handle_event(&mut ctx, &mut presenter, completed(Origin::job(Subsystem::Audio, jobs::AUDIO_LOAD), Err(missing())));
        assert_eq!(ctx.logbook.len(Subsystem::Audio), 3);
    }

    #[tokio::test]
    async fn test_missing_speedtest_keeps_status_polling() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Network);
        ctx.scheduler.schedule(jobs::NETWORK_STATUS, Duration::from_secs(5), JobAction::NetworkStatus);

        let fault = Fault::from(ToolError::NotFound { program: "speedtest-cli".to_string() });
        handle_event(&mut ctx, &mut presenter, completed(Origin::job(Subsystem::Network, jobs::SPEEDTEST), Err(fault)));

        // Only the diagnostic pause replaces status polling
        assert!(ctx.network_paused());
        assert_eq!(ctx.logbook.len(Subsystem::Network), 1);
    }

    #[tokio::test]
    async fn test_apps_poll_applies_delta() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);

        handle_event(&mut ctx, &mut presenter, apps_poll(&[(3, 50), (7, 50)]));
        handle_event(&mut ctx, &mut presenter, apps_poll(&[(3, 52), (9, 20)]));

        assert_eq!(presenter.calls.last().unwrap(), "apps +[9] -[7] ~[] shown=2");
        assert_eq!(ctx.snapshots.apps.get(&3).unwrap().volume_percent, 50);
    }

    #[tokio::test]
    async fn test_edit_holds_off_poll_updates() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);
        handle_event(&mut ctx, &mut presenter, apps_poll(&[(3, 50)]));

        let edit = |editing| LoopEvent::Command(UserCommand::Edit { target: MixerTarget::App(3), editing });
        handle_event(&mut ctx, &mut presenter, edit(true));
        handle_event(&mut ctx, &mut presenter, apps_poll(&[(3, 90)]));
        assert_eq!(presenter.calls.len(), 1);
        assert_eq!(ctx.snapshots.apps.get(&3).unwrap().volume_percent, 50);

        handle_event(&mut ctx, &mut presenter, edit(false));
        handle_event(&mut ctx, &mut presenter, apps_poll(&[(3, 90)]));
        assert_eq!(presenter.calls.last().unwrap(), "apps +[] -[] ~[3] shown=1");
    }

    #[tokio::test]
    async fn test_levels_only_update_shown_devices() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);
        handle_event(&mut ctx, &mut presenter, full_load(vec![sink("a", 40)]));

        let levels = |devices| {
            completed(
                Origin::job(Subsystem::Audio, jobs::AUDIO_LEVELS),
                Ok(AudioReport::Levels { devices, defaults: AudioDefaults::default() }.into()),
            )
        };
        handle_event(&mut ctx, &mut presenter, levels(vec![sink("a", 41), sink("b", 10)]));
        assert_eq!(ctx.snapshots.outputs.len(), 1);
        assert_eq!(presenter.calls, ["devices out=1 in=0", "apps +[] -[] ~[] shown=0"]);

        handle_event(&mut ctx, &mut presenter, levels(vec![sink("a", 60)]));
        assert_eq!(presenter.calls.last().unwrap(), r#"levels ~["a"]"#);
    }

    #[tokio::test]
    async fn test_volume_command_sets_comparison_value() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);
        handle_event(&mut ctx, &mut presenter, full_load(vec![sink("a", 40)]));

        let command = UserCommand::SetVolume {
            target: MixerTarget::Device { direction: crate::types::Direction::Output, identifier: "a".to_string() },
            percent: 80,
        };
        handle_event(&mut ctx, &mut presenter, LoopEvent::Command(command));
        assert_eq!(ctx.snapshots.outputs.get(&"a".to_string()).unwrap().volume_percent, 80);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speedtest_results_pause_status_until_resume() {
        let (mut ctx, mut rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Network);
        ctx.scheduler.schedule(jobs::NETWORK_STATUS, Duration::from_secs(5), JobAction::NetworkStatus);

        let event = completed(
            Origin::job(Subsystem::Network, jobs::SPEEDTEST),
            Ok(NetworkReport::Speedtest("Ping: 12 ms".to_string()).into()),
        );
        handle_event(&mut ctx, &mut presenter, event);
        assert!(presenter.calls[0].contains("Ping: 12 ms"));
        assert!(!ctx.scheduler.is_live(jobs::NETWORK_STATUS));
        assert!(ctx.network_paused());

        let event = rx.recv().await.unwrap();
        assert!(matches!(&event, LoopEvent::Fired(fired) if fired.action == JobAction::ResumeNetworkStatus));
        handle_event(&mut ctx, &mut presenter, event);

        assert!(ctx.scheduler.is_live(jobs::NETWORK_STATUS));
        assert!(!ctx.network_paused());
        assert_eq!(ctx.logbook.entries(Subsystem::Network).last().unwrap().message, labels::PAUSE_EXPIRED);
    }

    #[tokio::test]
    async fn test_failed_speedtest_still_pauses() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Network);

        let fault = Fault::from(anyhow::anyhow!("Speedtest failed (unknown error)"));
        handle_event(&mut ctx, &mut presenter, completed(Origin::job(Subsystem::Network, jobs::SPEEDTEST), Err(fault)));

        assert!(ctx.network_paused());
        assert_eq!(ctx.logbook.len(Subsystem::Network), 1);
        assert_eq!(presenter.calls[0], "diagnostic Speedtest failed (unknown error)");
    }

    #[tokio::test]
    async fn test_bluetooth_command_on_audio_panel_is_rejected() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);

        let command = UserCommand::Pair { target: "AA:BB:CC:DD:EE:FF".to_string() };
        handle_event(&mut ctx, &mut presenter, LoopEvent::Command(command));

        assert_eq!(presenter.notices, ["'pair' is not available on the audio panel."]);
        assert!(ctx.logbook.is_empty(Subsystem::Bluetooth));
    }

    #[tokio::test]
    async fn test_disconnect_unknown_connection_gives_notice() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Network);

        let command = UserCommand::Disconnect { target: "Office".to_string() };
        handle_event(&mut ctx, &mut presenter, LoopEvent::Command(command));
        assert_eq!(presenter.notices, ["No active connection named 'Office'."]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_jobs() {
        let (mut ctx, _rx) = context();
        let mut presenter = Recorder::default();
        ctx.activate(Subsystem::Audio);
        ctx.scheduler.schedule(jobs::AUDIO_LEVELS, Duration::from_secs(1), JobAction::AudioLevels);

        assert_eq!(handle_event(&mut ctx, &mut presenter, LoopEvent::Shutdown), Flow::Quit);
        assert!(ctx.scheduler.is_empty());
        assert_eq!(ctx.active(), None);
    }
}
