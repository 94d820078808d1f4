//! State owned by the consuming loop
//!
//! Only the loop touches [`Context`]. Workers receive copies of what they
//! need and answer through the queue, so nothing here is shared or locked.

use std::collections::HashSet;
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::config::Config;
use crate::console::UserCommand;
use crate::constants::jobs;
use crate::dispatch::{Completion, Dispatcher, Origin};
use crate::logbook::Logbook;
use crate::reconcile::Reconciler;
use crate::scheduler::{Fired, Scheduler};
use crate::tools::{self, Report};
use crate::types::{
    AdapterStatus, AudioApp, AudioDefaults, AudioDevice, BluetoothDevice, Direction, NetworkStatus, Subsystem,
    WifiNetwork,
};

/// What a timer firing asks the loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    NetworkStatus,
    /// End of the pause that keeps speedtest results on screen
    ResumeNetworkStatus,
    BluetoothStatus,
    AudioLevels,
    AudioApps,
}

impl JobAction {
    pub fn key(&self) -> &'static str {
        match self {
            JobAction::NetworkStatus => jobs::NETWORK_STATUS,
            JobAction::ResumeNetworkStatus => jobs::NETWORK_STATUS_RESUME,
            JobAction::BluetoothStatus => jobs::BLUETOOTH_STATUS,
            JobAction::AudioLevels => jobs::AUDIO_LEVELS,
            JobAction::AudioApps => jobs::AUDIO_APPS,
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        match self {
            JobAction::NetworkStatus | JobAction::ResumeNetworkStatus => Subsystem::Network,
            JobAction::BluetoothStatus => Subsystem::Bluetooth,
            JobAction::AudioLevels | JobAction::AudioApps => Subsystem::Audio,
        }
    }
}

/// Everything the consuming loop reacts to, in arrival order
#[derive(Debug)]
pub enum LoopEvent {
    Fired(Fired<JobAction>),
    Completed(Completion<Report>),
    Command(UserCommand),
    Shutdown,
}

impl From<Fired<JobAction>> for LoopEvent {
    fn from(fired: Fired<JobAction>) -> Self {
        LoopEvent::Fired(fired)
    }
}

impl From<Completion<Report>> for LoopEvent {
    fn from(completion: Completion<Report>) -> Self {
        LoopEvent::Completed(completion)
    }
}

impl From<UserCommand> for LoopEvent {
    fn from(command: UserCommand) -> Self {
        LoopEvent::Command(command)
    }
}

/// The values each panel currently shows
pub struct Snapshots {
    pub network: NetworkStatus,
    pub wifi: Vec<WifiNetwork>,
    pub adapter: AdapterStatus,
    pub bluetooth: Reconciler<BluetoothDevice>,
    pub outputs: Reconciler<AudioDevice>,
    pub inputs: Reconciler<AudioDevice>,
    pub apps: Reconciler<AudioApp>,
    pub defaults: AudioDefaults,
}

impl Snapshots {
    fn new(threshold: u8) -> Self {
        Self {
            network: NetworkStatus::default(),
            wifi: Vec::new(),
            adapter: AdapterStatus::default(),
            bluetooth: Reconciler::new(threshold),
            outputs: Reconciler::new(threshold),
            inputs: Reconciler::new(threshold),
            apps: Reconciler::new(threshold),
            defaults: AudioDefaults::default(),
        }
    }

    fn clear(&mut self, subsystem: Subsystem) {
        match subsystem {
            Subsystem::Network => {
                self.network = NetworkStatus::default();
                self.wifi.clear();
            }
            Subsystem::Bluetooth => {
                self.adapter = AdapterStatus::default();
                self.bluetooth.clear();
            }
            Subsystem::Audio => {
                self.outputs.clear();
                self.inputs.clear();
                self.apps.clear();
                self.defaults = AudioDefaults::default();
            }
        }
    }

    pub fn devices(&mut self, direction: Direction) -> &mut Reconciler<AudioDevice> {
        match direction {
            Direction::Output => &mut self.outputs,
            Direction::Input => &mut self.inputs,
        }
    }
}

pub struct Context {
    pub config: Config,
    pub logbook: Logbook,
    pub snapshots: Snapshots,
    pub(crate) scheduler: Scheduler<JobAction, LoopEvent>,
    pub(crate) dispatcher: Dispatcher<LoopEvent>,
    active: Option<Subsystem>,
    /// Named tasks still running; at most one of each
    in_flight: HashSet<String>,
    /// First adapter address seen; reused across polls
    adapter_address: Option<String>,
}

impl Context {
    pub fn new(config: Config, tx: UnboundedSender<LoopEvent>) -> Self {
        Self {
            logbook: Logbook::new(config.log_capacity),
            snapshots: Snapshots::new(config.drift_threshold_percent),
            scheduler: Scheduler::new(tx.clone()),
            dispatcher: Dispatcher::new(tx),
            active: None,
            in_flight: HashSet::new(),
            adapter_address: None,
            config,
        }
    }

    pub fn active(&self) -> Option<Subsystem> {
        self.active
    }

    pub fn is_active(&self, subsystem: Subsystem) -> bool {
        self.active == Some(subsystem)
    }

    /// True the first time an adapter address is seen
    pub fn remember_adapter(&mut self, address: &str) -> bool {
        if self.adapter_address.is_some() {
            return false;
        }
        debug!(address = %address, "Found Bluetooth adapter");
        self.adapter_address = Some(address.to_string());
        true
    }

    /// Stop every job and make `panel` current, with its snapshots emptied
    pub fn activate(&mut self, panel: Subsystem) {
        let stopped = self.scheduler.cancel_all();
        self.snapshots.clear(panel);
        self.active = Some(panel);
        info!(panel = %panel, stopped_jobs = stopped, "Panel shown");
    }

    /// Switch panels: activate, schedule the panel's jobs and poll right away
    pub fn show_panel(&mut self, panel: Subsystem) {
        self.activate(panel);
        let intervals = self.config.intervals;
        match panel {
            Subsystem::Network => {
                self.start_network_status();
                self.scan_wifi();
            }
            Subsystem::Bluetooth => {
                self.scheduler.schedule(
                    jobs::BLUETOOTH_STATUS,
                    intervals.bluetooth_status(),
                    JobAction::BluetoothStatus,
                );
                self.run_job(JobAction::BluetoothStatus);
            }
            Subsystem::Audio => {
                self.scheduler.schedule(jobs::AUDIO_LEVELS, intervals.audio_levels(), JobAction::AudioLevels);
                self.scheduler.schedule(jobs::AUDIO_APPS, intervals.audio_apps(), JobAction::AudioApps);
                self.load_audio();
            }
        }
    }

    pub fn claim(&mut self, fired: Fired<JobAction>) -> Option<JobAction> {
        self.scheduler.claim(fired)
    }

    pub fn start_network_status(&mut self) {
        self.scheduler.schedule(
            jobs::NETWORK_STATUS,
            self.config.intervals.network_status(),
            JobAction::NetworkStatus,
        );
        self.run_job(JobAction::NetworkStatus);
    }

    /// Hold status polling so diagnostic output stays visible, then resume
    pub fn pause_network_status(&mut self) {
        self.scheduler.cancel(jobs::NETWORK_STATUS);
        self.scheduler.schedule_once(
            jobs::NETWORK_STATUS_RESUME,
            self.config.diagnostic_pause(),
            JobAction::ResumeNetworkStatus,
        );
    }

    pub fn network_paused(&self) -> bool {
        self.scheduler.is_live(jobs::NETWORK_STATUS_RESUME)
    }

    /// Stop `panel`'s timers after its tool turned out to be missing; they
    /// start again the next time the panel is shown
    pub fn stop_polling(&mut self, panel: Subsystem) -> usize {
        if !self.is_active(panel) {
            return 0;
        }
        let stopped = self.scheduler.cancel_all();
        if stopped > 0 {
            info!(panel = %panel, stopped_jobs = stopped, "Polling stopped");
        }
        stopped
    }

    #[cfg(test)]
    pub fn is_running(&self, name: &str) -> bool {
        self.in_flight.contains(name)
    }

    /// Start the worker for a periodic job, unless the last one is still running
    pub fn run_job(&mut self, action: JobAction) {
        let timeouts = self.config.timeouts;
        match action {
            JobAction::NetworkStatus => {
                self.spawn_named(Subsystem::Network, action.key(), async move {
                    tools::network::status(timeouts).await.map(tools::NetworkReport::Status)
                });
            }
            JobAction::BluetoothStatus => {
                self.spawn_named(Subsystem::Bluetooth, action.key(), tools::bluetooth::status(timeouts));
            }
            JobAction::AudioLevels => {
                let shown: Vec<(String, Direction)> = self
                    .snapshots
                    .outputs
                    .shown()
                    .keys()
                    .map(|id| (id.clone(), Direction::Output))
                    .chain(self.snapshots.inputs.shown().keys().map(|id| (id.clone(), Direction::Input)))
                    .collect();
                self.spawn_named(Subsystem::Audio, action.key(), tools::audio::levels(timeouts, shown));
            }
            JobAction::AudioApps => {
                self.spawn_named(Subsystem::Audio, action.key(), async move {
                    tools::audio::apps(timeouts).await.map(tools::AudioReport::Apps)
                });
            }
            // Handled by the loop itself; there is no worker
            JobAction::ResumeNetworkStatus => {}
        }
    }

    pub fn scan_wifi(&mut self) -> bool {
        let timeouts = self.config.timeouts;
        self.spawn_named(Subsystem::Network, jobs::WIFI_SCAN, tools::network::scan(timeouts))
    }

    pub fn scan_bluetooth(&mut self) -> bool {
        let timeouts = self.config.timeouts;
        let scan_for = self.config.bluetooth_scan();
        let adapter = self.adapter_address.clone();
        self.spawn_named(Subsystem::Bluetooth, jobs::BLUETOOTH_SCAN, async move {
            tools::bluetooth::scan(timeouts, scan_for, adapter).await.map(tools::BluetoothReport::Scan)
        })
    }

    pub fn load_audio(&mut self) -> bool {
        let timeouts = self.config.timeouts;
        self.spawn_named(Subsystem::Audio, jobs::AUDIO_LOAD, async move {
            tools::audio::load(timeouts).await.map(tools::AudioReport::Full)
        })
    }

    /// Cancels status polling for the duration; the completion pauses it further
    pub fn run_speedtest(&mut self) -> bool {
        let timeouts = self.config.timeouts;
        let started = self.spawn_named(Subsystem::Network, jobs::SPEEDTEST, async move {
            tools::network::speedtest(timeouts).await.map(tools::NetworkReport::Speedtest)
        });
        if started {
            self.scheduler.cancel(jobs::NETWORK_STATUS);
        }
        started
    }

    /// Single-flight: false, and nothing spawned, while `name` is running
    pub fn spawn_named<F, R>(&mut self, subsystem: Subsystem, name: &str, task: F) -> bool
    where
        F: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Report> + Send + 'static,
    {
        if !self.in_flight.insert(name.to_string()) {
            debug!(task = name, "Previous run still in flight, skipping");
            return false;
        }
        self.dispatcher
            .run::<Report, _>(Origin::job(subsystem, name), async move { task.await.map(Into::into) });
        true
    }

    /// Run a user action; actions are never deduplicated
    pub fn spawn_action<F, R>(&mut self, subsystem: Subsystem, task: F)
    where
        F: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Report> + Send + 'static,
    {
        self.dispatcher
            .run::<Report, _>(Origin::action(subsystem), async move { task.await.map(Into::into) });
    }

    /// A worker finished; its name may run again
    pub fn finish(&mut self, origin: &Origin) {
        if let Some(name) = &origin.job {
            self.in_flight.remove(name);
        }
    }

    pub fn shutdown(&mut self) {
        let stopped = self.scheduler.cancel_all();
        self.active = None;
        info!(stopped_jobs = stopped, "Stopped all jobs");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn context() -> (Context, mpsc::UnboundedReceiver<LoopEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Context::new(Config::default(), tx), rx)
    }

    #[tokio::test]
    async fn test_activate_stops_previous_panel_jobs() {
        let (mut ctx, _rx) = context();
        ctx.scheduler.schedule(jobs::AUDIO_LEVELS, std::time::Duration::from_secs(1), JobAction::AudioLevels);
        ctx.scheduler.schedule(jobs::AUDIO_APPS, std::time::Duration::from_secs(3), JobAction::AudioApps);

        ctx.activate(Subsystem::Bluetooth);

        assert!(ctx.scheduler.is_empty());
        assert!(ctx.is_active(Subsystem::Bluetooth));
    }

    #[tokio::test]
    async fn test_show_audio_panel_schedules_its_jobs_only() {
        let (mut ctx, _rx) = context();
        ctx.scheduler.schedule(jobs::NETWORK_STATUS, std::time::Duration::from_secs(5), JobAction::NetworkStatus);

        ctx.show_panel(Subsystem::Audio);

        let mut keys: Vec<&str> = ctx.scheduler.keys().collect();
        keys.sort();
        assert_eq!(keys, [jobs::AUDIO_APPS, jobs::AUDIO_LEVELS]);
        assert!(ctx.is_running(jobs::AUDIO_LOAD));
    }

    #[tokio::test]
    async fn test_named_task_is_single_flight() {
        let (mut ctx, _rx) = context();
        let pending = || std::future::pending::<anyhow::Result<tools::NetworkReport>>();

        assert!(ctx.spawn_named(Subsystem::Network, jobs::WIFI_SCAN, pending()));
        assert!(!ctx.spawn_named(Subsystem::Network, jobs::WIFI_SCAN, pending()));

        ctx.finish(&Origin::job(Subsystem::Network, jobs::WIFI_SCAN));
        assert!(ctx.spawn_named(Subsystem::Network, jobs::WIFI_SCAN, pending()));
    }

    #[tokio::test]
    async fn test_pause_replaces_status_with_resume() {
        let (mut ctx, _rx) = context();
        ctx.scheduler.schedule(jobs::NETWORK_STATUS, std::time::Duration::from_secs(5), JobAction::NetworkStatus);

        ctx.pause_network_status();

        assert!(!ctx.scheduler.is_live(jobs::NETWORK_STATUS));
        assert!(ctx.network_paused());
        assert_eq!(ctx.scheduler.len(), 1);
    }

    #[test]
    fn test_adapter_address_is_kept_from_first_sighting() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut ctx = Context::new(Config::default(), tx);
        assert!(ctx.remember_adapter("00:1A:7D:DA:71:13"));
        assert!(!ctx.remember_adapter("11:22:33:44:55:66"));
        assert_eq!(ctx.adapter_address.as_deref(), Some("00:1A:7D:DA:71:13"));
    }

    #[tokio::test]
    async fn test_stop_polling_only_touches_shown_panel() {
        let (mut ctx, _rx) = context();
        ctx.activate(Subsystem::Audio);
        ctx.scheduler.schedule(jobs::AUDIO_LEVELS, std::time::Duration::from_secs(1), JobAction::AudioLevels);
        ctx.scheduler.schedule(jobs::AUDIO_APPS, std::time::Duration::from_secs(3), JobAction::AudioApps);

        assert_eq!(ctx.stop_polling(Subsystem::Network), 0);
        assert_eq!(ctx.scheduler.len(), 2);

        assert_eq!(ctx.stop_polling(Subsystem::Audio), 2);
        assert!(ctx.scheduler.is_empty());
        assert!(ctx.is_active(Subsystem::Audio));
    }
}
