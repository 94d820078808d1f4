//! Named timers with replace-and-cancel semantics
//!
//! Timers never run work themselves. Each firing posts a [`Fired`] message
//! onto the consuming loop's queue, and the loop asks [`Scheduler::claim`]
//! whether that firing still belongs to a live job before acting on it.
//!
//! Job lifecycle:
//! - periodic: Scheduled → Firing → Scheduled …
//! - one-shot: Scheduled → Firing → Removed (on claim)
//!
//! A one-shot job whose timer has already fired stays registered, and
//! counts as live, until the loop claims that firing.
//! - Cancelled from any state; terminal

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Periodic,
    OneShot,
}

/// A timer firing, as delivered to the consuming loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<A> {
    pub key: String,
    pub generation: u64,
    pub action: A,
}

struct Job {
    kind: JobKind,
    generation: u64,
    live: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Job {
    fn stop(self) {
        self.live.store(false, Ordering::Release);
        self.handle.abort();
    }
}

/// Registry of live timers keyed by name; at most one timer per key
pub struct Scheduler<A, E> {
    jobs: HashMap<String, Job>,
    tx: UnboundedSender<E>,
    next_generation: u64,
    _action: PhantomData<fn(A)>,
}

impl<A, E> Scheduler<A, E>
where
    A: Clone + Send + 'static,
    E: From<Fired<A>> + Send + 'static,
{
    pub fn new(tx: UnboundedSender<E>) -> Self {
        Self { jobs: HashMap::new(), tx, next_generation: 0, _action: PhantomData }
    }

    /// Fire `action` every `interval`, first after one interval.
    /// A live timer under `key` is cancelled first.
    pub fn schedule(&mut self, key: impl Into<String>, interval: Duration, action: A) {
        self.insert(key.into(), JobKind::Periodic, interval, action);
    }

    /// Fire `action` once after `delay`. A live timer under `key` is cancelled first.
    pub fn schedule_once(&mut self, key: impl Into<String>, delay: Duration, action: A) {
        self.insert(key.into(), JobKind::OneShot, delay, action);
    }

    fn insert(&mut self, key: String, kind: JobKind, interval: Duration, action: A) {
        // Zero would spin; tokio's interval also rejects it
        let interval = interval.max(Duration::from_millis(1));

        if let Some(previous) = self.jobs.remove(&key) {
            debug!(key = %key, "Replacing live timer");
            previous.stop();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let live = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(run_timer(
            Fired { key: key.clone(), generation, action },
            kind,
            interval,
            live.clone(),
            self.tx.clone(),
        ));

        debug!(key = %key, ?kind, interval_ms = interval.as_millis() as u64, generation, "Scheduled job");
        self.jobs.insert(key, Job { kind, generation, live, handle });
    }

    /// Remove the timer under `key`; false if there was none
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.jobs.remove(key) {
            Some(job) => {
                debug!(key = %key, "Cancelled job");
                job.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every live timer, returning how many there were
    pub fn cancel_all(&mut self) -> usize {
        let count = self.jobs.len();
        for (key, job) in self.jobs.drain() {
            debug!(key = %key, "Stopping job");
            job.stop();
        }
        count
    }

    /// Accept a firing for execution.
    ///
    /// Returns the action only if the firing came from the timer currently
    /// registered under its key. A finished one-shot job leaves the registry.
    pub fn claim(&mut self, fired: Fired<A>) -> Option<A> {
        let job = self.jobs.get(&fired.key)?;
        if job.generation != fired.generation || !job.live.load(Ordering::Acquire) {
            trace!(key = %fired.key, generation = fired.generation, "Dropping stale firing");
            return None;
        }
        if job.kind == JobKind::OneShot {
            self.jobs.remove(&fired.key);
        }
        Some(fired.action)
    }

    /// True while `key` is registered, including a fired one-shot not yet claimed
    pub fn is_live(&self, key: &str) -> bool {
        self.jobs.contains_key(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }
}

impl<A, E> Drop for Scheduler<A, E> {
    fn drop(&mut self) {
        for (_, job) in self.jobs.drain() {
            job.stop();
        }
    }
}

async fn run_timer<A, E>(
    fired: Fired<A>,
    kind: JobKind,
    interval: Duration,
    live: Arc<AtomicBool>,
    tx: UnboundedSender<E>,
) where
    A: Clone,
    E: From<Fired<A>>,
{
    match kind {
        JobKind::Periodic => {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Cancellation may land between the tick and the send
                if !live.load(Ordering::Acquire) || tx.send(E::from(fired.clone())).is_err() {
                    break;
                }
            }
        }
        JobKind::OneShot => {
            tokio::time::sleep(interval).await;
            if live.load(Ordering::Acquire) {
                let _ = tx.send(E::from(fired));
            }
        }
    }
}
