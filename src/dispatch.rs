//! Off-loop execution of blocking work
//!
//! A dispatched task runs on its own tokio task; its result, or whatever
//! fault it hit (error or panic), comes back to the consuming loop as one
//! [`Completion`] message. Workers never touch loop-owned state.

use std::any::Any;
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::error::Fault;
use crate::types::Subsystem;

/// Which subsystem, and optionally which scheduled job, started a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub subsystem: Subsystem,
    pub job: Option<String>,
}

impl Origin {
    /// Work started by the user rather than a timer
    pub fn action(subsystem: Subsystem) -> Self {
        Self { subsystem, job: None }
    }

    pub fn job(subsystem: Subsystem, key: impl Into<String>) -> Self {
        Self { subsystem, job: Some(key.into()) }
    }
}

/// Result of one dispatched task, ready for the consuming loop
#[derive(Debug)]
pub struct Completion<T> {
    pub origin: Origin,
    pub outcome: Result<T, Fault>,
}

/// Spawns workers and routes their completions to one queue
pub struct Dispatcher<E> {
    tx: UnboundedSender<E>,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E: Send + 'static> Dispatcher<E> {
    pub fn new(tx: UnboundedSender<E>) -> Self {
        Self { tx }
    }

    /// Run `task` on an independent tokio task.
    ///
    /// Exactly one completion is enqueued per call, whether the task
    /// succeeds, returns an error, or panics.
    pub fn run<T, F>(&self, origin: Origin, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
        E: From<Completion<T>>,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The inner task is the panic boundary
            let outcome = match tokio::spawn(task).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(Fault::from(err)),
                Err(join) => Err(join_fault(join)),
            };
            if let Err(fault) = &outcome {
                warn!(subsystem = %origin.subsystem, job = ?origin.job, error = %fault, "Worker failed");
            }
            if tx.send(E::from(Completion { origin, outcome })).is_err() {
                debug!("Consuming loop closed, dropping completion");
            }
        })
    }
}

fn join_fault(err: JoinError) -> Fault {
    if err.is_panic() {
        Fault::Panicked { message: panic_message(err.into_panic()) }
    } else {
        Fault::Failed(anyhow::anyhow!("worker was cancelled"))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}
