//! Task management for the p2pd daemon.
//!
//! [`TaskManager`] owns the failure channel for critical tasks and hands out
//! cloneable [`TaskExecutor`]s. Regular tasks are fire-and-forget; critical
//! tasks report an error or panic back to the manager so the daemon can shut
//! down instead of running in a degraded state.

mod metrics;

use std::{
    any::Any,
    fmt::Display,
    future::Future,
    panic::AssertUnwindSafe,
};

use futures_util::FutureExt;
use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{Instrument, debug, error};

use crate::metrics::{IncCounterOnDrop, TaskExecutorMetrics};

/// Errors from task management.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No tokio runtime is running on the current thread.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// A critical task terminated with an error or a panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("critical task `{task}` failed: {reason}")]
pub struct CriticalTaskError {
    task: &'static str,
    reason: String,
}

impl CriticalTaskError {
    /// Name of the failed task.
    pub fn task(&self) -> &'static str {
        self.task
    }

    /// Error or panic message of the failed task.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Owns the critical failure channel and spawns on a tokio runtime.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,
    failed_tx: UnboundedSender<CriticalTaskError>,
    failed_rx: UnboundedReceiver<CriticalTaskError>,
}

impl TaskManager {
    /// Create a task manager spawning onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        let (failed_tx, failed_rx) = unbounded_channel();
        Self {
            handle,
            failed_tx,
            failed_rx,
        }
    }

    /// Create a task manager for the runtime of the current thread.
    pub fn current() -> Result<Self, TaskError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Returns a new executor spawning onto this manager's runtime.
    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            failed_tx: self.failed_tx.clone(),
            metrics: TaskExecutorMetrics::default(),
        }
    }

    /// Wait until a critical task fails.
    ///
    /// Never resolves while every critical task is healthy, since the manager
    /// itself keeps the channel open.
    pub async fn critical_failure(&mut self) -> CriticalTaskError {
        loop {
            if let Some(err) = self.failed_rx.recv().await {
                return err;
            }
        }
    }
}

/// Cloneable handle for spawning named tasks.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    failed_tx: UnboundedSender<CriticalTaskError>,
    metrics: TaskExecutorMetrics,
}

impl TaskExecutor {
    /// Spawn a regular task. Its outcome is not reported anywhere.
    pub fn spawn<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_regular_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_regular_tasks_total.clone());

        let task = async move {
            let _finished = finished;
            fut.await;
            debug!("task finished");
        };

        self.handle
            .spawn(task.instrument(tracing::debug_span!("task", name)))
    }

    /// Spawn a critical task.
    ///
    /// If the task returns an error or panics, the failure is logged and
    /// delivered to [`TaskManager::critical_failure`].
    pub fn spawn_critical<F, E>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.metrics.inc_critical_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_critical_tasks_total.clone());
        let failed_tx = self.failed_tx.clone();

        let task = AssertUnwindSafe(fut).catch_unwind().map(move |result| {
            let _finished = finished;
            let reason = match result {
                Ok(Ok(())) => {
                    debug!("critical task finished");
                    return;
                }
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            error!(task = name, %reason, "critical task failed");
            let _ = failed_tx.send(CriticalTaskError { task: name, reason });
        });

        self.handle
            .spawn(task.instrument(tracing::debug_span!("critical_task", name)))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
