use std::collections::HashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Supervises the router's background tasks: provider adapters, the health
/// sweeper and the throttle flush loop. Every task gets a shutdown receiver
/// so sweeps in flight finish cleanly instead of being left dangling; tasks
/// that ignore the signal are aborted after it fires.
pub struct TaskSupervisor {
    tasks: HashMap<String, JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        TaskSupervisor {
            tasks: HashMap::new(),
            shutdown_tx,
        }
    }

    /// Receiver for the shutdown signal, handed to each spawned task.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a background task and register it for monitoring.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F) -> &mut Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(future);
        info!(task = %name, "spawned background task");
        self.tasks.insert(name, handle);
        self
    }

    /// Returns an error if any registered task has terminated on its own.
    /// A provider adapter that exhausted its reconnect attempts shows up
    /// here.
    pub fn check_health(&mut self) -> Result<()> {
        let finished: Vec<String> = self
            .tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        if finished.is_empty() {
            return Ok(());
        }

        for name in &finished {
            self.tasks.remove(name);
        }
        error!(tasks = ?finished, "background tasks terminated unexpectedly");
        Err(Error::TaskFailed(format!("{:?}", finished)))
    }

    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal shutdown and wait for tasks to drain; abort stragglers.
    pub async fn shutdown_all(&mut self, grace: std::time::Duration) {
        info!(tasks = self.tasks.len(), "shutting down background tasks");
        let _ = self.shutdown_tx.send(true);

        let deadline = tokio::time::Instant::now() + grace;
        for (name, mut handle) in self.tasks.drain() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(_) => info!(task = %name, "task stopped"),
                Err(_) => {
                    error!(task = %name, "task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
