//! Background task registry
//!
//! Long-running tasks (hold sweeper, reconciliation reporter) register
//! here so shutdown can cancel and await them in one place. Every task
//! body is wrapped with panic containment: a panicking task is logged
//! and dies alone instead of taking the runtime down.

use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for each task before giving up on it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

struct NamedHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Registry of spawned background tasks with a shared shutdown token.
pub struct BackgroundTasks {
    shutdown: CancellationToken,
    handles: Mutex<Vec<NamedHandle>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Token tasks should select on to learn about shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a named task with panic containment.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let wrapped = async move {
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                error!(task = name, panic = %panic_message(&panic), "background task panicked");
            }
        };
        let handle = tokio::spawn(wrapped);
        self.handles.lock().push(NamedHandle { name, handle });
        info!(task = name, "background task started");
    }

    /// Tasks that have not finished yet.
    pub fn running_count(&self) -> usize {
        self.handles.lock().iter().filter(|t| !t.handle.is_finished()).count()
    }

    pub fn log_summary(&self) {
        let handles = self.handles.lock();
        let names: Vec<&str> = handles.iter().map(|t| t.name).collect();
        info!(count = handles.len(), tasks = ?names, "background tasks running");
    }

    /// Cancel every task and await each one up to the grace period.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let drained: Vec<NamedHandle> = self.handles.lock().drain(..).collect();
        for task in drained {
            match tokio::time::timeout(SHUTDOWN_GRACE, task.handle).await {
                Ok(_) => debug!(task = task.name, "background task stopped"),
                Err(_) => warn!(task = task.name, "background task ignored shutdown, detaching"),
            }
        }
        info!("background tasks shut down");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicking_task_is_contained() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("boom", async {
            panic!("intentional");
        });
        // The panic must not propagate out of shutdown.
        tasks.shutdown().await;
        assert_eq!(tasks.running_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_loops() {
        let tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();
        tasks.spawn("looper", async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                    _ = token.cancelled() => return,
                }
            }
        });
        assert_eq!(tasks.running_count(), 1);
        tasks.shutdown().await;
        assert_eq!(tasks.running_count(), 0);
    }
}
