// TASKS: named background tasks (scan loop, position loop, event log writer)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub struct TaskInfo {
    pub name: String,
    pub handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

#[derive(Default)]
pub struct TaskManager {
    tasks: Vec<TaskInfo>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F) -> Arc<Mutex<Option<JoinHandle<()>>>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.add_task(name, handle)
    }

    pub fn add_task(&mut self, name: impl Into<String>, handle: JoinHandle<()>) -> Arc<Mutex<Option<JoinHandle<()>>>> {
        let handle_arc = Arc::new(Mutex::new(Some(handle)));
        self.tasks.push(TaskInfo {
            name: name.into(),
            handle: handle_arc.clone(),
        });
        handle_arc
    }

    /// Names of tasks whose future has already returned.
    pub async fn finished_tasks(&self) -> Vec<String> {
        let mut finished = Vec::new();
        for task in &self.tasks {
            let guard = task.handle.lock().await;
            match guard.as_ref() {
                Some(h) if !h.is_finished() => {}
                _ => finished.push(task.name.clone()),
            }
        }
        finished
    }

    /// Logs tasks that stopped on their own until `shutdown` is set.
    pub fn spawn_health_check(&mut self, shutdown: Arc<AtomicBool>, interval: Duration) {
        let watched: Vec<TaskInfo> = self.tasks.clone();
        self.spawn("health_check", async move {
            let mut reported: Vec<String> = Vec::new();
            let mut ticker = tokio::time::interval(interval);
            while !shutdown.load(Ordering::Relaxed) {
                ticker.tick().await;
                for task in &watched {
                    let guard = task.handle.lock().await;
                    let done = guard.as_ref().map(|h| h.is_finished()).unwrap_or(true);
                    if done && !reported.contains(&task.name) {
                        warn!(task = %task.name, "TASKS: task stopped");
                        reported.push(task.name.clone());
                    }
                }
            }
        });
    }

    /// Wait up to `grace` for every task, then abort what is left.
    pub async fn shutdown(self, grace: Duration) {
        for task in self.tasks {
            let handle = task.handle.lock().await.take();
            if let Some(mut handle) = handle {
                match tokio::time::timeout(grace, &mut handle).await {
                    Ok(_) => info!(task = %task.name, "TASKS: task finished"),
                    Err(_) => {
                        warn!(task = %task.name, "TASKS: task did not stop in time, aborting");
                        handle.abort();
                    }
                }
            }
        }
    }
}
