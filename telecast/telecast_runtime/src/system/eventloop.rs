//! Cooperative event loop for the Telecast backend.
//!
//! A single dedicated worker thread drains two queues, urgent before idle.
//! Startup phases and other backend work are scheduled here as labeled
//! tasks; a panicking task is contained and logged without taking the
//! loop down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, trace};

/// Errors from scheduling work on the event loop.
#[derive(Debug, Error)]
pub enum EventLoopError {
    /// The loop has been shut down
    #[error("event loop is shutting down")]
    ShuttingDown,
}

type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A scheduled unit of work with a diagnostic label.
struct Task {
    func: TaskFn,
    label: String,
    enqueued_at: Instant,
}

impl Task {
    fn new<F>(f: F, label: &str) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            func: Box::new(f),
            label: label.to_string(),
            enqueued_at: Instant::now(),
        }
    }
}

type ThreadStartedHook = Box<dyn FnOnce(ThreadId) + Send + 'static>;

/// Single-threaded cooperative event loop with urgent and idle queues.
pub struct EventLoop {
    urgent_tx: Sender<Task>,
    idle_tx: Sender<Task>,

    /// Receivers held until the worker thread takes them at startup.
    receivers: Mutex<Option<(Receiver<Task>, Receiver<Task>)>>,

    /// Hooks fired on the worker thread before it processes any task.
    thread_started_hooks: Mutex<Vec<ThreadStartedHook>>,

    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_flag: Arc<AtomicBool>,
}

impl EventLoop {
    /// Create an event loop. No thread runs until [`EventLoop::startup`].
    pub fn new() -> Self {
        let (urgent_tx, urgent_rx) = unbounded();
        let (idle_tx, idle_rx) = unbounded();

        Self {
            urgent_tx,
            idle_tx,
            receivers: Mutex::new(Some((urgent_rx, idle_rx))),
            thread_started_hooks: Mutex::new(Vec::new()),
            worker: Mutex::new(None),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a hook fired with the worker's `ThreadId` when the loop
    /// thread starts. Must be called before [`EventLoop::startup`].
    pub fn on_thread_started<F>(&self, hook: F)
    where
        F: FnOnce(ThreadId) + Send + 'static,
    {
        self.thread_started_hooks.lock().push(Box::new(hook));
    }

    /// Spawn the worker thread and begin draining the queues. Calling this
    /// a second time is a no-op.
    pub fn startup(&self) {
        let Some((urgent_rx, idle_rx)) = self.receivers.lock().take() else {
            debug!("Event loop already started");
            return;
        };

        let hooks: Vec<ThreadStartedHook> =
            std::mem::take(&mut *self.thread_started_hooks.lock());
        let shutdown_flag = Arc::clone(&self.shutdown_flag);

        let handle = thread::Builder::new()
            .name("telecast-eventloop".to_string())
            .spawn(move || {
                let thread_id = thread::current().id();
                for hook in hooks {
                    hook(thread_id);
                }
                Self::worker_loop(urgent_rx, idle_rx, shutdown_flag);
            })
            .expect("Failed to spawn event loop thread");

        *self.worker.lock() = Some(handle);
    }

    fn worker_loop(
        urgent_rx: Receiver<Task>,
        idle_rx: Receiver<Task>,
        shutdown_flag: Arc<AtomicBool>,
    ) {
        debug!("Event loop thread started");

        while !shutdown_flag.load(Ordering::Relaxed) {
            // Urgent work always wins over idle work.
            if let Ok(task) = urgent_rx.try_recv() {
                Self::run_task(task);
                continue;
            }
            if let Ok(task) = idle_rx.try_recv() {
                Self::run_task(task);
                continue;
            }

            // Nothing queued; block briefly and re-check the flag.
            crossbeam_channel::select! {
                recv(urgent_rx) -> task => {
                    if let Ok(task) = task {
                        Self::run_task(task);
                    }
                }
                recv(idle_rx) -> task => {
                    if let Ok(task) = task {
                        Self::run_task(task);
                    }
                }
                default(Duration::from_millis(100)) => {}
            }
        }

        debug!("Event loop thread shutting down");
    }

    fn run_task(task: Task) {
        trace!(
            "Running task '{}' (queued {:.1}ms)",
            task.label,
            task.enqueued_at.elapsed().as_secs_f64() * 1000.0
        );

        let label = task.label;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task.func));
        if let Err(e) = result {
            error!(
                "Task '{}' panicked: {:?}",
                label,
                e.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
            );
        }
    }

    /// Schedule work at idle priority.
    pub fn add_idle<F>(&self, f: F, label: &str) -> Result<(), EventLoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown_flag.load(Ordering::Relaxed) {
            return Err(EventLoopError::ShuttingDown);
        }
        self.idle_tx
            .send(Task::new(f, label))
            .map_err(|_| EventLoopError::ShuttingDown)
    }

    /// Schedule work ahead of all idle tasks.
    pub fn add_urgent<F>(&self, f: F, label: &str) -> Result<(), EventLoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown_flag.load(Ordering::Relaxed) {
            return Err(EventLoopError::ShuttingDown);
        }
        self.urgent_tx
            .send(Task::new(f, label))
            .map_err(|_| EventLoopError::ShuttingDown)
    }

    /// Stop the worker thread and wait for it to exit. Queued tasks that
    /// have not started are dropped.
    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("Event loop thread panicked during shutdown");
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}
