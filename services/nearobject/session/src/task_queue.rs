//! Serial task queue backed by one worker thread.
//!
//! Tasks run to completion, one at a time, in queue order. Each post returns
//! a [`oneshot::Receiver`] that yields the task's result. Stopping the queue
//! abandons whatever has not started yet; receivers of abandoned tasks never
//! yield a value and report closure once the queue is dropped.

use crate::error::TaskQueueError;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    stopping: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A named single-threaded executor for ordered background work
pub struct TaskQueue {
    name: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl TaskQueue {
    /// Create a queue and spawn its worker thread
    pub fn new(name: impl Into<String>) -> Result<Self, TaskQueueError> {
        let name = name.into();
        let shared = Arc::new(Shared::default());

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(worker_shared))
            .map_err(|source| {
                error!("Failed to spawn task queue worker {}: {}", name, source);
                TaskQueueError::Spawn {
                    name: name.clone(),
                    source,
                }
            })?;

        debug!("Task queue {} started", name);
        Ok(Self {
            worker_id: worker.thread().id(),
            name,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue name, also the worker thread's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue `task` behind everything already queued
    pub fn post_back<F, T>(&self, task: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.post(task, false)
    }

    /// Enqueue `task` ahead of everything already queued
    pub fn post_front<F, T>(&self, task: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.post(task, true)
    }

    fn post<F, T>(&self, task: F, front: bool) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Task = Box::new(move || {
            // receiver may have been dropped; the result is then discarded
            let _ = tx.send(task());
        });

        let mut state = self.shared.lock();
        if state.stopping {
            trace!("Task posted to stopped queue {} dropped", self.name);
            return rx;
        }
        if front {
            state.tasks.push_front(job);
        } else {
            state.tasks.push_back(job);
        }
        drop(state);
        self.shared.available.notify_one();
        rx
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// Whether [`TaskQueue::stop`] has been requested
    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopping
    }

    /// Stop the worker after the task in progress and wait for it to exit.
    ///
    /// Queued tasks that have not started are abandoned. Calling this from a
    /// task running on the queue itself requests the stop without joining.
    pub fn stop(&self) {
        {
            let mut state = self.shared.lock();
            if state.stopping {
                return;
            }
            state.stopping = true;
        }
        self.shared.available.notify_all();

        if thread::current().id() == self.worker_id {
            return;
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Task queue {} worker terminated abnormally", self.name);
            }
        }
        debug!(
            "Task queue {} stopped with {} abandoned tasks",
            self.name,
            self.pending()
        );
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.lock();
            loop {
                if state.stopping {
                    return;
                }
                if let Some(task) = state.tasks.pop_front() {
                    break task;
                }
                state = shared
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(
                "Task panicked on queue {}",
                thread::current().name().unwrap_or("unnamed")
            );
        }
    }
}
