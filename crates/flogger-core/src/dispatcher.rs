//! The data logger facade.
//!
//! `Dispatcher::new()` builds a dedicated tokio runtime and a pool of
//! workers draining an unbounded task queue. `push`/`dump`/`reset` only
//! touch the entry store and enqueue tasks, so handler latency never lands
//! on the experiment loop. `wait()` is the barrier before relying on
//! handler side effects.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::binding::HandlerBinding;
use crate::config::LoggerConfig;
use crate::error::{FloggerError, Result};
use crate::models::{DispatchStats, HandlerFailure, Snapshot, Value, WaitOutcome};
use crate::paths;
use crate::pool::WorkerPool;
use crate::queue::{Task, TaskQueue};
use crate::storage;
use crate::store::{EntryHandlers, EntryStore};

struct State {
    store: EntryStore,
    root: Arc<PathBuf>,
}

/// Registry of entries plus the asynchronous handler machinery.
///
/// All methods take `&self`; share it behind an `Arc` to log from several
/// threads. Store mutations are serialized under one lock, so tasks from a
/// single thread reach the queue in call order.
///
/// `wait`, `wait_timeout` and `shutdown` block the calling thread and must
/// not be called from inside an async runtime. Dropping the logger drains
/// the queue for at most [`LoggerConfig::drop_timeout`], then abandons
/// handlers that are still running.
pub struct Dispatcher {
    state: Mutex<State>,
    queue: TaskQueue,
    pool: Mutex<Option<WorkerPool>>,
    failures: Mutex<mpsc::UnboundedReceiver<HandlerFailure>>,
    name: Arc<RwLock<String>>,
    log_waits: bool,
    last_wait: Mutex<Instant>,
    drop_timeout: Duration,
    // Taken only in `Drop`.
    runtime: Option<Runtime>,
}

impl Dispatcher {
    /// Create the root directory, start the worker runtime and spawn the
    /// workers.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        storage::ensure_dir(&config.root)?;

        let workers = config.workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("flogger-io")
            .enable_all()
            .build()
            .map_err(|e| FloggerError::Runtime(e.to_string()))?;

        let queue = TaskQueue::new();
        let name = Arc::new(RwLock::new(config.name.clone()));
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(
            runtime.handle(),
            workers,
            queue.consumer(),
            Arc::clone(&name),
            failure_tx,
        );

        let drop_timeout = config.drop_timeout();
        info!(logger = %config.name, workers, root = %config.root.display(), "DataLogger initialized");

        Ok(Self {
            state: Mutex::new(State {
                store: EntryStore::new(),
                root: Arc::new(config.root),
            }),
            queue,
            pool: Mutex::new(Some(pool)),
            failures: Mutex::new(failure_rx),
            name,
            log_waits: config.log_waits,
            last_wait: Mutex::new(Instant::now()),
            drop_timeout,
            runtime: Some(runtime),
        })
    }

    /// Set the root directory of disk-writing handlers.
    ///
    /// Fails with [`FloggerError::PathLocked`] once any entry is declared.
    pub fn set_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let mut state = self.state();
        if !state.store.is_empty() {
            return Err(FloggerError::PathLocked);
        }
        let path = path.into();
        storage::ensure_dir(&path)?;
        state.root = Arc::new(path);
        Ok(())
    }

    pub fn root(&self) -> PathBuf {
        self.state().root.as_ref().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let mut guard = self.name.write().unwrap_or_else(|e| e.into_inner());
        *guard = name.into();
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Register an entry with its on-push, on-dump and on-reset handlers.
    ///
    /// Re-declaring a name fails with [`FloggerError::DuplicateEntry`]. The
    /// ancestor directories of a hierarchical name are created under the
    /// root.
    pub fn declare(
        &self,
        entry: &str,
        on_push: Vec<HandlerBinding>,
        on_dump: Vec<HandlerBinding>,
        on_reset: Vec<HandlerBinding>,
    ) -> Result<()> {
        self.ensure_running()?;
        let mut state = self.state();
        if state.store.contains(entry) {
            return Err(FloggerError::DuplicateEntry(entry.to_string()));
        }
        storage::ensure_dir(&paths::entry_dir(&state.root, entry))?;
        state.store.declare(
            entry,
            EntryHandlers {
                on_push,
                on_dump,
                on_reset,
            },
        )
    }

    /// Store `value` at `step` and queue the on-push handlers with the
    /// whole series accumulated so far.
    pub fn push(&self, entry: &str, step: u64, value: impl Into<Value>) -> Result<()> {
        self.ensure_running()?;
        let mut state = self.state();
        state.store.append(entry, step, value.into())?;
        let handlers = state.store.handlers(entry)?;
        self.submit(&state, entry, &handlers.on_push)
    }

    /// Push at the step equal to the number of pushes since declaration or
    /// the last reset, and return that step.
    pub fn push_next(&self, entry: &str, value: impl Into<Value>) -> Result<u64> {
        self.ensure_running()?;
        let mut state = self.state();
        let step = state.store.pushes(entry)?;
        state.store.append(entry, step, value.into())?;
        let handlers = state.store.handlers(entry)?;
        self.submit(&state, entry, &handlers.on_push)?;
        Ok(step)
    }

    /// Queue the on-dump handlers of every declared entry.
    pub fn dump(&self) -> Result<()> {
        self.ensure_running()?;
        let state = self.state();
        for entry in state.store.all_names() {
            let handlers = state.store.handlers(entry)?;
            self.submit(&state, entry, &handlers.on_dump)?;
        }
        Ok(())
    }

    /// Queue the on-reset handlers with the current data, then empty the
    /// entry.
    pub fn reset(&self, entry: &str) -> Result<()> {
        self.ensure_running()?;
        let mut state = self.state();
        let handlers = state.store.handlers(entry)?;
        self.submit(&state, entry, &handlers.on_reset)?;
        state.store.clear(entry)
    }

    /// Block until every queued task has finished; returns the time spent
    /// waiting.
    pub fn wait(&self) -> Duration {
        let started = Instant::now();
        self.block_on(self.queue.drained());
        let elapsed = started.elapsed();
        self.log_wait(started, elapsed);
        elapsed
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        let started = Instant::now();
        let drained = self
            .block_on(async { tokio::time::timeout(timeout, self.queue.drained()).await })
            .is_some_and(|r| r.is_ok());
        let elapsed = started.elapsed();
        if drained {
            self.log_wait(started, elapsed);
        }
        WaitOutcome { drained, elapsed }
    }

    /// Snapshot of an entry's current data.
    pub fn snapshot(&self, entry: &str) -> Result<Snapshot> {
        self.state().store.snapshot(entry)
    }

    /// Pushes to an entry since declaration or its last reset.
    pub fn entry_len(&self, entry: &str) -> Result<u64> {
        self.state().store.pushes(entry)
    }

    /// Values of an entry ordered by step.
    pub fn series(&self, entry: &str) -> Result<Vec<Value>> {
        Ok(self.snapshot(entry)?.values().cloned().collect())
    }

    /// Declared entry names in declaration order.
    pub fn entries(&self) -> Vec<String> {
        self.state().store.all_names().map(str::to_string).collect()
    }

    /// Tasks enqueued but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.queue.size()
    }

    pub fn stats(&self) -> DispatchStats {
        self.queue.stats()
    }

    /// Handler failures reported since the previous call.
    pub fn drain_failures(&self) -> Vec<HandlerFailure> {
        let mut rx = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::new();
        while let Ok(failure) = rx.try_recv() {
            out.push(failure);
        }
        out
    }

    /// Close the queue, let the workers drain it and join them.
    ///
    /// Idempotent. Later logging calls fail with [`FloggerError::ShutDown`].
    pub fn shutdown(&self) {
        self.queue.close();
        let pool = self.pool.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(pool) = pool {
            let started = Instant::now();
            self.block_on(pool.join());
            info!(
                logger = %self.name(),
                "DataLogger shut down after draining for {:?}",
                started.elapsed()
            );
        }
    }

    fn submit(&self, state: &State, entry: &str, bindings: &[HandlerBinding]) -> Result<()> {
        if bindings.is_empty() {
            return Ok(());
        }
        let snapshot = state.store.snapshot(entry)?;
        let entry: Arc<str> = Arc::from(entry);
        for binding in bindings {
            self.queue.enqueue(Task::new(
                binding.clone(),
                Arc::clone(&entry),
                Arc::clone(&snapshot),
                Arc::clone(&state.root),
            ))?;
        }
        Ok(())
    }

    fn log_wait(&self, started: Instant, elapsed: Duration) {
        let mut last = self.last_wait.lock().unwrap_or_else(|e| e.into_inner());
        if self.log_waits {
            let logger = self.name();
            info!(logger = %logger, "Last wait occurred {:?} ago", started.duration_since(*last));
            info!(logger = %logger, "Waited {:?} for completion", elapsed);
        }
        *last = Instant::now();
    }

    /// Run `future` on the worker runtime. `None` once `Drop` released it.
    fn block_on<F: Future>(&self, future: F) -> Option<F::Output> {
        self.runtime.as_ref().map(|rt| rt.block_on(future))
    }

    fn ensure_running(&self) -> Result<()> {
        if self.queue.is_closed() {
            return Err(FloggerError::ShutDown);
        }
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.queue.close();
        let pool = self.pool.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        let Some(pool) = pool else {
            return;
        };
        let timeout = self.drop_timeout;
        let drained = self
            .block_on(async { tokio::time::timeout(timeout, pool.join()).await })
            .is_some_and(|r| r.is_ok());
        if drained {
            return;
        }
        warn!(
            logger = %self.name(),
            in_flight = self.queue.size(),
            "DataLogger dropped before handlers finished; abandoning them after {:?}",
            timeout
        );
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name())
            .field("root", &self.root())
            .field("entries", &self.entries())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

