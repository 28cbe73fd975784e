//! Worker pool draining the task queue.
//!
//! Each worker takes one task at a time and runs its handler on the
//! blocking thread pool, so up to `workers` handlers overlap. Handler
//! errors and panics become [`HandlerFailure`] records on a side channel;
//! the task is marked complete either way.

use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::models::HandlerFailure;
use crate::queue::{Task, TaskConsumer};

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers on `runtime`, all pulling from `consumer`.
    pub fn spawn(
        runtime: &Handle,
        size: usize,
        consumer: TaskConsumer,
        logger_name: Arc<RwLock<String>>,
        failures: mpsc::UnboundedSender<HandlerFailure>,
    ) -> Self {
        let workers = (0..size.max(1))
            .map(|id| {
                runtime.spawn(worker_loop(
                    id,
                    consumer.clone(),
                    Arc::clone(&logger_name),
                    failures.clone(),
                ))
            })
            .collect();
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to exit. Workers exit once the queue is
    /// closed and drained.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("Worker terminated abnormally: {}", e);
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    consumer: TaskConsumer,
    logger_name: Arc<RwLock<String>>,
    failures: mpsc::UnboundedSender<HandlerFailure>,
) {
    while let Some(task) = consumer.dequeue().await {
        let entry = task.entry().to_string();
        let handler = task.handler_name().to_string();
        debug!(worker = id, entry = %entry, handler = %handler, "Running handler");

        if let Some((message, panicked)) = execute(task).await {
            consumer.counters.failed.fetch_add(1, Ordering::Relaxed);
            let logger = logger_name
                .read()
                .map(|n| n.clone())
                .unwrap_or_else(|e| e.into_inner().clone());
            warn!(
                logger = %logger,
                entry = %entry,
                handler = %handler,
                panicked,
                "Handler failed: {}",
                message
            );
            let _ = failures.send(HandlerFailure {
                entry,
                handler,
                message,
                panicked,
                at: Utc::now(),
            });
        }

        consumer.counters.completed.fetch_add(1, Ordering::Relaxed);
        consumer.complete();
    }
    debug!(worker = id, "Worker exiting");
}

/// Run the handler off the async workers. Returns the failure message
/// and whether it was a panic.
async fn execute(task: Task) -> Option<(String, bool)> {
    match tokio::task::spawn_blocking(move || task.run()).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some((format!("{:#}", e), false)),
        Err(e) => Some((panic_message(e), true)),
    }
}

fn panic_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "handler task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::binding::{FnHandler, HandlerBinding};
    use crate::models::Series;
    use crate::queue::TaskQueue;

    fn task(binding: HandlerBinding) -> Task {
        Task::new(
            binding,
            Arc::from("Loss"),
            Arc::new(Series::new()),
            Arc::new(PathBuf::from(".")),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_are_reported_and_pool_keeps_going() {
        let queue = TaskQueue::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(
            &Handle::current(),
            2,
            queue.consumer(),
            Arc::new(RwLock::new("test".to_string())),
            tx,
        );
        assert_eq!(pool.size(), 2);

        queue
            .enqueue(task(HandlerBinding::new(FnHandler::new("bad", |_| {
                anyhow::bail!("disk full")
            }))))
            .unwrap();
        queue
            .enqueue(task(HandlerBinding::new(FnHandler::new("boom", |_| {
                panic!("kaboom")
            }))))
            .unwrap();
        queue
            .enqueue(task(HandlerBinding::new(FnHandler::new("ok", |_| Ok(())))))
            .unwrap();

        queue.drained().await;
        queue.close();
        pool.join().await;

        let mut failures = Vec::new();
        while let Ok(f) = rx.try_recv() {
            failures.push(f);
        }
        failures.sort_by(|a, b| a.handler.cmp(&b.handler));
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].handler, "bad");
        assert_eq!(failures[0].message, "disk full");
        assert!(!failures[0].panicked);
        assert_eq!(failures[1].handler, "boom");
        assert_eq!(failures[1].message, "kaboom");
        assert!(failures[1].panicked);

        let stats = queue.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 2);
    }
}
