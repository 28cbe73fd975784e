//! Task queue: an unbounded FIFO of dispatch tasks with an in-flight
//! counter that drops back to zero once every enqueued task has finished.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use crate::binding::HandlerBinding;
use crate::error::{FloggerError, Result};
use crate::models::{DispatchStats, Snapshot};

/// One scheduled handler invocation against a frozen snapshot.
#[derive(Debug, Clone)]
pub struct Task {
    binding: HandlerBinding,
    entry: Arc<str>,
    data: Snapshot,
    root: Arc<PathBuf>,
}

impl Task {
    pub fn new(binding: HandlerBinding, entry: Arc<str>, data: Snapshot, root: Arc<PathBuf>) -> Self {
        Self {
            binding,
            entry,
            data,
            root,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn handler_name(&self) -> &str {
        self.binding.name()
    }

    pub fn data(&self) -> &Snapshot {
        &self.data
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn run(&self) -> anyhow::Result<()> {
        self.binding.invoke(&self.entry, &self.data, &self.root)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

impl Counters {
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the queue, owned by the dispatcher.
pub struct TaskQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    consumer: TaskConsumer,
}

/// Worker side of the queue. Cloned into every worker.
#[derive(Clone)]
pub struct TaskConsumer {
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>,
    in_flight: Arc<watch::Sender<usize>>,
    pub(crate) counters: Arc<Counters>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        let (in_flight, _) = watch::channel(0usize);
        Self {
            sender: Mutex::new(Some(sender)),
            consumer: TaskConsumer {
                receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
                in_flight: Arc::new(in_flight),
                counters: Arc::new(Counters::default()),
            },
        }
    }

    /// Submit a task. Never blocks beyond the channel send.
    pub fn enqueue(&self, task: Task) -> Result<()> {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sender = guard.as_ref().ok_or(FloggerError::ShutDown)?;
        // Count before sending so a fast worker can never underflow.
        self.consumer.in_flight.send_modify(|n| *n += 1);
        if sender.send(task).is_err() {
            self.consumer.in_flight.send_modify(|n| *n -= 1);
            return Err(FloggerError::ShutDown);
        }
        self.consumer.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Tasks enqueued but not yet finished.
    pub fn size(&self) -> usize {
        *self.consumer.in_flight.borrow()
    }

    /// Stop accepting tasks. Queued tasks are still handed to workers.
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Resolves once the in-flight counter reads zero.
    pub async fn drained(&self) {
        let mut rx = self.consumer.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub fn consumer(&self) -> TaskConsumer {
        self.consumer.clone()
    }

    pub fn stats(&self) -> DispatchStats {
        self.consumer.counters.stats()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskConsumer {
    /// Wait for the next task. `None` once the queue is closed and empty.
    pub async fn dequeue(&self) -> Option<Task> {
        self.receiver.lock().await.recv().await
    }

    /// Mark one dequeued task as finished.
    pub fn complete(&self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::FnHandler;
    use crate::models::{Series, Value};

    fn task(entry: &str, step: u64) -> Task {
        let mut data = Series::new();
        data.insert(step, Value::Int(step as i64));
        Task::new(
            HandlerBinding::new(FnHandler::new("noop", |_| Ok(()))),
            Arc::from(entry),
            Arc::new(data),
            Arc::new(PathBuf::from(".")),
        )
    }

    #[tokio::test]
    async fn test_fifo_and_in_flight_count() {
        let queue = TaskQueue::new();
        let consumer = queue.consumer();
        for step in 0..3 {
            queue.enqueue(task("Loss", step)).unwrap();
        }
        assert_eq!(queue.size(), 3);

        for expected in 0..3u64 {
            let t = consumer.dequeue().await.unwrap();
            assert_eq!(t.data().keys().next(), Some(&expected));
            consumer.complete();
        }
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.stats().submitted, 3);
    }

    #[tokio::test]
    async fn test_close_drains_before_ending() {
        let queue = TaskQueue::new();
        let consumer = queue.consumer();
        queue.enqueue(task("a", 0)).unwrap();
        queue.close();

        assert!(queue.is_closed());
        assert!(matches!(queue.enqueue(task("a", 1)), Err(FloggerError::ShutDown)));
        assert!(consumer.dequeue().await.is_some());
        consumer.complete();
        assert!(consumer.dequeue().await.is_none());
        queue.drained().await;
    }
}
