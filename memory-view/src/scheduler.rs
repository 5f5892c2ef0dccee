// Command scheduler: one logical worker for every debuggee-facing operation
//
// Commands run strictly one after another, highest priority first and FIFO
// within a priority. A running command is never preempted; priorities only
// decide which queued command goes next.

use crate::error::{MemoryViewError, Result};
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

tokio::task_local! {
    static ON_WORKER: ();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Background refreshes such as the census
    Lowest,
    Low,
    Normal,
    /// Stepping and evaluation
    High,
}

pub trait Command: Send + 'static {
    fn priority(&self) -> Priority;
}

pub trait CommandHandler<C>: Send + Sync + 'static {
    fn execute(&self, command: C) -> impl Future<Output = ()> + Send;
}

/// True when called from inside a command executing on the worker
pub fn is_worker() -> bool {
    ON_WORKER.try_with(|_| ()).is_ok()
}

/// Guard for operations that mutate worker-owned state
///
/// Panics in debug builds; release builds refuse the operation.
pub fn assert_worker(operation: &'static str) -> Result<()> {
    if is_worker() {
        return Ok(());
    }
    error!("{} called off the command worker", operation);
    debug_assert!(false, "{} must run on the command worker", operation);
    Err(MemoryViewError::OffWorker(operation))
}

pub(crate) async fn run_on_worker<F: Future>(future: F) -> F::Output {
    ON_WORKER.scope((), future).await
}

struct Queued<C> {
    priority: Priority,
    seq: u64,
    command: C,
}

impl<C> PartialEq for Queued<C> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<C> Eq for Queued<C> {}

impl<C> Ord for Queued<C> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap: higher priority first, then lower seq
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<C> PartialOrd for Queued<C> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct SchedulerInner<C> {
    queue: Mutex<BinaryHeap<Queued<C>>>,
    notify: Notify,
    next_seq: AtomicU64,
    closed: AtomicBool,
}

pub struct CommandScheduler<C> {
    inner: Arc<SchedulerInner<C>>,
}

impl<C> Clone for CommandScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Command> CommandScheduler<C> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queue: Mutex::new(BinaryHeap::new()),
                notify: Notify::new(),
                next_seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the worker; it stops when the handler is dropped or on shutdown
    pub fn start<H: CommandHandler<C>>(&self, handler: Weak<H>) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            info!("Command worker started");
            loop {
                let next = inner.queue.lock().pop();
                match next {
                    Some(queued) => {
                        let Some(handler) = handler.upgrade() else {
                            break;
                        };
                        debug!("Executing command seq={} priority={:?}", queued.seq, queued.priority);
                        run_on_worker(handler.execute(queued.command)).await;
                    }
                    None => {
                        if inner.closed.load(Ordering::Acquire) {
                            break;
                        }
                        inner.notify.notified().await;
                    }
                }
            }
            info!("Command worker stopped");
        })
    }

    pub fn schedule(&self, command: C) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(MemoryViewError::SchedulerClosed);
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let priority = command.priority();
        self.inner.queue.lock().push(Queued {
            priority,
            seq,
            command,
        });
        debug!("Scheduled command seq={} priority={:?}", seq, priority);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Commands accepted since creation
    pub fn scheduled_count(&self) -> u64 {
        self.inner.next_seq.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Stop the worker once it is idle; returns the queued commands it
    /// will never run, in the order it would have run them
    pub fn shutdown(&self) -> Vec<C> {
        self.inner.closed.store(true, Ordering::Release);
        let mut dropped = Vec::new();
        {
            let mut queue = self.inner.queue.lock();
            while let Some(queued) = queue.pop() {
                dropped.push(queued.command);
            }
        }
        self.inner.notify.notify_one();
        dropped
    }
}

impl<C: Command> Default for CommandScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}
