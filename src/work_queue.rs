//! Fixed-size worker pool draining a shared FIFO task queue
//!
//! Tasks are boxed closures returning `anyhow::Result<()>`. Every submitted
//! task bumps a pending counter; a worker decrements it once the task has
//! finished, however it finished. [`WorkQueue::finish`] waits on a condition
//! variable until the counter is back to zero, so it also covers tasks that
//! were submitted by other tasks while the caller was blocked.
//!
//! A failing task never takes its worker down: errors are logged, panics are
//! caught and logged, and the worker moves on to the next task.
//!
//! Tasks may hold the queue and submit to it. A task that calls `finish` or
//! `shutdown` (or drops the last handle) does not wait on itself: `finish`
//! returns straight away and shutdown joins every worker but the caller.

use anyhow::{bail, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crate::models::DEFAULT_THREADS;

/// A unit of work executed by the pool
pub type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Count of submitted-but-unfinished tasks
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    finished: Condvar,
}

impl Pending {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.finished.notify_all();
        }
    }

    fn wait_for_zero(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.finished.wait(&mut count);
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }
}

/// State shared between the queue handle and its workers
struct Shared {
    pending: Pending,
    /// Set by `shutdown_now`; workers discard tasks instead of running them
    discard: AtomicBool,
}

/// Worker pool with a completion barrier
pub struct WorkQueue {
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    shared: Arc<Shared>,
    size: usize,
}

impl WorkQueue {
    /// Start a pool with `threads` workers (0 falls back to the default)
    pub fn new(threads: usize) -> Result<Self> {
        let size = if threads == 0 { DEFAULT_THREADS } else { threads };
        let (sender, receiver) = unbounded::<Task>();
        let shared = Arc::new(Shared {
            pending: Pending::default(),
            discard: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || run_worker(id, receiver, shared))?;
            workers.push(handle);
        }

        log::debug!("Started work queue with {} workers", size);

        let worker_ids = workers.iter().map(|handle| handle.thread().id()).collect();
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_ids,
            shared,
            size,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks submitted but not yet finished
    pub fn pending(&self) -> usize {
        self.shared.pending.get()
    }

    /// Queue a task for asynchronous execution
    ///
    /// Returns immediately. Fails only if the queue has been shut down.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            bail!("Work queue has been shut down");
        };

        // Count before sending so a fast worker can never decrement first
        self.shared.pending.increment();
        if sender.send(Box::new(task)).is_err() {
            self.shared.pending.decrement();
            bail!("Work queue has no running workers");
        }
        Ok(())
    }

    /// Block until every submitted task has finished
    ///
    /// Called from one of this queue's own tasks, the calling task is still
    /// pending and would wait on itself, so this returns immediately.
    pub fn finish(&self) {
        if self.on_worker() {
            log::warn!("finish() called from a worker task; not waiting");
            return;
        }
        self.shared.pending.wait_for_zero();
    }

    /// Let workers drain the remaining tasks, then join them
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        self.close_and_join();
    }

    /// Discard tasks that have not started yet, then join the workers
    pub fn shutdown_now(&self) {
        self.shared.discard.store(true, Ordering::SeqCst);
        self.close_and_join();
    }

    fn close_and_join(&self) {
        // Dropping the sender disconnects the channel once it is drained
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        log::debug!("Shutting down {} workers", workers.len());
        let current = thread::current().id();
        for handle in workers {
            // A worker cannot join itself; it exits once the channel is empty
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                log::error!("Worker thread terminated abnormally");
            }
        }
    }

    fn on_worker(&self) -> bool {
        self.worker_ids.contains(&thread::current().id())
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(id: usize, receiver: Receiver<Task>, shared: Arc<Shared>) {
    for task in receiver.iter() {
        scopeguard::defer! {
            shared.pending.decrement();
        }

        if shared.discard.load(Ordering::SeqCst) {
            continue;
        }

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Task failed on worker {}: {:#}", id, e),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("Task panicked on worker {}: {}", id, message);
            }
        }
    }

    log::trace!("Worker {} exiting", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_finish_waits_for_all_tasks() {
        let queue = WorkQueue::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            queue
                .execute(move || {
                    thread::sleep(Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        queue.finish();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_finish_covers_nested_submissions() {
        let queue = Arc::new(WorkQueue::new(2).unwrap());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let inner_queue = Arc::clone(&queue);
            let counter = Arc::clone(&counter);
            queue
                .execute(move || {
                    let counter = Arc::clone(&counter);
                    inner_queue.execute(move || {
                        thread::sleep(Duration::from_millis(5));
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                })
                .unwrap();
        }

        queue.finish();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        queue.shutdown();
    }

    #[test]
    fn test_failures_do_not_kill_workers() {
        let queue = WorkQueue::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        queue.execute(|| anyhow::bail!("boom")).unwrap();
        queue.execute(|| panic!("task panic")).unwrap();

        let after = Arc::clone(&counter);
        queue
            .execute(move || {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        queue.finish();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_drains_and_is_idempotent() {
        let queue = WorkQueue::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            queue
                .execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        queue.shutdown();
        queue.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(queue.execute(|| Ok(())).is_err());
    }

    #[test]
    fn test_shutdown_now_discards_queued_tasks() {
        let queue = WorkQueue::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        // The blocker holds the only worker until shutdown_now has raised the flag
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(0);
        let shared = Arc::clone(&queue.shared);
        queue
            .execute(move || {
                started_tx.send(())?;
                while !shared.discard.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(())
            })
            .unwrap();

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            queue
                .execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        started_rx.recv().unwrap();
        queue.shutdown_now();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending(), 0);
        assert!(queue.execute(|| Ok(())).is_err());
    }

    #[test]
    fn test_finish_and_shutdown_from_a_task_do_not_deadlock() {
        let queue = Arc::new(WorkQueue::new(2).unwrap());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            queue
                .execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let inner = Arc::clone(&queue);
        queue
            .execute(move || {
                inner.finish();
                inner.shutdown();
                done_tx.send(())?;
                Ok(())
            })
            .unwrap();

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        queue.finish();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(queue.execute(|| Ok(())).is_err());
    }

    #[test]
    fn test_last_handle_dropped_inside_a_task() {
        let queue = Arc::new(WorkQueue::new(3).unwrap());
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let owned = Arc::clone(&queue);
        queue
            .execute(move || {
                release_rx.recv()?;
                // By now this is the last handle, so the pool is torn down here
                drop(owned);
                done_tx.send(())?;
                Ok(())
            })
            .unwrap();

        drop(queue);
        release_tx.send(()).unwrap();

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_zero_threads_uses_default() {
        let queue = WorkQueue::new(0).unwrap();
        assert_eq!(queue.size(), DEFAULT_THREADS);
    }
}
