//! Fixed-size worker pool for per-target output generation.
//!
//! The dispatch thread submits nullary tasks; N worker threads drain them
//! from a shared channel. The pool records the first task failure (including
//! panics) and keeps draining the rest; [`WorkerPool::drain`] blocks until
//! every task submitted before the call has finished and surfaces that first
//! failure. No task is retried.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::anyhow;
use tracing::debug;

type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

#[derive(Debug, Default)]
struct PoolState {
    pending: Mutex<usize>,
    done: Condvar,
    first_error: Mutex<Option<anyhow::Error>>,
}

/// Parallel executor with a submit primitive and a blocking drain.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    state: Arc<PoolState>,
}

impl WorkerPool {
    /// Spawn `threads` workers (clamped to at least one).
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let state = Arc::new(PoolState::default());
        let workers = (0..threads)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let state = Arc::clone(&state);
                thread::Builder::new()
                    .name(format!("kanna-worker-{index}"))
                    .spawn(move || worker_loop(&receiver, &state))
                    .expect("spawn worker thread")
            })
            .collect();
        debug!(threads, "worker pool started");
        Self {
            sender: Some(sender),
            workers,
            state,
        }
    }

    /// The default worker count: one per logical CPU.
    #[must_use]
    pub fn default_thread_count() -> usize {
        thread::available_parallelism().map_or(4, std::num::NonZero::get)
    }

    /// Enqueue a task for execution on some worker thread.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        {
            let mut pending = self
                .state
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *pending += 1;
        }
        let sent = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(Box::new(task)).is_ok());
        if !sent {
            let mut pending = self
                .state
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *pending -= 1;
        }
    }

    /// Block until all previously submitted tasks have completed.
    ///
    /// # Errors
    ///
    /// Returns the first task failure recorded since the last drain.
    pub fn drain(&self) -> anyhow::Result<()> {
        let mut pending = self
            .state
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *pending > 0 {
            pending = self
                .state
                .done
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(pending);
        let mut first_error = self
            .state
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match first_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            drop(worker.join());
        }
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Task>>, state: &PoolState) {
    loop {
        let task = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        let Ok(task) = task else {
            // Channel closed: the pool is shutting down.
            return;
        };
        let outcome = match catch_unwind(AssertUnwindSafe(task)) {
            Ok(result) => result,
            Err(panic) => Err(anyhow!(
                "worker task panicked: {}",
                panic_message(panic.as_ref())
            )),
        };
        if let Err(err) = outcome {
            let mut first_error = state
                .first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if first_error.is_none() {
                *first_error = Some(err);
            }
        }
        let mut pending = state.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending -= 1;
        if *pending == 0 {
            state.done.notify_all();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn drains_all_submitted_tasks() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        pool.drain().expect("drain");
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn drain_reports_the_first_failure_and_keeps_draining() {
        let pool = WorkerPool::new(2);
        let completed = Arc::new(AtomicUsize::new(0));
        pool.submit(|| Err(anyhow!("boom")));
        for _ in 0..8 {
            let completed = Arc::clone(&completed);
            pool.submit(move || {
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let err = pool.drain().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(completed.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn panics_are_captured_as_failures() {
        let pool = WorkerPool::new(1);
        pool.submit(|| panic!("kaboom"));
        let err = pool.drain().unwrap_err();
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn drain_on_an_idle_pool_returns_immediately() {
        let pool = WorkerPool::new(1);
        pool.drain().expect("idle drain");
    }
}
