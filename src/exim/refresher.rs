//! On-demand background refresh worker.
//!
//! A [`Refresher`] owns one thread that sleeps until [`Refresher::schedule`]
//! is called, runs the refresh routine once, and goes back to sleep. Requests
//! that arrive while a cycle is running collapse into a single follow-up
//! cycle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{EximError, Result};

/// How long [`Refresher::stop`] waits for the worker before giving up.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Signal {
    pending: bool,
    busy: bool,
    quit: bool,
    exited: bool,
}

#[derive(Debug, Default)]
struct Shared {
    signal: Mutex<Signal>,
    wake: Condvar,
    exited: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Signal> {
        // The routine never runs under this lock, so a poisoned guard still
        // holds consistent flags.
        self.signal.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Single-worker, coalescing background job.
pub struct Refresher {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Refresher {
    /// Start the worker thread. The routine runs only on that thread.
    pub fn spawn<F>(name: impl Into<String>, mut routine: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker_name = name.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                run_worker(&worker_name, &worker_shared, &mut routine);
                let mut signal = worker_shared.lock();
                signal.exited = true;
                signal.busy = false;
                worker_shared.exited.notify_all();
            })
            .map_err(EximError::ThreadSpawn)?;

        debug!(worker = %name, "Refresh worker started");
        Ok(Self {
            name,
            shared,
            handle: Some(handle),
        })
    }

    /// Request a refresh cycle. Never blocks on the routine.
    ///
    /// A request made while a request is already pending is a no-op.
    pub fn schedule(&self) {
        let mut signal = self.shared.lock();
        if signal.quit || signal.pending {
            return;
        }
        signal.pending = true;
        self.shared.wake.notify_one();
    }

    /// Whether a cycle is running right now.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().busy
    }

    /// Whether a cycle has been requested but not started yet.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().pending
    }

    /// Ask the worker to exit and wait up to [`DEFAULT_STOP_TIMEOUT`].
    pub fn stop(&mut self) -> bool {
        self.stop_timeout(DEFAULT_STOP_TIMEOUT)
    }

    /// Ask the worker to exit and wait up to `timeout` for it.
    ///
    /// Returns `true` if the worker has exited. A worker stuck inside a long
    /// external command is left running and `false` is returned.
    pub fn stop_timeout(&mut self, timeout: Duration) -> bool {
        let signal = {
            let mut signal = self.shared.lock();
            signal.quit = true;
            self.shared.wake.notify_all();
            signal
        };

        let (signal, _) = self
            .shared
            .exited
            .wait_timeout_while(signal, timeout, |s| !s.exited)
            .unwrap_or_else(|e| e.into_inner());
        let exited = signal.exited;
        drop(signal);

        if exited {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
            debug!(worker = %self.name, "Refresh worker stopped");
        } else {
            warn!(worker = %self.name, ?timeout, "Refresh worker did not stop in time");
        }
        exited
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn run_worker(name: &str, shared: &Shared, routine: &mut dyn FnMut()) {
    loop {
        {
            let mut signal = shared.lock();
            while !signal.pending && !signal.quit {
                signal = shared.wake.wait(signal).unwrap_or_else(|e| e.into_inner());
            }
            if signal.quit {
                return;
            }
            signal.pending = false;
            signal.busy = true;
        }

        debug!(worker = %name, "Refresh cycle starting");
        // The worker outlives a panicking cycle.
        if panic::catch_unwind(AssertUnwindSafe(&mut *routine)).is_err() {
            warn!(worker = %name, "Refresh cycle panicked");
        }

        shared.lock().busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_worker_survives_panicking_cycle() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut refresher = Refresher::spawn("test-panic", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first cycle fails");
            }
        })
        .unwrap();

        refresher.schedule();
        assert!(wait_until(Duration::from_secs(2), || {
            runs.load(Ordering::SeqCst) == 1 && !refresher.is_busy()
        }));
        refresher.schedule();
        assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::SeqCst) == 2));
        assert!(refresher.stop());
    }

    #[test]
    fn test_schedule_runs_routine_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut refresher = Refresher::spawn("test-once", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        refresher.schedule();
        assert!(wait_until(Duration::from_secs(2), || runs.load(Ordering::SeqCst) == 1));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(refresher.stop());
    }

    #[test]
    fn test_nothing_runs_without_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut refresher = Refresher::spawn("test-idle", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(refresher.stop());
    }

    #[test]
    fn test_requests_during_busy_cycle_coalesce() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let counter = Arc::clone(&runs);
        let mut refresher = Refresher::spawn("test-coalesce", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();

        refresher.schedule();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(refresher.is_busy());

        // Two requests while busy.
        refresher.schedule();
        refresher.schedule();
        assert!(refresher.is_pending());
        release_tx.send(()).unwrap();

        // Exactly one follow-up cycle.
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        release_tx.send(()).unwrap();
        assert!(started_rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(refresher.stop());
    }

    #[test]
    fn test_stop_gives_up_on_stuck_worker() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        let mut refresher = Refresher::spawn("test-stuck", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();
        refresher.schedule();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let start = Instant::now();
        assert!(!refresher.stop_timeout(Duration::from_millis(100)));
        assert!(start.elapsed() < Duration::from_secs(1));

        // Once released, the worker sees the quit flag and exits.
        release_tx.send(()).unwrap();
        assert!(refresher.stop_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn test_schedule_after_stop_is_ignored() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut refresher = Refresher::spawn("test-after-stop", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(refresher.stop());
        refresher.schedule();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
