//! Start/stop bookkeeping for the drain thread.
//!
//! Each start creates a *run*: a fresh thread plus its own [`RunToken`].
//! Stopping cancels the token of the current run only, so a thread from a
//! stopped run can never pick up work that belongs to a later one.
//!
//! A new run never waits for the previous thread on the caller's side. The
//! stopped thread's handle travels to its successor as a [`Predecessor`],
//! and the successor joins it before touching the buffer, so at most one
//! thread is ever inside the store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Cancellation flag of one run.
#[derive(Clone)]
pub(crate) struct RunToken {
    id: u64,
    proceed: Arc<AtomicBool>,
}

impl RunToken {
    fn new(id: u64) -> Self {
        Self {
            id,
            proceed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn should_continue(&self) -> bool {
        self.proceed.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.proceed.store(false, Ordering::Release);
    }
}

/// Handle of the previous run's thread, joined by the next drain thread.
///
/// Shared with the lifecycle so a failed spawn can take the handle back.
#[derive(Clone)]
pub(crate) struct Predecessor(Arc<Mutex<Option<JoinHandle<()>>>>);

impl Predecessor {
    fn new(handle: Option<JoinHandle<()>>) -> Self {
        Self(Arc::new(Mutex::new(handle)))
    }

    fn take(&self) -> Option<JoinHandle<()>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Block until the previous thread has exited. Returns whether there was
    /// one to wait for.
    pub(crate) fn wait(&self) -> bool {
        match self.take() {
            Some(handle) => {
                join_unless_current(handle);
                true
            }
            None => false,
        }
    }
}

struct Run {
    token: RunToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    current: Option<Run>,
    /// Thread of the last stopped run, handed to the next run.
    retired: Option<JoinHandle<()>>,
}

/// Guards the started flag and the handle of the live drain thread.
pub(crate) struct Lifecycle {
    started: AtomicBool,
    runs: AtomicU64,
    slots: Mutex<Slots>,
}

/// What a call to [`Lifecycle::start`] did.
pub(crate) enum Started {
    Spawned(u64),
    AlreadyRunning,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            runs: AtomicU64::new(0),
            slots: Mutex::new(Slots::default()),
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn runs_started(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a drain thread unless one is already running.
    ///
    /// `spawn` receives the token of the new run and the thread it must
    /// join first, and returns the new thread. Nothing here blocks on a
    /// previous run. The slot lock is held across the flag flip and the
    /// spawn, so a concurrent `stop` always observes either no run or a
    /// complete one.
    pub(crate) fn start<F>(&self, spawn: F) -> std::io::Result<Started>
    where
        F: FnOnce(RunToken, Predecessor) -> std::io::Result<JoinHandle<()>>,
    {
        if self.is_started() {
            return Ok(Started::AlreadyRunning);
        }

        let mut slots = self.slots();
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(Started::AlreadyRunning);
        }

        let predecessor = Predecessor::new(slots.retired.take());
        let id = self.runs.load(Ordering::Acquire) + 1;
        let token = RunToken::new(id);
        match spawn(token.clone(), predecessor.clone()) {
            Ok(handle) => {
                self.runs.store(id, Ordering::Release);
                slots.current = Some(Run { token, handle });
                Ok(Started::Spawned(id))
            }
            Err(err) => {
                slots.retired = predecessor.take();
                self.started.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Cancel the current run and clear the started flag.
    ///
    /// Returns the id of the cancelled run, or `None` when nothing was
    /// running. The caller is responsible for waking the thread.
    pub(crate) fn stop(&self) -> Option<u64> {
        let mut slots = self.slots();
        self.started.store(false, Ordering::Release);

        let run = slots.current.take()?;
        run.token.cancel();
        // Every start empties `retired`, so there is nothing to overwrite.
        slots.retired = Some(run.handle);
        Some(run.token.id())
    }

    /// Take the handle of the last stopped run so it can be joined. That
    /// thread joins its own predecessor before exiting.
    pub(crate) fn take_retired(&self) -> Option<JoinHandle<()>> {
        self.slots().retired.take()
    }
}

/// Join a finished run's thread. A drain thread that restarts its own
/// queue (a store that submits while ingesting) must not join itself.
fn join_unless_current(handle: JoinHandle<()>) {
    if handle.thread().id() != thread::current().id() {
        let _ = handle.join();
    }
}
