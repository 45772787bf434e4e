//! The simulation environment.
//!
//! [`Environment`] owns the scheduler (clock and event queue) and the process table.
//! It is the only thing that polls process futures: every popped event names a
//! process, and the environment resumes it until its next suspension point.
//!
//! # Basic Usage
//!
//! ```
//! use depot_core::{Environment, SimTime};
//!
//! let env = Environment::new();
//! let sim = env.clone();
//! let handle = env.process("greeter", async move {
//!     sim.timeout(5.0)?.await;
//!     Ok(sim.now())
//! });
//!
//! env.run(None).unwrap();
//! assert_eq!(handle.value().unwrap().unwrap(), SimTime::from(5.0));
//! ```

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::SimError;
use crate::execute::{Execute, Executor};
use crate::logging::{process_span, simulation_span};
use crate::process::{wrap_body, AllOf, ProcessHandle, ProcessState, ProcessTable};
use crate::scheduler::{ClockRef, Continuation, EventHandle, EventKind, Scheduler};
use crate::types::ProcessId;
use crate::waker;
use crate::SimTime;

static NEXT_ENV_ID: AtomicU64 = AtomicU64::new(1);

/// One resumption of one process, as recorded by [`Environment::enable_trace`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub time: SimTime,
    pub process: String,
    pub kind: EventKind,
}

pub(crate) struct EnvInner {
    id: u64,
    scheduler: RefCell<Scheduler>,
    processes: RefCell<ProcessTable>,
    active: Cell<Option<ProcessId>>,
    events_processed: Cell<u64>,
    trace: RefCell<Option<Vec<TraceRecord>>>,
}

impl EnvInner {
    pub(crate) fn now(&self) -> SimTime {
        self.scheduler.borrow().time()
    }

    pub(crate) fn active_process(&self) -> Option<ProcessId> {
        self.active.get()
    }

    pub(crate) fn schedule_now(&self, process: ProcessId, kind: EventKind) -> EventHandle {
        self.scheduler
            .borrow_mut()
            .schedule_now(Continuation::new(process, kind))
    }

    /// Schedules at `time`, or now if `time` already passed.
    pub(crate) fn schedule_at(
        &self,
        time: SimTime,
        process: ProcessId,
        kind: EventKind,
    ) -> EventHandle {
        let mut scheduler = self.scheduler.borrow_mut();
        let continuation = Continuation::new(process, kind);
        let time = time.max(scheduler.time());
        match scheduler.schedule(time, continuation) {
            Ok(handle) => handle,
            Err(_) => scheduler.schedule_now(continuation),
        }
    }

    pub(crate) fn is_pending(&self, handle: EventHandle) -> bool {
        self.scheduler.borrow().is_pending(handle)
    }

    pub(crate) fn cancel(&self, handle: EventHandle) -> bool {
        self.scheduler.borrow_mut().cancel(handle)
    }

    pub(crate) fn mark_watched(&self, process: ProcessId) {
        if let Some(slot) = self.processes.borrow_mut().get_mut(process) {
            slot.watched = true;
        }
    }

    pub(crate) fn add_joiner(&self, child: ProcessId, parent: ProcessId) {
        if let Some(slot) = self.processes.borrow_mut().get_mut(child) {
            if !slot.state.is_terminal() && !slot.joiners.contains(&parent) {
                slot.joiners.push(parent);
            }
        }
    }

    pub(crate) fn remove_joiner(&self, child: ProcessId, parent: ProcessId) {
        if let Some(slot) = self.processes.borrow_mut().get_mut(child) {
            slot.joiners.retain(|joiner| *joiner != parent);
        }
    }

    pub(crate) fn process_state(&self, process: ProcessId) -> Option<ProcessState> {
        self.processes.borrow().get(process).map(|slot| slot.state)
    }
}

/// The discrete-event simulation environment.
///
/// Cloning is cheap and every clone refers to the same simulation, so a process body
/// usually captures its own clone to call [`timeout`](Environment::timeout),
/// [`process`](Environment::process) and [`all_of`](Environment::all_of).
///
/// Everything is single-threaded: exactly one process runs at a time, and processes
/// scheduled for the same instant are resumed in the order they were scheduled.
#[derive(Clone)]
pub struct Environment {
    inner: Rc<EnvInner>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.inner.id)
            .field("now", &self.now())
            .field("pending_events", &self.pending_events())
            .field("processes", &self.process_count())
            .finish()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create an environment with the clock at zero and nothing scheduled.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EnvInner {
                id: NEXT_ENV_ID.fetch_add(1, Ordering::Relaxed),
                scheduler: RefCell::new(Scheduler::default()),
                processes: RefCell::new(ProcessTable::default()),
                active: Cell::new(None),
                events_processed: Cell::new(0),
                trace: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<EnvInner> {
        Rc::downgrade(&self.inner)
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.inner.now()
    }

    /// Read-only view of the clock that outlives borrows of the environment.
    pub(crate) fn clock(&self) -> ClockRef {
        self.inner.scheduler.borrow().clock()
    }

    /// Register a new process and schedule its first resumption at the current time.
    ///
    /// The body runs only when the scheduler reaches that resumption, never inside this
    /// call. An `Err` returned by the body marks the process FAILED and reaches its
    /// observers wrapped in [`SimError::ProcessFailure`].
    pub fn process<F, T>(&self, name: impl Into<String>, body: F) -> ProcessHandle<T>
    where
        F: Future<Output = Result<T, SimError>> + 'static,
        T: 'static,
    {
        let name: Rc<str> = Rc::from(name.into());
        let outcome = Rc::new(RefCell::new(None));
        let future = wrap_body(Rc::clone(&name), body, Rc::clone(&outcome));
        let now = self.now();

        let id = self
            .inner
            .processes
            .borrow_mut()
            .insert(Rc::clone(&name), future, now);
        self.inner.schedule_now(id, EventKind::Start);
        debug!(process = %name, id = %id, time = %now, "Process registered");

        ProcessHandle::new(id, name, self.downgrade(), outcome)
    }

    /// A wakeup `duration` units from now.
    ///
    /// Fails with [`SimError::InvalidDuration`] if `duration` is negative or not finite.
    /// A zero duration still suspends the caller: it resumes at the current time, after
    /// every event already scheduled for this instant.
    pub fn timeout(&self, duration: f64) -> Result<Timeout, SimError> {
        let target = self.now().checked_add(duration)?;
        Ok(Timeout {
            env: self.downgrade(),
            target,
            event: None,
            fired: false,
        })
    }

    /// Wait until every process in `handles` is DONE, or until one of them fails.
    ///
    /// The join resolves to the children's values in handle order. A failure fails the
    /// join and the remaining children keep running. When several children have failed
    /// by the time the caller resumes, for instance at the same instant, the join
    /// reports the first of them in handle order, not the one that failed earliest.
    pub fn all_of<T>(&self, handles: impl IntoIterator<Item = ProcessHandle<T>>) -> AllOf<T> {
        AllOf::new(self.downgrade(), handles.into_iter().collect())
    }

    /// Run the simulation.
    ///
    /// With `until = None` the loop stops when no events are left. With `Some(t)` every
    /// event firing strictly before `t` is processed and the clock is then set to `t`;
    /// processes still waiting are left suspended and can be resumed by a later call.
    pub fn run(&self, until: Option<SimTime>) -> Result<(), SimError> {
        let executor = match until {
            Some(time) => Executor::timed(time),
            None => Executor::unbound(),
        };
        self.execute(executor)
    }

    /// Runs the simulation with an explicit executor.
    ///
    /// See [`Execute`] and [`Executor`] for the stopping conditions.
    pub fn execute<E: Execute>(&self, executor: E) -> Result<(), SimError> {
        let _span = simulation_span(self.inner.id).entered();
        info!(
            time = %self.now(),
            pending_events = self.pending_events(),
            "Starting simulation execution"
        );
        let result = executor.execute(self);
        match &result {
            Ok(()) => info!(
                final_time = %self.now(),
                events_processed = self.events_processed(),
                "Simulation execution completed"
            ),
            Err(error) => warn!(
                time = %self.now(),
                %error,
                "Simulation execution stopped by an error"
            ),
        }
        result
    }

    /// Performs one step of the simulation. Returns `Ok(true)` if an event was processed
    /// and `Ok(false)` if the queue was empty.
    ///
    /// An error means a process failed while nobody was waiting on it.
    pub fn step(&self) -> Result<bool, SimError> {
        self.flush_deferred_wakes();
        let event = self.inner.scheduler.borrow_mut().pop();
        let Some(event) = event else {
            return Ok(false);
        };
        self.inner
            .events_processed
            .set(self.inner.events_processed.get() + 1);
        trace!(
            event_id = %event.id(),
            time = %event.time(),
            "Processing simulation step"
        );
        self.resume(event.continuation())?;
        Ok(true)
    }

    /// Time of the next pending event.
    pub fn peek(&self) -> Option<SimTime> {
        self.flush_deferred_wakes();
        self.inner.scheduler.borrow_mut().peek().map(|event| event.time())
    }

    /// Number of events waiting to fire.
    pub fn pending_events(&self) -> usize {
        self.inner.scheduler.borrow().len()
    }

    /// Number of events fired so far.
    pub fn events_processed(&self) -> u64 {
        self.inner.events_processed.get()
    }

    /// The process currently being resumed, if any.
    pub fn active_process(&self) -> Option<ProcessId> {
        self.inner.active_process()
    }

    pub fn process_state(&self, process: ProcessId) -> Option<ProcessState> {
        self.inner.process_state(process)
    }

    pub fn process_name(&self, process: ProcessId) -> Option<String> {
        self.inner
            .processes
            .borrow()
            .get(process)
            .map(|slot| slot.name.to_string())
    }

    /// Number of processes ever registered.
    pub fn process_count(&self) -> usize {
        self.inner.processes.borrow().len()
    }

    /// Start recording a [`TraceRecord`] for every process resumption.
    pub fn enable_trace(&self) {
        let mut trace = self.inner.trace.borrow_mut();
        if trace.is_none() {
            *trace = Some(Vec::new());
        }
    }

    /// The resumptions recorded since [`enable_trace`](Environment::enable_trace).
    pub fn trace(&self) -> Vec<TraceRecord> {
        self.inner.trace.borrow().clone().unwrap_or_default()
    }

    /// Drop every unfinished process and every pending event.
    ///
    /// Dropping a process runs the drop glue of whatever it holds, so requests it still
    /// owns are released. Abandoned processes keep the state they had. Processes capture
    /// clones of the environment, so this is also what breaks those reference cycles.
    pub fn shutdown(&self) {
        let futures: Vec<_> = self
            .inner
            .processes
            .borrow_mut()
            .iter_mut()
            .filter_map(|slot| slot.future.take())
            .collect();
        let abandoned = futures.len();
        drop(futures);

        self.inner.scheduler.borrow_mut().clear();
        waker::take_deferred_wakes(self.inner.id);
        info!(abandoned, time = %self.now(), "Environment shut down");
    }

    pub(crate) fn advance_to(&self, time: SimTime) {
        self.inner.scheduler.borrow_mut().advance_to(time);
    }

    fn resume(&self, continuation: Continuation) -> Result<(), SimError> {
        let Continuation { process, kind } = continuation;
        let taken = {
            let mut table = self.inner.processes.borrow_mut();
            let slot = table
                .get_mut(process)
                .ok_or(SimError::UnknownProcess(process))?;
            if slot.state.is_terminal() {
                None
            } else {
                slot.future.take().map(|future| {
                    slot.state = ProcessState::Running;
                    (future, Rc::clone(&slot.name))
                })
            }
        };
        let Some((mut future, name)) = taken else {
            trace!(%process, %kind, "Ignoring resumption of a finished or abandoned process");
            return Ok(());
        };

        let now = self.now();
        if let Some(trace) = self.inner.trace.borrow_mut().as_mut() {
            trace.push(TraceRecord {
                time: now,
                process: name.to_string(),
                kind,
            });
        }
        trace!(process = %name, %kind, time = %now, "Resuming process");

        let waker = waker::process_waker(self.inner.id, process);
        let mut cx = Context::from_waker(&waker);
        let previous = self.inner.active.replace(Some(process));
        let poll = process_span(&name, process).in_scope(|| future.as_mut().poll(&mut cx));
        self.inner.active.set(previous);

        let result = match poll {
            Poll::Pending => {
                if let Some(slot) = self.inner.processes.borrow_mut().get_mut(process) {
                    slot.state = ProcessState::Suspended;
                    slot.future = Some(future);
                }
                Ok(())
            }
            Poll::Ready(outcome) => {
                drop(future);
                self.finish(process, &name, outcome)
            }
        };
        self.flush_deferred_wakes();
        result
    }

    fn finish(
        &self,
        process: ProcessId,
        name: &str,
        outcome: Result<(), SimError>,
    ) -> Result<(), SimError> {
        let now = self.now();
        let (joiners, watched, lifetime) = {
            let mut table = self.inner.processes.borrow_mut();
            let slot = table
                .get_mut(process)
                .ok_or(SimError::UnknownProcess(process))?;
            slot.state = if outcome.is_ok() {
                ProcessState::Done
            } else {
                ProcessState::Failed
            };
            (
                std::mem::take(&mut slot.joiners),
                slot.watched,
                now.duration_since(slot.started_at),
            )
        };

        for joiner in &joiners {
            self.inner.schedule_now(*joiner, EventKind::Join);
        }

        match outcome {
            Ok(()) => {
                debug!(
                    process = %name,
                    time = %now,
                    lifetime,
                    joiners = joiners.len(),
                    "Process completed"
                );
                Ok(())
            }
            Err(error) if watched || !joiners.is_empty() => {
                debug!(process = %name, time = %now, lifetime, %error, "Process failed");
                Ok(())
            }
            Err(error) => {
                warn!(
                    process = %name,
                    time = %now,
                    lifetime,
                    %error,
                    "Process failed with no observer"
                );
                Err(error)
            }
        }
    }

    fn flush_deferred_wakes(&self) {
        for process in waker::take_deferred_wakes(self.inner.id) {
            self.inner.schedule_now(process, EventKind::Wake);
        }
    }
}

/// Future returned by [`Environment::timeout`].
///
/// The wakeup is scheduled when the future is first polled, for the time computed when
/// it was created. Dropping a pending `Timeout` cancels its event.
#[must_use = "a timeout does nothing unless awaited"]
pub struct Timeout {
    env: Weak<EnvInner>,
    target: SimTime,
    event: Option<EventHandle>,
    fired: bool,
}

impl Timeout {
    /// The instant this timeout fires at.
    pub fn target(&self) -> SimTime {
        self.target
    }
}

impl Future for Timeout {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.fired {
            return Poll::Ready(());
        }
        let Some(env) = this.env.upgrade() else {
            return Poll::Pending;
        };

        match this.event {
            Some(handle) if env.is_pending(handle) => Poll::Pending,
            Some(_) => {
                this.fired = true;
                this.event = None;
                Poll::Ready(())
            }
            None => {
                let process = env
                    .active_process()
                    .unwrap_or_else(|| panic!("Timeout polled outside of a simulation process"));
                this.event = Some(env.schedule_at(this.target, process, EventKind::Timeout));
                Poll::Pending
            }
        }
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let (Some(handle), Some(env)) = (self.event.take(), self.env.upgrade()) {
            env.cancel(handle);
        }
    }
}
