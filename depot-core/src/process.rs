//! Processes and the futures used to wait on them.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use serde::Serialize;

use crate::environment::EnvInner;
use crate::error::SimError;
use crate::types::ProcessId;
use crate::SimTime;

/// Lifecycle of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessState {
    /// Registered, first resumption not reached yet.
    Created,
    /// Being polled right now.
    Running,
    /// Waiting on a timeout, a resource, or other processes.
    Suspended,
    Done,
    Failed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Done | ProcessState::Failed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Created => "created",
            ProcessState::Running => "running",
            ProcessState::Suspended => "suspended",
            ProcessState::Done => "done",
            ProcessState::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub(crate) type BoxedBody = Pin<Box<dyn Future<Output = Result<(), SimError>>>>;

type Outcome<T> = Rc<RefCell<Option<Result<T, SimError>>>>;

pub(crate) struct ProcessSlot {
    pub(crate) name: Rc<str>,
    pub(crate) state: ProcessState,
    pub(crate) future: Option<BoxedBody>,
    /// Processes to resume when this one reaches a terminal state.
    pub(crate) joiners: Vec<ProcessId>,
    /// Set once a handle or a join has taken responsibility for the outcome.
    pub(crate) watched: bool,
    pub(crate) started_at: SimTime,
}

#[derive(Default)]
pub(crate) struct ProcessTable {
    slots: Vec<ProcessSlot>,
}

impl ProcessTable {
    pub(crate) fn insert(&mut self, name: Rc<str>, future: BoxedBody, now: SimTime) -> ProcessId {
        let id = ProcessId(self.slots.len());
        self.slots.push(ProcessSlot {
            name,
            state: ProcessState::Created,
            future: Some(future),
            joiners: Vec::new(),
            watched: false,
            started_at: now,
        });
        id
    }

    pub(crate) fn get(&self, id: ProcessId) -> Option<&ProcessSlot> {
        self.slots.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: ProcessId) -> Option<&mut ProcessSlot> {
        self.slots.get_mut(id.0)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProcessSlot> {
        self.slots.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Erase the body's value type. The value goes to `outcome`, failures are wrapped with
/// the process name on the way out.
pub(crate) fn wrap_body<F, T>(name: Rc<str>, body: F, outcome: Outcome<T>) -> BoxedBody
where
    F: Future<Output = Result<T, SimError>> + 'static,
    T: 'static,
{
    Box::pin(async move {
        match body.await {
            Ok(value) => {
                *outcome.borrow_mut() = Some(Ok(value));
                Ok(())
            }
            Err(error) => {
                let error = SimError::process_failure(&*name, error);
                *outcome.borrow_mut() = Some(Err(error.clone()));
                Err(error)
            }
        }
    })
}

fn joining_process(env: &EnvInner) -> ProcessId {
    env.active_process()
        .unwrap_or_else(|| panic!("process join awaited outside of a simulation process"))
}

/// Handle to a registered process.
///
/// Awaiting the handle from another process suspends the caller until the process is
/// DONE (yielding its value) or FAILED (yielding [`SimError::ProcessFailure`]). Awaiting
/// a handle counts as observing the process, so its failure is not reported by
/// [`Environment::run`](crate::Environment::run).
pub struct ProcessHandle<T> {
    id: ProcessId,
    name: Rc<str>,
    env: Weak<EnvInner>,
    outcome: Outcome<T>,
    joined_as: Option<ProcessId>,
}

impl<T> ProcessHandle<T> {
    pub(crate) fn new(
        id: ProcessId,
        name: Rc<str>,
        env: Weak<EnvInner>,
        outcome: Outcome<T>,
    ) -> Self {
        Self {
            id,
            name,
            env,
            outcome,
            joined_as: None,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the process reached DONE or FAILED.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    pub fn state(&self) -> Option<ProcessState> {
        self.env.upgrade()?.process_state(self.id)
    }

    /// Mark the process as observed without awaiting it.
    pub fn watch(&self) {
        if let Some(env) = self.env.upgrade() {
            env.mark_watched(self.id);
        }
    }

    fn failure(&self) -> Option<SimError> {
        match &*self.outcome.borrow() {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> ProcessHandle<T> {
    /// The process outcome, once it has finished.
    pub fn value(&self) -> Option<Result<T, SimError>> {
        self.outcome.borrow().clone()
    }
}

impl<T> Clone for ProcessHandle<T> {
    fn clone(&self) -> Self {
        Self::new(
            self.id,
            Rc::clone(&self.name),
            self.env.clone(),
            Rc::clone(&self.outcome),
        )
    }
}

impl<T> fmt::Debug for ProcessHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T: Clone> Future for ProcessHandle<T> {
    type Output = Result<T, SimError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.outcome.borrow().clone() {
            return Poll::Ready(outcome);
        }
        let Some(env) = this.env.upgrade() else {
            return Poll::Pending;
        };
        env.mark_watched(this.id);
        if this.joined_as.is_none() {
            let parent = joining_process(&env);
            env.add_joiner(this.id, parent);
            this.joined_as = Some(parent);
        }
        Poll::Pending
    }
}

impl<T> Drop for ProcessHandle<T> {
    fn drop(&mut self) {
        if let (Some(parent), Some(env)) = (self.joined_as.take(), self.env.upgrade()) {
            env.remove_joiner(self.id, parent);
        }
    }
}

/// Future returned by [`Environment::all_of`](crate::Environment::all_of).
///
/// Every child is observed from the moment the join is created.
/// Failures are reported in handle order; see [`Environment::all_of`](crate::Environment::all_of).
pub struct AllOf<T> {
    env: Weak<EnvInner>,
    handles: Vec<ProcessHandle<T>>,
    joined_as: Option<ProcessId>,
}

impl<T> AllOf<T> {
    pub(crate) fn new(env: Weak<EnvInner>, handles: Vec<ProcessHandle<T>>) -> Self {
        for handle in &handles {
            handle.watch();
        }
        Self {
            env,
            handles,
            joined_as: None,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<T: Clone> Future for AllOf<T> {
    type Output = Result<Vec<T>, SimError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(error) = this.handles.iter().find_map(|handle| handle.failure()) {
            return Poll::Ready(Err(error));
        }
        if this.handles.iter().all(|handle| handle.is_finished()) {
            let values = this
                .handles
                .iter()
                .filter_map(|handle| match handle.value() {
                    Some(Ok(value)) => Some(value),
                    _ => None,
                })
                .collect();
            return Poll::Ready(Ok(values));
        }

        let Some(env) = this.env.upgrade() else {
            return Poll::Pending;
        };
        let parent = *this.joined_as.get_or_insert_with(|| joining_process(&env));
        for handle in this.handles.iter().filter(|h| !h.is_finished()) {
            env.add_joiner(handle.id, parent);
        }
        Poll::Pending
    }
}

impl<T> Drop for AllOf<T> {
    fn drop(&mut self) {
        if let (Some(parent), Some(env)) = (self.joined_as.take(), self.env.upgrade()) {
            for handle in &self.handles {
                env.remove_joiner(handle.id, parent);
            }
        }
    }
}
