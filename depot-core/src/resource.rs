//! Counted resources with a FIFO wait queue.
//!
//! A [`Resource`] has a fixed number of slots. [`Resource::request`] takes a free slot
//! immediately or joins the back of the queue; releasing a slot hands it straight to
//! the oldest waiting request, so a slot is never free while someone is queued.
//!
//! ```
//! use depot_core::{Environment, Resource, SimTime};
//!
//! let env = Environment::new();
//! let dock = Resource::new(&env, "dock", 1).unwrap();
//!
//! for name in ["A", "B"] {
//!     let sim = env.clone();
//!     let dock = dock.clone();
//!     env.process(name, async move {
//!         let mut request = dock.acquire().await;
//!         sim.timeout(10.0)?.await;
//!         request.release()
//!     });
//! }
//!
//! env.run(None).unwrap();
//! assert_eq!(env.now(), SimTime::from(20.0));
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use serde::Serialize;
use tracing::{debug, trace};

use crate::environment::EnvInner;
use crate::error::SimError;
use crate::scheduler::{ClockRef, EventHandle, EventKind};
use crate::types::{ProcessId, RequestId};
use crate::{Environment, SimTime};

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestStatus {
    Queued,
    Granted,
    Released,
}

/// Occupancy of a resource right after a change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    pub time: SimTime,
    pub in_use: usize,
    pub queued: usize,
}

struct RequestEntry {
    status: RequestStatus,
    waiter: Option<ProcessId>,
    issued_at: SimTime,
    granted_at: Option<SimTime>,
    grant_event: Option<EventHandle>,
}

struct ResourceState {
    name: String,
    capacity: usize,
    in_use: usize,
    next_request_id: u64,
    queue: VecDeque<RequestId>,
    requests: HashMap<RequestId, RequestEntry>,
    history: Vec<ResourceSample>,
}

impl ResourceState {
    fn record(&mut self, time: SimTime) {
        self.history.push(ResourceSample {
            time,
            in_use: self.in_use,
            queued: self.queue.len(),
        });
    }

    /// Hand free slots to the head of the queue.
    fn grant_waiting(&mut self, env: &EnvInner, now: SimTime) {
        while self.in_use < self.capacity {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            let Some(entry) = self.requests.get_mut(&id) else {
                continue;
            };
            entry.status = RequestStatus::Granted;
            entry.granted_at = Some(now);
            entry.grant_event = entry
                .waiter
                .map(|process| env.schedule_now(process, EventKind::Grant));
            self.in_use += 1;
            debug!(
                resource = %self.name,
                request = %id,
                waited = now.duration_since(entry.issued_at),
                "Queued request granted"
            );
        }
    }
}

/// A counted resource with a FIFO wait queue.
///
/// Cloning gives another handle to the same resource.
#[derive(Clone)]
pub struct Resource {
    env: Weak<EnvInner>,
    clock: ClockRef,
    state: Rc<RefCell<ResourceState>>,
}

impl Resource {
    /// Create a resource with `capacity` slots.
    ///
    /// Fails with [`SimError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(
        env: &Environment,
        name: impl Into<String>,
        capacity: usize,
    ) -> Result<Self, SimError> {
        let name = name.into();
        if capacity == 0 {
            return Err(SimError::InvalidCapacity {
                resource: name,
                capacity,
            });
        }
        let mut state = ResourceState {
            name,
            capacity,
            in_use: 0,
            next_request_id: 0,
            queue: VecDeque::new(),
            requests: HashMap::new(),
            history: Vec::new(),
        };
        state.record(env.now());
        Ok(Self {
            env: env.downgrade(),
            clock: env.clock(),
            state: Rc::new(RefCell::new(state)),
        })
    }

    fn now(&self) -> SimTime {
        self.clock.time()
    }

    /// Ask for a slot.
    ///
    /// The request is granted on the spot if a slot is free, otherwise it waits behind
    /// every request issued before it. Await [`Request::granted`] to suspend until the
    /// slot is handed over.
    pub fn request(&self) -> Request {
        let now = self.now();
        let mut state = self.state.borrow_mut();
        let id = RequestId(state.next_request_id);
        state.next_request_id += 1;

        let granted = state.in_use < state.capacity;
        if granted {
            state.in_use += 1;
        } else {
            state.queue.push_back(id);
        }
        state.requests.insert(
            id,
            RequestEntry {
                status: if granted {
                    RequestStatus::Granted
                } else {
                    RequestStatus::Queued
                },
                waiter: None,
                issued_at: now,
                granted_at: granted.then_some(now),
                grant_event: None,
            },
        );
        state.record(now);
        trace!(
            resource = %state.name,
            request = %id,
            granted,
            in_use = state.in_use,
            queued = state.queue.len(),
            "Resource requested"
        );

        Request {
            resource: self.clone(),
            id,
            released: false,
        }
    }

    /// Request a slot and wait until it is granted.
    pub async fn acquire(&self) -> Request {
        let request = self.request();
        request.granted().await;
        request
    }

    /// Give back the slot held by `request`.
    ///
    /// Fails with [`SimError::InvalidRelease`] if the request belongs to another
    /// resource, is still queued, or was already released.
    pub fn release(&self, request: &mut Request) -> Result<(), SimError> {
        let invalid = |reason| SimError::InvalidRelease {
            resource: self.name(),
            request: request.id,
            reason,
        };
        if !Rc::ptr_eq(&self.state, &request.resource.state) {
            return Err(invalid("request belongs to another resource"));
        }
        if request.released {
            return Err(invalid("request was already released"));
        }
        if request.status() != RequestStatus::Granted {
            return Err(invalid("request has not been granted"));
        }

        request.released = true;
        self.free_slot(request.id);
        Ok(())
    }

    fn free_slot(&self, id: RequestId) {
        let env = self.env.upgrade();
        let now = self.now();
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.requests.remove(&id) {
            if let (Some(event), Some(env)) = (entry.grant_event, env.as_ref()) {
                env.cancel(event);
            }
        }
        state.in_use = state.in_use.saturating_sub(1);
        trace!(resource = %state.name, request = %id, "Resource released");
        if let Some(env) = env.as_ref() {
            state.grant_waiting(env, now);
        }
        state.record(now);
    }

    fn withdraw(&self, id: RequestId) {
        let now = self.now();
        let mut state = self.state.borrow_mut();
        state.queue.retain(|queued| *queued != id);
        state.requests.remove(&id);
        trace!(resource = %state.name, request = %id, "Queued request withdrawn");
        state.record(now);
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Number of slots currently held.
    pub fn count(&self) -> usize {
        self.state.borrow().in_use
    }

    /// Number of requests waiting for a slot.
    pub fn queue_len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Occupancy after every change, oldest first. The first sample is taken when the
    /// resource is created.
    pub fn history(&self) -> Vec<ResourceSample> {
        self.state.borrow().history.clone()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Resource")
            .field("name", &state.name)
            .field("capacity", &state.capacity)
            .field("in_use", &state.in_use)
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// A claim on one slot of a [`Resource`].
///
/// Dropping a granted request releases its slot and dropping a queued one leaves the
/// queue, so a process that is abandoned or fails never keeps a slot.
#[must_use = "dropping a request releases it immediately"]
pub struct Request {
    resource: Resource,
    id: RequestId,
    released: bool,
}

impl Request {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn status(&self) -> RequestStatus {
        if self.released {
            return RequestStatus::Released;
        }
        self.resource
            .state
            .borrow()
            .requests
            .get(&self.id)
            .map(|entry| entry.status)
            .unwrap_or(RequestStatus::Released)
    }

    pub fn issued_at(&self) -> Option<SimTime> {
        self.entry(|entry| entry.issued_at)
    }

    pub fn granted_at(&self) -> Option<SimTime> {
        self.entry(|entry| entry.granted_at).flatten()
    }

    fn entry<R>(&self, f: impl FnOnce(&RequestEntry) -> R) -> Option<R> {
        self.resource.state.borrow().requests.get(&self.id).map(f)
    }

    /// Wait until the slot is handed to this request.
    ///
    /// Completes without suspending if the request was granted on the spot.
    pub fn granted(&self) -> Granted<'_> {
        Granted { request: self }
    }

    /// Shorthand for [`Resource::release`].
    pub fn release(&mut self) -> Result<(), SimError> {
        let resource = self.resource.clone();
        resource.release(self)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("resource", &self.resource.name())
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.status() {
            RequestStatus::Granted => self.resource.free_slot(self.id),
            RequestStatus::Queued => self.resource.withdraw(self.id),
            RequestStatus::Released => {}
        }
    }
}

/// Future returned by [`Request::granted`].
pub struct Granted<'a> {
    request: &'a Request,
}

impl Future for Granted<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let request = self.request;
        let env = request.resource.env.upgrade();
        let mut state = request.resource.state.borrow_mut();
        let Some(entry) = state.requests.get_mut(&request.id) else {
            return Poll::Ready(());
        };
        match entry.status {
            RequestStatus::Granted => match (entry.grant_event, env.as_ref()) {
                (Some(event), Some(env)) if env.is_pending(event) => Poll::Pending,
                _ => {
                    entry.grant_event = None;
                    Poll::Ready(())
                }
            },
            RequestStatus::Released => Poll::Ready(()),
            RequestStatus::Queued => {
                if let Some(env) = env {
                    let process = env.active_process().unwrap_or_else(|| {
                        panic!("resource request awaited outside of a simulation process")
                    });
                    entry.waiter = Some(process);
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_rejected() {
        let env = Environment::new();
        assert!(matches!(
            Resource::new(&env, "trucks", 0),
            Err(SimError::InvalidCapacity { capacity: 0, .. })
        ));
    }

    #[test]
    fn test_request_granted_immediately_when_free() {
        let env = Environment::new();
        let trucks = Resource::new(&env, "trucks", 2).unwrap();
        let a = trucks.request();
        let b = trucks.request();
        let c = trucks.request();

        assert_eq!(a.status(), RequestStatus::Granted);
        assert_eq!(b.status(), RequestStatus::Granted);
        assert_eq!(c.status(), RequestStatus::Queued);
        assert_eq!(trucks.count(), 2);
        assert_eq!(trucks.queue_len(), 1);
    }

    #[test]
    fn test_release_hands_slot_to_queue_head() {
        let env = Environment::new();
        let trucks = Resource::new(&env, "trucks", 1).unwrap();
        let mut a = trucks.request();
        let b = trucks.request();
        let c = trucks.request();

        a.release().unwrap();
        assert_eq!(a.status(), RequestStatus::Released);
        assert_eq!(b.status(), RequestStatus::Granted);
        assert_eq!(c.status(), RequestStatus::Queued);
        assert_eq!(trucks.count(), 1);
        assert_eq!(trucks.queue_len(), 1);
    }

    #[test]
    fn test_invalid_releases() {
        let env = Environment::new();
        let trucks = Resource::new(&env, "trucks", 1).unwrap();
        let docks = Resource::new(&env, "docks", 1).unwrap();
        let mut held = trucks.request();
        let mut queued = trucks.request();

        assert!(matches!(
            queued.release(),
            Err(SimError::InvalidRelease { .. })
        ));
        assert!(matches!(
            docks.release(&mut held),
            Err(SimError::InvalidRelease { .. })
        ));
        held.release().unwrap();
        assert!(matches!(
            held.release(),
            Err(SimError::InvalidRelease { .. })
        ));
        assert_eq!(trucks.count(), 1);
    }

    #[test]
    fn test_drop_releases_or_withdraws() {
        let env = Environment::new();
        let trucks = Resource::new(&env, "trucks", 1).unwrap();
        let held = trucks.request();
        let queued = trucks.request();
        let last = trucks.request();

        drop(queued);
        assert_eq!(trucks.queue_len(), 1);
        drop(held);
        assert_eq!(last.status(), RequestStatus::Granted);
        assert_eq!(trucks.count(), 1);
        assert_eq!(trucks.queue_len(), 0);
    }

    #[test]
    fn test_history_tracks_occupancy() {
        let env = Environment::new();
        let trucks = Resource::new(&env, "trucks", 1).unwrap();
        for name in ["A", "B"] {
            let sim = env.clone();
            let trucks = trucks.clone();
            env.process(name, async move {
                let mut request = trucks.acquire().await;
                sim.timeout(10.0)?.await;
                request.release()
            });
        }
        env.run(None).unwrap();

        let history = trucks.history();
        let last = history.last().unwrap();
        assert_eq!(last.time, SimTime::from(20.0));
        assert_eq!((last.in_use, last.queued), (0, 0));
        assert!(history.iter().any(|s| s.in_use == 1 && s.queued == 1));
    }

    #[test]
    fn test_queue_only_holds_requests_while_full() {
        let env = Environment::new();
        let dock = Resource::new(&env, "dock", 2).unwrap();
        let withdrawn = Rc::new(std::cell::Cell::new(0));

        for i in 0..30u32 {
            let sim = env.clone();
            let dock = dock.clone();
            let withdrawn = Rc::clone(&withdrawn);
            env.process(format!("worker {i}"), async move {
                sim.timeout(f64::from(i % 7))?.await;
                let mut request = dock.request();
                if i % 5 == 0 {
                    // Give up after a while, queued or not.
                    sim.timeout(0.5)?.await;
                    if request.status() == RequestStatus::Queued {
                        withdrawn.set(withdrawn.get() + 1);
                    }
                    drop(request);
                    return Ok(());
                }
                request.granted().await;
                sim.timeout(f64::from(1 + i % 3))?.await;
                request.release()
            });
        }
        env.run(None).unwrap();

        assert!(withdrawn.get() > 0);
        let history = dock.history();
        for sample in &history {
            assert!(sample.in_use <= 2, "{sample:?}");
            if sample.queued > 0 {
                assert_eq!(sample.in_use, 2, "queued while a slot is free: {sample:?}");
            }
        }
        assert!(history.iter().any(|s| s.queued > 0));
        assert_eq!(dock.count(), 0);
        assert_eq!(dock.queue_len(), 0);
    }

    #[test]
    fn test_granted_at_records_wait() {
        let env = Environment::new();
        let trucks = Resource::new(&env, "trucks", 1).unwrap();
        let waits = Rc::new(RefCell::new(Vec::new()));
        for name in ["A", "B"] {
            let sim = env.clone();
            let trucks = trucks.clone();
            let waits = Rc::clone(&waits);
            env.process(name, async move {
                let request = trucks.request();
                request.granted().await;
                let issued = request.issued_at().unwrap_or_default();
                let granted = request.granted_at().unwrap_or_default();
                waits.borrow_mut().push(granted - issued);
                sim.timeout(4.0)?.await;
                Ok(())
            });
        }
        env.run(None).unwrap();
        assert_eq!(*waits.borrow(), vec![0.0, 4.0]);
    }
}
