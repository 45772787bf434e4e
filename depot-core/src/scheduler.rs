use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SimError;
use crate::types::{EventId, ProcessId};
use crate::SimTime;

/// Why a process is being resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// First resumption of a freshly registered process.
    Start,
    /// A `timeout` elapsed.
    Timeout,
    /// A queued resource request was granted.
    Grant,
    /// An awaited child process reached a terminal state.
    Join,
    /// The process waker was triggered by a future outside the engine primitives.
    Wake,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Start => "start",
            EventKind::Timeout => "timeout",
            EventKind::Grant => "grant",
            EventKind::Join => "join",
            EventKind::Wake => "wake",
        };
        f.write_str(name)
    }
}

/// What happens when an event fires: process `process` is resumed because of `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub process: ProcessId,
    pub kind: EventKind,
}

impl Continuation {
    pub fn new(process: ProcessId, kind: EventKind) -> Self {
        Self { process, kind }
    }
}

/// Entry stored in the scheduler's queue.
///
/// Entries are ordered by fire time and then by insertion sequence, so events sharing a
/// fire time come out in the order they were scheduled.
#[derive(Debug, Clone)]
pub struct EventEntry {
    id: EventId,
    time: SimTime,
    continuation: Continuation,
}

impl EventEntry {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn continuation(&self) -> Continuation {
        self.continuation
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior in BinaryHeap.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Handle to a scheduled event, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHandle {
    id: EventId,
    time: SimTime,
}

impl EventHandle {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn time(&self) -> SimTime {
        self.time
    }
}

type Clock = Rc<Cell<SimTime>>;

/// This struct exposes only immutable access to the simulation clock.
/// The clock itself is owned by the scheduler, while others can obtain `ClockRef`
/// to read the current simulation time.
///
/// # Example
///
/// ```
/// # use depot_core::Scheduler;
/// let scheduler = Scheduler::default();
/// let clock_ref = scheduler.clock();
/// assert_eq!(clock_ref.time(), scheduler.time());
/// ```
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
///
/// Cancelled events stay in the heap and are discarded when they reach the front.
pub struct Scheduler {
    next_event_id: u64,
    events: BinaryHeap<EventEntry>,
    live: HashSet<EventId>,
    clock: Clock,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            next_event_id: 0,
            events: BinaryHeap::default(),
            live: HashSet::new(),
            clock: Rc::new(Cell::new(SimTime::zero())),
        }
    }
}

impl Scheduler {
    /// Schedules `continuation` to fire at the absolute time `time`.
    ///
    /// Fails with [`SimError::ScheduleInPast`] if `time` is before the current time.
    pub fn schedule(
        &mut self,
        time: SimTime,
        continuation: Continuation,
    ) -> Result<EventHandle, SimError> {
        let now = self.time();
        if time < now {
            return Err(SimError::ScheduleInPast {
                time: time.as_f64(),
                now: now.as_f64(),
            });
        }

        Ok(self.push(time, continuation))
    }

    /// Schedules `continuation` to fire `delay` units after the current time.
    pub fn schedule_in(
        &mut self,
        delay: f64,
        continuation: Continuation,
    ) -> Result<EventHandle, SimError> {
        let time = self.time().checked_add(delay)?;
        self.schedule(time, continuation)
    }

    /// Schedules `continuation` to fire at the current time, behind every event already
    /// scheduled for this instant.
    pub fn schedule_now(&mut self, continuation: Continuation) -> EventHandle {
        let time = self.time();
        self.push(time, continuation)
    }

    /// Cancels a scheduled event. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        let removed = self.live.remove(&handle.id);
        if removed {
            trace!(event_id = %handle.id, "Event cancelled");
        }
        removed
    }

    /// Whether the event behind `handle` is still waiting to fire.
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.live.contains(&handle.id)
    }

    /// Drops every pending event. The clock keeps its value.
    pub fn clear(&mut self) {
        self.events.clear();
        self.live.clear();
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Number of pending (not cancelled) events.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns a reference to the next scheduled event or `None` if none are left.
    pub fn peek(&mut self) -> Option<&EventEntry> {
        self.discard_cancelled();
        self.events.peek()
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    /// The clock advances to the event's fire time.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.discard_cancelled();
        let event = self.events.pop()?;
        self.live.remove(&event.id);
        self.clock.set(event.time);
        Some(event)
    }

    /// Moves the clock forward to `time` without firing anything.
    pub(crate) fn advance_to(&mut self, time: SimTime) {
        debug_assert!(time >= self.time(), "simulation clock cannot move backward");
        self.clock.set(self.time().max(time));
    }

    fn push(&mut self, time: SimTime, continuation: Continuation) -> EventHandle {
        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        trace!(
            event_id = %id,
            time = %time,
            process = %continuation.process,
            kind = %continuation.kind,
            "Event scheduled"
        );
        self.events.push(EventEntry {
            id,
            time,
            continuation,
        });
        self.live.insert(id);
        EventHandle { id, time }
    }

    fn discard_cancelled(&mut self) {
        while let Some(head) = self.events.peek() {
            if self.live.contains(&head.id) {
                break;
            }
            self.events.pop();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn resume(process: usize) -> Continuation {
        Continuation::new(ProcessId(process), EventKind::Timeout)
    }

    #[test]
    fn test_clock_ref() {
        let time = SimTime::from(1.0);
        let clock = Clock::new(Cell::new(time));
        let clock_ref = ClockRef::from(clock);
        assert_eq!(clock_ref.time(), time);
    }

    #[test]
    fn test_event_entry_cmp() {
        let entry = |id: u64, time: f64| EventEntry {
            id: EventId(id),
            time: SimTime::from(time),
            continuation: resume(0),
        };

        // Earlier time wins regardless of sequence.
        assert_eq!(entry(5, 0.0).cmp(&entry(1, 1.0)), Ordering::Greater);
        assert_eq!(entry(1, 2.0).cmp(&entry(3, 1.0)), Ordering::Less);
        // Equal times fall back to the insertion sequence.
        assert_eq!(entry(1, 1.0).cmp(&entry(2, 1.0)), Ordering::Greater);
        assert_eq!(entry(2, 1.0), entry(2, 1.0));
    }

    #[test]
    fn test_scheduler() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.time(), SimTime::zero());
        assert_eq!(scheduler.clock().time(), SimTime::zero());
        assert!(scheduler.is_empty());

        scheduler.schedule_in(1.0, resume(0)).unwrap();
        scheduler.schedule_now(resume(1));
        scheduler.schedule_in(2.0, resume(1)).unwrap();
        assert_eq!(scheduler.len(), 3);

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.time(), SimTime::zero());
        assert_eq!(entry.continuation().process, ProcessId(1));
        assert_eq!(scheduler.time(), SimTime::zero());

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.time(), SimTime::from(1.0));
        assert_eq!(entry.continuation().process, ProcessId(0));
        assert_eq!(scheduler.time(), SimTime::from(1.0));
        assert_eq!(scheduler.clock().time(), SimTime::from(1.0));

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.time(), SimTime::from(2.0));
        assert_eq!(scheduler.time(), SimTime::from(2.0));

        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_equal_times_pop_in_insertion_order() {
        let mut scheduler = Scheduler::default();
        for process in 0..20 {
            scheduler.schedule_in(5.0, resume(process)).unwrap();
        }
        scheduler.schedule_in(1.0, resume(99)).unwrap();

        assert_eq!(scheduler.pop().unwrap().continuation().process, ProcessId(99));
        let order: Vec<usize> = std::iter::from_fn(|| scheduler.pop())
            .map(|e| e.continuation().process.0)
            .collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_pop_order_is_non_decreasing() {
        let mut scheduler = Scheduler::default();
        let delays = [7.5, 0.0, 3.25, 3.25, 12.0, 0.5, 7.5, 1.0];
        for (i, delay) in delays.iter().enumerate() {
            scheduler.schedule_in(*delay, resume(i)).unwrap();
        }

        let mut last: Option<EventEntry> = None;
        while let Some(entry) = scheduler.pop() {
            if let Some(prev) = &last {
                assert!(prev.time() <= entry.time());
                if prev.time() == entry.time() {
                    assert!(prev.id() < entry.id());
                }
            }
            last = Some(entry);
        }
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::default();
        let first = scheduler.schedule_in(1.0, resume(0)).unwrap();
        scheduler.schedule_in(2.0, resume(1)).unwrap();

        assert!(scheduler.is_pending(first));
        assert!(scheduler.cancel(first));
        assert!(!scheduler.is_pending(first));
        assert!(!scheduler.cancel(first));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.peek().unwrap().time(), SimTime::from(2.0));

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.continuation().process, ProcessId(1));
        assert!(!scheduler.cancel(EventHandle {
            id: entry.id(),
            time: entry.time()
        }));
        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_schedule_rejects_past_and_negative_delay() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_in(4.0, resume(0)).unwrap();
        scheduler.pop();

        assert!(matches!(
            scheduler.schedule(SimTime::from(1.0), resume(0)),
            Err(SimError::ScheduleInPast { .. })
        ));
        assert!(matches!(
            scheduler.schedule_in(-1.0, resume(0)),
            Err(SimError::InvalidDuration { .. })
        ));
    }
}
