use std::any::{Any, TypeId};
use std::cell::Cell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::{Clock, ComponentId};

/// Entry type stored in the scheduler, including the event value, component
/// ID, and the time when it is supposed to occur.
///
/// Entries are ordered by time, and entries with equal times by the order in
/// which they were scheduled. This makes the processing order of
/// equal-timestamp events deterministic.
#[derive(Debug)]
pub struct EventEntry {
    time: Reverse<Duration>,
    sequence: Reverse<u64>,
    component: usize,
    inner: Box<dyn Any>,
    event_type: TypeId,
    state_hash: u64,
}

impl EventEntry {
    /// Tries to downcast the event entry to one holding an event of type `E`.
    /// If it fails, returns `None`.
    #[must_use]
    pub fn downcast<E: fmt::Debug + 'static>(&self) -> Option<EventEntryTyped<'_, E>> {
        if self.event_type == TypeId::of::<E>() {
            let event = self.inner.downcast_ref::<E>().unwrap();
            Some(EventEntryTyped {
                time: self.time.0,
                component_id: ComponentId::new(self.component, self.state_hash),
                component_idx: self.component,
                event,
            })
        } else {
            None
        }
    }

    /// Index of the component this event is addressed to.
    #[must_use]
    pub fn component_idx(&self) -> usize {
        self.component
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
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
        self.time
            .cmp(&other.time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// An event entry that was successfully downcast to the event type `E`.
#[derive(Debug)]
pub struct EventEntryTyped<'e, E: fmt::Debug> {
    /// Time when the event occurs.
    pub time: Duration,
    /// Typed ID of the target component.
    pub component_id: ComponentId<E>,
    /// Index of the target component.
    pub component_idx: usize,
    /// The event itself.
    pub event: &'e E,
}

/// This struct has only immutable access to the simulation clock exposed.
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
    pub fn time(&self) -> Duration {
        self.clock.get()
    }
}

/// Scheduler is used to keep the current time and information about the
/// upcoming events.
pub struct Scheduler {
    events: BinaryHeap<EventEntry>,
    clock: Clock,
    sequence: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            events: BinaryHeap::new(),
            clock: Rc::new(Cell::new(Duration::default())),
            sequence: 0,
        }
    }
}

impl Scheduler {
    /// Schedules `event` to be executed for `component` at `self.time() + time`.
    pub fn schedule<E: fmt::Debug + 'static>(
        &mut self,
        time: Duration,
        component: ComponentId<E>,
        event: E,
    ) {
        let time = self.time() + time;
        let sequence = self.sequence;
        self.sequence += 1;
        self.events.push(EventEntry {
            time: Reverse(time),
            sequence: Reverse(sequence),
            component: component.idx(),
            inner: Box::new(event),
            event_type: TypeId::of::<E>(),
            state_hash: component.state_hash(),
        });
    }

    /// Schedules `event` to be executed for `component` at `self.time()`.
    pub fn schedule_immediately<E: fmt::Debug + 'static>(
        &mut self,
        component: ComponentId<E>,
        event: E,
    ) {
        self.schedule(Duration::default(), component, event);
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Returns the time of the next scheduled event, if any.
    #[must_use]
    pub fn next_event_time(&self) -> Option<Duration> {
        self.events.peek().map(|e| e.time.0)
    }

    /// Removes and returns the next scheduled event or `None` if none are
    /// left. Advances the clock to the time of the returned event.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.events.pop().map(|e| {
            debug_assert!(e.time.0 >= self.clock.get(), "clock must be monotonic");
            self.clock.replace(e.time.0);
            e
        })
    }
}
