#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! A small general-purpose discrete-event simulation framework: a virtual
//! clock with a time-ordered event queue, a type-safe value/queue store, and
//! an event-handling component registry.
//!
//! Events scheduled for the same virtual time fire in the order they were
//! scheduled.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Simulation clock.
pub type Clock = Rc<Cell<Duration>>;

pub use component::{Component, ComponentId, Components};
pub use queue::Queue;
pub use scheduler::{ClockRef, EventEntry, Scheduler};
pub use state::{Key, PushError, QueueId, State};

mod component;
mod queue;
mod scheduler;
mod state;

/// The main simulation object: state, scheduler, and registered components.
pub struct Simulation {
    /// Current state of the simulation meant to be mutated by the components.
    pub state: State,
    /// Schedules events and maintains the clock.
    pub scheduler: Scheduler,
    components: Components,
}

impl Default for Simulation {
    fn default() -> Self {
        let state = State::default();
        let components = Components::new(state.hash());
        Self {
            state,
            scheduler: Scheduler::default(),
            components,
        }
    }
}

impl Simulation {
    /// Registers a component and returns its typed ID.
    pub fn add_component<C>(&mut self, component: C) -> ComponentId<C::Event>
    where
        C: Component + 'static,
        C::Event: std::fmt::Debug + 'static,
    {
        self.components.add_component(component)
    }

    /// Creates a new unbounded queue in the state, returning its ID.
    #[must_use]
    pub fn add_queue<V: 'static>(&mut self) -> QueueId<V> {
        self.state.new_queue()
    }

    /// Creates a new bounded queue in the state, returning its ID.
    #[must_use]
    pub fn add_bounded_queue<V: 'static>(&mut self, capacity: usize) -> QueueId<V> {
        self.state.new_bounded_queue(capacity)
    }

    /// Schedules `event` to be executed for `component` at the current time
    /// plus `time`.
    pub fn schedule<E: std::fmt::Debug + 'static>(
        &mut self,
        time: Duration,
        component: ComponentId<E>,
        event: E,
    ) {
        self.scheduler.schedule(time, component, event);
    }

    /// Removes the next event from the queue and lets its target component
    /// process it. Returns `false` if no events are left.
    pub fn step(&mut self) -> bool {
        if let Some(entry) = self.scheduler.pop() {
            self.components
                .process_event_entry(&entry, &mut self.scheduler, &mut self.state);
            true
        } else {
            false
        }
    }

    /// Processes events until none are left.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Processes all events scheduled at or before `time`, leaving later
    /// events in the queue.
    pub fn run_until(&mut self, time: Duration) {
        while self.scheduler.next_event_time().map_or(false, |t| t <= time) {
            self.step();
        }
    }
}
