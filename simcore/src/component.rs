use std::fmt;
use std::marker::PhantomData;

use crate::{EventEntry, Scheduler, State};

/// Identifies a simulation component along with its event type.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ComponentId<E> {
    id: usize,
    state_hash: u64,
    _marker: PhantomData<E>,
}

impl<E> Clone for ComponentId<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }
}
impl<E> Copy for ComponentId<E> {}

impl<E> ComponentId<E> {
    pub(crate) fn new(id: usize, state_hash: u64) -> Self {
        Self {
            id,
            state_hash,
            _marker: PhantomData,
        }
    }

    pub(crate) fn idx(self) -> usize {
        self.id
    }

    pub(crate) fn state_hash(self) -> u64 {
        self.state_hash
    }
}

/// A simulation component processes events of its associated type, scheduled
/// for it by itself or by other components.
pub trait Component {
    /// Type of events processed by this component.
    type Event;

    /// Reacts to `event`, potentially mutating the state and scheduling
    /// further events.
    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    );
}

type EventHandler = Box<dyn FnMut(&EventEntry, &mut Scheduler, &mut State)>;

/// Registry of all components of a simulation.
///
/// Components are stored type-erased behind dispatch closures, so components
/// with arbitrary event types can live in one registry, while scheduling
/// remains statically typed through [`ComponentId`].
pub struct Components {
    handlers: Vec<EventHandler>,
    state_hash: u64,
}

impl Components {
    /// Constructs an empty registry tied to the state identified by `state_hash`.
    #[must_use]
    pub fn new(state_hash: u64) -> Self {
        Self {
            handlers: Vec::new(),
            state_hash,
        }
    }

    /// Registers `component` and returns its typed ID.
    pub fn add_component<C>(&mut self, component: C) -> ComponentId<C::Event>
    where
        C: Component + 'static,
        C::Event: fmt::Debug + 'static,
    {
        let id = self.handlers.len();
        let mut component = component;
        self.handlers
            .push(Box::new(move |entry, scheduler, state| {
                let entry = entry
                    .downcast::<C::Event>()
                    .expect("event addressed to a component of a different event type");
                component.process_event(entry.component_id, entry.event, scheduler, state);
            }));
        ComponentId::new(id, self.state_hash)
    }

    /// Routes `entry` to the component it is addressed to.
    ///
    /// # Panics
    ///
    /// Panics if the entry's component index is unknown or if the event type
    /// does not match the component's event type; either indicates a
    /// scheduling bug.
    pub fn process_event_entry(
        &mut self,
        entry: &EventEntry,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let handler = self
            .handlers
            .get_mut(entry.component_idx())
            .expect("event addressed to an unknown component");
        handler(entry, scheduler, state);
    }
}
