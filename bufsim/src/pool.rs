//! Shared pool of serving slots used by stations with the `dynamic`
//! discipline.
//!
//! Dynamic stations keep no local queue. Every arriving customer issues a
//! slot request to the pool; the pool grants slots in request order, across
//! all dynamic stations, as they free up.

use std::collections::VecDeque;

use simcore::{Component, ComponentId, Scheduler, State};

use crate::{station, CustomerId};

/// Events processed by the shared pool.
#[derive(Debug)]
pub enum Event {
    /// A station requests a slot for a customer. With `instant_only`, the
    /// request must be granted immediately or not at all.
    Request {
        /// Station to notify of the outcome.
        station: ComponentId<station::Event>,
        /// Customer the slot is for.
        customer: CustomerId,
        /// Reject instead of queueing when no slot is free.
        instant_only: bool,
    },
    /// A station returns a slot to the pool.
    Release,
    /// A queued request is withdrawn because the customer reneged.
    Cancel {
        /// Customer whose request is withdrawn.
        customer: CustomerId,
    },
}

/// The shared pool component.
pub struct SharedPool {
    idle_slots: usize,
    waiting: VecDeque<(ComponentId<station::Event>, CustomerId)>,
}

impl SharedPool {
    /// Constructs a pool holding `slots` serving slots.
    pub fn new(slots: usize) -> Self {
        Self {
            idle_slots: slots,
            waiting: VecDeque::new(),
        }
    }

    fn grant_next(&mut self, scheduler: &mut Scheduler) {
        while self.idle_slots > 0 {
            match self.waiting.pop_front() {
                Some((station, customer)) => {
                    self.idle_slots -= 1;
                    log::debug!("[{:?}] pool grants a slot to {}", scheduler.time(), customer);
                    scheduler.schedule_immediately(station, station::Event::SlotGranted(customer));
                }
                None => break,
            }
        }
    }
}

impl Component for SharedPool {
    type Event = Event;

    fn process_event(
        &mut self,
        _self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        _state: &mut State,
    ) {
        match event {
            Event::Request {
                station,
                customer,
                instant_only,
            } => {
                if self.idle_slots > 0 && self.waiting.is_empty() {
                    self.idle_slots -= 1;
                    scheduler.schedule_immediately(*station, station::Event::SlotGranted(*customer));
                } else if *instant_only {
                    scheduler
                        .schedule_immediately(*station, station::Event::RequestRejected(*customer));
                } else {
                    self.waiting.push_back((*station, *customer));
                }
            }
            Event::Release => {
                self.idle_slots += 1;
                self.grant_next(scheduler);
            }
            Event::Cancel { customer } => {
                // A grant already in flight is handled lazily by the station.
                self.waiting.retain(|(_, waiting)| waiting != customer);
            }
        }
    }
}
