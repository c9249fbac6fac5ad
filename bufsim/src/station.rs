//! Food station component.
//!
//! A station has a fixed physical capacity covering everyone inside it,
//! waiting or being served. Stations with a local discipline own their
//! serving slots; dynamic stations borrow slots from the shared
//! [`pool`](crate::pool).

use std::collections::HashMap;
use std::time::Duration;

use simcore::{Component, ComponentId, Key, Scheduler, State};

use crate::analysis::Analysis;
use crate::customer::{CustomerRegistry, CustomerType};
use crate::discipline::{Discipline, WaitingEntry};
use crate::{duration_from_secs, pool, router, CustomerId, SimRng, StationId, VisitOutcome};

/// Events processed by a station.
#[derive(Debug)]
pub enum Event {
    /// A customer routed here tries to enter.
    Arrival(CustomerId),
    /// A waiting customer's patience timer fired. Stale timers carry a token
    /// that no longer matches and are ignored.
    PatienceExpired {
        /// The customer whose timer fired.
        customer: CustomerId,
        /// Token issued when the customer joined the queue.
        token: u64,
    },
    /// A customer's service is complete.
    ServiceFinished {
        /// The served customer.
        customer: CustomerId,
        /// When the service started.
        started: Duration,
    },
    /// The shared pool granted a requested slot.
    SlotGranted(CustomerId),
    /// The shared pool rejected an instant-only request.
    RequestRejected(CustomerId),
}

/// Free-space counters for all stations.
///
/// Kept in the simulation state so the router can check for full stations
/// without asking the station components.
pub struct Occupancy {
    free: Vec<usize>,
    capacity: Vec<usize>,
}

impl Occupancy {
    /// Constructs counters for stations with the given capacities, all empty.
    pub fn new(capacities: Vec<usize>) -> Self {
        Self {
            free: capacities.clone(),
            capacity: capacities,
        }
    }

    /// Free space left at `station`.
    pub fn free_space(&self, station: StationId) -> usize {
        self.free[usize::from(station)]
    }

    /// Whether `station` can admit another customer.
    pub fn has_space(&self, station: StationId) -> bool {
        self.free_space(station) > 0
    }

    /// Claims one unit of space at `station`. Returns `false` if the station
    /// is full.
    pub fn try_acquire(&mut self, station: StationId) -> bool {
        let free = &mut self.free[usize::from(station)];
        if *free > 0 {
            *free -= 1;
            true
        } else {
            false
        }
    }

    /// Returns one unit of space to `station`.
    ///
    /// # Panics
    ///
    /// Panics if the station is already empty; that means acquire and release
    /// calls are unbalanced.
    pub fn release(&mut self, station: StationId) {
        let idx = usize::from(station);
        assert!(
            self.free[idx] < self.capacity[idx],
            "station {} released more space than it has",
            station
        );
        self.free[idx] += 1;
    }
}

/// Where a station's serving slots come from.
pub enum Slots {
    /// The station owns its slots and queues waiting customers locally.
    Local {
        /// Slots not serving anyone right now.
        idle: usize,
        /// Queue of waiting customers.
        discipline: Box<dyn Discipline>,
    },
    /// Slots are borrowed from the shared pool; requests queue there.
    Shared {
        /// The pool component.
        pool: ComponentId<pool::Event>,
    },
}

/// A single food station.
pub struct Station {
    id: StationId,
    name: String,
    slots: Slots,
    router: ComponentId<router::Event>,
    customers: Key<CustomerRegistry>,
    analysis: Key<Analysis>,
    occupancy: Key<Occupancy>,
    erratic_delay: f64,
    /// Customers currently waiting here, with the token issued when they
    /// joined. The token invalidates patience timers from earlier visits.
    waiting: HashMap<CustomerId, u64>,
    token_seq: u64,
    rng: SimRng,
}

impl Station {
    /// Constructs a station.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: StationId,
        name: String,
        slots: Slots,
        router: ComponentId<router::Event>,
        customers: Key<CustomerRegistry>,
        analysis: Key<Analysis>,
        occupancy: Key<Occupancy>,
        erratic_delay: f64,
        rng: SimRng,
    ) -> Self {
        Self {
            id,
            name,
            slots,
            router,
            customers,
            analysis,
            occupancy,
            erratic_delay,
            waiting: HashMap::new(),
            token_seq: 0,
            rng,
        }
    }

    fn analysis<'a>(&self, state: &'a mut State) -> &'a mut Analysis {
        state
            .get_mut(self.analysis)
            .expect("analysis lives in the state")
    }

    fn customers<'a>(&self, state: &'a mut State) -> &'a mut CustomerRegistry {
        state
            .get_mut(self.customers)
            .expect("customer registry lives in the state")
    }

    fn occupancy<'a>(&self, state: &'a mut State) -> &'a mut Occupancy {
        state
            .get_mut(self.occupancy)
            .expect("occupancy lives in the state")
    }

    fn issue_token(&mut self, customer: CustomerId) -> u64 {
        let token = self.token_seq;
        self.token_seq += 1;
        self.waiting.insert(customer, token);
        token
    }

    fn handle_arrival(
        &mut self,
        self_id: ComponentId<Event>,
        customer: CustomerId,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let now = scheduler.time();
        self.analysis(state).record_attempt(self.id);
        if !self.occupancy(state).try_acquire(self.id) {
            let analysis = self.analysis(state);
            analysis.record_blocking_event(self.id);
            analysis.record_balked();
            log::debug!("[{:?}] {} balks at full station {}", now, customer, self.name);
            scheduler.schedule_immediately(
                self.router,
                router::Event::VisitFinished {
                    customer,
                    outcome: VisitOutcome::Balked,
                },
            );
            return;
        }
        let (patience, rank) = {
            let customer = self
                .customers(state)
                .get_mut(customer)
                .expect("routed customers are registered");
            customer.set_wait_start(now);
            (customer.patience(), customer.service_sample(self.id))
        };
        enum Admission {
            Serve,
            RenegeNow,
            Queued,
            Requested,
        }
        let admission = match &mut self.slots {
            Slots::Local { idle, discipline } => {
                if *idle > 0 {
                    debug_assert!(discipline.is_empty(), "an idle slot implies an empty queue");
                    *idle -= 1;
                    Admission::Serve
                } else if patience <= 0.0 {
                    Admission::RenegeNow
                } else {
                    discipline.enqueue(WaitingEntry {
                        customer,
                        enqueued_at: now,
                        rank,
                    });
                    Admission::Queued
                }
            }
            Slots::Shared { pool } => {
                scheduler.schedule_immediately(
                    *pool,
                    pool::Event::Request {
                        station: self_id,
                        customer,
                        instant_only: patience <= 0.0,
                    },
                );
                Admission::Requested
            }
        };
        match admission {
            Admission::Serve => self.begin_service(self_id, customer, scheduler, state),
            Admission::RenegeNow => self.renege(customer, scheduler, state),
            Admission::Queued | Admission::Requested => {
                let token = self.issue_token(customer);
                if patience > 0.0 && patience.is_finite() {
                    scheduler.schedule(
                        duration_from_secs(patience),
                        self_id,
                        Event::PatienceExpired { customer, token },
                    );
                }
            }
        }
    }

    fn begin_service(
        &mut self,
        self_id: ComponentId<Event>,
        customer: CustomerId,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let now = scheduler.time();
        let (wait, sample) = {
            let entry = self
                .customers(state)
                .get(customer)
                .expect("serving customers are registered");
            assert!(
                !entry.is_reneged(),
                "a slot was dispatched to a customer who already reneged"
            );
            (now - entry.wait_start(), entry.service_sample(self.id))
        };
        self.analysis(state).record_wait(self.id, wait);
        log::debug!(
            "[{:?}] {} starts service at {} after waiting {:?}",
            now,
            customer,
            self.name,
            wait
        );
        scheduler.schedule(
            duration_from_secs(sample),
            self_id,
            Event::ServiceFinished {
                customer,
                started: now,
            },
        );
    }

    fn renege(&mut self, customer: CustomerId, scheduler: &mut Scheduler, state: &mut State) {
        let now = scheduler.time();
        let wait = {
            let entry = self
                .customers(state)
                .get_mut(customer)
                .expect("waiting customers are registered");
            entry.mark_reneged();
            now - entry.wait_start()
        };
        let analysis = self.analysis(state);
        analysis.record_wait(self.id, wait);
        analysis.record_reneging_event();
        self.occupancy(state).release(self.id);
        log::debug!(
            "[{:?}] {} reneges at {} after waiting {:?}",
            now,
            customer,
            self.name,
            wait
        );
        scheduler.schedule_immediately(
            self.router,
            router::Event::VisitFinished {
                customer,
                outcome: VisitOutcome::Reneged,
            },
        );
    }

    fn handle_patience_expired(
        &mut self,
        customer: CustomerId,
        token: u64,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        match self.waiting.get(&customer) {
            Some(&current) if current == token => {}
            // Timer from an earlier visit, or the customer was served in the
            // meantime.
            _ => return,
        }
        self.waiting.remove(&customer);
        match &mut self.slots {
            Slots::Local { discipline, .. } => discipline.cancel(customer),
            Slots::Shared { pool } => {
                scheduler.schedule_immediately(*pool, pool::Event::Cancel { customer });
            }
        }
        self.renege(customer, scheduler, state);
    }

    fn handle_service_finished(
        &mut self,
        self_id: ComponentId<Event>,
        customer: CustomerId,
        started: Duration,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let now = scheduler.time();
        self.analysis(state).record_service(self.id, now - started);
        let customer_type = self
            .customers(state)
            .get(customer)
            .expect("served customers are registered")
            .customer_type();
        if customer_type == CustomerType::Erratic && self.erratic_delay > 0.0 {
            let affected: Vec<CustomerId> = self.waiting.keys().copied().collect();
            log::debug!(
                "[{:?}] erratic {} delays {} waiting customers at {}",
                now,
                customer,
                affected.len(),
                self.name
            );
            let registry = self.customers(state);
            for other in affected {
                registry
                    .get_mut(other)
                    .expect("waiting customers are registered")
                    .add_service_delta(self.id, self.erratic_delay);
            }
        }
        let next = match &mut self.slots {
            Slots::Local { idle, discipline } => {
                *idle += 1;
                let mut rng = self.rng.borrow_mut();
                let next = discipline.select_next(now, &mut *rng);
                if next.is_some() {
                    *idle -= 1;
                }
                next
            }
            Slots::Shared { pool } => {
                scheduler.schedule_immediately(*pool, pool::Event::Release);
                None
            }
        };
        self.occupancy(state).release(self.id);
        scheduler.schedule_immediately(
            self.router,
            router::Event::VisitFinished {
                customer,
                outcome: VisitOutcome::Served,
            },
        );
        if let Some(next) = next {
            self.waiting.remove(&next);
            self.begin_service(self_id, next, scheduler, state);
        }
    }

    fn handle_slot_granted(
        &mut self,
        self_id: ComponentId<Event>,
        customer: CustomerId,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let pool = match &self.slots {
            Slots::Shared { pool } => *pool,
            Slots::Local { .. } => panic!("local stations do not use the shared pool"),
        };
        if self.waiting.remove(&customer).is_some() {
            self.begin_service(self_id, customer, scheduler, state);
        } else {
            // The customer reneged while the grant was in flight.
            scheduler.schedule_immediately(pool, pool::Event::Release);
        }
    }

    fn handle_request_rejected(
        &mut self,
        customer: CustomerId,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        self.waiting.remove(&customer);
        self.renege(customer, scheduler, state);
    }
}

impl Component for Station {
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        match *event {
            Event::Arrival(customer) => self.handle_arrival(self_id, customer, scheduler, state),
            Event::PatienceExpired { customer, token } => {
                self.handle_patience_expired(customer, token, scheduler, state);
            }
            Event::ServiceFinished { customer, started } => {
                self.handle_service_finished(self_id, customer, started, scheduler, state);
            }
            Event::SlotGranted(customer) => {
                self.handle_slot_granted(self_id, customer, scheduler, state);
            }
            Event::RequestRejected(customer) => {
                self.handle_request_rejected(customer, scheduler, state);
            }
        }
    }
}
