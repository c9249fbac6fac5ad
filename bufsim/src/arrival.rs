//! Poisson arrival generator, one per entrance gate.
//!
//! Every generated customer is fully sampled at the door: type, patience, and
//! one service time per station. The generator then hands the customer to the
//! router through the entry queue and schedules its own next arrival, until
//! the next arrival would fall past the horizon.

use std::time::Duration;

use rand::distributions::{Uniform, WeightedIndex};
use rand::prelude::Distribution;
use rand_distr::Exp;

use simcore::{Component, ComponentId, Key, QueueId, Scheduler, State};

use crate::analysis::Analysis;
use crate::customer::{Customer, CustomerRegistry, CustomerType};
use crate::{duration_from_secs, router, CustomerId, GateId, SimRng};

/// Events processed by an arrival generator.
#[derive(Debug)]
pub enum Event {
    /// Generate the next customer.
    NewCustomer,
}

/// How customers of one type are sampled.
#[derive(Debug, Clone)]
pub struct TypeProfile {
    /// The type being sampled.
    pub customer_type: CustomerType,
    /// Patience range in seconds.
    pub patience: (f64, f64),
    /// Multiplier applied to every service sample.
    pub service_multiplier: f64,
}

/// Arrival generator component for a single gate.
pub struct ArrivalGenerator {
    gate: GateId,
    horizon: Duration,
    inter_arrival: Exp<f64>,
    type_distribution: WeightedIndex<f64>,
    profiles: Vec<TypeProfile>,
    mean_service_times: Vec<f64>,
    entry_queue: QueueId<CustomerId>,
    router: ComponentId<router::Event>,
    customers: Key<CustomerRegistry>,
    analysis: Key<Analysis>,
    rng: SimRng,
}

impl ArrivalGenerator {
    /// Constructs a generator for `gate` with Poisson rate `arrival_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `arrival_rate` is not positive or the type probabilities are
    /// unusable; both are ruled out by configuration validation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: GateId,
        horizon: Duration,
        arrival_rate: f64,
        profiles: Vec<TypeProfile>,
        type_probabilities: &[f64],
        mean_service_times: Vec<f64>,
        entry_queue: QueueId<CustomerId>,
        router: ComponentId<router::Event>,
        customers: Key<CustomerRegistry>,
        analysis: Key<Analysis>,
        rng: SimRng,
    ) -> Self {
        Self {
            gate,
            horizon,
            inter_arrival: Exp::new(arrival_rate).expect("arrival rate must be positive"),
            type_distribution: WeightedIndex::new(type_probabilities.iter().copied())
                .expect("type probabilities must contain a positive weight"),
            profiles,
            mean_service_times,
            entry_queue,
            router,
            customers,
            analysis,
            rng,
        }
    }

    fn sample_customer(&self, id: CustomerId, arrival_time: Duration) -> Customer {
        let mut rng = self.rng.borrow_mut();
        let profile = &self.profiles[self.type_distribution.sample(&mut *rng)];
        let (min, max) = profile.patience;
        // Validation guarantees finite bounds; a degenerate range needs no
        // draw.
        let patience = if min < max {
            Uniform::new_inclusive(min, max).sample(&mut *rng)
        } else {
            min
        };
        // Each service time gets uniform jitter within 50% of the station
        // mean, scaled by the type multiplier.
        let samples = self
            .mean_service_times
            .iter()
            .map(|&mean| {
                Uniform::new_inclusive(0.5 * mean, 1.5 * mean).sample(&mut *rng)
                    * profile.service_multiplier
            })
            .collect();
        Customer::new(
            id,
            self.gate,
            arrival_time,
            profile.customer_type,
            patience,
            samples,
        )
    }
}

impl Component for ArrivalGenerator {
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let Event::NewCustomer = event;
        let now = scheduler.time();
        let customer = state
            .get_mut(self.customers)
            .expect("customer registry lives in the state")
            .add(|id| self.sample_customer(id, now));
        state
            .get_mut(self.analysis)
            .expect("analysis lives in the state")
            .record_arrival();
        log::debug!("[{:?}] {} arrives at gate {}", now, customer, self.gate);
        state
            .send(self.entry_queue, customer)
            .expect("the entry queue is unbounded");
        scheduler.schedule_immediately(self.router, router::Event::NewCustomer);

        let gap = duration_from_secs(self.inter_arrival.sample(&mut *self.rng.borrow_mut()));
        // The horizon closes the doors: no arrivals are generated past it,
        // but customers already inside finish their lifecycle.
        if now + gap <= self.horizon {
            scheduler.schedule(gap, self_id, Event::NewCustomer);
        }
    }
}
