//! Routing of customers between gates, stations, and the exit.
//!
//! The router draws stations from weighted distributions, skipping full
//! stations by zeroing their weight and redistributing the remaining mass
//! proportionally. It also decides, after each served visit, whether the
//! customer continues to another station or leaves.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

use simcore::{Component, ComponentId, Key, QueueId, Scheduler, State};

use crate::analysis::Analysis;
use crate::customer::{CustomerRegistry, CustomerType};
use crate::station::Occupancy;
use crate::{station, CustomerId, SimRng, VisitOutcome};

/// Events processed by the router.
#[derive(Debug)]
pub enum Event {
    /// A new customer is waiting in the entry queue.
    NewCustomer,
    /// A station reports how a visit ended.
    VisitFinished {
        /// The customer in question.
        customer: CustomerId,
        /// How the visit ended.
        outcome: VisitOutcome,
    },
}

/// Station components a router can dispatch to, in station index order.
///
/// Kept in the state because stations are constructed after the router.
#[derive(Default)]
pub struct StationDirectory {
    /// Typed component IDs of all stations.
    pub components: Vec<ComponentId<station::Event>>,
}

/// The router component.
pub struct Router {
    entry_queue: QueueId<CustomerId>,
    directory: Key<StationDirectory>,
    initial_weights: Vec<Vec<f64>>,
    transition_weights: Vec<f64>,
    continue_probability: f64,
    customers: Key<CustomerRegistry>,
    analysis: Key<Analysis>,
    occupancy: Key<Occupancy>,
    rng: SimRng,
}

impl Router {
    /// Constructs a router.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry_queue: QueueId<CustomerId>,
        directory: Key<StationDirectory>,
        initial_weights: Vec<Vec<f64>>,
        transition_weights: Vec<f64>,
        continue_probability: f64,
        customers: Key<CustomerRegistry>,
        analysis: Key<Analysis>,
        occupancy: Key<Occupancy>,
        rng: SimRng,
    ) -> Self {
        Self {
            entry_queue,
            directory,
            initial_weights,
            transition_weights,
            continue_probability,
            customers,
            analysis,
            occupancy,
            rng,
        }
    }

    fn open_stations(&self, state: &State) -> Vec<bool> {
        let occupancy = state
            .get(self.occupancy)
            .expect("occupancy lives in the state");
        (0..self.transition_weights.len())
            .map(|idx| occupancy.has_space(idx.into()))
            .collect()
    }

    fn dispatch(
        &self,
        customer: CustomerId,
        station: usize,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let station_component = state
            .get(self.directory)
            .expect("station directory lives in the state")
            .components[station];
        state
            .get_mut(self.customers)
            .expect("customer registry lives in the state")
            .get_mut(customer)
            .expect("routed customers are registered")
            .mark_visited(station.into());
        scheduler.schedule_immediately(station_component, station::Event::Arrival(customer));
    }

    fn handle_new_customer(&mut self, scheduler: &mut Scheduler, state: &mut State) {
        let customer = state
            .recv(self.entry_queue)
            .expect("a new-customer event implies a queued customer");
        let gate = state
            .get(self.customers)
            .expect("customer registry lives in the state")
            .get(customer)
            .expect("queued customers are registered")
            .gate();
        let open = self.open_stations(state);
        let mut weights = self.initial_weights[usize::from(gate)].clone();
        let picked = pick_open_station(&mut *self.rng.borrow_mut(), &mut weights, &open);
        match picked {
            Some(station) => self.dispatch(customer, station, scheduler, state),
            None => {
                // Every station this gate routes to is full; the customer
                // leaves without entering any queue. Each candidate counts as
                // a blocked attempt.
                let analysis = state
                    .get_mut(self.analysis)
                    .expect("analysis lives in the state");
                for (station, &weight) in self.initial_weights[usize::from(gate)].iter().enumerate()
                {
                    if weight > 0.0 {
                        analysis.record_attempt(station.into());
                        analysis.record_blocking_event(station.into());
                    }
                }
                analysis.record_balked();
                log::debug!(
                    "[{:?}] {} balks at the door, every station is full",
                    scheduler.time(),
                    customer
                );
                state
                    .get_mut(self.customers)
                    .expect("customer registry lives in the state")
                    .remove(customer);
            }
        }
    }

    fn handle_visit_finished(
        &mut self,
        customer: CustomerId,
        outcome: VisitOutcome,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let now = scheduler.time();
        match outcome {
            VisitOutcome::Balked | VisitOutcome::Reneged => {
                // Already accounted for by the station; the customer is gone.
                state
                    .get_mut(self.customers)
                    .expect("customer registry lives in the state")
                    .remove(customer);
                return;
            }
            VisitOutcome::Served => {}
        }
        let continues = self.rng.borrow_mut().gen_bool(self.continue_probability);
        let (arrival_time, customer_type, visited) = {
            let entry = state
                .get(self.customers)
                .expect("customer registry lives in the state")
                .get(customer)
                .expect("served customers are registered");
            let visited: Vec<bool> = (0..self.transition_weights.len())
                .map(|idx| entry.has_visited(idx.into()))
                .collect();
            (entry.arrival_time(), entry.customer_type(), visited)
        };
        if !continues {
            state
                .get_mut(self.analysis)
                .expect("analysis lives in the state")
                .record_exit(now - arrival_time);
            log::debug!("[{:?}] {} leaves satisfied", now, customer);
            state
                .get_mut(self.customers)
                .expect("customer registry lives in the state")
                .remove(customer);
            return;
        }
        let open = self.open_stations(state);
        // Unvisited stations are preferred; everyone except indulgent
        // customers falls back to revisiting when nothing new is reachable.
        let mut fresh: Vec<f64> = self
            .transition_weights
            .iter()
            .zip(&visited)
            .map(|(&weight, &visited)| if visited { 0.0 } else { weight })
            .collect();
        let mut rng = self.rng.borrow_mut();
        let picked = pick_open_station(&mut *rng, &mut fresh, &open).or_else(|| {
            if customer_type == CustomerType::Indulgent {
                None
            } else {
                let mut weights = self.transition_weights.clone();
                pick_open_station(&mut *rng, &mut weights, &open)
            }
        });
        drop(rng);
        match picked {
            Some(station) => self.dispatch(customer, station, scheduler, state),
            None => {
                // Nowhere left to go; leaving hungry counts as reneging.
                state
                    .get_mut(self.analysis)
                    .expect("analysis lives in the state")
                    .record_reneging_event();
                log::debug!("[{:?}] {} leaves, no reachable station left", now, customer);
                state
                    .get_mut(self.customers)
                    .expect("customer registry lives in the state")
                    .remove(customer);
            }
        }
    }
}

impl Component for Router {
    type Event = Event;

    fn process_event(
        &mut self,
        _self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        match *event {
            Event::NewCustomer => self.handle_new_customer(scheduler, state),
            Event::VisitFinished { customer, outcome } => {
                self.handle_visit_finished(customer, outcome, scheduler, state);
            }
        }
    }
}

/// Draws a station from `weights`, retrying with the full station's weight
/// zeroed (which redistributes its mass proportionally among the rest)
/// whenever the draw lands on a station without space. Returns `None` when no
/// positive-weight open station remains.
fn pick_open_station<R: Rng>(rng: &mut R, weights: &mut [f64], open: &[bool]) -> Option<usize> {
    loop {
        for (weight, &open) in weights.iter_mut().zip(open) {
            if !open {
                *weight = 0.0;
            }
        }
        if weights.iter().all(|&w| w <= 0.0) {
            return None;
        }
        let distribution = WeightedIndex::new(weights.iter().copied()).ok()?;
        let station = distribution.sample(rng);
        if open[station] {
            return Some(station);
        }
        weights[station] = 0.0;
    }
}
