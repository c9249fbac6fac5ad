//! Counters and samples collected during a run, and the summary statistics
//! derived from them.

use std::time::Duration;

use serde::Serialize;
use simcore::ClockRef;

use crate::StationId;

/// Collects per-station and restaurant-wide measurements.
///
/// Lives in the simulation state; stations, the router, and the arrival
/// generators all record into it.
pub struct Analysis {
    clock: ClockRef,
    station_names: Vec<String>,
    total_arrivals: usize,
    total_exits: usize,
    total_balked: usize,
    total_reneged: usize,
    attempts: Vec<usize>,
    blocking_events: Vec<usize>,
    waits: Vec<Vec<f64>>,
    services: Vec<Vec<f64>>,
    system_times: Vec<f64>,
}

impl Analysis {
    /// Constructs an empty analysis for the given stations.
    pub fn new(clock: ClockRef, station_names: Vec<String>) -> Self {
        let stations = station_names.len();
        Self {
            clock,
            station_names,
            total_arrivals: 0,
            total_exits: 0,
            total_balked: 0,
            total_reneged: 0,
            attempts: vec![0; stations],
            blocking_events: vec![0; stations],
            waits: vec![Vec::new(); stations],
            services: vec![Vec::new(); stations],
            system_times: Vec::new(),
        }
    }

    /// A new customer entered the restaurant.
    pub fn record_arrival(&mut self) {
        self.total_arrivals += 1;
    }

    /// A customer attempted to enter `station`.
    pub fn record_attempt(&mut self, station: StationId) {
        self.attempts[usize::from(station)] += 1;
    }

    /// A customer found `station` full.
    pub fn record_blocking_event(&mut self, station: StationId) {
        self.blocking_events[usize::from(station)] += 1;
    }

    /// A customer left the restaurant because every open station was full.
    pub fn record_balked(&mut self) {
        self.total_balked += 1;
    }

    /// A customer ran out of patience and left the restaurant.
    pub fn record_reneging_event(&mut self) {
        self.total_reneged += 1;
    }

    /// Records how long a customer waited at `station` before being served or
    /// giving up.
    pub fn record_wait(&mut self, station: StationId, wait: Duration) {
        self.waits[usize::from(station)].push(wait.as_secs_f64());
    }

    /// Records a completed service at `station`.
    pub fn record_service(&mut self, station: StationId, service: Duration) {
        self.services[usize::from(station)].push(service.as_secs_f64());
    }

    /// A customer left the restaurant satisfied, after `system_time` inside.
    pub fn record_exit(&mut self, system_time: Duration) {
        self.total_exits += 1;
        self.system_times.push(system_time.as_secs_f64());
    }

    /// Customers that entered so far.
    pub fn total_arrivals(&self) -> usize {
        self.total_arrivals
    }

    /// Customers that left satisfied so far.
    pub fn total_exits(&self) -> usize {
        self.total_exits
    }

    /// Customers that balked so far.
    pub fn total_balked(&self) -> usize {
        self.total_balked
    }

    /// Customers that reneged so far.
    pub fn total_reneged(&self) -> usize {
        self.total_reneged
    }

    /// Summarizes everything recorded so far.
    pub fn calculate_statistics(&self) -> Statistics {
        let elapsed = self.clock.time().as_secs_f64();
        let all_waits: Vec<f64> = self.waits.iter().flatten().copied().collect();
        Statistics {
            arrivals: self.total_arrivals,
            exits: self.total_exits,
            balked: self.total_balked,
            reneged: self.total_reneged,
            mean_wait: mean(&all_waits),
            mean_wait_per_station: self.waits.iter().map(|w| mean(w)).collect(),
            mean_service_per_station: self.services.iter().map(|s| mean(s)).collect(),
            mean_system_time: mean(&self.system_times),
            attempts: self.attempts.clone(),
            blocking_events: self.blocking_events.clone(),
            blocking_probability: self
                .attempts
                .iter()
                .zip(&self.blocking_events)
                .map(|(&attempts, &blocked)| {
                    if attempts == 0 {
                        0.0
                    } else {
                        blocked as f64 / attempts as f64
                    }
                })
                .collect(),
            throughput: if elapsed > 0.0 {
                self.total_exits as f64 / elapsed
            } else {
                0.0
            },
        }
    }

    /// Names of the stations, in index order.
    pub fn station_names(&self) -> &[String] {
        &self.station_names
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

/// Summary statistics of a finished (or running) simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Customers that entered the restaurant.
    pub arrivals: usize,
    /// Customers that left satisfied.
    pub exits: usize,
    /// Customers that left because every open station was full.
    pub balked: usize,
    /// Customers that left after running out of patience.
    pub reneged: usize,
    /// Mean waiting time over all stations, in seconds.
    pub mean_wait: f64,
    /// Mean waiting time per station, in seconds.
    pub mean_wait_per_station: Vec<f64>,
    /// Mean service time per station, in seconds.
    pub mean_service_per_station: Vec<f64>,
    /// Mean time satisfied customers spent inside, in seconds.
    pub mean_system_time: f64,
    /// Entry attempts per station.
    pub attempts: Vec<usize>,
    /// Entry attempts per station that found the station full.
    pub blocking_events: Vec<usize>,
    /// Fraction of attempts per station that were blocked.
    pub blocking_probability: Vec<f64>,
    /// Satisfied customers per second of simulated time.
    pub throughput: f64,
}
