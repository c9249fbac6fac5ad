//! Analytical M/M/c/K results used to sanity-check simulation output.
//!
//! A station with `c` serving slots, capacity `K`, Poisson arrivals, and
//! exponential-ish service is an M/M/c/K system. Blocking probability in such
//! a system depends on the service distribution only through its mean when
//! all slots double as capacity (the Erlang loss case), which makes the
//! comparison meaningful despite the uniform service jitter.

use crate::{ResolvedConfig, StationId};

/// Parameters of an M/M/c/K queueing system.
#[derive(Debug, Clone, Copy)]
pub struct MmckModel {
    /// Arrival rate λ.
    pub arrival_rate: f64,
    /// Per-server service rate μ.
    pub service_rate: f64,
    /// Number of servers c.
    pub servers: usize,
    /// System capacity K, counting customers in service.
    pub capacity: usize,
}

impl MmckModel {
    /// Steady-state probabilities `P[n]` of having `n` customers in the
    /// system, for `n` in `0..=K`.
    pub fn state_distribution(&self) -> Vec<f64> {
        let a = self.arrival_rate / self.service_rate;
        let c = self.servers;
        let unnormalized: Vec<f64> = (0..=self.capacity)
            .map(|n| {
                if n <= c {
                    a.powi(n as i32) / factorial(n)
                } else {
                    a.powi(n as i32) / (factorial(c) * (c as f64).powi((n - c) as i32))
                }
            })
            .collect();
        let total: f64 = unnormalized.iter().sum();
        unnormalized.into_iter().map(|p| p / total).collect()
    }

    /// Probability that an arriving customer finds the system full.
    pub fn blocking_probability(&self) -> f64 {
        *self
            .state_distribution()
            .last()
            .expect("the distribution has K + 1 entries")
    }

    /// Expected number of customers waiting (not in service).
    pub fn expected_queue_length(&self) -> f64 {
        let c = self.servers;
        self.state_distribution()
            .iter()
            .enumerate()
            .skip(c + 1)
            .map(|(n, p)| (n - c) as f64 * p)
            .sum()
    }

    /// Expected waiting time of an admitted customer, by Little's law.
    pub fn expected_wait(&self) -> f64 {
        let admitted_rate = self.arrival_rate * (1.0 - self.blocking_probability());
        if admitted_rate > 0.0 {
            self.expected_queue_length() / admitted_rate
        } else {
            0.0
        }
    }
}

/// Estimates the total arrival rate at `station`, counting both fresh
/// arrivals routed from the gates and repeat visits.
///
/// Fresh arrivals split across stations in proportion to the gate's initial
/// weights. Each admitted customer generates a geometric number of further
/// visits with continue probability `p`, contributing the feedback factor
/// `1 / (1 - p)`. The estimate ignores weight redistribution around full
/// stations, so it is only indicative under heavy blocking.
pub fn estimated_station_arrival_rate(config: &ResolvedConfig, station: StationId) -> f64 {
    let idx = usize::from(station);
    let fresh: f64 = config
        .gates
        .iter()
        .map(|gate| {
            let total: f64 = gate.initial_weights.iter().sum();
            if total > 0.0 {
                gate.arrival_rate * gate.initial_weights[idx] / total
            } else {
                0.0
            }
        })
        .sum();
    let transition_total: f64 = config.transition_weights.iter().sum();
    let transition_share = if transition_total > 0.0 {
        config.transition_weights[idx] / transition_total
    } else {
        0.0
    };
    let total_rate: f64 = config.gates.iter().map(|gate| gate.arrival_rate).sum();
    let p = config.continue_probability;
    // Every served visit spawns another with probability p, so the stream of
    // repeat visits has rate `total * p / (1 - p)` at most, split by the
    // transition weights.
    let repeats = if p < 1.0 {
        total_rate * p / (1.0 - p) * transition_share
    } else {
        f64::INFINITY
    };
    fresh + repeats
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|i| i as f64).product()
}

#[cfg(test)]
mod test {
    use super::*;

    use float_cmp::approx_eq;

    #[test]
    fn test_state_distribution_sums_to_one() {
        let model = MmckModel {
            arrival_rate: 3.0,
            service_rate: 1.0,
            servers: 2,
            capacity: 7,
        };
        let total: f64 = model.state_distribution().iter().sum();
        assert!(approx_eq!(f64, total, 1.0, epsilon = 1e-12));
    }

    #[test]
    fn test_erlang_loss_single_server() {
        // M/M/1/1: blocking probability is rho / (1 + rho).
        let model = MmckModel {
            arrival_rate: 10.0,
            service_rate: 1.0,
            servers: 1,
            capacity: 1,
        };
        assert!(approx_eq!(
            f64,
            model.blocking_probability(),
            10.0 / 11.0,
            epsilon = 1e-12
        ));
        assert!(approx_eq!(f64, model.expected_queue_length(), 0.0));
        assert!(approx_eq!(f64, model.expected_wait(), 0.0));
    }

    #[test]
    fn test_mm1k_matches_closed_form() {
        // M/M/1/K: P[n] = (1 - rho) rho^n / (1 - rho^(K+1)).
        let (rho, capacity) = (0.8_f64, 4);
        let model = MmckModel {
            arrival_rate: 0.8,
            service_rate: 1.0,
            servers: 1,
            capacity,
        };
        let distribution = model.state_distribution();
        for (n, &p) in distribution.iter().enumerate() {
            let expected =
                (1.0 - rho) * rho.powi(n as i32) / (1.0 - rho.powi(capacity as i32 + 1));
            assert!(approx_eq!(f64, p, expected, epsilon = 1e-12));
        }
    }

    #[test]
    fn test_estimated_arrival_rate_includes_repeat_visits() {
        use crate::config::{ResolvedConfig, ResolvedGate, ResolvedStation};
        use crate::DisciplineKind;

        let config = ResolvedConfig {
            seed: 0,
            horizon: 1.0,
            gates: vec![ResolvedGate {
                arrival_rate: 1.0,
                initial_weights: vec![1.0],
            }],
            stations: vec![ResolvedStation {
                name: String::from("only"),
                servers: 1,
                capacity: 1,
                discipline: DisciplineKind::Fcfs,
                mean_service_time: 1.0,
            }],
            customer_types: Vec::new(),
            transition_weights: vec![1.0],
            continue_probability: 0.5,
            starvation_threshold: 0.0,
            erratic_delay: 0.0,
            dynamic_servers: None,
        };
        // Fresh rate 1, plus repeats 1 * 0.5 / (1 - 0.5) = 1.
        assert!(approx_eq!(
            f64,
            estimated_station_arrival_rate(&config, StationId::from(0)),
            2.0
        ));
    }

    #[test]
    fn test_queue_length_counts_only_waiting() {
        let model = MmckModel {
            arrival_rate: 1.0,
            service_rate: 1.0,
            servers: 2,
            capacity: 2,
        };
        // Capacity equals servers, so nobody ever waits.
        assert!(approx_eq!(f64, model.expected_queue_length(), 0.0));
    }
}
