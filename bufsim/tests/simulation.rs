//! End-to-end tests running full simulations against known queueing results
//! and conservation laws.

use std::collections::HashMap;

use float_cmp::approx_eq;

use bufsim::config::{CustomerTypeConfig, GateConfig, StationConfig};
use bufsim::{CustomerType, MmckModel, SimulationConfig, Statistics};

fn weights(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries
        .iter()
        .map(|(name, weight)| (String::from(*name), *weight))
        .collect()
}

fn normal_customers(patience: (f64, f64)) -> Vec<CustomerTypeConfig> {
    vec![CustomerTypeConfig {
        customer_type: CustomerType::Normal,
        probability: 1.0,
        patience,
        service_multiplier: 1.0,
    }]
}

fn run_to_statistics(config: &SimulationConfig) -> Statistics {
    let resolved = config.resolve().expect("test configuration is valid");
    let mut built = bufsim::build(&resolved);
    bufsim::run(&mut built);
    built
        .sim
        .state
        .get(built.analysis)
        .unwrap()
        .calculate_statistics()
}

fn mixed_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        seed,
        horizon: 500.0,
        gates: vec![
            GateConfig {
                arrival_rate: 0.4,
                initial_weights: weights(&[("soup", 3.0), ("grill", 1.0)]),
            },
            GateConfig {
                arrival_rate: 0.2,
                initial_weights: weights(&[("grill", 1.0), ("salad", 1.0)]),
            },
        ],
        stations: vec![
            StationConfig {
                name: String::from("soup"),
                servers: 2,
                capacity: 6,
                discipline: String::from("fcfs"),
                mean_service_time: 8.0,
            },
            StationConfig {
                name: String::from("grill"),
                servers: 1,
                capacity: 4,
                discipline: String::from("sjf"),
                mean_service_time: 12.0,
            },
            StationConfig {
                name: String::from("salad"),
                servers: 1,
                capacity: 3,
                discipline: String::from("ros"),
                mean_service_time: 5.0,
            },
        ],
        customer_types: vec![
            CustomerTypeConfig {
                customer_type: CustomerType::Normal,
                probability: 0.5,
                patience: (20.0, 60.0),
                service_multiplier: 1.0,
            },
            CustomerTypeConfig {
                customer_type: CustomerType::Impatient,
                probability: 0.2,
                patience: (1.0, 5.0),
                service_multiplier: 1.0,
            },
            CustomerTypeConfig {
                customer_type: CustomerType::Indulgent,
                probability: 0.2,
                patience: (40.0, 120.0),
                service_multiplier: 2.0,
            },
            CustomerTypeConfig {
                customer_type: CustomerType::Erratic,
                probability: 0.1,
                patience: (20.0, 60.0),
                service_multiplier: 1.0,
            },
        ],
        transition_weights: weights(&[("soup", 1.0), ("grill", 1.0), ("salad", 2.0)]),
        continue_probability: 0.6,
        starvation_threshold: 30.0,
        erratic_delay: 2.0,
        dynamic_servers: None,
    }
}

#[test]
fn test_same_seed_reproduces_statistics() {
    let config = mixed_config(42);
    let first = run_to_statistics(&config);
    let second = run_to_statistics(&config);
    assert_eq!(first, second);
}

#[test]
fn test_different_seeds_diverge() {
    let first = run_to_statistics(&mixed_config(42));
    let second = run_to_statistics(&mixed_config(43));
    assert_ne!(first, second);
}

#[test]
fn test_customers_are_conserved() {
    let config = mixed_config(7);
    let resolved = config.resolve().unwrap();
    let mut built = bufsim::build(&resolved);
    bufsim::run(&mut built);
    let stats = built
        .sim
        .state
        .get(built.analysis)
        .unwrap()
        .calculate_statistics();
    assert!(stats.arrivals > 100, "run produced too few customers");
    assert_eq!(stats.arrivals, stats.exits + stats.balked + stats.reneged);
    // Everyone's lifecycle settled, so the registry is empty.
    assert!(built.sim.state.get(built.customers).unwrap().is_empty());
    for (&attempts, &blocked) in stats.attempts.iter().zip(&stats.blocking_events) {
        assert!(blocked <= attempts);
    }
    for &p in &stats.blocking_probability {
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn test_erlang_loss_blocking_matches_theory() {
    // Single station with one slot and no waiting room is an M/M/1/1 loss
    // system; its blocking probability depends on service time only through
    // the mean, so the uniform jitter does not bias the comparison.
    let config = SimulationConfig {
        seed: 17,
        horizon: 2000.0,
        gates: vec![GateConfig {
            arrival_rate: 10.0,
            initial_weights: weights(&[("only", 1.0)]),
        }],
        stations: vec![StationConfig {
            name: String::from("only"),
            servers: 1,
            capacity: 1,
            discipline: String::from("fcfs"),
            mean_service_time: 1.0,
        }],
        customer_types: normal_customers((1e9, 1e9)),
        transition_weights: weights(&[("only", 1.0)]),
        continue_probability: 0.0,
        starvation_threshold: 1e9,
        erratic_delay: 0.0,
        dynamic_servers: None,
    };
    let stats = run_to_statistics(&config);
    let model = MmckModel {
        arrival_rate: 10.0,
        service_rate: 1.0,
        servers: 1,
        capacity: 1,
    };
    assert!(stats.arrivals > 10_000);
    let simulated = stats.blocking_probability[0];
    let theoretical = model.blocking_probability();
    assert!(
        (simulated - theoretical).abs() < 0.02,
        "simulated {} vs theoretical {}",
        simulated,
        theoretical
    );
}

#[test]
fn test_zero_patience_customers_renege_unless_served_instantly() {
    let config = SimulationConfig {
        seed: 3,
        horizon: 20.0,
        gates: vec![GateConfig {
            arrival_rate: 5.0,
            initial_weights: weights(&[("only", 1.0)]),
        }],
        stations: vec![StationConfig {
            name: String::from("only"),
            servers: 1,
            capacity: 10,
            discipline: String::from("fcfs"),
            mean_service_time: 50.0,
        }],
        customer_types: normal_customers((0.0, 0.0)),
        transition_weights: weights(&[("only", 1.0)]),
        continue_probability: 0.0,
        starvation_threshold: 1e9,
        erratic_delay: 0.0,
        dynamic_servers: None,
    };
    let stats = run_to_statistics(&config);
    assert!(stats.arrivals > 50);
    // The first customer takes the only slot for longer than the horizon;
    // everyone else leaves the moment they see a busy slot.
    assert_eq!(stats.exits, 1);
    assert_eq!(stats.balked, 0);
    assert_eq!(stats.reneged, stats.arrivals - 1);
    assert!(approx_eq!(f64, stats.mean_wait, 0.0));
}

#[test]
fn test_full_station_redirects_to_alternative() {
    // Station "slow" seats one customer forever; after it fills up, every
    // draw that lands on it must be redirected to "fast".
    let config = SimulationConfig {
        seed: 11,
        horizon: 50.0,
        gates: vec![GateConfig {
            arrival_rate: 2.0,
            initial_weights: weights(&[("slow", 1.0), ("fast", 1.0)]),
        }],
        stations: vec![
            StationConfig {
                name: String::from("slow"),
                servers: 1,
                capacity: 1,
                discipline: String::from("fcfs"),
                mean_service_time: 1e6,
            },
            StationConfig {
                name: String::from("fast"),
                servers: 4,
                capacity: 100,
                discipline: String::from("fcfs"),
                mean_service_time: 1.0,
            },
        ],
        customer_types: normal_customers((1e9, 1e9)),
        transition_weights: weights(&[("slow", 1.0), ("fast", 1.0)]),
        continue_probability: 0.0,
        starvation_threshold: 1e9,
        erratic_delay: 0.0,
        dynamic_servers: None,
    };
    let stats = run_to_statistics(&config);
    assert!(stats.arrivals > 50);
    // The router checks for space before dispatching, so the full station
    // never sees an attempt after its only seat is taken.
    assert!(stats.attempts[0] <= 1);
    assert_eq!(stats.blocking_events[0], 0);
    assert_eq!(stats.attempts[1], stats.arrivals - stats.attempts[0]);
    assert_eq!(stats.balked, 0);
    assert_eq!(stats.reneged, 0);
    assert_eq!(stats.exits, stats.arrivals);
}

#[test]
fn test_dynamic_stations_share_the_pool() {
    let config = SimulationConfig {
        seed: 23,
        horizon: 200.0,
        gates: vec![GateConfig {
            arrival_rate: 1.0,
            initial_weights: weights(&[("left", 1.0), ("right", 1.0)]),
        }],
        stations: vec![
            StationConfig {
                name: String::from("left"),
                servers: 1,
                capacity: 10,
                discipline: String::from("dynamic"),
                mean_service_time: 1.0,
            },
            StationConfig {
                name: String::from("right"),
                servers: 1,
                capacity: 10,
                discipline: String::from("dynamic"),
                mean_service_time: 1.0,
            },
        ],
        customer_types: normal_customers((100.0, 100.0)),
        transition_weights: weights(&[("left", 1.0), ("right", 1.0)]),
        continue_probability: 0.3,
        starvation_threshold: 1e9,
        erratic_delay: 0.0,
        dynamic_servers: Some(2),
    };
    let stats = run_to_statistics(&config);
    assert!(stats.arrivals > 100);
    assert!(stats.exits > 0);
    assert_eq!(stats.arrivals, stats.exits + stats.balked + stats.reneged);
}

#[test]
fn test_indulgent_customers_never_revisit() {
    // One station, indulgent customers who always want to continue: after
    // the single visit there is nowhere new to go, so every served customer
    // leaves through the no-station-left path and nobody is served twice.
    let config = SimulationConfig {
        seed: 5,
        horizon: 100.0,
        gates: vec![GateConfig {
            arrival_rate: 1.0,
            initial_weights: weights(&[("only", 1.0)]),
        }],
        stations: vec![StationConfig {
            name: String::from("only"),
            servers: 10,
            capacity: 100,
            discipline: String::from("fcfs"),
            mean_service_time: 1.0,
        }],
        customer_types: vec![CustomerTypeConfig {
            customer_type: CustomerType::Indulgent,
            probability: 1.0,
            patience: (1e9, 1e9),
            service_multiplier: 2.0,
        }],
        transition_weights: weights(&[("only", 1.0)]),
        continue_probability: 1.0,
        starvation_threshold: 1e9,
        erratic_delay: 0.0,
        dynamic_servers: None,
    };
    let stats = run_to_statistics(&config);
    assert!(stats.arrivals > 50);
    // Each customer is served exactly once.
    assert_eq!(stats.attempts[0], stats.arrivals);
    assert_eq!(stats.exits, 0);
    assert_eq!(stats.reneged, stats.arrivals);
    assert_eq!(stats.balked, 0);
}
