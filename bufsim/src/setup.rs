//! Wires a validated configuration into a ready-to-run simulation.

use std::cell::RefCell;
use std::rc::Rc;

use rand::prelude::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use rand_distr::Exp;

use simcore::{Key, Simulation};

use crate::analysis::Analysis;
use crate::arrival::{ArrivalGenerator, TypeProfile};
use crate::customer::CustomerRegistry;
use crate::discipline::new_discipline;
use crate::pool::SharedPool;
use crate::router::{Router, StationDirectory};
use crate::station::{Occupancy, Slots, Station};
use crate::{arrival, duration_from_secs, DisciplineKind, ResolvedConfig, SimRng};

/// A fully wired simulation along with the keys needed to inspect it.
pub struct BuiltSimulation {
    /// The simulation itself.
    pub sim: Simulation,
    /// Key of the [`Analysis`] in the simulation state.
    pub analysis: Key<Analysis>,
    /// Key of the customer registry in the simulation state.
    pub customers: Key<CustomerRegistry>,
    /// End of the arrival window.
    pub horizon: std::time::Duration,
}

/// Builds a simulation from `config`.
///
/// Construction order matters: the shared pool and the router exist before
/// the stations that reference them, and the station directory in the state
/// is filled in once all stations are registered.
pub fn build(config: &ResolvedConfig) -> BuiltSimulation {
    let mut sim = Simulation::default();
    let rng: SimRng = Rc::new(RefCell::new(ChaChaRng::seed_from_u64(config.seed)));
    let horizon = duration_from_secs(config.horizon);

    let analysis = sim.state.insert(Analysis::new(
        sim.scheduler.clock(),
        config.stations.iter().map(|s| s.name.clone()).collect(),
    ));
    let customers = sim.state.insert(CustomerRegistry::default());
    let occupancy = sim.state.insert(Occupancy::new(
        config.stations.iter().map(|s| s.capacity).collect(),
    ));
    let directory = sim.state.insert(StationDirectory::default());
    let entry_queue = sim.add_queue();

    let pool = if config
        .stations
        .iter()
        .any(|s| s.discipline == DisciplineKind::Dynamic)
    {
        let slots = config
            .dynamic_servers
            .expect("validation guarantees a pool size when dynamic stations exist");
        Some(sim.add_component(SharedPool::new(slots)))
    } else {
        None
    };

    let router = sim.add_component(Router::new(
        entry_queue,
        directory,
        config
            .gates
            .iter()
            .map(|gate| gate.initial_weights.clone())
            .collect(),
        config.transition_weights.clone(),
        config.continue_probability,
        customers,
        analysis,
        occupancy,
        Rc::clone(&rng),
    ));

    let starvation_threshold = duration_from_secs(config.starvation_threshold);
    let station_components: Vec<_> = config
        .stations
        .iter()
        .enumerate()
        .map(|(idx, station)| {
            let slots = match station.discipline {
                DisciplineKind::Dynamic => Slots::Shared {
                    pool: pool.expect("dynamic stations imply a pool"),
                },
                local => Slots::Local {
                    idle: station.servers,
                    discipline: new_discipline(local, starvation_threshold),
                },
            };
            sim.add_component(Station::new(
                idx.into(),
                station.name.clone(),
                slots,
                router,
                customers,
                analysis,
                occupancy,
                config.erratic_delay,
                Rc::clone(&rng),
            ))
        })
        .collect();
    sim.state
        .get_mut(directory)
        .expect("the directory was just inserted")
        .components = station_components;

    let profiles: Vec<TypeProfile> = config
        .customer_types
        .iter()
        .map(|entry| TypeProfile {
            customer_type: entry.customer_type,
            patience: entry.patience,
            service_multiplier: entry.service_multiplier,
        })
        .collect();
    let type_probabilities: Vec<f64> = config
        .customer_types
        .iter()
        .map(|entry| entry.probability)
        .collect();
    let mean_service_times: Vec<f64> = config
        .stations
        .iter()
        .map(|s| s.mean_service_time)
        .collect();

    for (idx, gate) in config.gates.iter().enumerate() {
        let generator = sim.add_component(ArrivalGenerator::new(
            idx.into(),
            horizon,
            gate.arrival_rate,
            profiles.clone(),
            &type_probabilities,
            mean_service_times.clone(),
            entry_queue,
            router,
            customers,
            analysis,
            Rc::clone(&rng),
        ));
        let exp = Exp::new(gate.arrival_rate).expect("validation guarantees a positive rate");
        let first = duration_from_secs(exp.sample(&mut *rng.borrow_mut()));
        if first <= horizon {
            sim.schedule(first, generator, arrival::Event::NewCustomer);
        }
    }

    BuiltSimulation {
        sim,
        analysis,
        customers,
        horizon,
    }
}
