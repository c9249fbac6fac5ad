//! Discrete-event simulation of a buffet restaurant.
//!
//! Customers enter through one of several gates, get routed to food stations
//! according to per-gate preference weights, wait in station queues governed by
//! configurable service disciplines, and after each served visit either move on
//! to another station or leave the restaurant. Stations have finite capacity,
//! and customers have finite patience, so they may balk or renege along the
//! way.
//!
//! The simulation is event-driven and runs on the [`simcore`] framework: all
//! actors are [`Component`](simcore::Component)s exchanging typed events
//! through a central [`Scheduler`](simcore::Scheduler), and all shared data
//! lives in [`State`](simcore::State).

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss,
    clippy::must_use_candidate
)]

use std::cell::RefCell;
use std::cmp;
use std::rc::Rc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod arrival;
pub mod config;
pub mod discipline;
pub mod pool;
pub mod router;
pub mod setup;
pub mod station;
pub mod theory;

mod customer;

pub use analysis::{Analysis, Statistics};
pub use config::{ConfigError, ResolvedConfig, SimulationConfig};
pub use customer::{Customer, CustomerRegistry, CustomerType};
pub use discipline::DisciplineKind;
pub use setup::{build, BuiltSimulation};
pub use station::Occupancy;
pub use theory::MmckModel;

/// Random number generator used throughout the simulation.
///
/// A single generator is shared by all components so that one seed fully
/// determines a run.
pub type SimRng = Rc<RefCell<rand_chacha::ChaChaRng>>;

/// Identifier of an entrance gate.
#[derive(
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct GateId(pub usize);

/// Identifier of a food station.
#[derive(
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct StationId(pub usize);

/// Identifier of a customer.
#[derive(
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct CustomerId(pub usize);

/// How a single station visit ended, reported back to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// The customer was served at the station.
    Served,
    /// The customer found the station full and walked away.
    Balked,
    /// The customer ran out of patience while waiting.
    Reneged,
}

/// Runs `built` to completion without any terminal output.
///
/// Arrival generators stop producing new customers past the horizon, and the
/// remaining events are drained so that every customer already inside the
/// restaurant finishes their lifecycle.
pub fn run(built: &mut BuiltSimulation) {
    built.sim.run();
}

/// Runs `built` to completion, drawing a progress bar that tracks simulation
/// time along with running arrival and departure counts.
pub fn run_with_progress(built: &mut BuiltSimulation) {
    let pb = ProgressBar::new(built.horizon.as_secs());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:60} {pos:>6}/{len:6}s {msg}")
            .progress_chars("=> "),
    );
    loop {
        let more = built.sim.step();
        let time = cmp::min(built.sim.scheduler.time(), built.horizon);
        if pb.position() < time.as_secs() {
            let analysis = built
                .sim
                .state
                .get(built.analysis)
                .expect("analysis always lives in the state");
            pb.set_position(time.as_secs());
            pb.set_message(&format!(
                "arrived={} exited={} balked={} reneged={}",
                analysis.total_arrivals(),
                analysis.total_exits(),
                analysis.total_balked(),
                analysis.total_reneged(),
            ));
        }
        if !more {
            break;
        }
    }
    pb.finish();
}

/// Simulation time expressed as a [`Duration`].
///
/// # Panics
///
/// Panics if `secs` is negative or not finite.
pub(crate) fn duration_from_secs(secs: f64) -> Duration {
    assert!(
        secs.is_finite() && secs >= 0.0,
        "time must be finite and non-negative: {}",
        secs
    );
    Duration::from_secs_f64(secs)
}
