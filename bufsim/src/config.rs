//! Simulation configuration, deserialized from JSON and validated into a
//! resolved form where station names are replaced with indices.

use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::{CustomerType, DisciplineKind};

/// Error raised when a configuration cannot be parsed or fails validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A weight map refers to a station that is not defined.
    #[error("unknown station in weight map: {0}")]
    UnknownStation(String),
    /// A station names a discipline that does not exist.
    #[error("station {station}: unknown discipline: {discipline}")]
    UnknownDiscipline {
        /// Station name.
        station: String,
        /// The unrecognized discipline string.
        discipline: String,
    },
    /// No stations were defined.
    #[error("at least one station must be defined")]
    NoStations,
    /// No gates were defined.
    #[error("at least one gate must be defined")]
    NoGates,
    /// A station definition is invalid.
    #[error("station {station}: {message}")]
    InvalidStation {
        /// Station name.
        station: String,
        /// What is wrong with it.
        message: String,
    },
    /// A gate definition is invalid.
    #[error("gate {gate}: {message}")]
    InvalidGate {
        /// Gate index.
        gate: usize,
        /// What is wrong with it.
        message: String,
    },
    /// The customer type mix is invalid.
    #[error("invalid customer type mix: {0}")]
    InvalidTypeMix(String),
    /// A top-level numeric parameter is out of range.
    #[error("invalid value for {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },
    /// A station uses the dynamic discipline but no shared pool size is given.
    #[error("dynamic discipline requires the dynamic_servers parameter")]
    MissingDynamicServers,
    /// The configuration is not valid JSON.
    #[error("failed to parse configuration")]
    Parse(#[from] serde_json::Error),
}

/// A single entrance gate.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Poisson arrival rate at this gate, in customers per second.
    pub arrival_rate: f64,
    /// Initial routing weights, keyed by station name. Stations absent from
    /// the map get weight zero.
    pub initial_weights: HashMap<String, f64>,
}

/// A single food station.
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Unique station name, referenced by weight maps.
    pub name: String,
    /// Number of serving slots.
    pub servers: usize,
    /// Total physical capacity, covering both waiting and serving customers.
    pub capacity: usize,
    /// Service discipline: `fcfs`, `ros`, `sjf`, or `dynamic`.
    pub discipline: String,
    /// Mean service time in seconds, before per-customer jitter.
    pub mean_service_time: f64,
}

/// One entry of the customer type mix.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerTypeConfig {
    /// Type this entry describes.
    pub customer_type: CustomerType,
    /// Relative probability of drawing this type at arrival.
    pub probability: f64,
    /// Patience is drawn uniformly from this `[min, max]` range, in seconds.
    pub patience: (f64, f64),
    /// Multiplier applied to all of the customer's service samples.
    pub service_multiplier: f64,
}

/// Top-level simulation configuration as found in the JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// RNG seed; one seed fully determines a run.
    pub seed: u64,
    /// Length of the arrival window in seconds. Customers already inside when
    /// the horizon passes still finish their lifecycle.
    pub horizon: f64,
    /// Entrance gates.
    pub gates: Vec<GateConfig>,
    /// Food stations.
    pub stations: Vec<StationConfig>,
    /// Customer type mix.
    pub customer_types: Vec<CustomerTypeConfig>,
    /// Routing weights used for every visit after the first, keyed by station
    /// name.
    pub transition_weights: HashMap<String, f64>,
    /// Probability that a served customer visits another station instead of
    /// leaving.
    pub continue_probability: f64,
    /// Maximum time an SJF queue may keep a customer waiting before rank is
    /// overridden, in seconds.
    pub starvation_threshold: f64,
    /// Seconds added to the remaining service samples of waiting customers
    /// whenever an erratic customer finishes service.
    pub erratic_delay: f64,
    /// Size of the shared server pool used by `dynamic` stations.
    #[serde(default)]
    pub dynamic_servers: Option<usize>,
}

/// A station after name resolution.
#[derive(Debug, Clone)]
pub struct ResolvedStation {
    /// Station name, kept for reporting.
    pub name: String,
    /// Number of serving slots.
    pub servers: usize,
    /// Total physical capacity.
    pub capacity: usize,
    /// Service discipline.
    pub discipline: DisciplineKind,
    /// Mean service time in seconds.
    pub mean_service_time: f64,
}

/// A gate after name resolution.
#[derive(Debug, Clone)]
pub struct ResolvedGate {
    /// Poisson arrival rate.
    pub arrival_rate: f64,
    /// Initial routing weights indexed by station.
    pub initial_weights: Vec<f64>,
}

/// Validated configuration with station names resolved to indices.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// RNG seed.
    pub seed: u64,
    /// Arrival window length in seconds.
    pub horizon: f64,
    /// Entrance gates.
    pub gates: Vec<ResolvedGate>,
    /// Food stations.
    pub stations: Vec<ResolvedStation>,
    /// Customer type mix.
    pub customer_types: Vec<CustomerTypeConfig>,
    /// Transition weights indexed by station.
    pub transition_weights: Vec<f64>,
    /// Probability of continuing to another station after service.
    pub continue_probability: f64,
    /// SJF starvation threshold in seconds.
    pub starvation_threshold: f64,
    /// Erratic service delay in seconds.
    pub erratic_delay: f64,
    /// Shared pool size, present iff any station is dynamic.
    pub dynamic_servers: Option<usize>,
}

impl SimulationConfig {
    /// Reads a configuration from a JSON stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is not valid JSON or does not match the
    /// configuration schema.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Validates the configuration and resolves station names to indices.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.stations.is_empty() {
            return Err(ConfigError::NoStations);
        }
        if self.gates.is_empty() {
            return Err(ConfigError::NoGates);
        }
        validate_parameter("horizon", self.horizon, false)?;
        validate_probability("continue_probability", self.continue_probability)?;
        validate_parameter("starvation_threshold", self.starvation_threshold, true)?;
        validate_parameter("erratic_delay", self.erratic_delay, true)?;

        let stations = self
            .stations
            .iter()
            .map(|station| self.resolve_station(station))
            .collect::<Result<Vec<_>, _>>()?;
        let names: Vec<&str> = stations.iter().map(|s| s.name.as_str()).collect();

        let gates = self
            .gates
            .iter()
            .enumerate()
            .map(|(idx, gate)| {
                validate_parameter("arrival_rate", gate.arrival_rate, false).map_err(|_| {
                    ConfigError::InvalidGate {
                        gate: idx,
                        message: format!("arrival rate must be positive: {}", gate.arrival_rate),
                    }
                })?;
                let initial_weights = resolve_weights(&gate.initial_weights, &names)?;
                if initial_weights.iter().all(|&w| w <= 0.0) {
                    return Err(ConfigError::InvalidGate {
                        gate: idx,
                        message: String::from("at least one positive initial weight required"),
                    });
                }
                Ok(ResolvedGate {
                    arrival_rate: gate.arrival_rate,
                    initial_weights,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let transition_weights = resolve_weights(&self.transition_weights, &names)?;
        if transition_weights.iter().all(|&w| w <= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "transition_weights",
                message: String::from("at least one positive weight required"),
            });
        }

        self.validate_type_mix()?;

        let dynamic_servers = match self.dynamic_servers {
            Some(0) => {
                return Err(ConfigError::InvalidParameter {
                    name: "dynamic_servers",
                    message: String::from("must be positive"),
                })
            }
            servers => servers,
        };
        if stations
            .iter()
            .any(|s| s.discipline == DisciplineKind::Dynamic)
            && dynamic_servers.is_none()
        {
            return Err(ConfigError::MissingDynamicServers);
        }

        Ok(ResolvedConfig {
            seed: self.seed,
            horizon: self.horizon,
            gates,
            stations,
            customer_types: self.customer_types.clone(),
            transition_weights,
            continue_probability: self.continue_probability,
            starvation_threshold: self.starvation_threshold,
            erratic_delay: self.erratic_delay,
            dynamic_servers,
        })
    }

    fn resolve_station(&self, station: &StationConfig) -> Result<ResolvedStation, ConfigError> {
        let discipline = DisciplineKind::from_str(&station.discipline).map_err(|_| {
            ConfigError::UnknownDiscipline {
                station: station.name.clone(),
                discipline: station.discipline.clone(),
            }
        })?;
        if station.servers == 0 {
            return Err(ConfigError::InvalidStation {
                station: station.name.clone(),
                message: String::from("must have at least one serving slot"),
            });
        }
        if station.capacity < station.servers {
            return Err(ConfigError::InvalidStation {
                station: station.name.clone(),
                message: format!(
                    "capacity {} cannot be less than the {} serving slots",
                    station.capacity, station.servers
                ),
            });
        }
        if !(station.mean_service_time > 0.0 && station.mean_service_time.is_finite()) {
            return Err(ConfigError::InvalidStation {
                station: station.name.clone(),
                message: format!(
                    "mean service time must be positive: {}",
                    station.mean_service_time
                ),
            });
        }
        Ok(ResolvedStation {
            name: station.name.clone(),
            servers: station.servers,
            capacity: station.capacity,
            discipline,
            mean_service_time: station.mean_service_time,
        })
    }

    fn validate_type_mix(&self) -> Result<(), ConfigError> {
        if self.customer_types.is_empty() {
            return Err(ConfigError::InvalidTypeMix(String::from(
                "at least one customer type required",
            )));
        }
        let mut total = 0.0;
        for entry in &self.customer_types {
            if !(entry.probability >= 0.0 && entry.probability.is_finite()) {
                return Err(ConfigError::InvalidTypeMix(format!(
                    "probability of {} must be non-negative: {}",
                    entry.customer_type.to_string(),
                    entry.probability
                )));
            }
            total += entry.probability;
            let (min, max) = entry.patience;
            if !(min >= 0.0 && max >= min && max.is_finite()) {
                return Err(ConfigError::InvalidTypeMix(format!(
                    "patience range of {} must be finite and satisfy 0 <= min <= max",
                    entry.customer_type.to_string()
                )));
            }
            if !(entry.service_multiplier > 0.0 && entry.service_multiplier.is_finite()) {
                return Err(ConfigError::InvalidTypeMix(format!(
                    "service multiplier of {} must be positive",
                    entry.customer_type.to_string()
                )));
            }
        }
        if total <= 0.0 {
            return Err(ConfigError::InvalidTypeMix(String::from(
                "probabilities must not all be zero",
            )));
        }
        Ok(())
    }
}

fn resolve_weights(
    weights: &HashMap<String, f64>,
    names: &[&str],
) -> Result<Vec<f64>, ConfigError> {
    for name in weights.keys() {
        if !names.contains(&name.as_str()) {
            return Err(ConfigError::UnknownStation(name.clone()));
        }
    }
    Ok(names
        .iter()
        .map(|name| weights.get(*name).copied().unwrap_or(0.0))
        .collect())
}

fn validate_parameter(name: &'static str, value: f64, zero_ok: bool) -> Result<(), ConfigError> {
    let valid = value.is_finite() && if zero_ok { value >= 0.0 } else { value > 0.0 };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            message: format!("out of range: {}", value),
        })
    }
}

fn validate_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            message: format!("must be within [0, 1]: {}", value),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn example_json() -> &'static str {
        r#"{
            "seed": 17,
            "horizon": 3600.0,
            "gates": [
                {
                    "arrival_rate": 0.5,
                    "initial_weights": { "soup": 3.0, "grill": 1.0 }
                }
            ],
            "stations": [
                {
                    "name": "soup",
                    "servers": 2,
                    "capacity": 10,
                    "discipline": "fcfs",
                    "mean_service_time": 30.0
                },
                {
                    "name": "grill",
                    "servers": 1,
                    "capacity": 5,
                    "discipline": "sjf",
                    "mean_service_time": 60.0
                }
            ],
            "customer_types": [
                {
                    "customer_type": "normal",
                    "probability": 0.7,
                    "patience": [60.0, 180.0],
                    "service_multiplier": 1.0
                },
                {
                    "customer_type": "indulgent",
                    "probability": 0.3,
                    "patience": [120.0, 240.0],
                    "service_multiplier": 2.0
                }
            ],
            "transition_weights": { "soup": 1.0, "grill": 2.0 },
            "continue_probability": 0.7,
            "starvation_threshold": 100.0,
            "erratic_delay": 5.0
        }"#
    }

    #[test]
    fn test_parse_and_resolve() {
        let config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.stations.len(), 2);
        assert_eq!(resolved.stations[0].name, "soup");
        assert_eq!(resolved.stations[0].discipline, DisciplineKind::Fcfs);
        assert_eq!(resolved.stations[1].discipline, DisciplineKind::Sjf);
        assert_eq!(resolved.gates[0].initial_weights, vec![3.0, 1.0]);
        assert_eq!(resolved.transition_weights, vec![1.0, 2.0]);
        assert!(resolved.dynamic_servers.is_none());
    }

    #[test]
    fn test_unknown_station_in_weights() {
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config
            .transition_weights
            .insert(String::from("sushi"), 1.0);
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::UnknownStation(name)) if name == "sushi"
        ));
    }

    #[test]
    fn test_unknown_discipline() {
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.stations[0].discipline = String::from("lifo");
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::UnknownDiscipline { .. })
        ));
    }

    #[test]
    fn test_dynamic_requires_pool_size() {
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.stations[0].discipline = String::from("dynamic");
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingDynamicServers)
        ));
        config.dynamic_servers = Some(4);
        assert!(config.resolve().is_ok());
    }

    #[test]
    fn test_capacity_below_servers_rejected() {
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.stations[0].capacity = 1;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidStation { .. })
        ));
    }

    #[test]
    fn test_continue_probability_range() {
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.continue_probability = 1.2;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidParameter { name, .. }) if name == "continue_probability"
        ));
    }

    #[test]
    fn test_patience_range_validation() {
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.customer_types[0].patience = (10.0, 5.0);
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidTypeMix(_))));
    }

    #[test]
    fn test_non_finite_patience_rejected() {
        // The patience draw is uniform over the range, which cannot handle
        // non-finite bounds; they must be fatal at startup rather than panic
        // mid-run.
        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.customer_types[0].patience = (f64::INFINITY, f64::INFINITY);
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidTypeMix(_))));

        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.customer_types[0].patience = (0.0, f64::INFINITY);
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidTypeMix(_))));

        let mut config = SimulationConfig::from_json(example_json().as_bytes()).unwrap();
        config.customer_types[0].patience = (f64::NAN, f64::NAN);
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidTypeMix(_))));
    }
}
