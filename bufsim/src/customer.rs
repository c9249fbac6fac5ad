use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CustomerId, GateId, StationId};

/// Behavioral profile of a customer.
#[derive(
    strum::EnumString,
    strum::ToString,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    /// Baseline behavior.
    Normal,
    /// Draws patience from a much shorter range.
    Impatient,
    /// Takes twice as long to serve and never revisits a station.
    Indulgent,
    /// Slows down everyone still waiting when it finishes service.
    Erratic,
}

/// A customer present in the restaurant.
///
/// Service times are sampled once per station when the customer enters and
/// stored here, so that a station serves the customer for the same duration
/// regardless of when the visit happens. Erratic customers mutate these
/// samples for other waiting customers.
#[derive(Debug)]
pub struct Customer {
    id: CustomerId,
    gate: GateId,
    arrival_time: Duration,
    customer_type: CustomerType,
    patience: f64,
    service_samples: Vec<f64>,
    visited: Vec<bool>,
    reneged: bool,
    wait_start: Duration,
}

impl Customer {
    /// Constructs a new customer entering through `gate` at `arrival_time`.
    pub fn new(
        id: CustomerId,
        gate: GateId,
        arrival_time: Duration,
        customer_type: CustomerType,
        patience: f64,
        service_samples: Vec<f64>,
    ) -> Self {
        let stations = service_samples.len();
        Self {
            id,
            gate,
            arrival_time,
            customer_type,
            patience,
            service_samples,
            visited: vec![false; stations],
            reneged: false,
            wait_start: Duration::default(),
        }
    }

    /// The customer's ID.
    pub fn id(&self) -> CustomerId {
        self.id
    }

    /// The gate the customer entered through.
    pub fn gate(&self) -> GateId {
        self.gate
    }

    /// When the customer entered the restaurant.
    pub fn arrival_time(&self) -> Duration {
        self.arrival_time
    }

    /// The customer's behavioral profile.
    pub fn customer_type(&self) -> CustomerType {
        self.customer_type
    }

    /// Patience in seconds. May be zero (leaves immediately unless served on
    /// the spot) or infinite (never reneges).
    pub fn patience(&self) -> f64 {
        self.patience
    }

    /// Service time, in seconds, this customer requires at `station`.
    pub fn service_sample(&self, station: StationId) -> f64 {
        self.service_samples[usize::from(station)]
    }

    /// Extends the service time required at `station` by `delta` seconds.
    pub fn add_service_delta(&mut self, station: StationId, delta: f64) {
        self.service_samples[usize::from(station)] += delta;
    }

    /// Marks `station` as visited.
    pub fn mark_visited(&mut self, station: StationId) {
        self.visited[usize::from(station)] = true;
    }

    /// Whether the customer was ever routed to `station`.
    pub fn has_visited(&self, station: StationId) -> bool {
        self.visited[usize::from(station)]
    }

    /// Records when the customer joined the current queue.
    pub fn set_wait_start(&mut self, time: Duration) {
        self.wait_start = time;
    }

    /// When the customer joined the current queue.
    pub fn wait_start(&self) -> Duration {
        self.wait_start
    }

    /// Marks the customer as having given up waiting.
    pub fn mark_reneged(&mut self) {
        self.reneged = true;
    }

    /// Whether the customer has given up waiting.
    pub fn is_reneged(&self) -> bool {
        self.reneged
    }
}

/// All customers currently inside the restaurant, indexed by ID.
///
/// Lives in the simulation state so that stations and the router can look up
/// and mutate customers without owning them.
#[derive(Default)]
pub struct CustomerRegistry {
    customers: HashMap<CustomerId, Customer>,
    next_id: usize,
}

impl CustomerRegistry {
    /// Registers a new customer built by `make` from a freshly assigned ID.
    pub fn add<F>(&mut self, make: F) -> CustomerId
    where
        F: FnOnce(CustomerId) -> Customer,
    {
        let id = CustomerId::from(self.next_id);
        self.next_id += 1;
        self.customers.insert(id, make(id));
        id
    }

    /// Looks up a customer.
    pub fn get(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    /// Looks up a customer for mutation.
    pub fn get_mut(&mut self, id: CustomerId) -> Option<&mut Customer> {
        self.customers.get_mut(&id)
    }

    /// Removes a customer who left the restaurant.
    pub fn remove(&mut self, id: CustomerId) -> Option<Customer> {
        self.customers.remove(&id)
    }

    /// Number of customers currently inside.
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    /// Whether the restaurant is empty.
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_customer_type_from_str() {
        assert_eq!(
            CustomerType::from_str("normal").unwrap(),
            CustomerType::Normal
        );
        assert_eq!(
            CustomerType::from_str("impatient").unwrap(),
            CustomerType::Impatient
        );
        assert_eq!(
            CustomerType::from_str("indulgent").unwrap(),
            CustomerType::Indulgent
        );
        assert_eq!(
            CustomerType::from_str("erratic").unwrap(),
            CustomerType::Erratic
        );
        assert!(CustomerType::from_str("hangry").is_err());
    }

    #[test]
    fn test_service_samples_and_deltas() {
        let mut customer = Customer::new(
            CustomerId::from(0),
            GateId::from(0),
            Duration::from_secs(1),
            CustomerType::Normal,
            10.0,
            vec![2.0, 4.0],
        );
        assert!((customer.service_sample(StationId::from(1)) - 4.0).abs() < f64::EPSILON);
        customer.add_service_delta(StationId::from(1), 0.5);
        assert!((customer.service_sample(StationId::from(1)) - 4.5).abs() < f64::EPSILON);
        assert!((customer.service_sample(StationId::from(0)) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_visited_tracking() {
        let mut customer = Customer::new(
            CustomerId::from(0),
            GateId::from(0),
            Duration::default(),
            CustomerType::Indulgent,
            10.0,
            vec![1.0, 1.0, 1.0],
        );
        assert!(!customer.has_visited(StationId::from(2)));
        customer.mark_visited(StationId::from(2));
        assert!(customer.has_visited(StationId::from(2)));
        assert!(!customer.has_visited(StationId::from(0)));
    }

    #[test]
    fn test_registry_assigns_sequential_ids() {
        let mut registry = CustomerRegistry::default();
        let make = |id| {
            Customer::new(
                id,
                GateId::from(0),
                Duration::default(),
                CustomerType::Normal,
                1.0,
                vec![1.0],
            )
        };
        let first = registry.add(make);
        let second = registry.add(make);
        assert_eq!(first, CustomerId::from(0));
        assert_eq!(second, CustomerId::from(1));
        assert_eq!(registry.len(), 2);
        assert!(registry.remove(first).is_some());
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
    }
}
