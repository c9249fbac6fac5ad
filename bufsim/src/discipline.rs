//! Service disciplines deciding which waiting customer a freed slot serves
//! next.
//!
//! The `dynamic` discipline is not represented here: dynamic stations do not
//! keep a local queue at all and instead request slots from the shared
//! [`pool`](crate::pool).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};

use crate::CustomerId;

/// Service discipline selector, parsed from configuration.
#[derive(strum::EnumString, strum::ToString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum DisciplineKind {
    /// First come, first served.
    Fcfs,
    /// Shortest job first, with a starvation guard.
    Sjf,
    /// Random order of service.
    Ros,
    /// Serving slots are drawn from the shared pool; no local queue.
    Dynamic,
}

/// A customer waiting in a station queue.
#[derive(Debug, Clone, Copy)]
pub struct WaitingEntry {
    /// The waiting customer.
    pub customer: CustomerId,
    /// Time the customer joined the queue.
    pub enqueued_at: Duration,
    /// Service time the customer will require, used by rank-based disciplines.
    pub rank: f64,
}

/// A queue of waiting customers with a pluggable selection order.
pub trait Discipline {
    /// Adds a customer to the queue.
    fn enqueue(&mut self, entry: WaitingEntry);

    /// Removes a customer who reneged before being served.
    fn cancel(&mut self, customer: CustomerId);

    /// Picks the customer a freed slot should serve next, or `None` if nobody
    /// is waiting.
    fn select_next(&mut self, now: Duration, rng: &mut dyn RngCore) -> Option<CustomerId>;

    /// Number of customers waiting.
    fn len(&self) -> usize;

    /// Whether nobody is waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Constructs the queue implementation for `kind`.
///
/// # Panics
///
/// Panics when called for [`DisciplineKind::Dynamic`]; dynamic stations have
/// no local queue.
pub fn new_discipline(kind: DisciplineKind, starvation_threshold: Duration) -> Box<dyn Discipline> {
    match kind {
        DisciplineKind::Fcfs => Box::new(FcfsQueue::default()),
        DisciplineKind::Sjf => Box::new(SjfQueue::new(starvation_threshold)),
        DisciplineKind::Ros => Box::new(RosQueue::default()),
        DisciplineKind::Dynamic => panic!("dynamic stations draw slots from the shared pool"),
    }
}

/// First come, first served.
#[derive(Default)]
pub struct FcfsQueue {
    queue: VecDeque<WaitingEntry>,
}

impl Discipline for FcfsQueue {
    fn enqueue(&mut self, entry: WaitingEntry) {
        self.queue.push_back(entry);
    }

    fn cancel(&mut self, customer: CustomerId) {
        self.queue.retain(|entry| entry.customer != customer);
    }

    fn select_next(&mut self, _now: Duration, _rng: &mut dyn RngCore) -> Option<CustomerId> {
        self.queue.pop_front().map(|entry| entry.customer)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Random order of service: a freed slot picks a waiting customer uniformly
/// at random.
#[derive(Default)]
pub struct RosQueue {
    entries: Vec<WaitingEntry>,
}

impl Discipline for RosQueue {
    fn enqueue(&mut self, entry: WaitingEntry) {
        self.entries.push(entry);
    }

    fn cancel(&mut self, customer: CustomerId) {
        self.entries.retain(|entry| entry.customer != customer);
    }

    fn select_next(&mut self, _now: Duration, rng: &mut dyn RngCore) -> Option<CustomerId> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.entries.len());
        Some(self.entries.swap_remove(idx).customer)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct SjfEntry {
    rank: Reverse<OrderedFloat<f64>>,
    seq: Reverse<u64>,
    customer: CustomerId,
}

impl PartialOrd for SjfEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SjfEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank
            .cmp(&other.rank)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Shortest job first with a starvation guard.
///
/// A freed slot normally serves the waiting customer with the smallest
/// service time. However, if the oldest waiting customer has been waiting
/// longer than the starvation threshold, that customer is served instead,
/// regardless of rank.
///
/// Cancellations are lazy: a removed entry's copies stay in the rank heap
/// and the arrival list until they surface, then get skipped. Staleness is
/// keyed by the enqueue sequence number rather than the customer, so a
/// customer revisiting the station gets a fresh entry that is unaffected by
/// the fate of earlier ones.
pub struct SjfQueue {
    heap: BinaryHeap<SjfEntry>,
    arrivals: VecDeque<(CustomerId, u64, Duration)>,
    /// Waiting customers and the sequence number of their current entry.
    active: HashMap<CustomerId, u64>,
    stale_heap: HashSet<u64>,
    stale_arrivals: HashSet<u64>,
    threshold: Duration,
    seq: u64,
}

impl SjfQueue {
    /// Constructs an empty queue with the given starvation threshold.
    pub fn new(threshold: Duration) -> Self {
        Self {
            heap: BinaryHeap::new(),
            arrivals: VecDeque::new(),
            active: HashMap::new(),
            stale_heap: HashSet::new(),
            stale_arrivals: HashSet::new(),
            threshold,
            seq: 0,
        }
    }
}

impl Discipline for SjfQueue {
    fn enqueue(&mut self, entry: WaitingEntry) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(SjfEntry {
            rank: Reverse(OrderedFloat(entry.rank)),
            seq: Reverse(seq),
            customer: entry.customer,
        });
        self.arrivals.push_back((entry.customer, seq, entry.enqueued_at));
        self.active.insert(entry.customer, seq);
    }

    fn cancel(&mut self, customer: CustomerId) {
        if let Some(seq) = self.active.remove(&customer) {
            self.stale_heap.insert(seq);
            self.stale_arrivals.insert(seq);
        }
    }

    fn select_next(&mut self, now: Duration, _rng: &mut dyn RngCore) -> Option<CustomerId> {
        // Starvation guard: the oldest live waiter overrides rank order once
        // their wait exceeds the threshold.
        while let Some(&(customer, seq, enqueued_at)) = self.arrivals.front() {
            if self.stale_arrivals.remove(&seq) {
                self.arrivals.pop_front();
                continue;
            }
            if now.saturating_sub(enqueued_at) > self.threshold {
                self.arrivals.pop_front();
                self.active.remove(&customer);
                // The heap copy of this entry stays behind.
                self.stale_heap.insert(seq);
                return Some(customer);
            }
            break;
        }
        while let Some(entry) = self.heap.pop() {
            if self.stale_heap.remove(&entry.seq.0) {
                continue;
            }
            // The arrival-list copy of this entry stays behind.
            self.active.remove(&entry.customer);
            self.stale_arrivals.insert(entry.seq.0);
            return Some(entry.customer);
        }
        None
    }

    fn len(&self) -> usize {
        self.active.len()
    }
}
