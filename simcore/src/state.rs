use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

use rand::RngCore;

use crate::Queue;

/// A type-safe key used to fetch values from the value store.
///
/// # Construction
///
/// A key can be constructed only by calling [`State::insert`]. The state
/// assigns a new numerical ID to the inserted value. Additionally, the key
/// holds a unique hash for the state object. This prevents using the key
/// with a different instance of [`State`]; such an operation panics.
///
/// # Type Safety
///
/// A key used to insert a value of type `T` cannot be used to access a value
/// of another type `U`; the key is generic over `T`, which is only a marker,
/// and no values of type `T` are stored inside the key.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Key<V> {
    id: usize,
    state_hash: u64,
    _marker: PhantomData<V>,
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }
}
impl<T> Copy for Key<T> {}

/// A type-safe identifier of a queue.
///
/// This is an analogue of [`Key`] used specifically for queues.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct QueueId<V> {
    id: usize,
    state_hash: u64,
    _marker: PhantomData<V>,
}

impl<T> Clone for QueueId<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }
}
impl<T> Copy for QueueId<T> {}

/// Error returned when sending to a queue that is at capacity. Holds the
/// rejected value.
#[derive(Debug, PartialEq, Eq)]
pub struct PushError<V>(pub V);

/// State of a simulation holding all queues and arbitrary values in a value
/// store.
pub struct State {
    store: HashMap<usize, Box<dyn Any>>,
    queues: HashMap<usize, Box<dyn Any>>,
    next_id: usize,
    state_hash: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            store: HashMap::new(),
            queues: HashMap::new(),
            next_id: 0,
            state_hash: rand::thread_rng().next_u64(),
        }
    }
}

impl State {
    pub(crate) fn hash(&self) -> u64 {
        self.state_hash
    }

    fn assert_hash(&self, key_hash: u64) {
        assert_eq!(
            key_hash, self.state_hash,
            "State hash of the key does not match the hash of the state"
        );
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Inserts an arbitrary value to the value store. Learn more in the
    /// documentation for [`Key`].
    #[must_use = "Discarding key results in leaking inserted value"]
    pub fn insert<V: 'static>(&mut self, value: V) -> Key<V> {
        let id = self.next_id();
        self.store.insert(id, Box::new(value));
        Key {
            id,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }

    /// Removes a value of type `V` from the value store. Learn more in the
    /// documentation for [`Key`].
    pub fn remove<V: 'static>(&mut self, key: Key<V>) -> Option<V> {
        self.assert_hash(key.state_hash);
        self.store
            .remove(&key.id)
            .map(|v| *v.downcast::<V>().expect("value type mismatch"))
    }

    /// Gets an immutable reference to a value of a type `V` from the value
    /// store. Learn more in the documentation for [`Key`].
    #[must_use]
    pub fn get<V: 'static>(&self, key: Key<V>) -> Option<&V> {
        self.assert_hash(key.state_hash);
        self.store
            .get(&key.id)
            .map(|v| v.downcast_ref::<V>().expect("value type mismatch"))
    }

    /// Gets a mutable reference to a value of a type `V` from the value
    /// store. Learn more in the documentation for [`Key`].
    #[must_use]
    pub fn get_mut<V: 'static>(&mut self, key: Key<V>) -> Option<&mut V> {
        self.assert_hash(key.state_hash);
        self.store
            .get_mut(&key.id)
            .map(|v| v.downcast_mut::<V>().expect("value type mismatch"))
    }

    /// Creates a new unbounded queue, returning its ID.
    #[must_use]
    pub fn new_queue<V: 'static>(&mut self) -> QueueId<V> {
        let id = self.next_id();
        self.queues.insert(id, Box::new(Queue::<V>::default()));
        QueueId {
            id,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }

    /// Creates a new bounded queue, returning its ID.
    #[must_use]
    pub fn new_bounded_queue<V: 'static>(&mut self, capacity: usize) -> QueueId<V> {
        let id = self.next_id();
        self.queues.insert(id, Box::new(Queue::<V>::bounded(capacity)));
        QueueId {
            id,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }

    fn queue_mut<V: 'static>(&mut self, queue: QueueId<V>) -> &mut Queue<V> {
        self.assert_hash(queue.state_hash);
        self.queues
            .get_mut(&queue.id)
            .expect("if this queue ID was issued, a corresponding queue must exist")
            .downcast_mut::<Queue<V>>()
            .expect("queue type mismatch")
    }

    /// Sends `value` to the `queue`.
    ///
    /// # Errors
    ///
    /// Returns the rejected value if the queue is full.
    pub fn send<V: 'static>(&mut self, queue: QueueId<V>, value: V) -> Result<(), PushError<V>> {
        self.queue_mut(queue).push_back(value).map_err(PushError)
    }

    /// Pops the first value from the `queue`. It returns `None` if the queue
    /// is empty.
    pub fn recv<V: 'static>(&mut self, queue: QueueId<V>) -> Option<V> {
        self.queue_mut(queue).pop_front()
    }

    /// Checks the number of elements in the queue.
    pub fn len<V: 'static>(&mut self, queue: QueueId<V>) -> usize {
        self.queue_mut(queue).len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_remove_key_values() {
        let mut state = State::default();

        let id = state.insert(1);
        assert_eq!(state.remove(id), Some(1));
        assert_eq!(state.remove(id), None);

        let id = state.insert("string_slice");
        assert_eq!(state.remove(id), Some("string_slice"));
        assert_eq!(state.remove(id), None);

        let id = state.insert(vec![String::from("S")]);
        assert_eq!(state.remove(id), Some(vec![String::from("S")]));
        assert_eq!(state.remove(id), None);
    }

    #[test]
    #[should_panic(expected = "State hash of the key does not match")]
    fn test_key_from_another_state() {
        let mut state_1 = State::default();
        let mut state_2 = State::default();
        let id = state_1.insert(1);
        let _ = state_2.remove(id);
    }

    #[test]
    fn test_get_and_get_mut() {
        let mut state = State::default();
        let id = state.insert(String::from("a"));
        state.get_mut(id).unwrap().push('b');
        assert_eq!(state.get(id).map(String::as_str), Some("ab"));
    }

    #[test]
    fn test_bounded_queue() {
        let mut state = State::default();
        let qid = state.new_bounded_queue::<&str>(2);
        assert_eq!(state.len(qid), 0);

        assert!(state.send(qid, "A").is_ok());
        assert!(state.send(qid, "B").is_ok());
        assert_eq!(state.send(qid, "C"), Err(PushError("C")));

        assert_eq!(state.recv(qid), Some("A"));
        assert_eq!(state.recv(qid), Some("B"));
        assert_eq!(state.recv(qid), None);
    }

    #[test]
    fn test_unbounded_queue() {
        let mut state = State::default();
        let qid = state.new_queue::<&str>();
        assert_eq!(state.len(qid), 0);

        assert!(state.send(qid, "A").is_ok());
        assert!(state.send(qid, "B").is_ok());
        assert!(state.send(qid, "C").is_ok());

        assert_eq!(state.recv(qid), Some("A"));
        assert_eq!(state.recv(qid), Some("B"));
        assert_eq!(state.recv(qid), Some("C"));
        assert_eq!(state.recv(qid), None);
    }
}
