//! Unique most-recently-submitted-first work queue.
//!
//! [`WorkQueue`] is the coordination point between request handlers that
//! discover files (producers) and the worker pool that generates thumbnails
//! (consumers). It holds at most one pending entry per key and serves keys in
//! most-recently-inserted order, so the directory a user is looking at *right
//! now* is always thumbnailed first.
//!
//! Each key is in exactly one of three states:
//!
//! - **Queued** — linked into the MRU list, waiting to be claimed.
//! - **In flight** — claimed by exactly one worker. The key stays registered
//!   so duplicate submissions are recognised and suppressed, but it is no
//!   longer in the list.
//! - **Absent** — not tracked at all (never submitted, or released).
//!
//! Submitting a queued key moves it to the front without duplication;
//! submitting an in-flight key is a no-op. All operations are O(1), backed by
//! a hash map plus an arena-allocated doubly linked list with sentinel nodes,
//! guarded by a single mutex/condvar pair.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::mem;
use std::sync::{Condvar, Mutex};

/// Arena index of the head sentinel.
const HEAD: usize = 0;
/// Arena index of the tail sentinel.
const TAIL: usize = 1;

/// What the queue currently knows about a tracked key.
enum Slot {
    /// Waiting in the list; the value is the key's arena node index.
    Queued(usize),
    /// Claimed by a worker; not present in the list.
    InFlight,
}

struct Node {
    key: String,
    prev: usize,
    next: usize,
}

/// Doubly linked list over a `Vec` arena with head/tail sentinels.
///
/// Freed node indices are recycled so long-running queues do not grow the
/// arena beyond their high-water mark.
struct NodeList {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl NodeList {
    fn new() -> Self {
        let nodes = vec![
            Node { key: String::new(), prev: HEAD, next: TAIL },
            Node { key: String::new(), prev: HEAD, next: TAIL },
        ];
        Self { nodes, free: Vec::new() }
    }

    fn is_empty(&self) -> bool {
        self.nodes[HEAD].next == TAIL
    }

    /// Link an existing node right after the head sentinel.
    fn link_front(&mut self, index: usize) {
        let first = self.nodes[HEAD].next;
        self.nodes[index].prev = HEAD;
        self.nodes[index].next = first;
        self.nodes[HEAD].next = index;
        self.nodes[first].prev = index;
    }

    /// Detach a node from the list without freeing it.
    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    /// Allocate a node for `key` and place it at the front.
    fn push_front(&mut self, key: String) -> usize {
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index].key = key;
                index
            }
            None => {
                self.nodes.push(Node { key, prev: HEAD, next: TAIL });
                self.nodes.len() - 1
            }
        };
        self.link_front(index);
        index
    }

    fn move_to_front(&mut self, index: usize) {
        self.unlink(index);
        self.link_front(index);
    }

    /// Remove and return the most recently inserted key, if any.
    fn pop_front(&mut self) -> Option<String> {
        let index = self.nodes[HEAD].next;
        if index == TAIL {
            return None;
        }
        self.unlink(index);
        self.free.push(index);
        Some(mem::take(&mut self.nodes[index].key))
    }
}

struct State {
    closed: bool,
    entries: HashMap<String, Slot>,
    list: NodeList,
}

/// Thread-safe unique MRU work queue.
///
/// Any number of producers may call [`submit_batch`](WorkQueue::submit_batch)
/// concurrently while workers block in [`claim`](WorkQueue::claim).
/// [`close`](WorkQueue::close) is the one-shot shutdown signal: it wakes every
/// blocked claimant, each of which observes `None` exactly once.
///
/// # Example
///
/// ```
/// use thumbq::WorkQueue;
///
/// let queue = WorkQueue::new();
/// queue.submit_batch(["/a.mkv".to_string(), "/b.mkv".to_string()]);
/// let key = queue.claim().unwrap();
/// assert_eq!(key, "/a.mkv");
/// queue.release(&key);
/// queue.close();
/// assert_eq!(queue.claim(), None);
/// ```
pub struct WorkQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                closed: false,
                entries: HashMap::new(),
                list: NodeList::new(),
            }),
            available: Condvar::new(),
        }
    }

    /// Submit a batch of keys in priority order: the first key of the batch
    /// is the first one claimed, ahead of anything submitted earlier and not
    /// yet claimed.
    ///
    /// Internally the batch is walked in reverse so that, after repeated
    /// most-recent-first insertion, the pop order matches the order given
    /// here.
    ///
    /// In-flight keys are skipped (their running job will complete on its
    /// own); already-queued keys are moved to their new position without
    /// creating a duplicate.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been closed. Submitting work during shutdown
    /// is a coordination bug in the caller.
    pub fn submit_batch<I>(&self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        let keys: Vec<String> = keys.into_iter().collect();

        let mut guard = self.state.lock().unwrap();
        assert!(!guard.closed, "submit_batch called on a closed queue");
        let State { entries, list, .. } = &mut *guard;

        let mut submitted = false;
        for key in keys.into_iter().rev() {
            match entries.entry(key) {
                Entry::Occupied(occupied) => match occupied.get() {
                    Slot::InFlight => continue,
                    Slot::Queued(index) => list.move_to_front(*index),
                },
                Entry::Vacant(vacant) => {
                    let index = list.push_front(vacant.key().clone());
                    vacant.insert(Slot::Queued(index));
                }
            }
            submitted = true;
        }

        drop(guard);
        if submitted {
            // Every idle worker competes for the new entries.
            self.available.notify_all();
        }
    }

    /// Block until a key is available or the queue is closed.
    ///
    /// Returns the most recently inserted key and marks it in flight, or
    /// `None` once the queue has been closed (including for callers that
    /// were already blocked when [`close`](WorkQueue::close) ran).
    ///
    /// The caller owns the key until it calls [`release`](WorkQueue::release).
    pub fn claim(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return None;
            }
            if let Some(key) = state.list.pop_front() {
                state.entries.insert(key.clone(), Slot::InFlight);
                return Some(key);
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Release a previously claimed key, making future submissions of the
    /// same key effective again.
    ///
    /// Any cache write for the key must happen before this call so that a
    /// resubmission arriving after the release observes the completed
    /// outcome.
    ///
    /// No-op if the queue has already been closed.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not currently in flight; releasing a key you do
    /// not hold is a coordination bug.
    pub fn release(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        match state.entries.remove(key) {
            Some(Slot::InFlight) => {}
            Some(Slot::Queued(_)) | None => {
                panic!("release of key that is not in flight: {key}");
            }
        }
    }

    /// Close the queue permanently.
    ///
    /// Discards all tracked state and wakes every thread blocked in
    /// [`claim`](WorkQueue::claim), each of which observes the closed signal
    /// exactly once. Call exactly once, at shutdown.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.entries = HashMap::new();
        state.list = NodeList::new();
        self.available.notify_all();
    }

    /// Number of queued (claimable) keys. In-flight keys are not counted.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .entries
            .values()
            .filter(|slot| matches!(slot, Slot::Queued(_)))
            .count()
    }
}
