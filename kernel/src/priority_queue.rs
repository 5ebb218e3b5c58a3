/*
 *   Copyright (c) 2024 desim contributors
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;

use crate::environment::Environment;
use crate::event::Event;

/// One buffered item, ordered by `(priority, insertion sequence)` with both
/// legs reversed so a max-heap [`BinaryHeap`] pops the smallest priority
/// first, and ties break in FIFO (earliest-inserted-first) order — the same
/// trick [`crate::environment::Environment`]'s scheduled-entry heap uses.
///
/// `Ord` is hand-implemented rather than derived so that `T` itself never
/// needs to be `Ord`: two entries never compare equal on `(priority, seq)`,
/// since `seq` is unique, so `value` is never actually inspected.
struct QueuedEntry<P, T> {
    priority: P,
    seq: u64,
    value: T,
}

impl<P: PartialEq, T> PartialEq for QueuedEntry<P, T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl<P: Eq, T> Eq for QueuedEntry<P, T> {}

impl<P: Ord, T> PartialOrd for QueuedEntry<P, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Ord, T> Ord for QueuedEntry<P, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct PriorityQueueInner<P, T> {
    env: Environment,
    items: BinaryHeap<QueuedEntry<P, T>>,
    next_seq: u64,
    getters: VecDeque<Event<T>>,
}

/// Like [`crate::Queue`], but buffered items are drained in ascending
/// priority order (lowest `P` first) rather than insertion order. Items with
/// equal priority are still FIFO among themselves.
///
/// As with `Queue`, a `put` that finds a getter already waiting delivers
/// straight to it and never touches the heap at all — priority ordering only
/// governs items that actually had to wait.
pub struct PriorityQueue<P, T>(Rc<RefCell<PriorityQueueInner<P, T>>>);

impl<P, T> Clone for PriorityQueue<P, T> {
    fn clone(&self) -> Self {
        PriorityQueue(self.0.clone())
    }
}

impl<P: Ord + 'static, T: Clone + 'static> PriorityQueue<P, T> {
    pub fn new(env: &Environment) -> Self {
        PriorityQueue(Rc::new(RefCell::new(PriorityQueueInner {
            env: env.clone(),
            items: BinaryHeap::new(),
            next_seq: 0,
            getters: VecDeque::new(),
        })))
    }

    /// Delivers straight to the oldest waiting getter if one exists
    /// (bypassing priority ordering, which only applies to buffered items);
    /// otherwise inserts `value` into the heap under `priority`.
    pub fn put(&self, priority: P, value: T) -> Event<()> {
        let mut inner = self.0.borrow_mut();
        let env = inner.env.clone();
        if let Some(getter) = inner.getters.pop_front() {
            drop(inner);
            let _ = getter.succeed(value);
        } else {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.items.push(QueuedEntry {
                priority,
                seq,
                value,
            });
        }
        Event::succeeded(&env, ())
    }

    /// Returns the lowest-priority buffered item immediately if one exists;
    /// otherwise joins the FIFO waiter list.
    pub fn get(&self) -> Event<T> {
        let mut inner = self.0.borrow_mut();
        if let Some(entry) = inner.items.pop() {
            let env = inner.env.clone();
            drop(inner);
            Event::succeeded(&env, entry.value)
        } else {
            let env = inner.env.clone();
            let event = Event::pending(&env);
            inner.getters.push_back(event.clone());
            drop(inner);

            let this = self.clone();
            let event_for_hook = event.clone();
            event.set_on_cancel(move || this.remove_getter(&event_for_hook));
            event
        }
    }

    fn remove_getter(&self, target: &Event<T>) {
        let mut inner = self.0.borrow_mut();
        if let Some(pos) = inner.getters.iter().position(|e| e.is_same(target)) {
            inner.getters.remove(pos);
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn waiters_len(&self) -> usize {
        self.0.borrow().getters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drains_lowest_priority_first() {
        let env = Environment::new();
        let pq: PriorityQueue<i32, &'static str> = PriorityQueue::new(&env);

        pq.put(5, "medium");
        pq.put(1, "urgent");
        pq.put(9, "low");

        assert_eq!(pq.get().value(), Some("urgent"));
        assert_eq!(pq.get().value(), Some("medium"));
        assert_eq!(pq.get().value(), Some("low"));
    }

    #[test]
    fn equal_priority_ties_break_fifo() {
        let env = Environment::new();
        let pq: PriorityQueue<i32, &'static str> = PriorityQueue::new(&env);

        pq.put(1, "a");
        pq.put(1, "b");
        pq.put(1, "c");

        assert_eq!(pq.get().value(), Some("a"));
        assert_eq!(pq.get().value(), Some("b"));
        assert_eq!(pq.get().value(), Some("c"));
    }

    #[test]
    fn put_delivers_directly_to_waiting_getter_bypassing_priority() {
        let env = Environment::new();
        let pq: PriorityQueue<i32, &'static str> = PriorityQueue::new(&env);

        let first_waiter = pq.get();
        let second_waiter = pq.get();

        // Even though "low" has worse priority than a hypothetical later
        // put, it reaches the first waiter because waiters are serviced
        // strictly in arrival order, not by any priority of their own.
        pq.put(9, "low");
        pq.put(1, "urgent");

        assert_eq!(first_waiter.value(), Some("low"));
        assert_eq!(second_waiter.value(), Some("urgent"));
        assert_eq!(pq.len(), 0);
    }

    #[test]
    fn cancelling_a_pending_get_removes_it_from_waiters() {
        let env = Environment::new();
        let pq: PriorityQueue<i32, i32> = PriorityQueue::new(&env);

        let waiter = pq.get();
        assert_eq!(pq.waiters_len(), 1);
        waiter.cancel();
        assert_eq!(pq.waiters_len(), 0);

        pq.put(1, 42);
        assert!(waiter.is_pending());
        assert_eq!(pq.len(), 1);
    }
}
