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
use std::collections::VecDeque;
use std::rc::Rc;

use crate::environment::Environment;
use crate::event::Event;

struct QueueInner<T> {
    env: Environment,
    items: VecDeque<T>,
    getters: VecDeque<Event<T>>,
}

/// An unbounded FIFO channel. At most one of `items`/`getters` is nonempty
/// at any time — a `put` either hands straight to the oldest waiting
/// getter, or is buffered; a `get` either drains the oldest buffered item,
/// or joins the waiter list.
pub struct Queue<T>(Rc<RefCell<QueueInner<T>>>);

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Queue(self.0.clone())
    }
}

impl<T: Clone + 'static> Queue<T> {
    pub fn new(env: &Environment) -> Self {
        Queue(Rc::new(RefCell::new(QueueInner {
            env: env.clone(),
            items: VecDeque::new(),
            getters: VecDeque::new(),
        })))
    }

    /// The queue is unbounded, so `put` always succeeds immediately. If a
    /// getter is already waiting, it is resolved with `item` in this same
    /// tick, preserving FIFO among waiters; otherwise `item` is buffered.
    pub fn put(&self, item: T) -> Event<()> {
        let mut inner = self.0.borrow_mut();
        let env = inner.env.clone();
        if let Some(getter) = inner.getters.pop_front() {
            drop(inner);
            // Ignore the result: a getter can only be resolved once, and we
            // are the only writer holding this exact waiter handle.
            let _ = getter.succeed(item);
        } else {
            inner.items.push_back(item);
        }
        Event::succeeded(&env, ())
    }

    /// Returns the oldest buffered item immediately if one exists;
    /// otherwise joins the FIFO waiter list and returns a pending event
    /// that a later `put` will resolve.
    pub fn get(&self) -> Event<T> {
        let mut inner = self.0.borrow_mut();
        if let Some(item) = inner.items.pop_front() {
            let env = inner.env.clone();
            drop(inner);
            Event::succeeded(&env, item)
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

    /// Removes a losing `get` from the waiter list by identity, so a later
    /// `put` cannot deliver to it. Invoked only through an `Event`'s cancel
    /// hook, i.e. only by `first_of`.
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
    fn put_before_get_buffers_items_fifo() {
        let env = Environment::new();
        let queue: Queue<i32> = Queue::new(&env);

        queue.put(1);
        queue.put(2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.waiters_len(), 0);

        let first = queue.get();
        assert_eq!(first.value(), Some(1));
        let second = queue.get();
        assert_eq!(second.value(), Some(2));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn get_before_put_queues_waiters_fifo() {
        let env = Environment::new();
        let queue: Queue<&'static str> = Queue::new(&env);

        let a = queue.get();
        let b = queue.get();
        assert_eq!(queue.waiters_len(), 2);
        assert_eq!(queue.len(), 0);

        queue.put("first");
        queue.put("second");

        assert_eq!(a.value(), Some("first"));
        assert_eq!(b.value(), Some("second"));
        assert_eq!(queue.waiters_len(), 0);
    }

    #[test]
    fn invariant_items_xor_getters() {
        let env = Environment::new();
        let queue: Queue<i32> = Queue::new(&env);

        queue.put(1);
        assert!(queue.len() > 0 && queue.waiters_len() == 0);

        queue.get();
        assert!(queue.len() == 0 && queue.waiters_len() == 0);

        queue.get();
        assert!(queue.len() == 0 && queue.waiters_len() > 0);
    }

    #[test]
    fn cancelling_a_pending_get_removes_it_from_waiters() {
        let env = Environment::new();
        let queue: Queue<i32> = Queue::new(&env);

        let waiter = queue.get();
        assert_eq!(queue.waiters_len(), 1);

        waiter.cancel();
        assert_eq!(queue.waiters_len(), 0);

        queue.put(99);
        assert!(waiter.is_pending(), "cancelled getter must not be fed");
        assert_eq!(queue.len(), 1, "the put must not be lost either");
    }
}
