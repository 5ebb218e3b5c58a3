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

struct BarrierInner {
    env: Environment,
    waiters: VecDeque<Event<()>>,
}

/// A rendezvous point with no fixed party count: any number of processes can
/// `wait`, and a single `release` resolves all of them at once, in the order
/// they joined, then clears the list — the barrier is reusable immediately.
pub struct Barrier(Rc<RefCell<BarrierInner>>);

impl Clone for Barrier {
    fn clone(&self) -> Self {
        Barrier(self.0.clone())
    }
}

impl Barrier {
    pub fn new(env: &Environment) -> Self {
        Barrier(Rc::new(RefCell::new(BarrierInner {
            env: env.clone(),
            waiters: VecDeque::new(),
        })))
    }

    pub fn wait(&self) -> Event<()> {
        let mut inner = self.0.borrow_mut();
        let env = inner.env.clone();
        let event = Event::pending(&env);
        inner.waiters.push_back(event.clone());
        drop(inner);

        let this = self.clone();
        let event_for_hook = event.clone();
        event.set_on_cancel(move || this.remove_waiter(&event_for_hook));
        event
    }

    /// Resolves every current waiter, in the order each one called `wait`,
    /// then empties the waiter list so the barrier can be reused by a next
    /// round of waiters.
    pub fn release(&self) {
        let waiters = std::mem::take(&mut self.0.borrow_mut().waiters);
        for waiter in waiters {
            let _ = waiter.succeed(());
        }
    }

    fn remove_waiter(&self, target: &Event<()>) {
        let mut inner = self.0.borrow_mut();
        if let Some(pos) = inner.waiters.iter().position(|e| e.is_same(target)) {
            inner.waiters.remove(pos);
        }
    }

    pub fn waiters_len(&self) -> usize {
        self.0.borrow().waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn release_resolves_all_waiters_in_join_order_and_clears_list() {
        let env = Environment::new();
        let barrier = Barrier::new(&env);
        let order = Rc::new(StdRefCell::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let waiter = barrier.wait();
            let order = order.clone();
            waiter.subscribe(move |_| order.borrow_mut().push(label));
        }
        assert_eq!(barrier.waiters_len(), 3);

        barrier.release();
        env.run();

        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        assert_eq!(barrier.waiters_len(), 0);
    }

    #[test]
    fn barrier_is_reusable_after_release() {
        let env = Environment::new();
        let barrier = Barrier::new(&env);

        let first_round = barrier.wait();
        barrier.release();
        assert!(first_round.is_succeeded());

        let second_round = barrier.wait();
        assert!(second_round.is_pending());
        barrier.release();
        assert!(second_round.is_succeeded());
    }

    #[test]
    fn cancelling_a_wait_removes_it_from_the_list() {
        let env = Environment::new();
        let barrier = Barrier::new(&env);

        let waiter = barrier.wait();
        waiter.cancel();
        assert_eq!(barrier.waiters_len(), 0);

        barrier.release();
        assert!(waiter.is_pending());
    }
}
