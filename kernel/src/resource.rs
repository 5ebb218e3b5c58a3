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

use desim_core::{KernelError, KernelResult};

use crate::environment::Environment;
use crate::event::Event;

struct ResourceInner {
    env: Environment,
    capacity: usize,
    in_use: usize,
    waiters: VecDeque<Event<()>>,
}

/// A capacity-bounded semaphore: up to `capacity` holders at a time, FIFO
/// among anyone waiting for a slot to free up.
pub struct Resource(Rc<RefCell<ResourceInner>>);

impl Clone for Resource {
    fn clone(&self) -> Self {
        Resource(self.0.clone())
    }
}

impl Resource {
    pub fn new(env: &Environment, capacity: usize) -> Self {
        Resource(Rc::new(RefCell::new(ResourceInner {
            env: env.clone(),
            capacity,
            in_use: 0,
            waiters: VecDeque::new(),
        })))
    }

    /// Grants a slot immediately if one is free; otherwise joins the FIFO
    /// waiter list. Every `acquire` must be matched by exactly one
    /// `release`, whether it resolved immediately or had to wait.
    pub fn acquire(&self) -> Event<()> {
        let mut inner = self.0.borrow_mut();
        if inner.in_use < inner.capacity {
            inner.in_use += 1;
            let env = inner.env.clone();
            drop(inner);
            Event::succeeded(&env, ())
        } else {
            let env = inner.env.clone();
            let event = Event::pending(&env);
            inner.waiters.push_back(event.clone());
            drop(inner);

            let this = self.clone();
            let event_for_hook = event.clone();
            event.set_on_cancel(move || this.remove_waiter(&event_for_hook));
            event
        }
    }

    /// Releases a previously granted slot. If a waiter is queued, the slot
    /// transfers straight to the oldest one — `in_use` does not change,
    /// since one holder departs and another immediately takes its place.
    /// Calling this without a matching outstanding `acquire` is a logic
    /// error, reported as [`KernelError::UnbalancedRelease`] rather than
    /// silently underflowing.
    pub fn release(&self) -> KernelResult<()> {
        let mut inner = self.0.borrow_mut();
        if inner.in_use == 0 {
            return Err(KernelError::UnbalancedRelease);
        }
        if let Some(waiter) = inner.waiters.pop_front() {
            drop(inner);
            let _ = waiter.succeed(());
        } else {
            inner.in_use -= 1;
        }
        Ok(())
    }

    fn remove_waiter(&self, target: &Event<()>) {
        let mut inner = self.0.borrow_mut();
        if let Some(pos) = inner.waiters.iter().position(|e| e.is_same(target)) {
            inner.waiters.remove(pos);
        }
    }

    pub fn capacity(&self) -> usize {
        self.0.borrow().capacity
    }

    pub fn in_use(&self) -> usize {
        self.0.borrow().in_use
    }

    pub fn available(&self) -> usize {
        let inner = self.0.borrow();
        inner.capacity - inner.in_use
    }

    pub fn waiters_len(&self) -> usize {
        self.0.borrow().waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn acquire_up_to_capacity_succeeds_immediately() {
        let env = Environment::new();
        let resource = Resource::new(&env, 2);

        let a = resource.acquire();
        let b = resource.acquire();

        assert!(a.is_succeeded());
        assert!(b.is_succeeded());
        assert_eq!(resource.in_use(), 2);
        assert_eq!(resource.available(), 0);
    }

    #[test]
    fn acquire_beyond_capacity_waits() {
        let env = Environment::new();
        let resource = Resource::new(&env, 1);

        let _first = resource.acquire();
        let second = resource.acquire();

        assert!(second.is_pending());
        assert_eq!(resource.waiters_len(), 1);
    }

    #[test]
    fn release_wakes_oldest_waiter_fifo() {
        let env = Environment::new();
        let resource = Resource::new(&env, 1);

        let _first = resource.acquire();
        let second = resource.acquire();
        let third = resource.acquire();

        resource.release().unwrap();
        assert!(second.is_succeeded());
        assert!(third.is_pending());
        assert_eq!(resource.in_use(), 1, "slot transferred, not freed");

        resource.release().unwrap();
        assert!(third.is_succeeded());
    }

    #[test]
    fn release_without_outstanding_acquire_is_unbalanced() {
        let env = Environment::new();
        let resource = Resource::new(&env, 1);
        let err = resource.release().unwrap_err();
        assert!(matches!(err, KernelError::UnbalancedRelease));
    }

    #[test]
    fn cancelling_a_pending_acquire_removes_it_from_waiters() {
        let env = Environment::new();
        let resource = Resource::new(&env, 1);

        let _holder = resource.acquire();
        let waiter = resource.acquire();
        assert_eq!(resource.waiters_len(), 1);

        waiter.cancel();
        assert_eq!(resource.waiters_len(), 0);

        resource.release().unwrap();
        assert!(waiter.is_pending(), "cancelled waiter must not be granted");
    }
}
