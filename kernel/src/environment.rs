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

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use desim_core::{KernelError, KernelResult};

use crate::time::Instant;

type Callback = Box<dyn FnOnce(&Environment)>;

/// One entry in the Environment's scheduled-callback heap.
///
/// `Ord` is implemented over `(time, serial)` only, and reversed relative to
/// the natural order, so that a [`BinaryHeap`] (a max-heap) pops the
/// *smallest* `(time, serial)` pair first — the earliest-scheduled,
/// earliest-inserted entry, exactly as the spec's scheduled-entry ordering
/// requires.
struct ScheduledEntry {
    time: Instant,
    serial: u64,
    cancelled: Rc<Cell<bool>>,
    callback: Callback,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.serial == other.serial
    }
}
impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.serial.cmp(&self.serial))
    }
}

/// A handle to a previously scheduled callback. Cancelling it marks the
/// entry a no-op; the entry itself stays in the heap until it is dequeued
/// (the spec is explicit that cancellation does not remove heap storage).
#[derive(Clone)]
pub struct ScheduleHandle {
    cancelled: Rc<Cell<bool>>,
}

impl ScheduleHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

struct EnvironmentInner {
    now: Instant,
    next_serial: u64,
    heap: BinaryHeap<ScheduledEntry>,
}

/// Owns the virtual clock and the scheduled-entry priority queue, and drives
/// the single-threaded dispatch loop every other kernel component is built
/// on top of.
///
/// Cheap to `Clone`: it is a handle (`Rc<RefCell<_>>`) to shared state, not
/// the state itself. There is deliberately no `Arc`/`Mutex` anywhere in this
/// type — the kernel is single-threaded by design (see the crate's
/// concurrency model notes), so reference counting without atomics and
/// interior mutability without locking is the correct representation, not a
/// shortcut.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<EnvironmentInner>>);

/// Builder for [`Environment`], the kernel's only configuration surface
/// (there is no I/O, so there is nothing to configure beyond constructor
/// arguments).
pub struct EnvironmentBuilder {
    start_time: f64,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        EnvironmentBuilder { start_time: 0.0 }
    }
}

impl EnvironmentBuilder {
    pub fn start_time(mut self, seconds: f64) -> Self {
        self.start_time = seconds;
        self
    }

    pub fn build(self) -> Environment {
        Environment(Rc::new(RefCell::new(EnvironmentInner {
            now: Instant::new(self.start_time),
            next_serial: 0,
            heap: BinaryHeap::new(),
        })))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        EnvironmentBuilder::default().build()
    }

    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// The current virtual time. Never advances while a callback is
    /// executing, only between dispatches.
    pub fn now(&self) -> Instant {
        self.0.borrow().now
    }

    /// Schedules `callback` to run at `now + delay`. Returns a handle that
    /// can cancel the entry before it fires.
    ///
    /// `delay < 0.0` is rejected with [`KernelError::InvalidSchedule`].
    pub fn schedule<F>(&self, delay: f64, callback: F) -> KernelResult<ScheduleHandle>
    where
        F: FnOnce(&Environment) + 'static,
    {
        if delay < 0.0 {
            return Err(KernelError::InvalidSchedule(format!(
                "delay {delay} is negative"
            )));
        }

        let mut inner = self.0.borrow_mut();
        let time = inner.now + delay;
        let serial = inner.next_serial;
        inner.next_serial += 1;

        let cancelled = Rc::new(Cell::new(false));
        inner.heap.push(ScheduledEntry {
            time,
            serial,
            cancelled: cancelled.clone(),
            callback: Box::new(callback),
        });

        tracing::trace!(%time, serial, "scheduled");
        Ok(ScheduleHandle { cancelled })
    }

    /// Pops and dispatches exactly one entry. Returns `false` if the heap
    /// was empty (nothing to do). Used directly by tests, and internally by
    /// [`Self::run`]/[`Self::run_until`].
    pub fn step(&self) -> bool {
        let popped = self.0.borrow_mut().heap.pop();
        let Some(entry) = popped else {
            return false;
        };

        self.0.borrow_mut().now = entry.time;

        if entry.cancelled.get() {
            tracing::trace!(time = %entry.time, serial = entry.serial, "skipped cancelled entry");
        } else {
            tracing::trace!(time = %entry.time, serial = entry.serial, "dispatch");
            (entry.callback)(self);
        }
        true
    }

    /// Drives the loop until the heap empties.
    pub fn run(&self) {
        let span = tracing::debug_span!("env.run");
        let _guard = span.enter();
        while self.step() {}
    }

    /// Drives the loop until the next entry would exceed `until`, or the
    /// heap empties first. The clock is advanced to `until` even if nothing
    /// was left to dispatch at that time.
    pub fn run_until(&self, until: Instant) {
        let span = tracing::debug_span!("env.run_until", %until);
        let _guard = span.enter();
        loop {
            let next_time = self.0.borrow().heap.peek().map(|e| e.time);
            match next_time {
                None => break,
                Some(t) if t > until => {
                    self.0.borrow_mut().now = until;
                    break;
                }
                Some(_) => {
                    self.step();
                }
            }
        }
    }

    /// Drives the loop until `is_done` reports true, or the heap empties.
    /// This is the generic form of "run until an event resolves" — kept
    /// free of any `Event<T>` type parameter here so `Environment` itself
    /// stays non-generic; see `Event::run_until_resolved` for the ergonomic
    /// wrapper callers actually reach for.
    pub fn run_while_pending(&self, mut is_done: impl FnMut() -> bool) {
        while !is_done() {
            if !self.step() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn schedule_rejects_negative_delay() {
        let env = Environment::new();
        let err = env.schedule(-1.0, |_| {}).unwrap_err();
        assert!(matches!(err, KernelError::InvalidSchedule(_)));
    }

    #[test]
    fn zero_delay_entries_fire_in_registration_order() {
        let env = Environment::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));

        for label in ["A", "B", "C"] {
            let order = order.clone();
            env.schedule(0.0, move |_| order.borrow_mut().push(label))
                .unwrap();
        }

        env.run();
        assert_eq!(*order.borrow(), vec!["A", "B", "C"]);
    }

    #[test]
    fn entries_dispatch_in_time_order_regardless_of_schedule_order() {
        let env = Environment::new();
        let order = Rc::new(StdRefCell::new(Vec::new()));

        for delay in [5.0, 1.0, 3.0] {
            let order = order.clone();
            env.schedule(delay, move |e| order.borrow_mut().push(e.now().as_secs_f64()))
                .unwrap();
        }

        env.run();
        assert_eq!(*order.borrow(), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn cancelled_entry_does_not_invoke_callback() {
        let env = Environment::new();
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();

        let handle = env.schedule(1.0, move |_| fired_clone.set(true)).unwrap();
        handle.cancel();
        env.run();

        assert!(!fired.get());
    }

    #[test]
    fn run_until_stops_before_later_entries_and_advances_clock() {
        let env = Environment::new();
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();
        env.schedule(10.0, move |_| fired_clone.set(true)).unwrap();

        env.run_until(Instant::new(5.0));

        assert!(!fired.get());
        assert_eq!(env.now(), Instant::new(5.0));
    }

    #[test]
    fn clock_is_monotonic_across_dispatches() {
        let env = Environment::new();
        let times: Rc<StdRefCell<Vec<f64>>> = Rc::new(StdRefCell::new(Vec::new()));

        for delay in [2.0, 0.0, 4.0, 1.0] {
            let times = times.clone();
            env.schedule(delay, move |e| times.borrow_mut().push(e.now().as_secs_f64()))
                .unwrap();
        }
        env.run();

        let observed = times.borrow().clone();
        let mut sorted = observed.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(observed, sorted, "dispatch times must be nondecreasing");
    }
}
