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
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use desim_core::KernelError;

use crate::environment::Environment;
use crate::event::Event;

type Routine<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>>>>;

struct ProcessInner<T> {
    env: Environment,
    future: Option<Routine<T>>,
    completion: Event<T>,
}

/// A cooperatively scheduled coroutine: an `async` routine driven by the
/// Environment rather than by a real OS thread or a general-purpose
/// executor like tokio's.
///
/// A `Process` polls eagerly at spawn time and every time one of its
/// `.await`s wakes it, and goes right back to sleep the moment it hits a
/// suspension point — there is only ever one `Process` actually running at
/// a time, and that running `Process` never yields except by awaiting an
/// [`Event`]. This is what the spec calls "single-threaded, cooperative,
/// deterministic".
pub struct Process<T>(Rc<RefCell<ProcessInner<T>>>);

impl<T> Clone for Process<T> {
    fn clone(&self) -> Self {
        Process(self.0.clone())
    }
}

impl<T: Clone + 'static> Process<T> {
    /// Spawns `future` and polls it immediately, synchronously, before
    /// returning — matching the spec's "a process starts running at the
    /// instant it is spawned, not at the next scheduler tick".
    pub fn spawn<F>(env: &Environment, future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        let inner = Rc::new(RefCell::new(ProcessInner {
            env: env.clone(),
            future: Some(Box::pin(future)),
            completion: Event::pending(env),
        }));
        let process = Process(inner);
        process.poll_now();
        process
    }

    /// The event that resolves when this process's routine returns: with
    /// its `Ok` value on success, or [`KernelError::Routine`] wrapping
    /// whatever `anyhow::Error` the routine returned.
    pub fn completion(&self) -> Event<T> {
        self.0.borrow().completion.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.0.borrow().future.is_none()
    }

    fn poll_now(&self) {
        let waker = make_waker(self.0.clone());
        let mut cx = Context::from_waker(&waker);

        // Take the future out rather than polling while borrowed: the
        // routine's own `.await`s reach back into other `Rc<RefCell<_>>`
        // kernel state (queues, resources, other events), never this cell,
        // but holding the borrow across an arbitrary `poll` is needless risk.
        let future = self.0.borrow_mut().future.take();
        let Some(mut future) = future else {
            return;
        };

        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                let completion = self.0.borrow().completion.clone();
                match result {
                    Ok(value) => {
                        let _ = completion.succeed(value);
                    }
                    Err(err) => {
                        let _ = completion.fail(KernelError::from_routine_error(err));
                    }
                }
            }
            Poll::Pending => {
                self.0.borrow_mut().future = Some(future);
            }
        }
    }

    /// Re-polls through the Environment's scheduler rather than inline, so a
    /// process resuming from a suspended `.await` is just another
    /// dispatched callback, ordered by `(time, serial)` like everything
    /// else.
    fn wake_self(&self) {
        let env = self.0.borrow().env.clone();
        let this = self.clone();
        let _ = env.schedule(0.0, move |_| this.poll_now());
    }
}

unsafe fn clone_raw<T: Clone + 'static>(ptr: *const ()) -> RawWaker {
    let inner = Rc::from_raw(ptr as *const RefCell<ProcessInner<T>>);
    let cloned = inner.clone();
    std::mem::forget(inner);
    RawWaker::new(Rc::into_raw(cloned) as *const (), vtable::<T>())
}

unsafe fn wake_raw<T: Clone + 'static>(ptr: *const ()) {
    let inner = Rc::from_raw(ptr as *const RefCell<ProcessInner<T>>);
    Process(inner).wake_self();
}

unsafe fn wake_by_ref_raw<T: Clone + 'static>(ptr: *const ()) {
    let inner = Rc::from_raw(ptr as *const RefCell<ProcessInner<T>>);
    Process(inner.clone()).wake_self();
    std::mem::forget(inner);
}

unsafe fn drop_raw<T: Clone + 'static>(ptr: *const ()) {
    drop(Rc::from_raw(ptr as *const RefCell<ProcessInner<T>>));
}

fn vtable<T: Clone + 'static>() -> &'static RawWakerVTable {
    &RawWakerVTable::new(
        clone_raw::<T>,
        wake_raw::<T>,
        wake_by_ref_raw::<T>,
        drop_raw::<T>,
    )
}

fn make_waker<T: Clone + 'static>(inner: Rc<RefCell<ProcessInner<T>>>) -> Waker {
    let raw = RawWaker::new(Rc::into_raw(inner) as *const (), vtable::<T>());
    unsafe { Waker::from_raw(raw) }
}
