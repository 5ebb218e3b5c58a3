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
use std::task::{Context, Poll, Waker};

use desim_core::{KernelError, KernelResult};

use crate::environment::Environment;

enum EventState<T> {
    Pending,
    Succeeded(T),
    Failed(KernelError),
}

struct EventInner<T> {
    env: Environment,
    state: EventState<T>,
    callbacks: Vec<Box<dyn FnOnce(Result<T, KernelError>)>>,
    /// Invoked at most once, by a losing `FirstOf` child, to unregister this
    /// event from whatever scheduled entry or waiter list produced it.
    on_cancel: Option<Box<dyn FnOnce()>>,
    /// The most recently registered `Future` waker. Re-registering on every
    /// `poll` (rather than subscribing once per poll) keeps `.await`-ing an
    /// `Event` cheap even if it is polled many times before resolving.
    waker_slot: Option<Waker>,
    wake_hooked: bool,
}

/// A one-shot, value-bearing future.
///
/// Cloning an `Event` clones a handle (`Rc<RefCell<_>>`) to shared state, the
/// same way [`Environment`] does — there is exactly one logical event with
/// arbitrarily many subscribers holding handles to it.
///
/// `Event<T>` implements [`Future`], so it can be `.await`ed directly inside
/// a [`crate::Process`]'s routine; that `.await` *is* the spec's "suspension
/// point".
pub struct Event<T>(Rc<RefCell<EventInner<T>>>);

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Event(self.0.clone())
    }
}

impl<T> Event<T> {
    /// A fresh event with no resolution yet.
    pub fn pending(env: &Environment) -> Self {
        Event(Rc::new(RefCell::new(EventInner {
            env: env.clone(),
            state: EventState::Pending,
            callbacks: Vec::new(),
            on_cancel: None,
            waker_slot: None,
            wake_hooked: false,
        })))
    }

    /// An event that is already resolved successfully. `put` on an unbounded
    /// [`crate::Queue`] and a granted [`crate::Resource::acquire`] both
    /// return one of these.
    pub fn succeeded(env: &Environment, value: T) -> Self {
        Event(Rc::new(RefCell::new(EventInner {
            env: env.clone(),
            state: EventState::Succeeded(value),
            callbacks: Vec::new(),
            on_cancel: None,
            waker_slot: None,
            wake_hooked: false,
        })))
    }

    /// An event that is already resolved with a failure.
    pub fn failed(env: &Environment, err: KernelError) -> Self {
        Event(Rc::new(RefCell::new(EventInner {
            env: env.clone(),
            state: EventState::Failed(err),
            callbacks: Vec::new(),
            on_cancel: None,
            waker_slot: None,
            wake_hooked: false,
        })))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.0.borrow().state, EventState::Pending)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.0.borrow().state, EventState::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.0.borrow().state, EventState::Failed(_))
    }

    fn env_handle(&self) -> Environment {
        self.0.borrow().env.clone()
    }

    /// Identity comparison, independent of `T: PartialEq`. Used by waiter
    /// lists (`Queue`, `Resource`, `Barrier`) to find and remove a specific
    /// cancelled event handle.
    pub(crate) fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Installs the hook a losing `FirstOf` child will invoke to unregister
    /// this event from its source (a scheduled `Timeout`, a `Queue`'s or
    /// `Resource`'s waiter list). Crate-internal: user code never needs to
    /// cancel a plain `Event` it created itself.
    pub(crate) fn set_on_cancel(&self, hook: impl FnOnce() + 'static) {
        self.0.borrow_mut().on_cancel = Some(Box::new(hook));
    }

    /// Runs this event's cancel hook, if any. A no-op for events with no
    /// hook (plain user-created pending events, or already-resolved ones) —
    /// "a losing succeeded event has no effect".
    pub(crate) fn cancel(&self) {
        let hook = self.0.borrow_mut().on_cancel.take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<T: Clone + 'static> Event<T> {
    /// Registers `cb` to run with this event's result. If already resolved,
    /// `cb` still runs through the Environment's scheduler (at `now`, delay
    /// zero) rather than inline, so dispatch order stays globally
    /// deterministic no matter how late a subscriber arrives.
    pub fn subscribe(&self, cb: impl FnOnce(Result<T, KernelError>) + 'static) {
        let mut inner = self.0.borrow_mut();
        match &inner.state {
            EventState::Pending => inner.callbacks.push(Box::new(cb)),
            EventState::Succeeded(value) => {
                let value = value.clone();
                let env = inner.env.clone();
                drop(inner);
                env.schedule(0.0, move |_| cb(Ok(value)))
                    .expect("delay 0.0 is always valid");
            }
            EventState::Failed(err) => {
                let err = err.clone();
                let env = inner.env.clone();
                drop(inner);
                env.schedule(0.0, move |_| cb(Err(err)))
                    .expect("delay 0.0 is always valid");
            }
        }
    }

    /// `pending -> succeeded(v)`. Every subscribed callback runs once, in
    /// subscription order, dispatched through the Environment.
    pub fn succeed(&self, value: T) -> KernelResult<()> {
        let (env, callbacks) = {
            let mut inner = self.0.borrow_mut();
            if !matches!(inner.state, EventState::Pending) {
                return Err(KernelError::AlreadyResolved);
            }
            inner.state = EventState::Succeeded(value.clone());
            (inner.env.clone(), std::mem::take(&mut inner.callbacks))
        };
        for cb in callbacks {
            let value = value.clone();
            env.schedule(0.0, move |_| cb(Ok(value)))
                .expect("delay 0.0 is always valid");
        }
        Ok(())
    }

    /// `pending -> failed(e)`, symmetric with [`Self::succeed`].
    pub fn fail(&self, err: KernelError) -> KernelResult<()> {
        let (env, callbacks) = {
            let mut inner = self.0.borrow_mut();
            if !matches!(inner.state, EventState::Pending) {
                return Err(KernelError::AlreadyResolved);
            }
            inner.state = EventState::Failed(err.clone());
            (inner.env.clone(), std::mem::take(&mut inner.callbacks))
        };
        for cb in callbacks {
            let err = err.clone();
            env.schedule(0.0, move |_| cb(Err(err)))
                .expect("delay 0.0 is always valid");
        }
        Ok(())
    }

    /// The resolved value, if this event succeeded.
    pub fn value(&self) -> Option<T> {
        match &self.0.borrow().state {
            EventState::Succeeded(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// The resolved error, if this event failed.
    pub fn error(&self) -> Option<KernelError> {
        match &self.0.borrow().state {
            EventState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Projects a resolved value/error through `f`, producing a new event.
    /// This is how heterogeneous events are unified before racing them in
    /// [`crate::first_of`]/[`crate::all_of`]: wrap each child so they all
    /// share one `U`.
    ///
    /// Cancelling the mapped event cancels `self` in turn, so a `FirstOf`
    /// that raced a `.map()`-ed `Timeout` or `Queue::get` still unregisters
    /// the underlying source correctly.
    pub fn map<U, F>(&self, f: F) -> Event<U>
    where
        U: Clone + 'static,
        F: FnOnce(Result<T, KernelError>) -> Result<U, KernelError> + 'static,
    {
        let env = self.env_handle();
        let mapped = Event::pending(&env);
        let mapped_for_cb = mapped.clone();
        self.subscribe(move |res| {
            let _ = match f(res) {
                Ok(v) => mapped_for_cb.succeed(v),
                Err(e) => mapped_for_cb.fail(e),
            };
        });
        let upstream = self.clone();
        mapped.set_on_cancel(move || upstream.cancel());
        mapped
    }

    /// Drives `env` until this event resolves (or the heap empties first).
    pub fn run_until_resolved(&self, env: &Environment) {
        let this = self.clone();
        env.run_while_pending(move || !this.is_pending());
    }
}

impl<T: Clone + 'static> Future for Event<T> {
    type Output = Result<T, KernelError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        {
            let inner = this.0.borrow();
            match &inner.state {
                EventState::Succeeded(v) => return Poll::Ready(Ok(v.clone())),
                EventState::Failed(e) => return Poll::Ready(Err(e.clone())),
                EventState::Pending => {}
            }
        }

        let mut inner = this.0.borrow_mut();
        inner.waker_slot = Some(cx.waker().clone());
        let needs_hook = !inner.wake_hooked;
        inner.wake_hooked = true;
        drop(inner);

        if needs_hook {
            let inner_rc = this.0.clone();
            this.subscribe(move |_| {
                if let Some(waker) = inner_rc.borrow_mut().waker_slot.take() {
                    waker.wake();
                }
            });
        }

        Poll::Pending
    }
}
