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
use std::rc::Rc;

use desim_core::{KernelError, KernelResult};

use crate::environment::Environment;
use crate::event::Event;

/// Resolves once every named child has succeeded, with the results in the
/// same order the children were given in. If any child fails, `all_of`
/// fails with that same error immediately — but the other children are left
/// running: they may still resolve later, their results are just discarded.
/// Cancelling the losers is a `first_of`-only behavior.
///
/// Children differing in value type must be unified first with
/// [`Event::map`] (e.g. mapping a `Timeout`'s `()` and a `Queue::get`'s
/// `String` onto a shared enum) — `all_of` itself stays monomorphic in `T`.
pub fn all_of<T>(
    env: &Environment,
    children: Vec<(String, Event<T>)>,
) -> KernelResult<Event<Vec<(String, T)>>>
where
    T: Clone + 'static,
{
    if children.is_empty() {
        return Err(KernelError::EmptyCombinator);
    }

    let result: Event<Vec<(String, T)>> = Event::pending(env);
    let total = children.len();
    let completed = Rc::new(Cell::new(0usize));
    let slots: Rc<RefCell<Vec<Option<(String, T)>>>> =
        Rc::new(RefCell::new((0..total).map(|_| None).collect()));
    let failed = Rc::new(Cell::new(false));
    let all_events: Vec<Event<T>> = children.iter().map(|(_, e)| e.clone()).collect();

    for (idx, (name, child)) in children.into_iter().enumerate() {
        let result = result.clone();
        let completed = completed.clone();
        let slots = slots.clone();
        let failed = failed.clone();

        child.subscribe(move |res| {
            if failed.get() {
                return;
            }
            match res {
                Ok(value) => {
                    slots.borrow_mut()[idx] = Some((name, value));
                    completed.set(completed.get() + 1);
                    if completed.get() == total {
                        let out = slots
                            .borrow_mut()
                            .iter_mut()
                            .map(|slot| slot.take().expect("every slot filled by this point"))
                            .collect();
                        let _ = result.succeed(out);
                    }
                }
                Err(err) => {
                    // Unlike `first_of`, the other children are left alone:
                    // they may still resolve, their results are simply
                    // discarded once `failed` is set. Cancelling losers is
                    // a `first_of`-only behavior.
                    failed.set(true);
                    let _ = result.fail(err);
                }
            }
        });
    }

    let cancel_all = all_events.clone();
    result.set_on_cancel(move || {
        for child in &cancel_all {
            child.cancel();
        }
    });

    Ok(result)
}

/// Resolves as soon as any one named child resolves, with that child's name
/// and outcome, and cancels every other child. A failing child still wins
/// the race — `first_of` propagates whichever outcome, success or failure,
/// arrives first.
pub fn first_of<T>(
    env: &Environment,
    children: Vec<(String, Event<T>)>,
) -> KernelResult<Event<(String, T)>>
where
    T: Clone + 'static,
{
    if children.is_empty() {
        return Err(KernelError::EmptyCombinator);
    }

    let result: Event<(String, T)> = Event::pending(env);
    let done = Rc::new(Cell::new(false));
    let all_events: Vec<Event<T>> = children.iter().map(|(_, e)| e.clone()).collect();

    for (name, child) in children {
        let result = result.clone();
        let done = done.clone();
        let siblings = all_events.clone();

        child.subscribe(move |res| {
            if done.get() {
                return;
            }
            done.set(true);
            for sibling in &siblings {
                sibling.cancel();
            }
            match res {
                Ok(value) => {
                    let _ = result.succeed((name, value));
                }
                Err(err) => {
                    let _ = result.fail(err);
                }
            }
        });
    }

    let cancel_all = all_events.clone();
    result.set_on_cancel(move || {
        for child in &cancel_all {
            child.cancel();
        }
    });

    Ok(result)
}
