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

use desim_core::KernelResult;

use crate::environment::Environment;
use crate::event::Event;

/// An `Event` that resolves itself with `value` at `now + delay`.
///
/// `delay == 0.0` is legal ("yield to the current time bucket": the event
/// resolves at the same virtual time, but only after everything already
/// scheduled at `now` with a smaller serial has run). `delay < 0.0` fails
/// with `KernelError::InvalidSchedule`, surfaced here because `Environment::schedule`
/// itself rejects it.
///
/// The returned event carries a cancel hook wired to the underlying
/// scheduled entry: if a `FirstOf` race cancels a losing timeout, the
/// entry is marked a no-op and never fires, exactly as if it had never
/// been scheduled.
pub fn timeout<T>(env: &Environment, delay: f64, value: T) -> KernelResult<Event<T>>
where
    T: Clone + 'static,
{
    let event = Event::pending(env);
    let event_for_fire = event.clone();
    let handle = env.schedule(delay, move |_| {
        // Losing the race against another arm of a `FirstOf` cancels this
        // event and marks the schedule handle cancelled; the closure below
        // never runs `succeed`, so the cancel hook alone is not enough —
        // `Environment::step` already skips cancelled entries outright.
        let _ = event_for_fire.succeed(value);
    })?;
    event.set_on_cancel(move || handle.cancel());
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Instant;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_no_earlier_than_now_plus_delay() {
        let env = Environment::new();
        let event = timeout(&env, 5.0, "done").unwrap();
        assert!(event.is_pending());

        env.run();
        assert_eq!(env.now(), Instant::new(5.0));
        assert_eq!(event.value(), Some("done"));
    }

    #[test]
    fn cancelling_a_timeout_prevents_resolution() {
        let env = Environment::new();
        let event = timeout(&env, 5.0, ()).unwrap();
        event.cancel();

        env.run();
        assert!(event.is_pending(), "cancelled timeout must never fire");
    }

    #[test]
    fn zero_delay_is_legal() {
        let env = Environment::new();
        let event = timeout(&env, 0.0, 1).unwrap();
        env.run();
        assert_eq!(event.value(), Some(1));
    }

    #[test]
    fn negative_delay_is_rejected() {
        let env = Environment::new();
        assert!(timeout(&env, -1.0, ()).is_err());
    }
}
