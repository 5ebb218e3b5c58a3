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

use std::sync::Arc;

/// The closed error taxonomy for kernel misuse and user-routine failure.
///
/// Kernel misuse variants ([`Self::InvalidSchedule`], [`Self::AlreadyResolved`],
/// [`Self::UnbalancedRelease`], [`Self::EmptyCombinator`],
/// [`Self::ComparatorViolation`]) are returned synchronously from the offending
/// call. [`Self::Routine`] is different: it is never returned directly by a
/// kernel method, it is the payload a [`Process`](../../desim_kernel/struct.Process.html)'s
/// completion event fails with when the user's `async` body returns `Err`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    /// A negative delay was passed to `schedule`/`timeout`, or scheduling was
    /// attempted against an environment that is no longer reachable.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// `succeed`/`fail` was called on an `Event` that had already left the
    /// pending state.
    #[error("event was already resolved")]
    AlreadyResolved,

    /// `Resource::release` was called with no outstanding acquisition.
    #[error("release called with no matching acquire")]
    UnbalancedRelease,

    /// `all_of`/`first_of` was given an empty collection of children.
    #[error("combinator given an empty set of events")]
    EmptyCombinator,

    /// A `PriorityQueue` comparator could not order two items.
    #[error("priority queue items are not comparable")]
    ComparatorViolation,

    /// A user routine running inside a `Process` returned an error.
    ///
    /// Wrapped in an `Arc` (not the `Rc` the rest of this crate prefers) so
    /// that `KernelError` can stay `Clone` — needed so a failed `Event`'s
    /// error can be handed to every subscriber — while remaining
    /// `Send + Sync`. That matters because `anyhow::Error` itself is always
    /// `Send + Sync`, and routines build their errors with `anyhow!`/`?`;
    /// an `Rc` here would poison `KernelError`'s own `Send + Sync` status
    /// and break those conversions, for no benefit since nothing about this
    /// one immutable, rarely-cloned field depends on single-threadedness.
    #[error("process routine failed: {0}")]
    Routine(Arc<anyhow::Error>),
}

impl KernelError {
    /// Wraps a user routine's error for delivery through a `Process`'s
    /// completion event.
    pub fn from_routine_error(err: anyhow::Error) -> Self {
        KernelError::Routine(Arc::new(err))
    }
}

/// Result alias used throughout the kernel for fallible kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invalid_schedule_message_round_trips() {
        let err = KernelError::InvalidSchedule("delay -1 < 0".to_string());
        assert_eq!(err.to_string(), "invalid schedule: delay -1 < 0");
    }

    #[test]
    fn routine_error_is_cloneable() {
        let err = KernelError::from_routine_error(anyhow::anyhow!("boom"));
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
