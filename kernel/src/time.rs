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

use std::fmt;
use std::ops::Add;

/// A point on the simulation's virtual clock.
///
/// Backed by `f64` (the spec only requires "double precision"), but wrapped
/// in a newtype so it can carry a total [`Ord`] — construction rejects NaN,
/// so every `Instant` that exists is comparable with every other one via
/// [`f64::total_cmp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instant(f64);

impl Instant {
    pub const ZERO: Instant = Instant(0.0);

    /// Builds an `Instant`, rejecting NaN. Negative instants are allowed in
    /// general (only `Duration`s passed to `schedule`/`timeout` are required
    /// to be nonnegative, per the spec), since a start time is a plain
    /// `Instant` and some demo chapters find it convenient to start a clock
    /// at a negative offset.
    pub fn new(seconds: f64) -> Self {
        assert!(!seconds.is_nan(), "Instant must not be NaN");
        Instant(seconds)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for Instant {
    type Output = Instant;

    fn add(self, delay: f64) -> Instant {
        Instant::new(self.0 + delay)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}
