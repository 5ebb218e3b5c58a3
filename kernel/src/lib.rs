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

//! A deterministic, single-threaded discrete-event simulation kernel.
//!
//! Everything here runs on one [`Environment`]'s virtual clock, with no
//! locking and no real parallelism: `Rc<RefCell<_>>` throughout, `Process`
//! routines driven by Rust's native `async`/`await` as the suspend/resume
//! mechanism, and scheduled callbacks always ordered by `(time, serial)` so
//! a given simulation produces the same event trace on every run.

pub mod barrier;
pub mod combinators;
pub mod environment;
pub mod event;
pub mod priority_queue;
pub mod process;
pub mod queue;
pub mod resource;
pub mod time;
pub mod timeout;

pub use barrier::Barrier;
pub use combinators::{all_of, first_of};
pub use environment::{Environment, EnvironmentBuilder, ScheduleHandle};
pub use event::Event;
pub use priority_queue::PriorityQueue;
pub use process::Process;
pub use queue::Queue;
pub use resource::Resource;
pub use time::Instant;
pub use timeout::timeout;

pub use desim_core::{KernelError, KernelResult};
