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

//! Shared ambient stack for the `desim` workspace: the kernel's error
//! taxonomy and a convenience `tracing` initializer for demo binaries and
//! tests. Nothing in here is specific to discrete-event simulation; it is
//! the same kind of "helper crate for the rest of the workspace" role that
//! a foundational `core` crate plays elsewhere in this lineage.

pub mod error;
pub mod logging;

pub use error::{KernelError, KernelResult};
pub use logging::init_tracing;
