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

//! The kernel's "hello world": three independent timeouts, dispatched in
//! time order rather than scheduling order.

use desim_core::init_tracing;
use desim_kernel::{timeout, Environment};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let env = Environment::new();

    for (label, delay) in [("slow", 5.0), ("immediate", 1.0), ("medium", 3.0)] {
        let event = timeout(&env, delay, label)?;
        event.subscribe(move |result| {
            let value = result.expect("timeouts never fail");
            tracing::info!(%value, "fired");
        });
    }

    env.run();
    Ok(())
}
