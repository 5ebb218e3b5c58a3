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

//! A small bank: a capacity-bounded `Resource` models two tellers, and five
//! customers arrive at staggered times and queue for whichever teller frees
//! up first.

use desim_core::init_tracing;
use desim_kernel::{timeout, Environment, Process, Resource};

const TELLER_COUNT: usize = 2;
const SERVICE_TIME: f64 = 4.0;

async fn customer(env: Environment, tellers: Resource, name: &'static str, arrival: f64) -> anyhow::Result<()> {
    timeout(&env, arrival, ())?.await?;
    tracing::info!(customer = name, at = %env.now(), "arrives and joins the line");

    tellers.acquire().await?;
    tracing::info!(customer = name, at = %env.now(), "reaches a teller");

    timeout(&env, SERVICE_TIME, ())?.await?;
    tellers.release()?;
    tracing::info!(customer = name, at = %env.now(), "done, teller freed");

    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let env = Environment::new();
    let tellers = Resource::new(&env, TELLER_COUNT);

    for (name, arrival) in [
        ("alice", 0.0),
        ("bob", 0.0),
        ("carol", 1.0),
        ("dave", 2.0),
        ("erin", 3.0),
    ] {
        let spawn_env = env.clone();
        let customer_env = env.clone();
        let tellers = tellers.clone();
        Process::spawn(&spawn_env, async move {
            customer(customer_env, tellers, name, arrival).await
        });
    }

    env.run();
    tracing::info!(in_use = tellers.in_use(), "bank closed for the day");
    Ok(())
}
