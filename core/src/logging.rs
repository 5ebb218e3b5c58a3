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

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Convenience initializer for `tracing` output from demo binaries and from
/// tests that want to see the kernel's `trace!`/`debug!` event stream.
///
/// Honors `RUST_LOG` via [`EnvFilter`]; defaults to `info` when unset. This
/// is deliberately the only "configuration" surface the crate has: the
/// kernel itself reads no environment variables and opens no files, so
/// there is nothing else to layer in.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_filter(filter);

    // Errors here mean a global subscriber was already installed (e.g. a
    // second test in the same process calling this); that's fine to ignore.
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
