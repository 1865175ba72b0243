// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Panic Hook
//!
//! Logs panics as structured tracing events, with a backtrace, before
//! handing them to whichever hook was installed previously.

use std::panic;

use backtrace::Backtrace;

/// Wrap the current panic hook with one that logs through `tracing` first.
///
/// Install this after any hook that should format the final report (for
/// example `human_panic`), since that hook still runs afterwards.
pub fn set_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic| {
        let backtrace = Backtrace::new();
        let backtrace = format!("{backtrace:?}");
        if let Some(location) = panic.location() {
            tracing::error!(
                message = %panic,
                backtrace = %backtrace,
                panic.file = location.file(),
                panic.line = location.line(),
                panic.column = location.column(),
            );
        } else {
            tracing::error!(message = %panic, backtrace = %backtrace);
        }
        default_hook(panic);
    }));
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;

    #[test]
    fn test_hook_chains_to_previous() {
        let chained = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&chained);
        panic::set_hook(Box::new(move |_| seen.store(true, Ordering::SeqCst)));

        set_panic_hook();
        let result = panic::catch_unwind(|| panic!("boom"));
        let _ = panic::take_hook();

        assert!(result.is_err());
        assert!(chained.load(Ordering::SeqCst));
    }
}
