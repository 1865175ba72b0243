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

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crossbeam::channel::{Receiver, Sender, bounded};

/// Cooperative cancellation shared between a run and whoever stops it.
///
/// Cloning yields another handle to the same token. Waiters blocked in
/// [`wait`](Self::wait) wake as soon as the token is cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    wake_tx:   Sender<()>,
    wake_rx:   Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            let _ = self.inner.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool { self.inner.cancelled.load(Ordering::Acquire) }

    /// Block for up to `timeout`. Returns whether the token is cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        if self.inner.wake_rx.recv_timeout(timeout).is_ok() {
            // Pass the wake-up on to any other waiter.
            let _ = self.inner.wake_tx.try_send(());
        }
        self.is_cancelled()
    }
}

impl Default for CancellationToken {
    fn default() -> Self { Self::new() }
}
