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

//! Drives one run: resolve the start, stream the backlog, then either stop
//! or keep polling for new records until cancelled.
//!
//! ```text
//! Resolving -> Streaming -> Drained            (follow off)
//!                        -> Following -> ...   (follow on)
//! any state  -> Stopped                        (cancelled)
//! ```

use queue::{SegmentStore, StoreConfig};
use serde::Serialize;
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    Result,
    cancel::CancellationToken,
    config::ReaderConfig,
    cursor::{Cursor, Next, Record},
    decode::Decoder,
    error::SinkSnafu,
    filter::Filter,
    position::resolve,
    sink::{OutputSink, SingleLine},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TailState {
    Resolving,
    Streaming,
    /// All available records were read and follow mode is off.
    Drained,
    /// Waiting for new records.
    Following,
    /// Cancelled.
    Stopped,
}

/// What one run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records_read:  u64,
    pub emitted:       u64,
    pub filtered_out:  u64,
    pub decode_errors: u64,
    pub final_state:   TailState,
}

impl RunSummary {
    const fn new() -> Self {
        Self {
            records_read:  0,
            emitted:       0,
            filtered_out:  0,
            decode_errors: 0,
            final_state:   TailState::Resolving,
        }
    }
}

/// A configured reader. Patterns are compiled up front, so building one is
/// where configuration errors surface.
#[derive(Debug)]
pub struct QueueReader {
    config:  ReaderConfig,
    decoder: Decoder,
    filter:  Filter,
}

impl QueueReader {
    pub fn new(config: ReaderConfig) -> Result<Self> {
        let filter = Filter::new(&config.include, &config.exclude)?;
        Ok(Self {
            decoder: config.decoder(),
            filter,
            config,
        })
    }

    pub const fn config(&self) -> &ReaderConfig { &self.config }

    /// Run until the backlog is drained, or until `cancel` fires in follow
    /// mode.
    ///
    /// The store is opened here and released before returning, on error
    /// paths as well.
    pub fn run<S: OutputSink>(&self, sink: S, cancel: &CancellationToken) -> Result<RunSummary> {
        if self.config.single_line {
            self.run_with(SingleLine::new(sink), cancel)
        } else {
            self.run_with(sink, cancel)
        }
    }

    fn run_with<S: OutputSink>(
        &self,
        mut sink: S,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::new();

        let mut store = SegmentStore::with_config(StoreConfig::new(&self.config.base_path))?;
        let position = resolve(&mut store, self.config.start)?;
        let mut cursor = Cursor::new(position);

        info!(
            path = ?self.config.base_path,
            start_index = position.index,
            follow = self.config.follow,
            decoder = ?self.decoder,
            filtering = !self.filter.is_pass_through(),
            "Reading queue"
        );

        let mut state = TailState::Streaming;
        loop {
            if cancel.is_cancelled() {
                state = TailState::Stopped;
                break;
            }

            match cursor.next(&mut store)? {
                Next::Record(record) => self.process(&record, &mut sink, &mut summary)?,
                Next::EndOfData => {
                    sink.flush().context(SinkSnafu)?;
                    if !self.config.follow {
                        state = TailState::Drained;
                        break;
                    }
                    if state != TailState::Following {
                        debug!(
                            next_index = cursor.position().index,
                            records = summary.records_read,
                            "Backlog drained, following"
                        );
                        state = TailState::Following;
                    }
                    if cancel.wait(self.config.poll_interval()) {
                        state = TailState::Stopped;
                        break;
                    }
                    store.refresh()?;
                }
            }
        }

        store.close();
        summary.final_state = state;
        info!(
            records_read = summary.records_read,
            emitted = summary.emitted,
            filtered_out = summary.filtered_out,
            decode_errors = summary.decode_errors,
            final_state = %state,
            "Run finished"
        );
        Ok(summary)
    }

    fn process<S: OutputSink>(
        &self,
        record: &Record,
        sink: &mut S,
        summary: &mut RunSummary,
    ) -> Result<()> {
        summary.records_read += 1;

        let body = match self.decoder.decode(&record.payload) {
            Ok(body) => body,
            Err(err) => {
                summary.decode_errors += 1;
                warn!(
                    index = record.index,
                    segment = record.segment,
                    error = %err,
                    "Failed to decode record"
                );
                format!("<decode error: {err}>")
            }
        };

        if !self.filter.accepts(&body) {
            summary.filtered_out += 1;
            return Ok(());
        }

        let line = if self.config.suppress_index {
            body
        } else {
            format!("0x{:x}: {body}", record.index)
        };
        sink.emit(&line).context(SinkSnafu)?;
        summary.emitted += 1;
        Ok(())
    }
}
