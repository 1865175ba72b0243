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

use queue::QueueError;
use snafu::Snafu;

pub type Result<T, E = ReaderError> = std::result::Result<T, E>;

/// Errors that end a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    #[snafu(transparent)]
    Store {
        source: QueueError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid {kind} pattern `{pattern}`"))]
    InvalidPattern {
        kind:    &'static str,
        pattern: String,
        source:  regex::Error,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Invalid index `{literal}`: {reason}"))]
    InvalidIndex {
        literal: String,
        reason:  String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Failed to write record to output"))]
    Sink {
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl ReaderError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store { source, .. } if source.is_not_found())
    }

    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Store { source, .. } if source.is_corrupt())
    }

    /// The consumer of our output went away, e.g. `qreader ... | head`.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Sink { source, .. } if source.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

/// Why one record could not be rendered. Never ends a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    #[snafu(display("invalid CBOR payload: {message}"))]
    InvalidPayload { message: String },

    #[snafu(display("{trailing} trailing bytes after CBOR value"))]
    TrailingBytes { trailing: usize },

    #[snafu(display("not a method invocation: {reason}"))]
    NotMethodShaped { reason: &'static str },

    #[snafu(display("failed to render JSON"))]
    Json { source: serde_json::Error },
}
