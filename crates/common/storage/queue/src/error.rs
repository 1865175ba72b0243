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

use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// The base path does not exist.
    #[snafu(display("Queue directory not found: {}", path.display()))]
    StoreNotFound { path: PathBuf },

    /// The base path exists but is not a directory.
    #[snafu(display("Not a queue directory: {}", path.display()))]
    NotADirectory { path: PathBuf },

    /// A frame in a sealed segment is truncated or fails its checksum.
    #[snafu(display("Corrupted segment {} at offset {offset}: {reason}", path.display()))]
    SegmentCorrupted {
        path:   PathBuf,
        offset: u64,
        reason: String,
    },

    /// An index sidecar is unreadable.
    #[snafu(display("Corrupted index {}: {reason}", path.display()))]
    IndexCorrupted { path: PathBuf, reason: String },

    /// Segment base indices go backwards.
    #[snafu(display("Segment ordering violated at {}: {reason}", path.display()))]
    SegmentOrder { path: PathBuf, reason: String },

    /// Memory mapping operation failed.
    #[snafu(display("Mmap operation failed on {}: {message}", path.display()))]
    MmapFailed { path: PathBuf, message: String },

    /// A payload does not fit into an empty segment.
    #[snafu(display("Frame of {len} bytes does not fit a {capacity} byte segment"))]
    FrameTooLarge { len: usize, capacity: u64 },

    /// Filesystem I/O failure.
    #[snafu(context(false), display("IO error: {source}"))]
    Io { source: std::io::Error },
}

impl QueueError {
    /// The base path is missing or unusable.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreNotFound { .. } | Self::NotADirectory { .. })
    }

    /// Segment or index metadata cannot be trusted.
    pub const fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::SegmentCorrupted { .. } | Self::IndexCorrupted { .. } | Self::SegmentOrder { .. }
        )
    }
}

pub type Result<T, E = QueueError> = std::result::Result<T, E>;
