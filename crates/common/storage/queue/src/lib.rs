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

//! Read-only access to a segmented, append-only queue store.
//!
//! ## On-disk layout
//!
//! ```text
//! <base>/YYYY/MM/DD/YYYYMMDD-NNNN.data    framed records, preallocated
//! <base>/YYYY/MM/DD/YYYYMMDD-NNNN.index   sparse index + segment base index
//! ```
//!
//! Each `.data` file is a segment. Segments are ordered by their creation
//! sequence `NNNN` and each one covers a contiguous range of logical indices.
//! A frame is `[length: u32][payload][crc: u32]`; a zero length word means
//! nothing has been written there yet and a `u32::MAX` length word is the roll
//! trailer that seals a segment.
//!
//! [`SegmentStore`] owns every mapped segment of one reader. Callers walk it
//! with plain [`Position`] values (segment slot + byte offset + logical index),
//! so there is exactly one owner of file handles and releasing the store
//! releases everything.

pub mod config;
pub mod error;
pub mod file;
pub mod frame;
pub mod index;
pub mod path;
pub mod segment;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod writer;

mod crc;

pub use config::StoreConfig;
pub use error::{QueueError, Result};
pub use frame::{Frame, FrameRead};
pub use segment::SegmentInfo;
pub use store::{Position, SegmentStore};
#[cfg(any(test, feature = "test-util"))]
pub use writer::{RollStrategy, StoreWriter, StoreWriterBuilder};
