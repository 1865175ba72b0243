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

//! Frame wire format.
//!
//! ```text
//! ┌──────────────┬────────────────────┬──────────────┐
//! │ length: u32  │ payload: length B  │  crc: u32    │
//! └──────────────┴────────────────────┴──────────────┘
//! ```
//!
//! All integers are little-endian.

use bytes::Bytes;

/// Size of the length prefix.
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Size of the trailing checksum.
pub const FRAME_CRC_SIZE: usize = 4;

/// Length word that seals a segment. Nothing after it belongs to the segment.
pub const ROLL_TRAILER: u32 = u32::MAX;

/// Total bytes a payload occupies on disk.
#[inline]
pub const fn frame_disk_size(payload_len: usize) -> usize {
    FRAME_LENGTH_SIZE + payload_len + FRAME_CRC_SIZE
}

/// One complete, checksum-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte offset of the length word within the segment.
    pub offset:      u64,
    /// Byte offset just past the checksum, where the next frame starts.
    pub next_offset: u64,
    /// Frame payload.
    pub payload:     Bytes,
}

/// Outcome of reading at one offset of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete frame.
    Frame(Frame),
    /// No frame starts here: either the segment is sealed or the writer has
    /// not written anything at this offset yet.
    EndOfSegment,
    /// A frame has started here but the writer has not finished it.
    Incomplete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_disk_size() {
        assert_eq!(frame_disk_size(0), 8);
        assert_eq!(frame_disk_size(10), 18);
        assert_eq!(frame_disk_size(100), 108);
    }
}
