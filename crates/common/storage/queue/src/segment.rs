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

#![allow(clippy::cast_possible_truncation)]

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::{
    Result,
    crc::verify_frame_crc,
    error::SegmentCorruptedSnafu,
    file::ReadOnlyDataFile,
    frame::{FRAME_LENGTH_SIZE, Frame, FrameRead, ROLL_TRAILER, frame_disk_size},
    index::IndexReader,
};

/// Metadata for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Creation sequence parsed from the file name.
    pub sequence:   u32,
    pub path:       PathBuf,
    /// Logical index of the first record in this segment.
    pub base_index: u64,
    /// No further writes will land in this segment.
    pub sealed:     bool,
    /// Bytes of the file mapped so far.
    pub size:       u64,
}

/// A segment file together with its lazily opened mapping and its index.
pub(crate) struct Segment {
    info:             SegmentInfo,
    file:             Option<ReadOnlyDataFile>,
    index:            Option<IndexReader>,
    verify_checksums: bool,
}

impl Segment {
    pub(crate) const fn new(
        info: SegmentInfo,
        index: Option<IndexReader>,
        verify_checksums: bool,
    ) -> Self {
        Self {
            info,
            file: None,
            index,
            verify_checksums,
        }
    }

    pub(crate) const fn info(&self) -> &SegmentInfo { &self.info }

    pub(crate) const fn index(&self) -> Option<&IndexReader> { self.index.as_ref() }

    pub(crate) const fn seal(&mut self) { self.info.sealed = true; }

    /// Drop the mapping. The next read maps the file again.
    pub(crate) fn release(&mut self) {
        if self.file.take().is_some() {
            debug!(path = ?self.info.path, "Segment mapping released");
        }
    }

    /// Read the frame starting at `offset`.
    ///
    /// A sealed segment must hold only complete frames, so a frame that runs
    /// past the mapped bytes or fails its checksum there is corruption. In
    /// the active segment the same conditions mean the writer is mid-frame
    /// and the read reports [`FrameRead::Incomplete`].
    pub(crate) fn read_frame_at(&mut self, offset: u64) -> Result<FrameRead> {
        let sealed = self.info.sealed;
        let file = open_lazily(&mut self.file, &self.info.path)?;
        let fits_length = fits(file, offset, FRAME_LENGTH_SIZE as u64)?;
        self.info.size = file.size();

        if !fits_length {
            return Ok(FrameRead::EndOfSegment);
        }

        let length = file.read_u32(offset)?;
        if length == 0 {
            return Ok(FrameRead::EndOfSegment);
        }
        if length == ROLL_TRAILER {
            if !sealed {
                debug!(path = ?self.info.path, offset, "Roll trailer found, segment sealed");
            }
            self.info.sealed = true;
            return Ok(FrameRead::EndOfSegment);
        }

        let total = frame_disk_size(length as usize) as u64;
        let fits_frame = fits(file, offset, total)?;
        self.info.size = file.size();

        if !fits_frame {
            if sealed {
                return SegmentCorruptedSnafu {
                    path: self.info.path.clone(),
                    offset,
                    reason: format!(
                        "frame of {length} bytes runs past end of sealed segment ({} bytes)",
                        file.size()
                    ),
                }
                .fail();
            }
            return Ok(FrameRead::Incomplete);
        }

        let payload_offset = offset + FRAME_LENGTH_SIZE as u64;
        let mut payload = vec![0u8; length as usize];
        file.read_at(payload_offset, &mut payload)?;
        let stored_crc = file.read_u32(payload_offset + u64::from(length))?;

        if self.verify_checksums && !verify_frame_crc(length, &payload, stored_crc) {
            if !sealed && stored_crc == 0 {
                return Ok(FrameRead::Incomplete);
            }
            return SegmentCorruptedSnafu {
                path: self.info.path.clone(),
                offset,
                reason: format!("checksum mismatch (stored {stored_crc:#010x})"),
            }
            .fail();
        }

        Ok(FrameRead::Frame(Frame {
            offset,
            next_offset: offset + total,
            payload: Bytes::from(payload),
        }))
    }
}

fn open_lazily<'a>(
    slot: &'a mut Option<ReadOnlyDataFile>,
    path: &Path,
) -> Result<&'a mut ReadOnlyDataFile> {
    let file = match slot.take() {
        Some(file) => file,
        None => {
            debug!(path = ?path, "Mapping segment");
            ReadOnlyDataFile::open(path)?
        }
    };
    Ok(slot.insert(file))
}

/// Whether `len` bytes at `offset` are mapped, remapping once if the file
/// has grown.
fn fits(file: &mut ReadOnlyDataFile, offset: u64, len: u64) -> Result<bool> {
    let Some(end) = offset.checked_add(len) else {
        return SegmentCorruptedSnafu {
            path: file.path().to_path_buf(),
            offset,
            reason: format!("a {len} byte read overflows the offset"),
        }
        .fail();
    };
    if end <= file.size() {
        return Ok(true);
    }
    file.remap_if_grown()?;
    Ok(end <= file.size())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{crc::calculate_frame_crc, file::DataFile};

    fn write_test_frame(file: &DataFile, offset: u64, data: &[u8]) -> u64 {
        let length = u32::try_from(data.len()).unwrap();
        let crc = calculate_frame_crc(length, data);

        file.write_at(offset + 4, data).unwrap();
        file.write_at(offset + 4 + data.len() as u64, &crc.to_le_bytes())
            .unwrap();
        file.write_at(offset, &length.to_le_bytes()).unwrap();

        frame_disk_size(data.len()) as u64
    }

    fn segment_for(path: &Path, sealed: bool) -> Segment {
        Segment::new(
            SegmentInfo {
                sequence: 1,
                path: path.to_path_buf(),
                base_index: 0,
                sealed,
                size: 0,
            },
            None,
            true,
        )
    }

    fn expect_frame(read: FrameRead) -> Frame {
        match read {
            FrameRead::Frame(frame) => frame,
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_read_frames_then_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        let file = DataFile::create(&path, 4096).unwrap();

        let mut offset = 0;
        for i in 0..3 {
            offset += write_test_frame(&file, offset, format!("message {i}").as_bytes());
        }

        let mut segment = segment_for(&path, false);
        let mut offset = 0;
        for i in 0..3 {
            let frame = expect_frame(segment.read_frame_at(offset).unwrap());
            assert_eq!(frame.payload.as_ref(), format!("message {i}").as_bytes());
            assert_eq!(frame.offset, offset);
            offset = frame.next_offset;
        }

        assert_eq!(segment.read_frame_at(offset).unwrap(), FrameRead::EndOfSegment);
        assert!(!segment.info().sealed);
        assert_eq!(segment.info().size, 4096);
    }

    #[test]
    fn test_roll_trailer_seals_segment() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        let file = DataFile::create(&path, 4096).unwrap();

        let offset = write_test_frame(&file, 0, b"last one");
        file.write_at(offset, &ROLL_TRAILER.to_le_bytes()).unwrap();

        let mut segment = segment_for(&path, false);
        expect_frame(segment.read_frame_at(0).unwrap());
        assert_eq!(segment.read_frame_at(offset).unwrap(), FrameRead::EndOfSegment);
        assert!(segment.info().sealed);
    }

    #[test]
    fn test_missing_checksum_is_incomplete_while_active() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        let file = DataFile::create(&path, 4096).unwrap();

        file.write_at(0, &5u32.to_le_bytes()).unwrap();
        file.write_at(4, b"hel").unwrap();

        let mut segment = segment_for(&path, false);
        assert_eq!(segment.read_frame_at(0).unwrap(), FrameRead::Incomplete);

        write_test_frame(&file, 0, b"hello");
        let frame = expect_frame(segment.read_frame_at(0).unwrap());
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn test_missing_checksum_is_corrupt_once_sealed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        let file = DataFile::create(&path, 4096).unwrap();

        file.write_at(0, &5u32.to_le_bytes()).unwrap();
        file.write_at(4, b"hello").unwrap();

        let mut segment = segment_for(&path, true);
        let err = segment.read_frame_at(0).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_bad_checksum_is_corrupt_even_while_active() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        let file = DataFile::create(&path, 4096).unwrap();

        write_test_frame(&file, 0, b"hello");
        file.write_at(4, b"j").unwrap();

        let mut segment = segment_for(&path, false);
        assert!(segment.read_frame_at(0).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_frame_past_end_of_growing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");

        let payload = b"grown";
        let length = u32::try_from(payload.len()).unwrap();
        let mut bytes = length.to_le_bytes().to_vec();
        bytes.extend_from_slice(&payload[..2]);
        std::fs::write(&path, &bytes).unwrap();

        let mut segment = segment_for(&path, false);
        assert_eq!(segment.read_frame_at(0).unwrap(), FrameRead::Incomplete);

        bytes.extend_from_slice(&payload[2..]);
        bytes.extend_from_slice(&calculate_frame_crc(length, payload).to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let frame = expect_frame(segment.read_frame_at(0).unwrap());
        assert_eq!(frame.payload.as_ref(), payload);
        assert_eq!(frame.next_offset, 13);
        assert_eq!(segment.read_frame_at(13).unwrap(), FrameRead::EndOfSegment);
    }

    #[test]
    fn test_offset_overflow_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        DataFile::create(&path, 1024).unwrap();

        let mut segment = segment_for(&path, false);
        let err = segment.read_frame_at(u64::MAX - 1).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_release_then_read_again() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20260114-0001.data");
        let file = DataFile::create(&path, 1024).unwrap();
        write_test_frame(&file, 0, b"again");

        let mut segment = segment_for(&path, false);
        expect_frame(segment.read_frame_at(0).unwrap());
        segment.release();
        expect_frame(segment.read_frame_at(0).unwrap());
    }
}
