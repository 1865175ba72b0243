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

//! The segment store: one reader's view of a queue directory.
//!
//! ## Base indices
//!
//! Every segment knows the logical index of its first record. It comes from
//! the index sidecar header when one exists; otherwise it is the previous
//! segment's base plus that segment's record count (0 for the first
//! segment). Base indices never decrease; a store where they do is corrupt.
//!
//! ## Sealing
//!
//! A segment is sealed once a roll trailer is read from it or once a later
//! segment exists. Only the newest segment can be active.

use std::path::PathBuf;

use snafu::ensure;
use tracing::{debug, info};

use crate::{
    Result, StoreConfig,
    error::{IndexCorruptedSnafu, NotADirectorySnafu, SegmentOrderSnafu, StoreNotFoundSnafu},
    frame::FrameRead,
    index::IndexReader,
    path::{index_path_for, scan_data_files},
    segment::{Segment, SegmentInfo},
};

/// A place in the store: the slot of a segment in [`SegmentStore::segments`],
/// a byte offset within it, and the logical index of the record found there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub segment: usize,
    pub offset:  u64,
    pub index:   u64,
}

pub struct SegmentStore {
    config:   StoreConfig,
    segments: Vec<Segment>,
}

impl SegmentStore {
    /// Open the store rooted at `base_path` with default options.
    pub fn open<P: Into<PathBuf>>(base_path: P) -> Result<Self> {
        Self::with_config(StoreConfig::new(base_path))
    }

    /// Open a store. Fails with `StoreNotFound` if the base path is missing,
    /// and with a corruption error if segment metadata is unreadable.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        let base_path = &config.base_path;
        ensure!(
            base_path.exists(),
            StoreNotFoundSnafu {
                path: base_path.clone(),
            }
        );
        ensure!(
            base_path.is_dir(),
            NotADirectorySnafu {
                path: base_path.clone(),
            }
        );

        let mut store = Self {
            config,
            segments: Vec::new(),
        };
        store.refresh()?;

        info!(
            path = ?store.config.base_path,
            segments = store.segments.len(),
            first_index = store.segments.first().map(|s| s.info().base_index),
            "Segment store opened"
        );

        Ok(store)
    }

    /// Metadata of every known segment, in creation order.
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.segments.iter().map(|s| s.info().clone()).collect()
    }

    pub fn segment_count(&self) -> usize { self.segments.len() }

    pub fn segment_info(&self, segment: usize) -> Option<&SegmentInfo> {
        self.segments.get(segment).map(Segment::info)
    }

    /// Whether `segment` can still receive writes.
    ///
    /// Slots past the end count as active: a segment may yet appear there.
    pub fn is_active(&self, segment: usize) -> bool {
        self.segments.get(segment).is_none_or(|s| !s.info().sealed)
    }

    /// Rescan the directory for segments created since the last scan.
    ///
    /// Returns how many segments were added. Every segment but the newest is
    /// sealed afterwards.
    pub fn refresh(&mut self) -> Result<usize> {
        ensure!(
            self.config.base_path.is_dir(),
            StoreNotFoundSnafu {
                path: self.config.base_path.clone(),
            }
        );

        let last_sequence = self.segments.last().map(|s| s.info().sequence);
        let mut added = 0;

        for (sequence, path) in scan_data_files(&self.config.base_path)? {
            if last_sequence.is_some_and(|last| sequence <= last) {
                continue;
            }
            self.push_segment(sequence, path)?;
            added += 1;
        }

        if added > 0 {
            let newest = self.segments.len() - 1;
            for segment in &mut self.segments[..newest] {
                segment.seal();
            }
            debug!(added, segments = self.segments.len(), "Discovered new segments");
        }

        Ok(added)
    }

    fn push_segment(&mut self, sequence: u32, path: PathBuf) -> Result<()> {
        let index_path = index_path_for(&path);
        let index = if index_path.exists() {
            Some(IndexReader::open(&index_path)?)
        } else {
            None
        };

        let base_index = match (&index, self.segments.len()) {
            (Some(index), _) => index.base_index(),
            (None, 0) => 0,
            (None, n) => {
                let prev = n - 1;
                self.segments[prev].info().base_index + self.record_count(prev)?
            }
        };

        if let Some(prev) = self.segments.last() {
            let prev_base = prev.info().base_index;
            ensure!(
                base_index >= prev_base,
                SegmentOrderSnafu {
                    path:   path.clone(),
                    reason: format!(
                        "base index {base_index} is below previous segment's {prev_base}"
                    ),
                }
            );
        }

        let size = std::fs::metadata(&path)?.len();
        // Entry offsets increase, so checking the last one covers them all.
        if let Some(last) = index.as_ref().and_then(IndexReader::last_entry) {
            ensure!(
                last.offset < size,
                IndexCorruptedSnafu {
                    path:   index_path,
                    reason: format!(
                        "entry for index {} points at offset {} past the {size} byte data file",
                        last.index, last.offset
                    ),
                }
            );
        }

        debug!(path = ?path, sequence, base_index, indexed = index.is_some(), "Segment registered");

        self.segments.push(Segment::new(
            SegmentInfo {
                sequence,
                path,
                base_index,
                sealed: false,
                size,
            },
            index,
            self.config.verify_checksums,
        ));
        Ok(())
    }

    /// Read the frame at `offset` of `segment`.
    ///
    /// A slot past the last segment reads as [`FrameRead::EndOfSegment`].
    pub fn read_frame_at(&mut self, segment: usize, offset: u64) -> Result<FrameRead> {
        match self.segments.get_mut(segment) {
            Some(segment) => segment.read_frame_at(offset),
            None => Ok(FrameRead::EndOfSegment),
        }
    }

    /// First record of the store, or slot 0 of an empty store.
    pub fn start_position(&self) -> Position {
        Position {
            segment: 0,
            offset:  0,
            index:   self.segments.first().map_or(0, |s| s.info().base_index),
        }
    }

    /// Just past the last complete record: where the next write will appear.
    pub fn end_position(&mut self) -> Result<Position> {
        match self.segments.len() {
            0 => Ok(self.start_position()),
            n => self.seek_in_segment(n - 1, u64::MAX),
        }
    }

    /// Number of complete records currently in `segment`.
    pub fn record_count(&mut self, segment: usize) -> Result<u64> {
        let Some(base) = self.segment_info(segment).map(|s| s.base_index) else {
            return Ok(0);
        };
        let end = self.seek_in_segment(segment, u64::MAX)?;
        Ok(end.index - base)
    }

    /// Position of record `target` within `segment`, or the segment's end if
    /// the segment holds no such record.
    ///
    /// Starts from the closest sparse index entry at or before `target`.
    pub fn seek_in_segment(&mut self, segment: usize, target: u64) -> Result<Position> {
        let Some(seg) = self.segments.get_mut(segment) else {
            return Ok(Position {
                segment,
                offset: 0,
                index: target,
            });
        };

        let base = seg.info().base_index;
        let entry = seg.index().and_then(|i| i.find_offset_for_index(target));
        if let Some(entry) = entry
            && !matches!(seg.read_frame_at(entry.offset)?, FrameRead::Frame(_))
        {
            return IndexCorruptedSnafu {
                path:   index_path_for(&seg.info().path),
                reason: format!(
                    "entry for index {} points at offset {} where no frame starts",
                    entry.index, entry.offset
                ),
            }
            .fail();
        }
        let (mut index, mut offset) = entry.map_or((base, 0), |entry| (entry.index, entry.offset));

        while index < target {
            match seg.read_frame_at(offset)? {
                FrameRead::Frame(frame) => {
                    offset = frame.next_offset;
                    index += 1;
                }
                FrameRead::EndOfSegment | FrameRead::Incomplete => break,
            }
        }

        Ok(Position {
            segment,
            offset,
            index,
        })
    }

    /// Position of the nearest record with logical index `>= target`.
    ///
    /// An index before the store start resolves to the start; an index past
    /// the last record resolves to [`end_position`](Self::end_position).
    pub fn locate(&mut self, target: u64) -> Result<Position> {
        let start = self.start_position();
        if self.segments.is_empty() || target <= start.index {
            return Ok(start);
        }

        let segment = self
            .segments
            .partition_point(|s| s.info().base_index <= target)
            .saturating_sub(1);

        let position = self.seek_in_segment(segment, target)?;
        if position.index == target
            && matches!(
                self.read_frame_at(segment, position.offset)?,
                FrameRead::Frame(_)
            )
        {
            return Ok(position);
        }

        // `target` is past the records of `segment`; the next segment, if
        // any, starts above it.
        match self.segments.get(segment + 1) {
            Some(next) => Ok(Position {
                segment: segment + 1,
                offset:  0,
                index:   next.info().base_index,
            }),
            None => Ok(position),
        }
    }

    /// Release every mapping held by the store.
    pub fn close(mut self) { self.release_all(); }

    fn release_all(&mut self) {
        for segment in &mut self.segments {
            segment.release();
        }
    }
}

impl Drop for SegmentStore {
    fn drop(&mut self) {
        self.release_all();
        debug!(path = ?self.config.base_path, "Segment store released");
    }
}
