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

//! Forward-only iteration over the records of a store.
//!
//! The cursor is a plain [`Position`]; the store it walks is passed in on
//! every call so the store stays the single owner of mapped segments.

use bytes::Bytes;
use queue::{FrameRead, Position, SegmentStore};
use tracing::trace;

use crate::Result;

/// One record read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub index:   u64,
    pub segment: usize,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Record(Record),
    /// Nothing more is available right now. More may arrive later.
    EndOfData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    position: Position,
}

impl Cursor {
    pub const fn new(position: Position) -> Self { Self { position } }

    /// Where the next record will be read from.
    pub const fn position(&self) -> Position { self.position }

    /// Read the next record, moving into later segments as earlier ones are
    /// exhausted.
    ///
    /// A sealed segment's end moves the cursor to the next segment, skipping
    /// any index gap. The end of the active segment or a half-written frame
    /// is [`Next::EndOfData`]; calling again later picks up from the same
    /// place.
    pub fn next(&mut self, store: &mut SegmentStore) -> Result<Next> {
        loop {
            let Position { segment, offset, .. } = self.position;
            match store.read_frame_at(segment, offset)? {
                FrameRead::Frame(frame) => {
                    if offset == 0 {
                        // The store may start above where we were told to begin.
                        let base = store.segment_info(segment).map_or(0, |s| s.base_index);
                        self.position.index = self.position.index.max(base);
                    }
                    let record = Record {
                        index: self.position.index,
                        segment,
                        payload: frame.payload,
                    };
                    self.position.offset = frame.next_offset;
                    self.position.index += 1;
                    return Ok(Next::Record(record));
                }
                FrameRead::Incomplete => return Ok(Next::EndOfData),
                FrameRead::EndOfSegment => {
                    if store.is_active(segment) || !self.advance(store)? {
                        return Ok(Next::EndOfData);
                    }
                }
            }
        }
    }

    /// Move to the start of the segment after the current one, rescanning
    /// the directory if it is not known yet. Returns false if there is none.
    fn advance(&mut self, store: &mut SegmentStore) -> Result<bool> {
        let next = self.position.segment + 1;
        if next >= store.segment_count() {
            store.refresh()?;
        }
        let Some(info) = store.segment_info(next) else {
            return Ok(false);
        };

        let index = self.position.index.max(info.base_index);
        trace!(
            from = self.position.segment,
            to = next,
            skipped = index - self.position.index,
            "Crossing segment boundary"
        );
        self.position = Position {
            segment: next,
            offset: 0,
            index,
        };
        Ok(true)
    }

    /// Iterate the records available now.
    pub const fn records<'a>(&'a mut self, store: &'a mut SegmentStore) -> Records<'a> {
        Records {
            cursor: self,
            store,
        }
    }
}

/// Records up to the end of available data. See [`Cursor::records`].
pub struct Records<'a> {
    cursor: &'a mut Cursor,
    store:  &'a mut SegmentStore,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.next(self.store) {
            Ok(Next::Record(record)) => Some(Ok(record)),
            Ok(Next::EndOfData) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use queue::{RollStrategy, StoreWriter};
    use tempfile::TempDir;

    use super::*;

    fn writer(dir: &TempDir, per_segment: u64) -> StoreWriter {
        StoreWriter::builder(dir.path())
            .file_size(64 * 1024)
            .roll_strategy(RollStrategy::ByCount(per_segment))
            .index_interval(4)
            .build()
    }

    fn drain(cursor: &mut Cursor, store: &mut SegmentStore) -> Vec<(u64, String)> {
        cursor
            .records(store)
            .map(|r| {
                let r = r.unwrap();
                (r.index, String::from_utf8(r.payload.to_vec()).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_reads_across_segments_in_order() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, 3);
        for i in 0..10 {
            w.append(format!("r{i}").as_bytes()).unwrap();
        }

        let mut store = SegmentStore::open(dir.path()).unwrap();
        let mut cursor = Cursor::new(store.start_position());
        let records = drain(&mut cursor, &mut store);

        let expected: Vec<(u64, String)> = (0..10).map(|i| (i, format!("r{i}"))).collect();
        assert_eq!(records, expected);
        assert_eq!(cursor.next(&mut store).unwrap(), Next::EndOfData);
    }

    #[test]
    fn test_resumes_after_end_of_data() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, 100);
        w.append(b"first").unwrap();

        let mut store = SegmentStore::open(dir.path()).unwrap();
        let mut cursor = Cursor::new(store.start_position());
        assert_eq!(drain(&mut cursor, &mut store).len(), 1);

        w.begin_pending(b"second").unwrap();
        assert_eq!(cursor.next(&mut store).unwrap(), Next::EndOfData);

        w.finish_pending().unwrap();
        assert_eq!(drain(&mut cursor, &mut store), vec![(1, "second".to_string())]);
    }

    #[test]
    fn test_follows_into_new_segment() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, 2);
        w.append(b"a").unwrap();
        w.append(b"b").unwrap();

        let mut store = SegmentStore::open(dir.path()).unwrap();
        let mut cursor = Cursor::new(store.start_position());
        assert_eq!(drain(&mut cursor, &mut store).len(), 2);

        // Rolls: seals segment one with a trailer and starts segment two.
        w.append(b"c").unwrap();

        // The trailer alone is enough to move on; the directory is rescanned.
        assert_eq!(drain(&mut cursor, &mut store), vec![(2, "c".to_string())]);
        assert_eq!(store.segment_count(), 2);
    }

    #[test]
    fn test_skips_index_gap() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir, 2);
        for i in 0..6 {
            w.append(format!("r{i}").as_bytes()).unwrap();
        }
        let files = queue::path::scan_data_files(dir.path()).unwrap();
        std::fs::remove_file(&files[1].1).unwrap();

        let mut store = SegmentStore::open(dir.path()).unwrap();
        let mut cursor = Cursor::new(store.start_position());
        let indices: Vec<u64> = drain(&mut cursor, &mut store).iter().map(|r| r.0).collect();
        assert_eq!(indices, vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_empty_store_then_first_segment() {
        let dir = TempDir::new().unwrap();
        let mut store = SegmentStore::open(dir.path()).unwrap();
        let mut cursor = Cursor::new(store.start_position());
        assert_eq!(cursor.next(&mut store).unwrap(), Next::EndOfData);

        let mut w = StoreWriter::builder(dir.path()).start_index(40).build();
        w.append(b"late").unwrap();
        store.refresh().unwrap();

        assert_eq!(drain(&mut cursor, &mut store), vec![(40, "late".to_string())]);
    }
}
