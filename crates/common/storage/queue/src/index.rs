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

//! Sparse index sidecar for a segment.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────── header (256 B) ───────────────────────────────┐
//! │ interval: u64 │ entry_count: u64 │ base_index: u64 │ reserved (232 B, zero)   │
//! └──────────────────────────────────────────────────────────────────────────────┘
//! ┌──── entry (16 B) ────┐
//! │ index: u64 │ offset: u64 │  × entry_count, sorted by index
//! └──────────────────────┘
//! ```
//!
//! `base_index` is the logical index of the segment's first record. Entries
//! map a logical index to the byte offset of its frame, roughly every
//! `interval` records, so a reader can jump close to a target and scan the
//! rest.

use std::path::{Path, PathBuf};

use snafu::ensure;

use crate::{Result, error::IndexCorruptedSnafu};

pub(crate) const INDEX_HEADER_SIZE: u64 = 256;

pub(crate) const INDEX_ENTRY_SIZE: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Logical index of the indexed record.
    pub index:  u64,
    /// Byte offset in the data file where the record's frame begins.
    pub offset: u64,
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Fully loaded index sidecar.
#[derive(Debug, Clone)]
pub struct IndexReader {
    base_index: u64,
    interval:   u64,
    entries:    Vec<IndexEntry>,
}

impl IndexReader {
    /// Open an index file and load all entries into memory.
    ///
    /// Fails with `IndexCorrupted` if the header is short, the header claims
    /// more entries than the file holds, or entries are out of order.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::parse(path, &data)
    }

    fn parse(path: &Path, data: &[u8]) -> Result<Self> {
        let corrupted = |reason: String| IndexCorruptedSnafu {
            path: PathBuf::from(path),
            reason,
        };

        ensure!(
            data.len() as u64 >= INDEX_HEADER_SIZE,
            corrupted(format!(
                "header too short: {} bytes, expected {INDEX_HEADER_SIZE}",
                data.len()
            ))
        );

        let interval = read_u64(data, 0);
        let entry_count = read_u64(data, 8);
        let base_index = read_u64(data, 16);

        let available = (data.len() as u64 - INDEX_HEADER_SIZE) / INDEX_ENTRY_SIZE;
        ensure!(
            entry_count <= available,
            corrupted(format!(
                "header claims {entry_count} entries but file holds {available}"
            ))
        );

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(entry_count as usize);
        for i in 0..entry_count {
            let at = (INDEX_HEADER_SIZE + i * INDEX_ENTRY_SIZE) as usize;
            let entry = IndexEntry {
                index:  read_u64(data, at),
                offset: read_u64(data, at + 8),
            };

            ensure!(
                entry.index >= base_index,
                corrupted(format!(
                    "entry {i} has index {} below base index {base_index}",
                    entry.index
                ))
            );
            if let Some(prev) = entries.last() {
                ensure!(
                    entry.index > prev.index && entry.offset > prev.offset,
                    corrupted(format!("entry {i} is out of order"))
                );
            }

            entries.push(entry);
        }

        Ok(Self {
            base_index,
            interval,
            entries,
        })
    }

    /// Logical index of the segment's first record.
    pub const fn base_index(&self) -> u64 { self.base_index }

    #[cfg(test)]
    pub(crate) const fn interval(&self) -> u64 { self.interval }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[IndexEntry] { &self.entries }

    pub fn last_entry(&self) -> Option<IndexEntry> { self.entries.last().copied() }

    /// Find the closest indexed record at or before `target`.
    ///
    /// Returns `None` when `target` precedes every entry; the caller then
    /// scans from the start of the segment.
    pub fn find_offset_for_index(&self, target: u64) -> Option<IndexEntry> {
        let idx = self.entries.partition_point(|e| e.index <= target);
        idx.checked_sub(1).map(|i| self.entries[i])
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use self::writer::IndexWriter;

#[cfg(any(test, feature = "test-util"))]
mod writer {
    use std::{
        fs::{File, OpenOptions},
        io::{Seek, SeekFrom, Write},
        path::Path,
    };

    use super::{INDEX_ENTRY_SIZE, INDEX_HEADER_SIZE, IndexEntry};
    use crate::Result;

    /// Appends sparse entries to a new index sidecar.
    pub struct IndexWriter {
        file:               File,
        interval:           u64,
        entry_count:        u64,
        /// Last indexed logical index, used to space entries `interval` apart.
        last_indexed_index: Option<u64>,
    }

    impl IndexWriter {
        /// Create a new index file at the given path.
        ///
        /// The file is truncated if it already exists.
        pub fn create<P: AsRef<Path>>(path: P, interval: u64, base_index: u64) -> Result<Self> {
            if let Some(parent) = path.as_ref().parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_ref())?;

            let mut header = [0u8; INDEX_HEADER_SIZE as usize];
            header[0..8].copy_from_slice(&interval.max(1).to_le_bytes());
            header[16..24].copy_from_slice(&base_index.to_le_bytes());
            file.write_all(&header)?;

            Ok(Self {
                file,
                interval: interval.max(1),
                entry_count: 0,
                last_indexed_index: None,
            })
        }

        /// Write an entry if this is the segment's first record or at least
        /// `interval` records have passed since the last entry.
        pub fn maybe_write_entry(&mut self, index: u64, offset: u64) -> Result<()> {
            let should_write = self
                .last_indexed_index
                .is_none_or(|last| index >= last + self.interval);

            if should_write {
                self.write_entry(IndexEntry { index, offset })?;
                self.last_indexed_index = Some(index);
            }

            Ok(())
        }

        fn write_entry(&mut self, entry: IndexEntry) -> Result<()> {
            let mut buf = [0u8; INDEX_ENTRY_SIZE as usize];
            buf[0..8].copy_from_slice(&entry.index.to_le_bytes());
            buf[8..16].copy_from_slice(&entry.offset.to_le_bytes());

            self.file.seek(SeekFrom::End(0))?;
            self.file.write_all(&buf)?;
            self.entry_count += 1;

            Ok(())
        }

        /// Publish the entry count in the header.
        pub fn flush(&mut self) -> Result<()> {
            self.file.seek(SeekFrom::Start(8))?;
            self.file.write_all(&self.entry_count.to_le_bytes())?;
            self.file.flush()?;
            Ok(())
        }

        pub const fn entry_count(&self) -> u64 { self.entry_count }
    }
}
