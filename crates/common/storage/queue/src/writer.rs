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

//! Synchronous fixture writer.
//!
//! Builds stores in the on-disk format [`SegmentStore`](crate::SegmentStore)
//! reads, for tests and benchmarks. Each frame is published by writing the
//! payload and checksum first and the length word last, so a concurrent
//! reader sees either nothing or the whole frame. On roll the current
//! segment gets a roll trailer and the next segment is created on the next
//! append.

use std::path::{Path, PathBuf};

use chrono::Utc;
use snafu::ensure;
use tracing::debug;

use crate::{
    Result,
    crc::calculate_frame_crc,
    error::FrameTooLargeSnafu,
    file::DataFile,
    frame::{FRAME_LENGTH_SIZE, ROLL_TRAILER, frame_disk_size},
    index::IndexWriter,
    path::{data_file_path, index_path_for},
};

/// When the writer moves on to a new segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollStrategy {
    /// Roll once the segment holds this many bytes of frames.
    BySize(u64),
    /// Roll once the segment holds this many records.
    ByCount(u64),
    /// Roll only when the file is full.
    Never,
}

impl RollStrategy {
    pub const fn should_roll(&self, current_size: u64, count: u64) -> bool {
        match *self {
            Self::BySize(size) => current_size >= size,
            Self::ByCount(max_count) => count >= max_count,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub base_path:      PathBuf,
    /// Preallocated size of each data file.
    pub file_size:      u64,
    pub roll_strategy:  RollStrategy,
    pub index_interval: u64,
    /// Logical index of the first record written.
    pub start_index:    u64,
    /// Creation sequence of the first segment.
    pub first_sequence: u32,
}

pub struct StoreWriterBuilder {
    config: WriterConfig,
}

impl StoreWriterBuilder {
    pub fn file_size(mut self, size: u64) -> Self {
        self.config.file_size = size;
        self
    }

    pub const fn roll_strategy(mut self, strategy: RollStrategy) -> Self {
        self.config.roll_strategy = strategy;
        self
    }

    pub const fn index_interval(mut self, interval: u64) -> Self {
        self.config.index_interval = interval;
        self
    }

    pub const fn start_index(mut self, index: u64) -> Self {
        self.config.start_index = index;
        self
    }

    pub const fn first_sequence(mut self, sequence: u32) -> Self {
        self.config.first_sequence = sequence;
        self
    }

    /// Files are created lazily by the first append.
    pub fn build(self) -> StoreWriter {
        let config = self.config;
        StoreWriter {
            write_position: 0,
            message_count: 0,
            file_sequence: config.first_sequence,
            next_index: config.start_index,
            current_file: None,
            current_index: None,
            pending: None,
            config,
        }
    }
}

/// A frame whose length and payload are on disk but whose checksum is not.
struct PendingFrame {
    length: u32,
    crc:    u32,
}

pub struct StoreWriter {
    config:         WriterConfig,
    current_file:   Option<DataFile>,
    current_index:  Option<IndexWriter>,
    /// Byte offset of the next frame in the current file.
    write_position: u64,
    /// Records in the current file.
    message_count:  u64,
    /// Creation sequence of the current (or next) file.
    file_sequence:  u32,
    next_index:     u64,
    pending:        Option<PendingFrame>,
}

impl StoreWriter {
    pub fn builder<P: AsRef<Path>>(base_path: P) -> StoreWriterBuilder {
        StoreWriterBuilder {
            config: WriterConfig {
                base_path:      base_path.as_ref().to_path_buf(),
                file_size:      1024 * 1024,
                roll_strategy:  RollStrategy::Never,
                index_interval: 16,
                start_index:    0,
                first_sequence: 1,
            },
        }
    }

    /// Logical index the next appended record will get.
    pub const fn next_index(&self) -> u64 { self.next_index }

    /// Path of the segment currently being written.
    pub fn current_path(&self) -> Option<&Path> { self.current_file.as_ref().map(DataFile::path) }

    /// Append one record and return its logical index.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        self.prepare(payload.len())?;

        let length = payload.len() as u32;
        let crc = calculate_frame_crc(length, payload);
        let offset = self.write_position;
        if let Some(file) = self.current_file.as_ref() {
            file.write_at(offset + FRAME_LENGTH_SIZE as u64, payload)?;
            file.write_at(offset + FRAME_LENGTH_SIZE as u64 + u64::from(length), &crc.to_le_bytes())?;
            file.write_at(offset, &length.to_le_bytes())?;
        }

        self.commit(payload.len())
    }

    /// Write the length and payload of a frame but not its checksum, leaving
    /// it half-written until [`finish_pending`](Self::finish_pending).
    pub fn begin_pending(&mut self, payload: &[u8]) -> Result<()> {
        self.prepare(payload.len())?;

        let length = payload.len() as u32;
        let offset = self.write_position;
        if let Some(file) = self.current_file.as_ref() {
            file.write_at(offset, &length.to_le_bytes())?;
            file.write_at(offset + FRAME_LENGTH_SIZE as u64, payload)?;
        }
        self.pending = Some(PendingFrame {
            length,
            crc: calculate_frame_crc(length, payload),
        });
        Ok(())
    }

    /// Complete the frame started by [`begin_pending`](Self::begin_pending).
    ///
    /// Returns `None` if there is no pending frame.
    pub fn finish_pending(&mut self) -> Result<Option<u64>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };

        let crc_offset = self.write_position + FRAME_LENGTH_SIZE as u64 + u64::from(pending.length);
        if let Some(file) = self.current_file.as_ref() {
            file.write_at(crc_offset, &pending.crc.to_le_bytes())?;
        }
        self.commit(pending.length as usize).map(Some)
    }

    /// Seal the current segment with a roll trailer. The next append starts
    /// a new segment.
    pub fn roll(&mut self) -> Result<()> {
        let Some(file) = self.current_file.take() else {
            return Ok(());
        };

        if self.write_position + FRAME_LENGTH_SIZE as u64 <= file.size() {
            file.write_at(self.write_position, &ROLL_TRAILER.to_le_bytes())?;
        }
        file.flush()?;
        if let Some(mut index) = self.current_index.take() {
            index.flush()?;
        }

        debug!(
            path = ?file.path(),
            records = self.message_count,
            next_index = self.next_index,
            "Segment sealed"
        );

        self.file_sequence += 1;
        self.write_position = 0;
        self.message_count = 0;
        Ok(())
    }

    /// Roll if needed and make sure a file with room for the frame is open.
    fn prepare(&mut self, payload_len: usize) -> Result<()> {
        let total = frame_disk_size(payload_len) as u64;
        // Every segment keeps room for its roll trailer.
        let capacity = self.config.file_size.saturating_sub(FRAME_LENGTH_SIZE as u64);
        ensure!(total <= capacity, FrameTooLargeSnafu {
            len: payload_len,
            capacity,
        });

        if self.current_file.is_some()
            && (self
                .config
                .roll_strategy
                .should_roll(self.write_position, self.message_count)
                || self.write_position + total > capacity)
        {
            self.roll()?;
        }

        if self.current_file.is_none() {
            let path = data_file_path(&self.config.base_path, Utc::now(), self.file_sequence);
            let index = IndexWriter::create(
                index_path_for(&path),
                self.config.index_interval,
                self.next_index,
            )?;
            debug!(path = ?path, base_index = self.next_index, "Creating new data file");
            self.current_file = Some(DataFile::create(&path, self.config.file_size)?);
            self.current_index = Some(index);
        }

        Ok(())
    }

    fn commit(&mut self, payload_len: usize) -> Result<u64> {
        let index = self.next_index;
        if let Some(writer) = self.current_index.as_mut() {
            writer.maybe_write_entry(index, self.write_position)?;
            writer.flush()?;
        }

        self.write_position += frame_disk_size(payload_len) as u64;
        self.message_count += 1;
        self.next_index += 1;
        Ok(index)
    }
}
