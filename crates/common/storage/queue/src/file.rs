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

//! Memory-mapped segment files.

use std::path::{Path, PathBuf};

use mmap_io::MemoryMappedFile;

use crate::{QueueError, Result, error::MmapFailedSnafu};

fn mmap_error(path: &Path, e: impl std::fmt::Display) -> QueueError {
    MmapFailedSnafu {
        path:    path.to_path_buf(),
        message: e.to_string(),
    }
    .build()
}

/// Read-only view of a segment data file.
///
/// A zero-length file is left unmapped. The mapping is fixed at open time;
/// [`remap_if_grown`](Self::remap_if_grown) picks up a file that a writer has
/// extended since.
pub struct ReadOnlyDataFile {
    path: PathBuf,
    mmap: Option<MemoryMappedFile>,
    size: u64,
}

impl ReadOnlyDataFile {
    /// Open an existing data file in read-only mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = Self {
            path,
            mmap: None,
            size: 0,
        };
        file.remap_if_grown()?;
        Ok(file)
    }

    /// Remap the file if it is now longer than the current mapping.
    ///
    /// Returns `true` if a new mapping was installed.
    pub fn remap_if_grown(&mut self) -> Result<bool> {
        let len = std::fs::metadata(&self.path)?.len();
        if len <= self.size {
            return Ok(false);
        }

        let mmap =
            MemoryMappedFile::open_ro(&self.path).map_err(|e| mmap_error(&self.path, e))?;
        self.size = mmap.len();
        self.mmap = Some(mmap);
        Ok(true)
    }

    /// Read data from the specified offset into the provided buffer.
    #[inline]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let Some(mmap) = self.mmap.as_ref() else {
            return MmapFailedSnafu {
                path:    self.path.clone(),
                message: "file is empty and not mapped",
            }
            .fail();
        };
        mmap.read_into(offset, buf)
            .map_err(|e| mmap_error(&self.path, e))
    }

    /// Read a little-endian `u32` at `offset`.
    #[inline]
    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Mapped size in bytes.
    pub const fn size(&self) -> u64 { self.size }

    pub fn path(&self) -> &Path { &self.path }
}

/// Writable, preallocated data file. Only the fixture writer uses it.
#[cfg(any(test, feature = "test-util"))]
pub struct DataFile {
    mmap: MemoryMappedFile,
    path: PathBuf,
    size: u64,
}

#[cfg(any(test, feature = "test-util"))]
impl DataFile {
    /// Create a new zero-filled data file of `size` bytes.
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mmap = MemoryMappedFile::create_rw(&path, size).map_err(|e| mmap_error(&path, e))?;

        Ok(Self { mmap, path, size })
    }

    #[inline]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.mmap
            .update_region(offset, data)
            .map_err(|e| mmap_error(&self.path, e))
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| mmap_error(&self.path, e))
    }

    pub const fn size(&self) -> u64 { self.size }

    pub fn path(&self) -> &Path { &self.path }
}
