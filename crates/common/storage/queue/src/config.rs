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

/// Options for opening a [`SegmentStore`](crate::SegmentStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory containing the segment tree.
    pub base_path:        PathBuf,
    /// Verify each frame's CRC before handing it out.
    ///
    /// When disabled, a half-written frame at the tail of the active segment
    /// can only be told apart by its length running past the mapped bytes.
    pub verify_checksums: bool,
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_path:        PathBuf::from("./queue_data"),
            verify_checksums: true,
        }
    }
}
