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

//! Segment file naming.
//!
//! Segments live under a date tree, `<base>/YYYY/MM/DD/YYYYMMDD-NNNN.data`,
//! with the index sidecar next to it as `YYYYMMDD-NNNN.index`. `NNNN` is the
//! segment creation sequence and is what orders segments; the date only
//! spreads files across directories.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use crate::Result;

pub const DATA_EXTENSION: &str = "data";

pub const INDEX_EXTENSION: &str = "index";

pub fn time_based_dir<P: AsRef<Path>>(base: P, time: DateTime<Utc>) -> PathBuf {
    let base = base.as_ref();
    base.join(format!("{:04}", time.year()))
        .join(format!("{:02}", time.month()))
        .join(format!("{:02}", time.day()))
}

pub fn data_file_name(time: DateTime<Utc>, sequence: u32) -> String {
    format!(
        "{:04}{:02}{:02}-{:04}.{DATA_EXTENSION}",
        time.year(),
        time.month(),
        time.day(),
        sequence
    )
}

pub fn data_file_path<P: AsRef<Path>>(base: P, time: DateTime<Utc>, sequence: u32) -> PathBuf {
    time_based_dir(base, time).join(data_file_name(time, sequence))
}

/// Index sidecar for a data file.
pub fn index_path_for(data_path: &Path) -> PathBuf { data_path.with_extension(INDEX_EXTENSION) }

/// Parse the creation sequence out of `YYYYMMDD-NNNN.data`.
pub fn parse_segment_sequence(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let (date, sequence) = stem.split_once('-')?;
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    sequence.parse().ok()
}

/// Find every segment under `base`, ordered by creation sequence.
///
/// `.data` files whose names do not parse are skipped with a warning.
pub fn scan_data_files<P: AsRef<Path>>(base: P) -> Result<Vec<(u32, PathBuf)>> {
    let mut files = Vec::new();
    scan_data_files_recursive(base.as_ref(), &mut files)?;
    files.sort();
    Ok(files)
}

fn scan_data_files_recursive(dir: &Path, files: &mut Vec<(u32, PathBuf)>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            scan_data_files_recursive(&path, files)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some(DATA_EXTENSION) {
            match parse_segment_sequence(&path) {
                Some(sequence) => files.push((sequence, path)),
                None => warn!(path = ?path, "Skipping data file with unrecognised name"),
            }
        }
    }

    Ok(())
}
