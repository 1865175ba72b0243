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

use queue::{Position, SegmentStore};
use tracing::debug;

use crate::{Result, config::StartPosition};

/// Turn a start directive into a concrete position in `store`.
///
/// Indices that do not exist resolve to the nearest record after them, or
/// to the end of the store when nothing follows.
pub fn resolve(store: &mut SegmentStore, start: StartPosition) -> Result<Position> {
    let position = match start {
        StartPosition::Start => store.start_position(),
        StartPosition::Index(index) => {
            let position = store.locate(index)?;
            if position.index != index {
                debug!(
                    requested = index,
                    resolved = position.index,
                    "Requested index not present"
                );
            }
            position
        }
        StartPosition::LastN(count) => last_n(store, count)?,
    };

    debug!(
        ?start,
        segment = position.segment,
        offset = position.offset,
        index = position.index,
        "Start position resolved"
    );
    Ok(position)
}

/// Walk segments backwards from the newest, summing record counts, until
/// `count` records are covered.
fn last_n(store: &mut SegmentStore, count: u64) -> Result<Position> {
    if count == 0 {
        return Ok(store.end_position()?);
    }

    let mut remaining = count;
    for segment in (0..store.segment_count()).rev() {
        let records = store.record_count(segment)?;
        if records >= remaining {
            let base = store.segment_info(segment).map_or(0, |s| s.base_index);
            return Ok(store.seek_in_segment(segment, base + (records - remaining))?);
        }
        remaining -= records;
    }

    Ok(store.start_position())
}
