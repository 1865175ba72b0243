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

use std::{path::PathBuf, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::{Result, decode::Decoder, error::InvalidIndexSnafu};

/// Default wait between polls in follow mode.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Where a run starts reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// The first retained record.
    #[default]
    Start,
    /// The record with this logical index, or the nearest one after it.
    Index(u64),
    /// The last `n` records.
    LastN(u64),
}

/// How records are rendered.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WireType {
    /// Indented `key: value` text.
    #[default]
    Text,
    /// Compact JSON, one document per record.
    Json,
}

/// Everything one run needs to know.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct ReaderConfig {
    /// Directory holding the store.
    #[builder(into)]
    pub base_path: PathBuf,

    /// Emit only records matching at least one of these, when non-empty.
    #[builder(default)]
    pub include: Vec<String>,

    /// Suppress records matching any of these. Wins over `include`.
    #[builder(default)]
    pub exclude: Vec<String>,

    /// Keep polling for new records once the backlog is drained.
    #[builder(default)]
    pub follow: bool,

    #[builder(default)]
    pub start: StartPosition,

    /// Decode records as method invocations.
    #[builder(default)]
    pub method_reader: bool,

    #[builder(default)]
    pub wire_type: WireType,

    /// Omit the `0x<index>: ` prefix.
    #[builder(default)]
    pub suppress_index: bool,

    /// Strip newlines so every record prints on one line.
    #[builder(default)]
    pub single_line: bool,

    #[default(DEFAULT_POLL_INTERVAL_MS)]
    #[builder(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
}

impl ReaderConfig {
    pub const fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }

    pub const fn decoder(&self) -> Decoder {
        if self.method_reader {
            Decoder::MethodInvocation(self.wire_type)
        } else {
            Decoder::Plain(self.wire_type)
        }
    }
}

/// Parse a logical index literal.
///
/// Accepts decimal (`42`), hexadecimal (`0x2A`, `0X2a`, `#2a`) and octal with
/// a leading zero (`052`), each optionally prefixed with `+`. Negative values
/// are rejected.
pub fn parse_index(literal: &str) -> Result<u64> {
    let invalid = |reason: &str| {
        InvalidIndexSnafu {
            literal: literal.to_string(),
            reason:  reason.to_string(),
        }
        .fail()
    };

    let unsigned = match literal.strip_prefix('-') {
        Some(_) => return invalid("negative indices are not allowed"),
        None => literal.strip_prefix('+').unwrap_or(literal),
    };

    let (digits, radix) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .or_else(|| unsigned.strip_prefix('#'))
    {
        (hex, 16)
    } else if unsigned.len() > 1
        && let Some(octal) = unsigned.strip_prefix('0')
    {
        (octal, 8)
    } else {
        (unsigned, 10)
    };

    if digits.is_empty() {
        return invalid("no digits");
    }
    // `from_str_radix` would accept a second sign here.
    if digits.starts_with(['+', '-']) {
        return invalid("misplaced sign");
    }

    match u64::from_str_radix(digits, radix) {
        Ok(index) => Ok(index),
        Err(err) => invalid(&err.to_string()),
    }
}
