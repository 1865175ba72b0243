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

//! Reads a queue store and renders its records as text.
//!
//! A run flows through these pieces in order:
//!
//! - [`position`] turns a [`StartPosition`] into a place in the store;
//! - [`cursor`] walks records forward from there across segments;
//! - [`decode`] and [`render`] turn each payload into text;
//! - [`filter`] decides whether the text is emitted;
//! - [`sink`] receives what survives.
//!
//! [`QueueReader`] in [`tail`] drives the loop, including follow mode.

pub mod cancel;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod filter;
pub mod position;
pub mod render;
pub mod sink;
pub mod tail;

pub use cancel::CancellationToken;
pub use config::{ReaderConfig, StartPosition, WireType, parse_index};
pub use decode::Decoder;
pub use error::{DecodeError, ReaderError, Result};
pub use sink::{FnSink, OutputSink, SingleLine, StdoutSink};
pub use tail::{QueueReader, RunSummary, TailState};
