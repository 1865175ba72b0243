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

//! Where rendered records go.

use std::io::{self, Write};

/// Receives one rendered record per call.
pub trait OutputSink {
    fn emit(&mut self, record: &str) -> io::Result<()>;

    /// Called whenever the reader runs out of available records.
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn emit(&mut self, record: &str) -> io::Result<()> { (**self).emit(record) }

    fn flush(&mut self) -> io::Result<()> { (**self).flush() }
}

/// Writes each record as one line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, record: &str) -> io::Result<()> { writeln!(io::stdout().lock(), "{record}") }

    fn flush(&mut self) -> io::Result<()> { io::stdout().lock().flush() }
}

/// Strips every `\n` from records before passing them on.
#[derive(Debug)]
pub struct SingleLine<S> {
    inner: S,
}

impl<S: OutputSink> SingleLine<S> {
    pub const fn new(inner: S) -> Self { Self { inner } }

    pub fn into_inner(self) -> S { self.inner }
}

impl<S: OutputSink> OutputSink for SingleLine<S> {
    fn emit(&mut self, record: &str) -> io::Result<()> {
        if record.contains('\n') {
            self.inner.emit(&record.replace('\n', ""))
        } else {
            self.inner.emit(record)
        }
    }

    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

/// Collects records in memory.
impl OutputSink for Vec<String> {
    fn emit(&mut self, record: &str) -> io::Result<()> {
        self.push(record.to_owned());
        Ok(())
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(&str) -> io::Result<()>> OutputSink for FnSink<F> {
    fn emit(&mut self, record: &str) -> io::Result<()> { (self.0)(record) }
}
