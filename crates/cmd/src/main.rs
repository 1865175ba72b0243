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

use clap::Parser;
use qreader_common_telemetry::{LogFormat, LoggingOptions, init_global_logging, set_panic_hook};
use qreader_reader::{
    CancellationToken, QueueReader, ReaderConfig, StartPosition, StdoutSink, WireType, parse_index,
};
use snafu::{ResultExt, Whatever};
use tracing::debug;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
    name = "qreader",
    about = "Print the records of a queue store, optionally following new ones",
    author = build_info::AUTHOR,
    version = build_info::FULL_VERSION,
    long_version = build_info::LONG_VERSION
)]
#[command(long_about = r"

Print the records of a queue store in index order, one per line, each
prefixed with its index in hex.

Examples:

qreader -d /var/queue
qreader -d /var/queue -f -m 10 -i ERROR -e heartbeat
qreader -d /var/queue -n 0x4a00000012 -r -w json

")]
struct Cli {
    /// Directory holding the queue store.
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: PathBuf,

    /// Only print records matching this regex. Repeatable; any match counts.
    #[arg(short = 'i', long = "include-regex", value_name = "RE")]
    include: Vec<String>,

    /// Never print records matching this regex. Repeatable; wins over -i.
    #[arg(short = 'e', long = "exclude-regex", value_name = "RE")]
    exclude: Vec<String>,

    /// Keep polling for new records once the existing ones are printed.
    #[arg(short = 'f', long)]
    follow: bool,

    /// Start this many records before the end.
    #[arg(
        short = 'm',
        long = "max-history",
        value_name = "N",
        conflicts_with = "from_index"
    )]
    max_history: Option<u64>,

    /// Start at this index (decimal, 0x hex or 0-prefixed octal).
    #[arg(short = 'n', long = "from-index", value_name = "INDEX", value_parser = parse_from_index)]
    from_index: Option<u64>,

    /// Decode records as method invocations.
    #[arg(short = 'r', long = "as-method-reader")]
    method_reader: bool,

    /// Rendering of each record: text or json.
    #[arg(short = 'w', long = "wire-type", value_name = "TYPE", default_value_t = WireType::Text)]
    wire_type: WireType,

    /// Do not prefix records with their index.
    #[arg(short = 's', long = "suppress-index")]
    suppress_index: bool,

    /// Print every record on a single line.
    #[arg(short = 'l', long = "single-line")]
    single_line: bool,

    /// Wait between polls in follow mode.
    #[arg(long, value_name = "MS", default_value_t = qreader_reader::config::DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Diagnostic log filter, e.g. `info` or `queue=debug`. Overrides RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    #[arg(long, value_name = "FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Also write diagnostic logs to hourly files in this directory.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,
}

fn parse_from_index(literal: &str) -> Result<u64, String> {
    parse_index(literal).map_err(|err| err.to_string())
}

impl Cli {
    const fn start(&self) -> StartPosition {
        match (self.from_index, self.max_history) {
            (Some(index), _) => StartPosition::Index(index),
            (None, Some(n)) => StartPosition::LastN(n),
            (None, None) => StartPosition::Start,
        }
    }

    fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::builder()
            .base_path(self.directory.clone())
            .include(self.include.clone())
            .exclude(self.exclude.clone())
            .follow(self.follow)
            .start(self.start())
            .method_reader(self.method_reader)
            .wire_type(self.wire_type)
            .suppress_index(self.suppress_index)
            .single_line(self.single_line)
            .poll_interval_ms(self.poll_interval_ms)
            .build()
    }

    fn logging_options(&self) -> LoggingOptions {
        LoggingOptions::builder()
            .maybe_level(self.log_level.clone())
            .log_format(self.log_format)
            .dir(self.log_dir.clone().unwrap_or_default())
            .build()
    }

    fn run(&self) -> Result<(), Whatever> {
        let _guards = init_global_logging("qreader", &self.logging_options())
            .whatever_context("Failed to initialise logging")?;
        set_panic_hook();

        let reader =
            QueueReader::new(self.reader_config()).whatever_context("Invalid reader options")?;

        let token = CancellationToken::new();
        let on_interrupt = token.clone();
        ctrlc::set_handler(move || on_interrupt.cancel())
            .whatever_context("Failed to install Ctrl-C handler")?;

        match reader.run(StdoutSink, &token) {
            Ok(summary) => {
                debug!(?summary, "Reader exited");
                Ok(())
            }
            // Downstream closed, e.g. `qreader ... | head`.
            Err(err) if err.is_broken_pipe() => Ok(()),
            Err(err) => Err(err).with_whatever_context(|_| {
                format!("Failed to read queue at {}", self.directory.display())
            }),
        }
    }
}

fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();
    Cli::parse().run()
}
