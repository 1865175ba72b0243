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

use std::{env, io::IsTerminal, sync::Once};

use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter, filter::Targets, layer::SubscriberExt};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Filter used when neither [`LoggingOptions::level`] nor `RUST_LOG` is set.
///
/// Records go to stdout, so diagnostics stay quiet unless asked for.
pub const DEFAULT_LOG_TARGETS: &str = "warn";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("Invalid log filter `{filter}`"))]
    InvalidFilter {
        filter: String,
        source: filter::ParseError,
    },

    #[snafu(display("Failed to create rolling log file in {dir}"))]
    LogDir { dir: String, source: InitError },

    #[snafu(display("Failed to bridge `log` records into tracing"))]
    LogBridge { source: log::SetLoggerError },

    #[snafu(display("A global tracing subscriber is already installed"))]
    GlobalSubscriber {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rotated log files. Empty disables file logging.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Filter in `tracing_subscriber::filter::Targets` syntax, e.g.
    /// `"info,queue=debug"`. Falls back to `RUST_LOG`, then
    /// [`DEFAULT_LOG_TARGETS`].
    #[builder(into)]
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per log, one per hour.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Also write logs to stderr.
    #[default = true]
    #[builder(default = true)]
    pub append_stderr: bool,
}

/// Available log output formats.
#[derive(
    Clone,
    Debug,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,

    /// Human-readable lines.
    #[default]
    Text,
}

/// The filter `opts` selects, after `RUST_LOG` and the default.
pub fn log_targets(opts: &LoggingOptions) -> Result<Targets, LoggingError> {
    let from_env = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = opts
        .level
        .as_deref()
        .or(from_env.as_deref())
        .unwrap_or(DEFAULT_LOG_TARGETS);
    filter
        .parse::<Targets>()
        .context(InvalidFilterSnafu { filter })
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(writer: W, format: LogFormat, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

fn rolling_appender(
    opts: &LoggingOptions,
    prefix: String,
) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .context(LogDirSnafu { dir: &opts.dir })
}

/// Install the global subscriber.
///
/// Only the first call has an effect; later calls return no guards. The
/// returned guards flush the background writers when dropped and must be
/// kept alive for as long as logging is wanted.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    static START: Once = Once::new();
    let mut result = Ok(Vec::new());
    START.call_once(|| result = install(app_name, opts));
    result
}

fn install(app_name: &str, opts: &LoggingOptions) -> Result<Vec<WorkerGuard>, LoggingError> {
    let targets = log_targets(opts)?;
    let mut guards = vec![];
    let mut layers: Vec<BoxedLayer> = vec![];

    if opts.append_stderr {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        guards.push(guard);
        layers.push(fmt_layer(
            writer,
            opts.log_format,
            std::io::stderr().is_terminal(),
        ));
    }

    if !opts.dir.is_empty() {
        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(opts, app_name.to_string())?);
        guards.push(guard);
        layers.push(fmt_layer(writer, opts.log_format, false));

        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(opts, format!("{app_name}-err"))?);
        guards.push(guard);
        layers.push(
            fmt_layer(writer, opts.log_format, false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
        );
    }

    let subscriber = Registry::default().with(layers).with(targets);

    LogTracer::init().context(LogBridgeSnafu)?;
    tracing::subscriber::set_global_default(subscriber).context(GlobalSubscriberSnafu)?;

    Ok(guards)
}
