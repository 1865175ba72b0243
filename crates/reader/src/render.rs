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

//! Rendering of decoded CBOR values.
//!
//! Text output is a YAML-like block: a top-level map becomes one
//! `key: value` line per entry, nested maps are braced and indented, arrays
//! stay inline. JSON output is compact `serde_json`.

use std::fmt::Write;

use ciborium::Value;
use serde_json::{Map, Number, Value as Json};
use snafu::ResultExt;

use crate::{
    config::WireType,
    error::{DecodeError, JsonSnafu},
};

const INDENT: &str = "  ";

pub fn render(value: &Value, wire: WireType) -> Result<String, DecodeError> {
    match wire {
        WireType::Text => Ok(render_text(value)),
        WireType::Json => render_json(value),
    }
}

/// Render one value without the top-level block layout, as used for method
/// arguments.
pub fn render_inline(value: &Value, wire: WireType) -> Result<String, DecodeError> {
    match wire {
        WireType::Text => Ok(inline(value, 0)),
        WireType::Json => render_json(value),
    }
}

pub fn render_text(value: &Value) -> String {
    match value {
        Value::Map(entries) if !entries.is_empty() => block(entries, 0),
        other => inline(other, 0),
    }
}

pub fn render_json(value: &Value) -> Result<String, DecodeError> {
    serde_json::to_string(&to_json(value)).context(JsonSnafu)
}

fn block(entries: &[(Value, Value)], depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    entries
        .iter()
        .map(|(key, value)| format!("{pad}{}: {}", key_text(key), inline(value, depth)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i128::from(*i).to_string(),
        Value::Float(f) => format_float(*f),
        Value::Text(s) => quote_if_needed(s),
        Value::Bytes(bytes) => format!("!!binary {}", hex(bytes)),
        Value::Tag(tag, inner) => format!("!{tag} {}", inline(inner, depth)),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|item| inline(item, depth)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(entries) if entries.is_empty() => "{}".to_string(),
        Value::Map(entries) => format!(
            "{{\n{}\n{}}}",
            block(entries, depth + 1),
            INDENT.repeat(depth)
        ),
        other => format!("{other:?}"),
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::Text(s) => quote_if_needed(s),
        other => inline(other, 0),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { ".inf" } else { "-.inf" }).to_string()
    } else {
        // Keep a decimal point so floats never read back as integers.
        let s = f.to_string();
        if s.contains(['.', 'e', 'E']) { s } else { format!("{s}.0") }
    }
}

/// Strings that could be mistaken for another scalar, or that contain
/// structure characters, are written as JSON string literals.
fn quote_if_needed(s: &str) -> String {
    let plain = !s.is_empty()
        && s.trim() == s
        && !matches!(s, "null" | "true" | "false" | "~")
        && s.parse::<f64>().is_err()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | '/' | '@' | '+'));
    if plain {
        s.to_string()
    } else {
        // Serialising a str cannot fail.
        serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}"))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => {
            let wide = i128::from(*i);
            u64::try_from(wide)
                .map(Json::from)
                .or_else(|_| i64::try_from(wide).map(Json::from))
                .unwrap_or_else(|_| Json::String(wide.to_string()))
        }
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::String(hex(bytes)),
        Value::Tag(_, inner) => to_json(inner),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    Value::Text(s) => s.clone(),
                    other => to_json(other).to_string(),
                };
                object.insert(key, to_json(value));
            }
            Json::Object(object)
        }
        other => Json::String(format!("{other:?}")),
    }
}
