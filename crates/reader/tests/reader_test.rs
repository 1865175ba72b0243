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

use std::{io, path::Path, thread, time::Duration};

use ciborium::Value;
use crossbeam::channel::unbounded;
use qreader_reader::{
    CancellationToken, FnSink, QueueReader, ReaderConfig, StartPosition, TailState,
};
use queue::{RollStrategy, StoreWriter};
use tempfile::TempDir;
use test_case::test_case;

fn cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).unwrap();
    out
}

fn event(i: u64) -> Vec<u8> {
    cbor(&Value::Map(vec![
        (Value::Text("seq".into()), Value::Integer(i.into())),
        (Value::Text("msg".into()), Value::Text(format!("event {i}"))),
    ]))
}

fn writer(dir: &Path, per_segment: u64) -> StoreWriter {
    StoreWriter::builder(dir)
        .file_size(64 * 1024)
        .roll_strategy(RollStrategy::ByCount(per_segment))
        .index_interval(2)
        .build()
}

fn read(config: ReaderConfig) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let summary = QueueReader::new(config)
        .unwrap()
        .run(&mut out, &CancellationToken::new())
        .unwrap();
    assert_eq!(summary.final_state, TailState::Drained);
    out
}

fn sequences(lines: &[String]) -> Vec<u64> {
    lines
        .iter()
        .map(|line| {
            let (index, _) = line.split_once(':').unwrap();
            u64::from_str_radix(index.trim_start_matches("0x"), 16).unwrap()
        })
        .collect()
}

#[test]
fn test_everything_in_index_order_across_segments() {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 3);
    for i in 0..20 {
        w.append(&event(i)).unwrap();
    }

    let lines = read(ReaderConfig::builder().base_path(dir.path()).build());
    assert_eq!(sequences(&lines), (0..20).collect::<Vec<_>>());
    assert_eq!(lines[10], "0xa: seq: 10\nmsg: event 10");
}

#[test_case(StartPosition::Index(3), 5, vec![3, 4] ; "from index three")]
#[test_case(StartPosition::LastN(3), 10, vec![7, 8, 9] ; "max history three")]
#[test_case(StartPosition::LastN(50), 4, vec![0, 1, 2, 3] ; "history longer than store")]
#[test_case(StartPosition::Index(0x7f), 10, vec![] ; "index beyond store")]
fn test_start_positions(start: StartPosition, count: u64, expected: Vec<u64>) {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 2);
    for i in 0..count {
        w.append(&event(i)).unwrap();
    }

    let lines = read(
        ReaderConfig::builder()
            .base_path(dir.path())
            .start(start)
            .build(),
    );
    assert_eq!(sequences(&lines), expected);
}

#[test]
fn test_from_index_in_gap_moves_forward() {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 2);
    for i in 0..6 {
        w.append(&event(i)).unwrap();
    }
    // Remove the segment holding indices 2 and 3.
    let files = queue::path::scan_data_files(dir.path()).unwrap();
    std::fs::remove_file(&files[1].1).unwrap();

    let lines = read(
        ReaderConfig::builder()
            .base_path(dir.path())
            .start(StartPosition::Index(2))
            .build(),
    );
    assert_eq!(sequences(&lines), vec![4, 5]);
}

#[test]
fn test_exclusion_wins_over_inclusion() {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 10);
    for text in ["ERROR DEBUG trace", "ERROR disk full", "DEBUG only"] {
        w.append(&cbor(&Value::Text(text.into()))).unwrap();
    }

    let lines = read(
        ReaderConfig::builder()
            .base_path(dir.path())
            .include(vec!["ERROR".into()])
            .exclude(vec!["DEBUG".into()])
            .build(),
    );
    assert_eq!(lines, vec!["0x1: ERROR disk full"]);
}

#[test]
fn test_sealed_store_output_is_stable() {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 4);
    for i in 0..9 {
        w.append(&event(i)).unwrap();
    }
    w.roll().unwrap();

    let config = ReaderConfig::builder().base_path(dir.path()).build();
    let first = read(config.clone());
    let second = read(config);
    assert_eq!(first.len(), 9);
    assert_eq!(first, second);
}

#[test]
fn test_method_mode_survives_bad_record() {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 10);
    w.append(&cbor(&Value::Map(vec![(
        Value::Text("buy".into()),
        Value::Array(vec![Value::Text("AAPL".into()), Value::Integer(100.into())]),
    )])))
    .unwrap();
    w.append(&event(1)).unwrap();
    w.append(&cbor(&Value::Map(vec![(
        Value::Text("sell".into()),
        Value::Integer(5.into()),
    )])))
    .unwrap();

    let mut out: Vec<String> = Vec::new();
    let summary = QueueReader::new(
        ReaderConfig::builder()
            .base_path(dir.path())
            .method_reader(true)
            .build(),
    )
    .unwrap()
    .run(&mut out, &CancellationToken::new())
    .unwrap();

    assert_eq!(summary.decode_errors, 1);
    assert_eq!(summary.emitted, 3);
    assert_eq!(out[0], "0x0: buy[AAPL,100]");
    assert!(out[1].starts_with("0x1: <decode error: not a method invocation"));
    assert_eq!(out[2], "0x2: sell[5]");
}

#[test]
fn test_follow_emits_each_new_record_once() {
    let dir = TempDir::new().unwrap();
    let mut w = writer(dir.path(), 3);
    for i in 0..3 {
        w.append(&event(i)).unwrap();
    }

    let reader = QueueReader::new(
        ReaderConfig::builder()
            .base_path(dir.path())
            .follow(true)
            .suppress_index(true)
            .single_line(true)
            .poll_interval_ms(10)
            .build(),
    )
    .unwrap();

    let token = CancellationToken::new();
    let (tx, rx) = unbounded();
    let handle = {
        let token = token.clone();
        thread::spawn(move || {
            let sink = FnSink(move |line: &str| tx.send(line.to_owned()).map_err(io::Error::other));
            reader.run(sink, &token)
        })
    };

    let timeout = Duration::from_secs(10);
    for i in 0..3 {
        assert_eq!(rx.recv_timeout(timeout).unwrap(), format!("seq: {i}msg: event {i}"));
    }

    // Rolls into a second segment, which the follower must discover.
    w.append(&event(3)).unwrap();
    assert_eq!(rx.recv_timeout(timeout).unwrap(), "seq: 3msg: event 3");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    token.cancel();
    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.emitted, 4);
    assert_eq!(summary.final_state, TailState::Stopped);
}

#[test]
fn test_follow_on_empty_store_picks_up_first_segment() {
    let dir = TempDir::new().unwrap();

    let reader = QueueReader::new(
        ReaderConfig::builder()
            .base_path(dir.path())
            .follow(true)
            .start(StartPosition::LastN(5))
            .poll_interval_ms(10)
            .build(),
    )
    .unwrap();

    let token = CancellationToken::new();
    let (tx, rx) = unbounded();
    let handle = {
        let token = token.clone();
        thread::spawn(move || {
            let sink = FnSink(move |line: &str| tx.send(line.to_owned()).map_err(io::Error::other));
            reader.run(sink, &token)
        })
    };

    thread::sleep(Duration::from_millis(50));
    let mut w = writer(dir.path(), 10);
    w.append(&cbor(&Value::Text("hello".into()))).unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), "0x0: hello");
    token.cancel();
    assert_eq!(handle.join().unwrap().unwrap().emitted, 1);
}
