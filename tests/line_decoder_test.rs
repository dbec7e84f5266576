// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tests for line decoding and end-of-text detection on shell output.

use sshmon::monitor::{LineDecoder, LineEvent, END_OF_TEXT};
use tokio::io::AsyncWriteExt;

fn line(s: &str) -> LineEvent {
    LineEvent::Line(s.to_string())
}

#[tokio::test]
async fn test_nothing_after_sentinel_is_read() {
    let input: &[u8] = b"progress 50%\nprogress 100%\n\x03trailing garbage\n";
    let mut decoder = LineDecoder::new(input);

    assert_eq!(decoder.next_event().await.unwrap(), line("progress 50%"));
    assert_eq!(decoder.next_event().await.unwrap(), line("progress 100%"));
    assert_eq!(decoder.next_event().await.unwrap(), LineEvent::Sentinel);
}

#[tokio::test]
async fn test_empty_stream_ends_immediately() {
    let mut decoder = LineDecoder::new(&b""[..]);
    assert_eq!(decoder.next_event().await.unwrap(), LineEvent::EndOfStream);
}

#[tokio::test]
async fn test_invalid_utf8_is_replaced() {
    let mut decoder = LineDecoder::new(&b"ok \xff\xfe\n"[..]);
    assert_eq!(
        decoder.next_event().await.unwrap(),
        line("ok \u{FFFD}\u{FFFD}")
    );
}

#[tokio::test]
async fn test_lines_arriving_in_fragments() {
    let (mut tx, rx) = tokio::io::duplex(8);
    let mut decoder = LineDecoder::new(rx);

    let writer = tokio::spawn(async move {
        for chunk in [&b"hel"[..], b"lo\r", b"\nwor", b"ld", b"\n", &[END_OF_TEXT]] {
            tx.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    assert_eq!(decoder.next_event().await.unwrap(), line("hello"));
    assert_eq!(decoder.next_event().await.unwrap(), line("world"));
    assert_eq!(decoder.next_event().await.unwrap(), LineEvent::Sentinel);
    writer.await.unwrap();
}

#[tokio::test]
async fn test_cancelled_read_loses_no_bytes() {
    let (mut tx, rx) = tokio::io::duplex(64);
    let mut decoder = LineDecoder::new(rx);

    tx.write_all(b"partial").await.unwrap();
    // The line is incomplete, so this read times out mid-line.
    let timed_out = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        decoder.next_event(),
    )
    .await;
    assert!(timed_out.is_err());

    tx.write_all(b" line\n").await.unwrap();
    assert_eq!(decoder.next_event().await.unwrap(), line("partial line"));
}
