//! Frame decoder for the MPD response stream.
//!
//! Reads never line up with responses: one read may hold half a banner, three
//! responses, or the middle of an album-art payload. The decoder appends every
//! chunk to a [`ByteAccumulator`] and walks complete lines until one of them
//! finishes a frame:
//!
//! - `OK MPD ...` → [`Frame::Init`]
//! - `ACK [...` → [`Frame::ErrorResponse`]
//! - `OK` → [`Frame::Response`], or [`Frame::BinaryResponse`] when a
//!   `binary: N` header was seen earlier in the same frame
//!
//! After a binary header the next `N` bytes are raw and never scanned.
//!
//! # Example
//!
//! ```
//! use mpd_wire::mpd::{Frame, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//! assert!(decoder.push(b"volume: 5").unwrap().is_empty());
//!
//! let frames = decoder.push(b"0\nOK\n").unwrap();
//! assert_eq!(frames, vec![Frame::Response { text: "volume: 50\nOK\n".into() }]);
//! ```

use thiserror::Error;

use super::accumulator::ByteAccumulator;
use super::frame::Frame;
use super::header::BinaryHeader;
use super::scanner::{classify_line, find_newline, LineKind};

/// Default cap on a declared binary payload and on a frame's buffered text.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Malformed server output. The decoder has already discarded the bad frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("Invalid binary size: {0:?}")]
  InvalidBinarySize(String),
  #[error("Frame exceeds {limit} bytes without completing")]
  FrameTooLarge { limit: usize },
  #[error("Binary payload of {size} bytes exceeds limit of {limit}")]
  PayloadTooLarge { size: usize, limit: usize },
}

/// Decoding progress for the frame currently being accumulated.
#[derive(Debug, Clone)]
enum State {
  /// Scanning text lines for a frame end.
  Idle,
  /// A binary header was seen; sticky until the frame completes.
  Binary(BinaryHeader),
}

/// Incremental decoder that turns raw reads into [`Frame`]s.
///
/// Owned by exactly one reader; needs no locking.
pub struct FrameDecoder {
  buffer: ByteAccumulator,
  state: State,
  /// Start of the first line not yet examined.
  cursor: usize,
  max_frame_size: usize,
}

impl FrameDecoder {
  pub fn new() -> Self {
    Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
  }

  pub fn with_max_frame_size(max_frame_size: usize) -> Self {
    Self {
      buffer: ByteAccumulator::new(),
      state: State::Idle,
      cursor: 0,
      max_frame_size,
    }
  }

  /// Append a chunk and collect every frame it completes.
  ///
  /// On error the offending frame is dropped; frames completed before it in
  /// the same chunk are lost with it, so the connection reader uses
  /// [`extend`](Self::extend) + [`next_frame`](Self::next_frame) instead.
  pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, DecodeError> {
    self.extend(chunk);

    let mut frames = Vec::new();
    while let Some(frame) = self.next_frame()? {
      frames.push(frame);
    }
    Ok(frames)
  }

  /// Append a chunk without decoding.
  pub fn extend(&mut self, chunk: &[u8]) {
    self.buffer.append(chunk);
  }

  /// Extract the next complete frame, if the buffer holds one.
  ///
  /// `Ok(None)` means more bytes are needed. On `Err` the accumulator has
  /// been reset so the same bad bytes are never looked at twice.
  pub fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
    let result = self.scan();
    if result.is_err() {
      self.reset();
    }
    result
  }

  fn scan(&mut self) -> Result<Option<Frame>, DecodeError> {
    loop {
      if let State::Binary(header) = &self.state {
        let payload_end = header.payload_end();
        if self.buffer.len() < payload_end {
          return Ok(None);
        }
        self.cursor = self.cursor.max(payload_end);
      }

      let data = self.buffer.snapshot();
      let Some(newline) = find_newline(data, self.cursor) else {
        self.check_size()?;
        return Ok(None);
      };
      let line_start = self.cursor;
      let line_end = newline + 1;

      let in_binary = self.in_binary();

      match (classify_line(&data[line_start..line_end]), in_binary) {
        (LineKind::Init, _) => return Ok(Some(self.take_text(line_end, FrameKind::Init))),
        (LineKind::Error, _) => return Ok(Some(self.take_text(line_end, FrameKind::Error))),
        (LineKind::Terminator, false) => {
          return Ok(Some(self.take_text(line_end, FrameKind::Response)));
        }
        (LineKind::Terminator, true) => return Ok(Some(self.take_binary(line_end))),
        (LineKind::BinaryHeader, false) => {
          let Some(header) = BinaryHeader::parse(data, line_start)? else {
            return Ok(None);
          };
          if header.size > self.max_frame_size {
            return Err(DecodeError::PayloadTooLarge {
              size: header.size,
              limit: self.max_frame_size,
            });
          }
          log::debug!("Binary header: {} bytes follow", header.size);
          self.state = State::Binary(header);
          self.cursor = line_end;
        }
        _ => self.cursor = line_end,
      }
    }
  }

  fn check_size(&self) -> Result<(), DecodeError> {
    // The payload itself was held to the cap when its header was parsed.
    let pending = match &self.state {
      State::Binary(header) => self.buffer.len().saturating_sub(header.payload_end()),
      State::Idle => self.buffer.len(),
    };
    if pending > self.max_frame_size {
      return Err(DecodeError::FrameTooLarge {
        limit: self.max_frame_size,
      });
    }
    Ok(())
  }

  fn take_text(&mut self, end: usize, kind: FrameKind) -> Frame {
    let bytes = self.buffer.take(end);
    self.finish_frame();

    let text = String::from_utf8_lossy(&bytes).into_owned();
    match kind {
      FrameKind::Init => Frame::Init { text },
      FrameKind::Response => Frame::Response { text },
      FrameKind::Error => Frame::ErrorResponse { text },
    }
  }

  fn take_binary(&mut self, end: usize) -> Frame {
    let bytes = self.buffer.take(end);
    let state = std::mem::replace(&mut self.state, State::Idle);
    self.finish_frame();

    match state {
      State::Binary(header) => {
        let start = header.offset + 1;
        let binary = bytes.slice(start..header.payload_end());
        let mut text = header.text;
        text.push_str("\nOK\n");
        Frame::BinaryResponse { text, binary }
      }
      State::Idle => Frame::Response {
        text: String::from_utf8_lossy(&bytes).into_owned(),
      },
    }
  }

  fn finish_frame(&mut self) {
    self.state = State::Idle;
    self.cursor = 0;
  }

  /// Drop all buffered bytes and any half-decoded frame.
  pub fn reset(&mut self) {
    self.buffer.reset();
    self.finish_frame();
  }

  /// Bytes buffered for the frame in progress.
  pub fn buffered(&self) -> usize {
    self.buffer.len()
  }

  /// True while a binary payload is being collected.
  pub fn in_binary(&self) -> bool {
    matches!(self.state, State::Binary(_))
  }
}

impl Default for FrameDecoder {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Clone, Copy)]
enum FrameKind {
  Init,
  Response,
  Error,
}

#[cfg(test)]
mod tests {
  use super::*;
  use bytes::Bytes;

  fn binary_frame(prologue: &str, payload: &[u8]) -> Vec<u8> {
    let mut bytes = format!("{}binary: {}\n", prologue, payload.len()).into_bytes();
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(b"\nOK\n");
    bytes
  }

  fn decode_bytewise(input: &[u8]) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for byte in input {
      frames.extend(decoder.push(&[*byte]).unwrap());
    }
    frames
  }

  #[test]
  fn test_init_banner() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"OK MPD 0.21.25\n").unwrap();

    assert_eq!(
      frames,
      vec![Frame::Init {
        text: "OK MPD 0.21.25\n".into()
      }]
    );
    assert_eq!(decoder.buffered(), 0);
  }

  #[test]
  fn test_partial_banner_waits_for_newline() {
    let mut decoder = FrameDecoder::new();
    assert!(decoder.push(b"OK MPD ").unwrap().is_empty());
    assert!(decoder.push(b"0.23").unwrap().is_empty());

    let frames = decoder.push(b".5\n").unwrap();
    assert_eq!(frames[0].text(), "OK MPD 0.23.5\n");
  }

  #[test]
  fn test_plain_response() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"volume: 50\nOK\n").unwrap();

    assert_eq!(
      frames,
      vec![Frame::Response {
        text: "volume: 50\nOK\n".into()
      }]
    );
    assert_eq!(decoder.buffered(), 0);
  }

  #[test]
  fn test_empty_response() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"OK\n").unwrap();
    assert_eq!(frames, vec![Frame::Response { text: "OK\n".into() }]);
  }

  #[test]
  fn test_error_response() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"ACK [5@0] {play} malformed\n").unwrap();

    assert_eq!(
      frames,
      vec![Frame::ErrorResponse {
        text: "ACK [5@0] {play} malformed\n".into()
      }]
    );
  }

  #[test]
  fn test_error_after_partial_command_list_output() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder
      .push(b"volume: 50\nACK [50@1] {load} No such playlist\n")
      .unwrap();

    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_error());
    assert_eq!(
      frames[0].text(),
      "volume: 50\nACK [50@1] {load} No such playlist\n"
    );
  }

  #[test]
  fn test_binary_response() {
    let input = binary_frame("", &[0xde, 0xad, 0xbe, 0xef]);
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(&input).unwrap();

    assert_eq!(
      frames,
      vec![Frame::BinaryResponse {
        text: "binary: 4\n\nOK\n".into(),
        binary: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
      }]
    );
    assert_eq!(decoder.buffered(), 0);
    assert!(!decoder.in_binary());
  }

  #[test]
  fn test_binary_response_every_split_offset() {
    let input = binary_frame("", &[0xde, 0xad, 0xbe, 0xef]);
    let expected = FrameDecoder::new().push(&input).unwrap();

    for split in 1..input.len() {
      let mut decoder = FrameDecoder::new();
      let mut frames = decoder.push(&input[..split]).unwrap();
      frames.extend(decoder.push(&input[split..]).unwrap());
      assert_eq!(frames, expected, "split at {}", split);
      assert_eq!(decoder.buffered(), 0);
    }
  }

  #[test]
  fn test_binary_payload_containing_markers() {
    let payload = b"\nOK\nACK [1@0] {x} y\nOK MPD 1.0\nbinary: 9\n";
    let input = binary_frame("size: 9000\ntype: image/png\n", payload);

    let frames = FrameDecoder::new().push(&input).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].binary().map(|b| &b[..]), Some(&payload[..]));
    assert_eq!(
      frames[0].text(),
      "size: 9000\ntype: image/png\nbinary: 41\n\nOK\n"
    );

    assert_eq!(decode_bytewise(&input), frames);
  }

  #[test]
  fn test_binary_sizes_zero_and_one() {
    for payload in [&b""[..], &b"\x00"[..]] {
      let input = binary_frame("", payload);
      let frames = decode_bytewise(&input);
      assert_eq!(frames.len(), 1);
      assert_eq!(frames[0].binary().map(|b| b.len()), Some(payload.len()));
    }
  }

  #[test]
  fn test_large_binary_across_many_chunks() {
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let input = binary_frame("size: 100000\n", &payload);

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for chunk in input.chunks(8192) {
      frames.extend(decoder.push(chunk).unwrap());
    }

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].binary().map(|b| &b[..]), Some(&payload[..]));
  }

  #[test]
  fn test_stream_bytewise_matches_single_chunk() {
    let mut input = b"OK MPD 0.21.25\n".to_vec();
    input.extend_from_slice(b"volume: 50\nOK\n");
    input.extend_from_slice(b"ACK [5@0] {play} malformed\n");
    input.extend_from_slice(&binary_frame("size: 3\n", b"abc"));
    input.extend_from_slice(b"OK\n");
    input.extend_from_slice(&binary_frame("", b""));

    let whole = FrameDecoder::new().push(&input).unwrap();
    assert_eq!(whole.len(), 6);
    assert!(matches!(whole[0], Frame::Init { .. }));
    assert!(matches!(whole[1], Frame::Response { .. }));
    assert!(matches!(whole[2], Frame::ErrorResponse { .. }));
    assert!(matches!(whole[3], Frame::BinaryResponse { .. }));
    assert!(matches!(whole[4], Frame::Response { .. }));
    assert!(matches!(whole[5], Frame::BinaryResponse { .. }));

    assert_eq!(decode_bytewise(&input), whole);
  }

  #[test]
  fn test_frame_plus_partial_next() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"OK\nstate: pl").unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(decoder.buffered(), 9);

    let frames = decoder.push(b"ay\nOK\n").unwrap();
    assert_eq!(frames[0].text(), "state: play\nOK\n");
    assert_eq!(decoder.buffered(), 0);
  }

  #[test]
  fn test_invalid_binary_size_resets() {
    let mut decoder = FrameDecoder::new();
    let err = decoder.push(b"binary: four\n").unwrap_err();

    assert_eq!(err, DecodeError::InvalidBinarySize("four".into()));
    assert_eq!(decoder.buffered(), 0);
    assert!(!decoder.in_binary());

    let frames = decoder.push(b"OK\n").unwrap();
    assert_eq!(frames.len(), 1);
  }

  #[test]
  fn test_frame_size_cap() {
    let mut decoder = FrameDecoder::with_max_frame_size(16);
    assert!(decoder.push(b"0123456789").unwrap().is_empty());

    let err = decoder.push(b"0123456789").unwrap_err();
    assert_eq!(err, DecodeError::FrameTooLarge { limit: 16 });
    assert_eq!(decoder.buffered(), 0);
  }

  #[test]
  fn test_payload_at_cap_split_before_terminator() {
    let mut decoder = FrameDecoder::with_max_frame_size(1024);
    let mut input = b"size: 1024\nbinary: 1024\n".to_vec();
    input.extend(std::iter::repeat(0xab).take(1024));

    assert!(decoder.push(&input).unwrap().is_empty());
    assert!(decoder.in_binary());

    let frames = decoder.push(b"\nOK\n").unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].binary().map(|b| b.len()), Some(1024));
    assert_eq!(frames[0].text(), "size: 1024\nbinary: 1024\n\nOK\n");
    assert_eq!(decoder.buffered(), 0);
  }

  #[test]
  fn test_declared_payload_cap() {
    let mut decoder = FrameDecoder::with_max_frame_size(1024);
    let err = decoder.push(b"binary: 4096\n").unwrap_err();
    assert!(matches!(err, DecodeError::PayloadTooLarge { size: 4096, .. }));
  }

  #[test]
  fn test_next_frame_keeps_earlier_frames_on_error() {
    let mut decoder = FrameDecoder::new();
    decoder.extend(b"OK\nbinary: x\n");

    assert!(matches!(decoder.next_frame(), Ok(Some(Frame::Response { .. }))));
    assert!(decoder.next_frame().is_err());
    assert_eq!(decoder.next_frame(), Ok(None));
  }
}
